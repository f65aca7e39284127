//! Runtime configuration.
//!
//! Every option can come from the command line or from the environment; the
//! environment variable names match the deployment settings of the banking API.

use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

/// Limits applied by the sliding-window throttle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThrottleConfig {
    pub max_requests: u64,
    pub window: Duration,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            max_requests: 5,
            window: Duration::from_secs(60),
        }
    }
}

/// Timing limits of the transfer engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerConfig {
    /// How long a unit of work waits for another one's row lock.
    pub lock_timeout: Duration,
    /// Deadline applied to each transfer, end to end.
    pub transfer_deadline: Duration,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            lock_timeout: Duration::from_secs(5),
            transfer_deadline: Duration::from_secs(10),
        }
    }
}

#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Replays transfer requests against a ledger", long_about = None)]
pub struct Config {
    /// Accounts CSV (id, owner, currency, balance) used to seed the ledger
    pub accounts: PathBuf,

    /// Transfer requests CSV (from, to, amount, currency, ip, user)
    pub transfers: PathBuf,

    /// Exchange rates CSV (currency, rate)
    #[arg(long)]
    pub rates: Option<PathBuf>,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long)]
    pub db_path: Option<PathBuf>,

    /// Maximum transfer requests per identity and client within one window
    #[arg(long, env = "API_LIMIT_BOUND", default_value_t = 5)]
    pub api_limit_bound: u64,

    /// Length of the rate-limit window, in seconds
    #[arg(long, env = "API_LIMIT_DURATION", default_value_t = 60)]
    pub api_limit_duration: u64,

    /// Row lock wait timeout, in milliseconds
    #[arg(long, env = "LOCK_TIMEOUT_MS", default_value_t = 5_000)]
    pub lock_timeout_ms: u64,

    /// Per-transfer deadline, in milliseconds
    #[arg(long, env = "TRANSFER_DEADLINE_MS", default_value_t = 10_000)]
    pub transfer_deadline_ms: u64,
}

impl Config {
    pub fn throttle(&self) -> ThrottleConfig {
        ThrottleConfig {
            max_requests: self.api_limit_bound,
            window: Duration::from_secs(self.api_limit_duration),
        }
    }

    pub fn ledger(&self) -> LedgerConfig {
        LedgerConfig {
            lock_timeout: Duration::from_millis(self.lock_timeout_ms),
            transfer_deadline: Duration::from_millis(self.transfer_deadline_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_library_defaults() {
        let config = Config::try_parse_from(["simplebank", "a.csv", "t.csv"]).unwrap();
        assert_eq!(config.throttle(), ThrottleConfig::default());
        assert_eq!(config.ledger(), LedgerConfig::default());
        assert!(config.db_path.is_none());
    }

    #[test]
    fn test_flags_override_defaults() {
        let config = Config::try_parse_from([
            "simplebank",
            "a.csv",
            "t.csv",
            "--api-limit-bound",
            "2",
            "--api-limit-duration",
            "10",
            "--lock-timeout-ms",
            "250",
        ])
        .unwrap();
        assert_eq!(config.throttle().max_requests, 2);
        assert_eq!(config.throttle().window, Duration::from_secs(10));
        assert_eq!(config.ledger().lock_timeout, Duration::from_millis(250));
    }
}
