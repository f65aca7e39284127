use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies one rate-limit window: who is calling, from where, and for which operation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RateLimitKey {
    pub client_ip: String,
    pub identity: String,
    pub operation: String,
}

impl RateLimitKey {
    pub fn new(
        client_ip: impl Into<String>,
        identity: impl Into<String>,
        operation: impl Into<String>,
    ) -> Self {
        Self {
            client_ip: client_ip.into(),
            identity: identity.into(),
            operation: operation.into(),
        }
    }
}

/// Storage key of the window log, `ip:identity:operation`.
impl fmt::Display for RateLimitKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.client_ip, self.identity, self.operation)
    }
}

/// Outcome of a throttle check. A rejection is a normal value, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    pub allowed: bool,
    /// Maximum requests admitted per window.
    pub limit: u64,
    /// Requests recorded in the window after this call.
    pub count: u64,
    pub remaining: u64,
    /// Epoch millis at which the oldest recorded request leaves the window.
    pub reset_at_ms: i64,
    /// Seconds until a retry can succeed. Set only on rejection.
    pub retry_after_secs: Option<u64>,
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        self.allowed
    }
}
