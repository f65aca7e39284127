use crate::domain::account::Currency;
use crate::domain::ports::RateProviderRef;
use crate::error::{BankError, Result};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

/// Converts an amount between currencies using rates from a [`RateProvider`].
///
/// [`RateProvider`]: crate::domain::ports::RateProvider
#[derive(Clone)]
pub struct CurrencyExchange {
    rates: RateProviderRef,
}

impl CurrencyExchange {
    pub fn new(rates: RateProviderRef) -> Self {
        Self { rates }
    }

    /// Returns the amount credited in `to` for `amount` debited in `from`.
    /// Same-currency conversion is the identity and performs no lookup.
    pub async fn convert(&self, from: &Currency, to: &Currency, amount: i64) -> Result<i64> {
        if amount <= 0 {
            return Err(BankError::Validation(
                "transfer amount must be positive".into(),
            ));
        }
        if from == to {
            return Ok(amount);
        }

        let from_rate = self.rates.get_rate(from).await?;
        let to_rate = self.rates.get_rate(to).await?;
        convert_amount(amount, from_rate, to_rate)
    }
}

/// `floor(amount * from_rate / to_rate)`, in exact decimal arithmetic.
pub fn convert_amount(amount: i64, from_rate: Decimal, to_rate: Decimal) -> Result<i64> {
    if from_rate <= Decimal::ZERO || to_rate <= Decimal::ZERO {
        return Err(BankError::Validation(
            "exchange rates must be positive".into(),
        ));
    }

    Decimal::from(amount)
        .checked_mul(from_rate)
        .and_then(|v| v.checked_div(to_rate))
        .and_then(|v| v.floor().to_i64())
        .ok_or_else(|| BankError::Validation("converted amount out of range".into()))
}
