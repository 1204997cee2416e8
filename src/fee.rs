//! Exit fee configuration.
//!
//! The fee is a rate in basis points applied to the staked amount when a
//! participant exits. [`FeeConfig`] keeps its fields private so the bounds
//! below hold between every call, including after deserialization:
//!
//! * `rate <= MAX_RATE`
//! * `collector` is never the zero identity

use crate::auth::AdminGrant;
use crate::error::LedgerError;
use crate::events::LedgerEvent;
use crate::identity::Identity;
use crate::transfer::Amount;
use serde::{Deserialize, Serialize};

/// Denominator of the fee rate (basis points).
pub const RATE_DENOMINATOR: u32 = 10_000;

/// Largest accepted fee rate: 10 % of the stake.
pub const MAX_RATE: u32 = 1_000;

/// Current fee rate and the identity that receives fee proceeds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawFeeConfig")]
pub struct FeeConfig {
    rate: u32,
    collector: Identity,
}

#[derive(Deserialize)]
struct RawFeeConfig {
    rate: u32,
    collector: Identity,
}

impl TryFrom<RawFeeConfig> for FeeConfig {
    type Error = LedgerError;

    fn try_from(raw: RawFeeConfig) -> Result<Self, Self::Error> {
        check_rate(raw.rate)?;
        let mut config = Self::new(raw.collector)?;
        config.rate = raw.rate;
        Ok(config)
    }
}

fn check_rate(rate: u32) -> Result<(), LedgerError> {
    if rate > MAX_RATE {
        return Err(LedgerError::RateTooHigh {
            rate,
            max: MAX_RATE,
        });
    }
    Ok(())
}

impl FeeConfig {
    /// Zero-rate configuration paying fees to `collector`.
    pub fn new(collector: Identity) -> Result<Self, LedgerError> {
        if collector.is_zero() {
            return Err(LedgerError::InvalidCollector);
        }
        Ok(Self { rate: 0, collector })
    }

    /// Current rate in basis points.
    pub fn rate(&self) -> u32 {
        self.rate
    }

    /// Current fee recipient.
    pub fn collector(&self) -> &Identity {
        &self.collector
    }

    /// Replaces the rate. Rates above [`MAX_RATE`] leave the config unchanged.
    pub fn set_rate(&mut self, _grant: &AdminGrant, rate: u32) -> Result<LedgerEvent, LedgerError> {
        check_rate(rate)?;
        self.rate = rate;
        Ok(LedgerEvent::FeeUpdated { rate })
    }

    /// Replaces the collector. The zero identity is rejected.
    pub fn set_collector(
        &mut self,
        _grant: &AdminGrant,
        collector: Identity,
    ) -> Result<LedgerEvent, LedgerError> {
        if collector.is_zero() {
            return Err(LedgerError::InvalidCollector);
        }
        self.collector = collector;
        Ok(LedgerEvent::FeeCollectorUpdated { collector })
    }

    /// `amount * rate / RATE_DENOMINATOR`, truncated.
    ///
    /// Split as `q * rate + r * rate / D` with `amount = q * D + r`, which is
    /// exact and cannot overflow because `rate < D`.
    pub fn compute_fee(&self, amount: Amount) -> Amount {
        let denominator = Amount::from(RATE_DENOMINATOR);
        let rate = Amount::from(self.rate);
        let whole = amount / denominator;
        let remainder = amount % denominator;
        whole * rate + remainder * rate / denominator
    }
}
