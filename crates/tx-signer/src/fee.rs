//! Fee cap computation for dynamic fee transactions.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    constants::fee::{DEFAULT_HEADROOM_DENOMINATOR, DEFAULT_HEADROOM_NUMERATOR},
    Result, SignerError,
};

/// Headroom applied to the latest base fee so a transaction stays includable while the base
/// fee rises.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FeePolicy {
    /// Numerator of the multiplier
    pub headroom_numerator: u128,
    /// Denominator of the multiplier, non-zero
    pub headroom_denominator: u128,
}

impl Default for FeePolicy {
    fn default() -> Self {
        Self {
            headroom_numerator: DEFAULT_HEADROOM_NUMERATOR,
            headroom_denominator: DEFAULT_HEADROOM_DENOMINATOR,
        }
    }
}

/// Fee figures of a dynamic fee transaction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct FeeCaps {
    /// `maxPriorityFeePerGas`
    pub max_priority_fee_per_gas: u128,
    /// `maxFeePerGas`
    pub max_fee_per_gas: u128,
}

impl FeePolicy {
    /// Checks that the denominator is non-zero.
    pub fn validate(&self) -> Result<()> {
        if self.headroom_denominator == 0 {
            return Err(SignerError::invalid_field("headroomDenominator", "must be non-zero"));
        }
        Ok(())
    }

    /// `floor(base_fee * numerator / denominator)`.
    pub fn buffered_base_fee(&self, base_fee: u128) -> Result<u128> {
        self.validate()?;
        base_fee
            .checked_mul(self.headroom_numerator)
            .map(|scaled| scaled / self.headroom_denominator)
            .ok_or_else(|| SignerError::invalid_field("baseFee", "overflows with fee headroom"))
    }

    /// Computes the fee caps from a base fee history, oldest first, and a suggested tip.
    ///
    /// Only the latest base fee is used: `fee_cap = floor(latest * headroom) + tip`.
    pub fn compute_fee_cap(&self, base_fee_history: &[u128], tip: u128) -> Result<FeeCaps> {
        let latest = *base_fee_history
            .last()
            .ok_or_else(|| SignerError::invalid_field("baseFeeHistory", "must not be empty"))?;
        let buffered = self.buffered_base_fee(latest)?;
        let max_fee_per_gas = buffered
            .checked_add(tip)
            .ok_or_else(|| SignerError::invalid_field("maxFeePerGas", "overflows 128 bits"))?;

        debug!(latest, buffered, tip, max_fee_per_gas, "Computed fee caps");
        Ok(FeeCaps { max_priority_fee_per_gas: tip, max_fee_per_gas })
    }
}

/// [`FeePolicy::compute_fee_cap`] with the default policy.
pub fn compute_fee_cap(base_fee_history: &[u128], tip: u128) -> Result<FeeCaps> {
    FeePolicy::default().compute_fee_cap(base_fee_history, tip)
}
