//! Certificate batches.
//!
//! A [`RetirementBatch`] is a pair of parallel sequences (certificate
//! tokens and amounts) produced by automatic redemption and consumed by
//! retirement within the same invocation.

use serde::{Deserialize, Serialize};

use crate::{Amount, Result, SettleError, TokenId, amount};

/// Parallel (certificate, amount) sequences.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetirementBatch {
    pub certificates: Vec<TokenId>,
    pub amounts: Vec<Amount>,
}

impl RetirementBatch {
    #[must_use]
    pub fn new(certificates: Vec<TokenId>, amounts: Vec<Amount>) -> Self {
        Self {
            certificates,
            amounts,
        }
    }

    /// Check the sequences are non-empty and of equal length.
    ///
    /// # Errors
    /// Returns [`SettleError::ArityMismatch`] otherwise.
    pub fn validate(&self) -> Result<()> {
        if self.certificates.is_empty() || self.certificates.len() != self.amounts.len() {
            return Err(SettleError::ArityMismatch {
                certificates: self.certificates.len(),
                amounts: self.amounts.len(),
            });
        }
        Ok(())
    }

    /// Sum of all amounts.
    pub fn total(&self) -> Result<Amount> {
        amount::checked_sum(&self.amounts, "batch total")
    }

    /// Iterate `(certificate, amount)` pairs in order.
    pub fn iter(&self) -> impl Iterator<Item = (TokenId, Amount)> + '_ {
        self.certificates
            .iter()
            .copied()
            .zip(self.amounts.iter().copied())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.certificates.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.certificates.is_empty()
    }
}
