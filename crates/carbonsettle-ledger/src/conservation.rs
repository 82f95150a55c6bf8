//! Conservation checks.
//!
//! Two invariants tie the ledger to the outside world:
//! ```text
//! redemption:  Σ certificate amounts == pool tokens redeemed
//! custody:     ∀ token: Σ ledger balances <= custodian holdings
//! ```
//!
//! A redemption that returns less (or more) than it burned would silently
//! mint or destroy ledger value, so the invocation is aborted instead.

use carbonsettle_types::{Amount, Result, RetirementBatch, SettleError, TokenId};
use serde::{Deserialize, Serialize};

/// Verify that a redemption of `input` pool tokens produced exactly `input`
/// worth of certificates.
///
/// # Errors
/// `ArityMismatch` if the batch is malformed, `ConservationViolation` if the
/// sum differs from `input`.
pub fn verify_redemption(input: Amount, batch: &RetirementBatch) -> Result<()> {
    batch.validate()?;
    let produced = batch.total()?;
    if produced != input {
        return Err(SettleError::ConservationViolation {
            reason: format!(
                "redeemed {input} pool tokens but received {produced} across {} certificates",
                batch.len()
            ),
        });
    }
    Ok(())
}

/// Result of a custody audit for one token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustodyReport {
    pub token: TokenId,
    /// Σ of every owner's ledger balance.
    pub ledger_total: Amount,
    /// What the custodian actually holds.
    pub holdings: Amount,
    /// `holdings - ledger_total`; dust left over from swaps or direct transfers.
    pub surplus: Amount,
}

/// Check that the ledger never promises more of `token` than the custodian holds.
///
/// # Errors
/// Returns `ConservationViolation` if `ledger_total > holdings`.
pub fn verify_custody(
    token: TokenId,
    ledger_total: Amount,
    holdings: Amount,
) -> Result<CustodyReport> {
    let Some(surplus) = holdings.checked_sub(ledger_total) else {
        return Err(SettleError::ConservationViolation {
            reason: format!(
                "token {token}: ledger total {ledger_total} exceeds custodian holdings {holdings}"
            ),
        });
    };
    Ok(CustodyReport {
        token,
        ledger_total,
        holdings,
        surplus,
    })
}
