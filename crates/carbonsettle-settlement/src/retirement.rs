//! Retirement of custodied certificates.
//!
//! A batch is validated as a whole before anything moves: the sequences
//! must be non-empty and of equal length, and the owner must cover every
//! certificate (summed when a certificate repeats). Only then, index by
//! index, is the ledger debited and the certificate retired.

use std::collections::BTreeMap;

use carbonsettle_ledger::Ledger;
use carbonsettle_types::{
    AccountId, Amount, CertificateRetirement, Result, RetirementBatch, TokenId, amount,
};

pub struct RetirementEngine<'a, O> {
    retirement: &'a mut O,
    ledger: &'a mut Ledger,
    custodian: AccountId,
}

impl<'a, O: CertificateRetirement> RetirementEngine<'a, O> {
    pub fn new(retirement: &'a mut O, ledger: &'a mut Ledger, custodian: AccountId) -> Self {
        Self {
            retirement,
            ledger,
            custodian,
        }
    }

    /// Permanently retire every `(certificate, amount)` of `batch` held for `owner`.
    pub fn retire(&mut self, owner: AccountId, batch: &RetirementBatch) -> Result<()> {
        batch.validate()?;

        let mut needed: BTreeMap<TokenId, Amount> = BTreeMap::new();
        for (certificate, amount) in batch.iter() {
            let total = needed.entry(certificate).or_insert(0);
            *total = amount::checked_add(*total, amount, "retirement total")?;
        }
        for (&certificate, &total) in &needed {
            self.ledger.ensure_covers(owner, certificate, total)?;
        }

        for (certificate, amount) in batch.iter() {
            self.ledger.debit(owner, certificate, amount)?;
            self.retirement.retire(certificate, self.custodian, amount)?;
            tracing::debug!(
                owner = %owner,
                certificate = %certificate,
                amount,
                "Certificate retired"
            );
        }
        Ok(())
    }
}
