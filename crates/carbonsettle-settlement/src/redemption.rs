//! Automatic redemption of pool certificate tokens.
//!
//! ```text
//! pool redeemable → owner covers amount → automatic_redeem(custodian)
//!   → Σ amounts == amount → debit (owner, pool) → credit (owner, cert_i)
//! ```
//!
//! The ledger is only touched once the pool has returned a batch that
//! conserves value.

use carbonsettle_ledger::{EligibilityRegistry, Ledger, verify_redemption};
use carbonsettle_types::{
    AccountId, Amount, CertificatePool, Result, RetirementBatch, SettleError, TokenId,
};

pub struct RedemptionEngine<'a, O> {
    pool: &'a mut O,
    ledger: &'a mut Ledger,
    registry: &'a EligibilityRegistry,
    custodian: AccountId,
}

impl<'a, O: CertificatePool> RedemptionEngine<'a, O> {
    pub fn new(
        pool: &'a mut O,
        ledger: &'a mut Ledger,
        registry: &'a EligibilityRegistry,
        custodian: AccountId,
    ) -> Self {
        Self {
            pool,
            ledger,
            registry,
            custodian,
        }
    }

    /// Exchange `amount` of `owner`'s custodied `pool` tokens for the
    /// underlying certificates.
    ///
    /// # Errors
    /// - `IneligibleToken` if `pool` is not redeemable
    /// - `InsufficientLedgerBalance` if the owner cannot cover `amount`
    /// - `ArityMismatch` / `ConservationViolation` for a malformed batch
    pub fn redeem(
        &mut self,
        owner: AccountId,
        pool: TokenId,
        amount: Amount,
    ) -> Result<RetirementBatch> {
        if amount == 0 {
            return Err(SettleError::ZeroAmount { operation: "redeem" });
        }
        self.registry.require_redeemable(pool)?;
        self.ledger.ensure_covers(owner, pool, amount)?;

        let batch = self.pool.automatic_redeem(pool, self.custodian, amount)?;
        verify_redemption(amount, &batch)?;

        self.ledger.debit(owner, pool, amount)?;
        for (certificate, received) in batch.iter() {
            self.ledger.credit(owner, certificate, received)?;
        }

        tracing::debug!(
            owner = %owner,
            pool = %pool,
            amount,
            certificates = batch.len(),
            "Pool tokens redeemed"
        );
        Ok(batch)
    }
}

#[cfg(test)]
mod tests {
    use carbonsettle_types::{EligibilityConfig, testing::MockChain};

    use super::*;

    fn t(label: &str) -> TokenId {
        TokenId::from_label(label)
    }

    struct Fixture {
        chain: MockChain,
        ledger: Ledger,
        registry: EligibilityRegistry,
        custodian: AccountId,
        alice: AccountId,
    }

    impl Fixture {
        fn new() -> Self {
            let config = EligibilityConfig::default()
                .with_token("USDC", t("USDC"))
                .with_token("BCT", t("BCT"));
            let fx = Self {
                chain: MockChain::new(),
                ledger: Ledger::new(),
                registry: EligibilityRegistry::new(AccountId::from_label("admin"), &config),
                custodian: AccountId::from_label("custodian"),
                alice: AccountId::from_label("alice"),
            };
            fx.chain.add_inventory(t("BCT"), t("TCO2-A"), 60);
            fx.chain.add_inventory(t("BCT"), t("TCO2-B"), 1_000);
            fx
        }

        /// Alice holds `amount` BCT in custody.
        fn custody_bct(&mut self, amount: Amount) {
            self.chain.mint(t("BCT"), self.custodian, amount);
            self.ledger.credit(self.alice, t("BCT"), amount).unwrap();
        }

        fn redeem(&mut self, pool: TokenId, amount: Amount) -> Result<RetirementBatch> {
            let mut offsets = self.chain.offsets();
            RedemptionEngine::new(&mut offsets, &mut self.ledger, &self.registry, self.custodian)
                .redeem(self.alice, pool, amount)
        }
    }

    #[test]
    fn redemption_moves_value_into_certificates() {
        let mut fx = Fixture::new();
        fx.custody_bct(100);

        let batch = fx.redeem(t("BCT"), 100).unwrap();
        assert_eq!(batch.certificates, vec![t("TCO2-A"), t("TCO2-B")]);
        assert_eq!(batch.amounts, vec![60, 40]);
        assert_eq!(fx.ledger.balance(fx.alice, t("BCT")), 0);
        assert_eq!(fx.ledger.balance(fx.alice, t("TCO2-A")), 60);
        assert_eq!(fx.ledger.balance(fx.alice, t("TCO2-B")), 40);
        assert_eq!(fx.chain.balance(t("TCO2-A"), fx.custodian), 60);
    }

    #[test]
    fn insufficient_balance_never_calls_the_pool() {
        let mut fx = Fixture::new();
        fx.custody_bct(10);
        let err = fx.redeem(t("BCT"), 11).unwrap_err();
        assert!(matches!(err, SettleError::InsufficientLedgerBalance { .. }));
        assert!(fx.chain.calls().is_empty());
    }

    #[test]
    fn non_redeemable_token_rejected() {
        let mut fx = Fixture::new();
        fx.ledger.credit(fx.alice, t("USDC"), 5).unwrap();
        let err = fx.redeem(t("USDC"), 5).unwrap_err();
        assert!(matches!(err, SettleError::IneligibleToken { .. }));
        assert!(fx.chain.calls().is_empty());
    }

    #[test]
    fn skimmed_redemption_is_a_conservation_violation() {
        let mut fx = Fixture::new();
        fx.custody_bct(100);
        fx.chain.set_redemption_skim(1);
        let err = fx.redeem(t("BCT"), 100).unwrap_err();
        assert!(matches!(err, SettleError::ConservationViolation { .. }));
        assert_eq!(fx.ledger.balance(fx.alice, t("BCT")), 100);
        assert_eq!(fx.ledger.balance(fx.alice, t("TCO2-A")), 0);
    }

    #[test]
    fn pool_failure_leaves_ledger_untouched() {
        let mut fx = Fixture::new();
        fx.custody_bct(100);
        fx.chain.fail("pool.automatic_redeem");
        assert!(matches!(
            fx.redeem(t("BCT"), 100),
            Err(SettleError::ExternalCallFailure { .. })
        ));
        assert_eq!(fx.ledger.balance(fx.alice, t("BCT")), 100);
    }
}
