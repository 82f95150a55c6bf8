//! End-to-end tests across all three planes.
//!
//! Exchange plane (planner + gateway) -> custody plane (ledger + registry)
//! -> finality plane (redemption + retirement), driven through the
//! orchestrator against the in-memory chain.
//!
//! Pool inventory for BCT is 60 of `TCO2-A` followed by a deep stock of
//! `TCO2-B`, so every BCT redemption above 60 splits across both.

use carbonsettle_settlement::SettlementOrchestrator;
use carbonsettle_types::testing::{ExternalCall, MockChain, MockCustody, MockOffsets, MockRouter};
use carbonsettle_types::*;
use rust_decimal::Decimal;

type Orchestrator = SettlementOrchestrator<MockRouter, MockCustody, MockOffsets>;

fn t(label: &str) -> TokenId {
    TokenId::from_label(label)
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Helper: one orchestrator wired to one mock chain, with a funded user.
struct OffsetPipeline {
    chain: MockChain,
    orch: Orchestrator,
    alice: AccountId,
}

impl OffsetPipeline {
    fn new() -> Self {
        Self::with_config(|_| {})
    }

    fn with_config(tweak: impl FnOnce(&mut SettlementConfig)) -> Self {
        init_tracing();
        let chain = MockChain::new();
        // 1 WMATIC = 0.5 USDC, 1 WETH = 2000 USDC, 1 USDC = 1 BCT = 0.5 NCT.
        chain.set_rate(t("WMATIC"), t("USDC"), 1, 2);
        chain.set_rate(t("WETH"), t("USDC"), 2000, 1);
        chain.set_rate(t("USDC"), t("BCT"), 1, 1);
        chain.set_rate(t("USDC"), t("NCT"), 1, 2);
        chain.add_inventory(t("BCT"), t("TCO2-A"), 60);
        chain.add_inventory(t("BCT"), t("TCO2-B"), 1_000_000);
        chain.add_inventory(t("NCT"), t("TCO2-N"), 1_000_000);

        let mut config = SettlementConfig::new(
            Self::admin(),
            Self::custodian(),
            MockChain::registry_address(),
        );
        config.eligibility = EligibilityConfig::default()
            .with_token("USDC", t("USDC"))
            .with_token("WMATIC", t("WMATIC"))
            .with_token("WETH", t("WETH"))
            .with_token("BCT", t("BCT"))
            .with_token("NCT", t("NCT"));
        tweak(&mut config);

        let orch =
            SettlementOrchestrator::new(config, chain.router(), chain.custody(), chain.offsets())
                .expect("valid config");
        Self {
            chain,
            orch,
            alice: AccountId::from_label("alice"),
        }
    }

    fn admin() -> AccountId {
        AccountId::from_label("admin")
    }

    fn custodian() -> AccountId {
        AccountId::from_label("custodian")
    }

    fn ctx(&self) -> CallContext {
        CallContext::new(self.alice)
    }

    /// Give alice `amount` of `token` and let the custodian pull it.
    fn fund(&self, token: &str, amount: Amount) {
        self.chain.mint(t(token), self.alice, amount);
        self.chain.approve(t(token), self.alice, Self::custodian(), amount);
    }

    fn balance(&self, token: &str) -> Amount {
        self.orch.balance(self.alice, t(token))
    }

    fn assert_custody_backed(&self, tokens: &[&str]) {
        for token in tokens {
            self.orch
                .verify_custody(t(token))
                .unwrap_or_else(|e| panic!("custody audit for {token} failed: {e}"));
        }
    }

    fn retire_calls(&self) -> usize {
        self.chain.count(|c| matches!(c, ExternalCall::Retire { .. }))
    }
}

// =============================================================================
// Test: deposit 100 pool tokens -> A=60 / B=40 -> both retired
// =============================================================================
#[test]
fn e2e_pool_token_offset() {
    let mut p = OffsetPipeline::new();
    p.fund("BCT", 100);

    let receipt = p.orch.offset_pool_token(&p.ctx(), t("BCT"), 100).unwrap();

    assert_eq!(receipt.workflow, Workflow::PoolTokenIn);
    assert_eq!(receipt.retired.certificates, vec![t("TCO2-A"), t("TCO2-B")]);
    assert_eq!(receipt.retired.amounts, vec![60, 40]);
    assert_eq!(receipt.pool_amount, 100);
    assert!(receipt.path.is_none());
    assert!(receipt.verify_digest());

    assert_eq!(p.chain.retirements(), vec![(t("TCO2-A"), 60), (t("TCO2-B"), 40)]);
    assert_eq!(p.balance("BCT"), 0);
    assert_eq!(p.balance("TCO2-A"), 0);
    assert_eq!(p.balance("TCO2-B"), 0);
    assert_eq!(p.chain.balance(t("BCT"), p.alice), 0);
    p.assert_custody_backed(&["BCT", "TCO2-A", "TCO2-B"]);
}

// =============================================================================
// Test: retirement atomicity, [5, 3] against balances [5, 2]
// =============================================================================
#[test]
fn e2e_retirement_is_all_or_nothing() {
    let mut p = OffsetPipeline::new();
    p.fund("TCO2-A", 5);
    p.fund("TCO2-B", 2);
    let ctx = p.ctx();
    p.orch.deposit(&ctx, t("TCO2-A"), 5).unwrap();
    p.orch.deposit(&ctx, t("TCO2-B"), 2).unwrap();

    let batch = RetirementBatch::new(vec![t("TCO2-A"), t("TCO2-B")], vec![5, 3]);
    let err = p.orch.retire(&ctx, &batch).unwrap_err();

    assert!(matches!(err, SettleError::InsufficientLedgerBalance { .. }));
    assert_eq!(p.balance("TCO2-A"), 5);
    assert_eq!(p.balance("TCO2-B"), 2);
    assert_eq!(p.retire_calls(), 0);

    // The affordable batch goes through.
    let batch = RetirementBatch::new(vec![t("TCO2-A"), t("TCO2-B")], vec![5, 2]);
    p.orch.retire(&ctx, &batch).unwrap();
    assert_eq!(p.retire_calls(), 2);
    assert_eq!(p.balance("TCO2-A"), 0);
}

// =============================================================================
// Test: eligibility gating happens before any external interaction
// =============================================================================
#[test]
fn e2e_ineligible_tokens_make_no_external_calls() {
    let mut p = OffsetPipeline::new();
    p.fund("DAI", 1_000);
    p.fund("USDC", 1_000);
    let ctx = p.ctx().with_value(1_000);

    let err = p
        .orch
        .offset_token_exact_out(&ctx, t("DAI"), t("BCT"), 10, RoutingStrategy::Default)
        .unwrap_err();
    assert!(matches!(
        err,
        SettleError::IneligibleToken { required: Eligibility::Swappable, .. }
    ));

    let err = p
        .orch
        .offset_token_exact_in(&ctx, t("USDC"), 10, t("WETH"), RoutingStrategy::Default, None)
        .unwrap_err();
    assert!(matches!(
        err,
        SettleError::IneligibleToken { required: Eligibility::Redeemable, .. }
    ));

    assert!(p
        .orch
        .offset_native_exact_out(&ctx, t("USDC"), 10, RoutingStrategy::Default)
        .is_err());
    assert!(p.orch.offset_pool_token(&ctx, t("USDC"), 10).is_err());

    assert!(p.chain.calls().is_empty());
    assert!(p.orch.ledger().entries_for(p.alice).is_empty());
}

// =============================================================================
// Test: native exact-output refunds the unspent attached value
// =============================================================================
#[test]
fn e2e_native_exact_out_refund() {
    let mut p = OffsetPipeline::new();
    p.chain.fund_native(p.alice, 10_000);
    let ctx = p.ctx().with_value(1_000);

    let receipt = p
        .orch
        .offset_native_exact_out(&ctx, t("BCT"), 100, RoutingStrategy::Default)
        .unwrap();

    // 100 BCT <- 100 USDC <- 200 WMATIC.
    assert_eq!(receipt.input_spent, 200);
    assert_eq!(
        receipt.path.as_ref().map(PathPlan::hops),
        Some(&[t("WMATIC"), t("USDC"), t("BCT")][..])
    );
    assert_eq!(p.chain.native(p.alice), 9_800);
    assert_eq!(p.chain.native(OffsetPipeline::custodian()), 0);
    assert_eq!(receipt.retired.amounts, vec![60, 40]);
    assert_eq!(p.balance("BCT"), 0);
    p.assert_custody_backed(&["BCT", "TCO2-A", "TCO2-B"]);
}

#[test]
fn e2e_native_exact_out_underfunded() {
    let mut p = OffsetPipeline::new();
    p.chain.fund_native(p.alice, 10_000);
    let ctx = p.ctx().with_value(199);

    let err = p
        .orch
        .offset_native_exact_out(&ctx, t("BCT"), 100, RoutingStrategy::Default)
        .unwrap_err();
    assert!(matches!(
        err,
        SettleError::InsufficientAttachedValue { needed: 200, attached: 199 }
    ));
    assert_eq!(p.chain.native(p.alice), 10_000);
    assert_eq!(p.chain.count(ExternalCall::is_swap), 0);
}

// =============================================================================
// Test: native exact-input spends everything attached
// =============================================================================
#[test]
fn e2e_native_exact_in() {
    let mut p = OffsetPipeline::new();
    p.chain.fund_native(p.alice, 400);
    let ctx = p.ctx().with_value(400);

    let receipt = p
        .orch
        .offset_native_exact_in(&ctx, t("BCT"), RoutingStrategy::Default, None)
        .unwrap();

    assert_eq!(receipt.input_spent, 400);
    assert_eq!(receipt.pool_amount, 200);
    assert_eq!(receipt.retired.amounts, vec![60, 140]);
    assert_eq!(p.chain.native(p.alice), 0);
    assert_eq!(p.retire_calls(), 2);
    p.assert_custody_backed(&["WMATIC", "USDC", "BCT", "TCO2-A", "TCO2-B"]);
}

// =============================================================================
// Test: token workflows and the default path rule
// =============================================================================
#[test]
fn e2e_token_exact_out_pivots_through_stablecoin() {
    let mut p = OffsetPipeline::new();
    p.fund("WETH", 5);

    let receipt = p
        .orch
        .offset_token_exact_out(&p.ctx(), t("WETH"), t("BCT"), 100, RoutingStrategy::Default)
        .unwrap();

    let path = receipt.path.expect("swap ran");
    assert_eq!(path.hops(), &[t("WETH"), t("USDC"), t("BCT")]);
    assert_eq!(receipt.input_spent, 1);
    assert_eq!(p.chain.balance(t("WETH"), p.alice), 4);
    assert_eq!(
        p.chain.allowance(t("WETH"), OffsetPipeline::custodian(), MockChain::router_address()),
        0
    );
    p.assert_custody_backed(&["WETH", "BCT", "TCO2-A", "TCO2-B"]);
}

#[test]
fn e2e_token_exact_in_from_stablecoin_is_direct() {
    let mut p = OffsetPipeline::new();
    p.fund("USDC", 250);

    let receipt = p
        .orch
        .offset_token_exact_in(&p.ctx(), t("USDC"), 250, t("BCT"), RoutingStrategy::Default, None)
        .unwrap();

    assert_eq!(receipt.path.map(|path| path.len()), Some(2));
    assert_eq!(receipt.pool_amount, 250);
    assert_eq!(receipt.retired.amounts, vec![60, 190]);
    assert_eq!(p.chain.balance(t("USDC"), p.alice), 0);
    assert_eq!(
        p.chain.allowance(t("USDC"), OffsetPipeline::custodian(), MockChain::router_address()),
        0
    );
    p.assert_custody_backed(&["USDC", "BCT", "TCO2-A", "TCO2-B"]);
}

#[test]
fn e2e_unspent_input_refunded_and_allowance_revoked() {
    let mut p = OffsetPipeline::new();
    p.fund("USDC", 1_000);
    p.chain.set_input_rebate(3);

    let receipt = p
        .orch
        .offset_token_exact_out(&p.ctx(), t("USDC"), t("NCT"), 50, RoutingStrategy::Default)
        .unwrap();

    // 50 NCT quotes at 100 USDC; the router only took 97.
    assert_eq!(receipt.input_spent, 97);
    assert_eq!(p.chain.balance(t("USDC"), p.alice), 903);
    assert_eq!(
        p.chain.allowance(t("USDC"), OffsetPipeline::custodian(), MockChain::router_address()),
        0
    );
    p.assert_custody_backed(&["USDC", "NCT", "TCO2-N"]);
}

// =============================================================================
// Test: mid-workflow failures roll the ledger back
// =============================================================================
#[test]
fn e2e_retire_failure_rolls_back_ledger() {
    let mut p = OffsetPipeline::new();
    p.fund("USDC", 1_000);
    p.chain.fail("certificate.retire");

    let err = p
        .orch
        .offset_token_exact_out(&p.ctx(), t("USDC"), t("BCT"), 100, RoutingStrategy::Default)
        .unwrap_err();

    assert!(matches!(
        err,
        SettleError::ExternalCallFailure { call: "certificate.retire", .. }
    ));
    assert!(p.orch.ledger().entries_for(p.alice).is_empty());
    assert!(!p.orch.ledger().in_transaction());
}

#[test]
fn e2e_missing_pool_fails_without_collecting_value() {
    let mut p = OffsetPipeline::new();
    p.chain.fund_native(p.alice, 1_000);
    let ctx = p.ctx().with_value(1_000);

    // No WMATIC -> BCT pool exists.
    let err = p
        .orch
        .offset_native_exact_out(&ctx, t("BCT"), 10, RoutingStrategy::DirectOverride)
        .unwrap_err();
    assert!(matches!(err, SettleError::ExternalCallFailure { .. }));
    assert_eq!(p.chain.native(p.alice), 1_000);
    assert_eq!(p.chain.calls().len(), 1);
}

#[test]
fn e2e_configured_floor_applies_to_exact_input() {
    let mut p = OffsetPipeline::with_config(|cfg| {
        cfg.default_output_floor = OutputFloor::Tolerance(Decimal::new(5, 2));
    });
    p.fund("USDC", 100);

    p.orch
        .offset_token_exact_in(&p.ctx(), t("USDC"), 100, t("BCT"), RoutingStrategy::Default, None)
        .unwrap();
    assert!(p.chain.calls().iter().any(|c| matches!(
        c,
        ExternalCall::SwapExactInput { amount_out_min: 95, .. }
    )));

    // A per-call floor overrides the configured one.
    p.fund("USDC", 100);
    p.orch
        .offset_token_exact_in(
            &p.ctx(),
            t("USDC"),
            100,
            t("BCT"),
            RoutingStrategy::Default,
            Some(OutputFloor::None),
        )
        .unwrap();
    assert!(p.chain.calls().iter().any(|c| matches!(
        c,
        ExternalCall::SwapExactInput { amount_out_min: 0, .. }
    )));
}

// =============================================================================
// Test: deposit / withdraw round trip
// =============================================================================
#[test]
fn e2e_deposit_withdraw_round_trip() {
    let mut p = OffsetPipeline::new();
    p.fund("NCT", 80);
    let ctx = p.ctx();

    p.orch.deposit(&ctx, t("NCT"), 80).unwrap();
    assert_eq!(p.balance("NCT"), 80);
    assert_eq!(p.chain.balance(t("NCT"), p.alice), 0);

    p.orch.withdraw(&ctx, t("NCT"), 80).unwrap();
    assert_eq!(p.balance("NCT"), 0);
    assert_eq!(p.chain.balance(t("NCT"), p.alice), 80);
    assert_eq!(p.chain.balance(t("NCT"), OffsetPipeline::custodian()), 0);

    // Overdraw fails and leaves everything alone.
    assert!(matches!(
        p.orch.withdraw(&ctx, t("NCT"), 1),
        Err(SettleError::InsufficientLedgerBalance { .. })
    ));
}

#[test]
fn e2e_redeem_then_withdraw_certificates() {
    let mut p = OffsetPipeline::new();
    p.fund("BCT", 70);
    let ctx = p.ctx();
    p.orch.deposit(&ctx, t("BCT"), 70).unwrap();

    let batch = p.orch.redeem(&ctx, t("BCT"), 70).unwrap();
    assert_eq!(batch.amounts, vec![60, 10]);
    assert_eq!(p.balance("TCO2-B"), 10);

    p.orch.withdraw(&ctx, t("TCO2-B"), 10).unwrap();
    assert_eq!(p.chain.balance(t("TCO2-B"), p.alice), 10);
    p.assert_custody_backed(&["BCT", "TCO2-A", "TCO2-B"]);
}

// =============================================================================
// Test: admin changes are seen by the next invocation
// =============================================================================
#[test]
fn e2e_eligibility_is_evaluated_at_call_time() {
    let mut p = OffsetPipeline::new();
    p.fund("BCT", 20);
    let admin = OffsetPipeline::admin();

    p.orch.delete_token(admin, "BCT").unwrap();
    assert!(p.orch.offset_pool_token(&p.ctx(), t("BCT"), 10).is_err());

    p.orch.set_token(admin, "BCT", t("BCT")).unwrap();
    p.orch.offset_pool_token(&p.ctx(), t("BCT"), 10).unwrap();
    assert_eq!(p.chain.retirements(), vec![(t("TCO2-A"), 10)]);
}

#[test]
fn e2e_receipt_serializes() {
    let mut p = OffsetPipeline::new();
    p.fund("USDC", 30);
    let receipt = p
        .orch
        .offset_token_exact_out(&p.ctx(), t("USDC"), t("BCT"), 30, RoutingStrategy::Default)
        .unwrap();

    let json = serde_json::to_string(&receipt).unwrap();
    let back: OffsetReceipt = serde_json::from_str(&json).unwrap();
    assert_eq!(back, receipt);
    assert!(back.verify_digest());
}
