//! Settlement orchestrator.
//!
//! Owns the ledger and eligibility registry and drives the five offset
//! workflows end to end:
//!
//! ```text
//! pool token in:   deposit                     → redeem → retire
//! native exact-out: exact_output(wrapped native) → redeem → retire
//! native exact-in:  exact_input(all value)      → redeem → retire
//! token exact-out:  exact_output(source)        → redeem → retire
//! token exact-in:   exact_input(source)         → redeem → retire
//! ```
//!
//! Every invocation runs inside a ledger transaction: if any step fails,
//! every ledger entry touched by the invocation is restored and the error
//! is returned. External effects are expected to be reverted by the
//! environment the same way.

use carbonsettle_exchange::{
    ExchangeGateway, PathPlanner, SwapSource, expected_output, required_input,
};
use carbonsettle_ledger::{CustodyReport, EligibilityRegistry, Ledger, verify_custody};
use carbonsettle_types::{
    AccountId, AmmRouter, Amount, CallContext, CertificatePool, CertificateRegistry,
    CertificateRetirement, Eligibility, OffsetReceipt, OutputFloor, PathPlan, Result,
    RetirementBatch, RoutingStrategy, SettleError, SettlementConfig, TokenCustody, TokenId,
    Workflow,
};
use chrono::{DateTime, TimeDelta, Utc};

use crate::{RedemptionEngine, RetirementEngine};

pub struct SettlementOrchestrator<R, C, O> {
    config: SettlementConfig,
    router: R,
    custody: C,
    offsets: O,
    ledger: Ledger,
    registry: EligibilityRegistry,
    planner: PathPlanner,
    /// External certificate registry consulted on deposit.
    contract_registry: AccountId,
}

impl<R, C, O> SettlementOrchestrator<R, C, O>
where
    R: AmmRouter,
    C: TokenCustody,
    O: CertificatePool + CertificateRetirement + CertificateRegistry,
{
    /// Build an orchestrator with an empty ledger.
    ///
    /// # Errors
    /// Returns `Configuration` if `config` is inconsistent.
    pub fn new(config: SettlementConfig, router: R, custody: C, offsets: O) -> Result<Self> {
        config.validate()?;
        let registry = EligibilityRegistry::new(config.admin, &config.eligibility);
        let planner = PathPlanner::new(config.stablecoin_symbol.clone());
        let contract_registry = config.contract_registry;
        tracing::info!(
            admin = %config.admin,
            custodian = %config.custodian,
            tokens = config.eligibility.tokens.len(),
            "Settlement orchestrator initialized"
        );
        Ok(Self {
            config,
            router,
            custody,
            offsets,
            ledger: Ledger::new(),
            registry,
            planner,
            contract_registry,
        })
    }

    // =================================================================
    // Offset workflows
    // =================================================================

    /// Deposit `amount` of an already-held pool token, then redeem and retire it.
    pub fn offset_pool_token(
        &mut self,
        ctx: &CallContext,
        pool: TokenId,
        amount: Amount,
    ) -> Result<OffsetReceipt> {
        Self::ensure_nonzero(amount, "offset_pool_token")?;
        self.atomically(Workflow::PoolTokenIn, |this| {
            this.registry.require_redeemable(pool)?;
            let custodian = this.config.custodian;
            this.ledger
                .deposit(&mut this.custody, custodian, ctx.caller, pool, amount)?;
            let retired = this.redeem_and_retire(ctx.caller, pool, amount)?;
            Ok(OffsetReceipt::new(
                Workflow::PoolTokenIn,
                ctx.caller,
                pool,
                None,
                amount,
                amount,
                retired,
            ))
        })
    }

    /// Buy exactly `amount` of `pool` with the attached native value, refund
    /// the excess, then redeem and retire.
    pub fn offset_native_exact_out(
        &mut self,
        ctx: &CallContext,
        pool: TokenId,
        amount: Amount,
        strategy: RoutingStrategy,
    ) -> Result<OffsetReceipt> {
        Self::ensure_nonzero(amount, "offset_native_exact_out")?;
        self.atomically(Workflow::NativeExactOut, |this| {
            let plan = this.native_plan(pool, strategy)?;
            let deadline = this.deadline(ctx)?;
            let outcome = this.gateway().exact_output(
                ctx.caller,
                SwapSource::Native { attached: ctx.value },
                pool,
                amount,
                &plan,
                deadline,
            )?;
            let retired = this.redeem_and_retire(ctx.caller, pool, outcome.output)?;
            Ok(OffsetReceipt::new(
                Workflow::NativeExactOut,
                ctx.caller,
                pool,
                Some(outcome.path),
                outcome.input_spent,
                outcome.output,
                retired,
            ))
        })
    }

    /// Swap the whole attached native value into `pool`, then redeem and
    /// retire whatever it bought.
    ///
    /// `floor` overrides the configured default minimum output.
    pub fn offset_native_exact_in(
        &mut self,
        ctx: &CallContext,
        pool: TokenId,
        strategy: RoutingStrategy,
        floor: Option<OutputFloor>,
    ) -> Result<OffsetReceipt> {
        Self::ensure_nonzero(ctx.value, "offset_native_exact_in")?;
        let floor = floor.unwrap_or(self.config.default_output_floor);
        self.atomically(Workflow::NativeExactIn, |this| {
            let plan = this.native_plan(pool, strategy)?;
            let deadline = this.deadline(ctx)?;
            let outcome = this.gateway().exact_input(
                ctx.caller,
                SwapSource::Native { attached: ctx.value },
                ctx.value,
                pool,
                &plan,
                floor,
                deadline,
            )?;
            let retired = this.redeem_and_retire(ctx.caller, pool, outcome.output)?;
            Ok(OffsetReceipt::new(
                Workflow::NativeExactIn,
                ctx.caller,
                pool,
                Some(outcome.path),
                outcome.input_spent,
                outcome.output,
                retired,
            ))
        })
    }

    /// Buy exactly `amount` of `pool` with `source`, refund unspent source,
    /// then redeem and retire.
    pub fn offset_token_exact_out(
        &mut self,
        ctx: &CallContext,
        source: TokenId,
        pool: TokenId,
        amount: Amount,
        strategy: RoutingStrategy,
    ) -> Result<OffsetReceipt> {
        Self::ensure_nonzero(amount, "offset_token_exact_out")?;
        self.atomically(Workflow::TokenExactOut, |this| {
            this.registry.require_swappable(source)?;
            this.registry.require_redeemable(pool)?;
            let plan = this.planner.plan(&this.registry, source, pool, strategy)?;
            let deadline = this.deadline(ctx)?;
            let outcome = this.gateway().exact_output(
                ctx.caller,
                SwapSource::Token(source),
                pool,
                amount,
                &plan,
                deadline,
            )?;
            let retired = this.redeem_and_retire(ctx.caller, pool, outcome.output)?;
            Ok(OffsetReceipt::new(
                Workflow::TokenExactOut,
                ctx.caller,
                pool,
                Some(outcome.path),
                outcome.input_spent,
                outcome.output,
                retired,
            ))
        })
    }

    /// Swap exactly `amount_in` of `source` into `pool`, then redeem and
    /// retire whatever it bought.
    pub fn offset_token_exact_in(
        &mut self,
        ctx: &CallContext,
        source: TokenId,
        amount_in: Amount,
        pool: TokenId,
        strategy: RoutingStrategy,
        floor: Option<OutputFloor>,
    ) -> Result<OffsetReceipt> {
        Self::ensure_nonzero(amount_in, "offset_token_exact_in")?;
        let floor = floor.unwrap_or(self.config.default_output_floor);
        self.atomically(Workflow::TokenExactIn, |this| {
            this.registry.require_swappable(source)?;
            this.registry.require_redeemable(pool)?;
            let plan = this.planner.plan(&this.registry, source, pool, strategy)?;
            let deadline = this.deadline(ctx)?;
            let outcome = this.gateway().exact_input(
                ctx.caller,
                SwapSource::Token(source),
                amount_in,
                pool,
                &plan,
                floor,
                deadline,
            )?;
            let retired = this.redeem_and_retire(ctx.caller, pool, outcome.output)?;
            Ok(OffsetReceipt::new(
                Workflow::TokenExactIn,
                ctx.caller,
                pool,
                Some(outcome.path),
                outcome.input_spent,
                outcome.output,
                retired,
            ))
        })
    }

    // =================================================================
    // Queries
    // =================================================================

    /// Units of `source` needed to obtain exactly `amount` of `pool`.
    ///
    /// For native input pass the wrapped native token as `source`.
    pub fn calculate_needed_input(
        &self,
        source: TokenId,
        pool: TokenId,
        amount: Amount,
        strategy: RoutingStrategy,
    ) -> Result<Amount> {
        let plan = self.quote_plan(source, pool, strategy)?;
        required_input(&self.router, &plan, amount)
    }

    /// Units of `pool` expected for exactly `amount_in` of `source`.
    pub fn calculate_expected_output(
        &self,
        source: TokenId,
        pool: TokenId,
        amount_in: Amount,
        strategy: RoutingStrategy,
    ) -> Result<Amount> {
        let plan = self.quote_plan(source, pool, strategy)?;
        expected_output(&self.router, &plan, amount_in)
    }

    /// Ledger balance of `(owner, token)`.
    #[must_use]
    pub fn balance(&self, owner: AccountId, token: TokenId) -> Amount {
        self.ledger.balance(owner, token)
    }

    /// Check that the ledger's total for `token` is backed by custodian holdings.
    pub fn verify_custody(&self, token: TokenId) -> Result<CustodyReport> {
        let ledger_total = self.ledger.total_supply(token)?;
        let holdings = self.custody.balance_of(token, self.config.custodian);
        verify_custody(token, ledger_total, holdings)
    }

    // =================================================================
    // Stand-alone ledger operations
    // =================================================================

    /// Move `amount` of `token` from the caller into custody.
    ///
    /// Accepts any swappable or redeemable token, or any certificate the
    /// external registry recognizes.
    pub fn deposit(&mut self, ctx: &CallContext, token: TokenId, amount: Amount) -> Result<()> {
        Self::ensure_nonzero(amount, "deposit")?;
        if !self.registry.is_eligible(token)
            && !self.offsets.is_certificate(self.contract_registry, token)
        {
            tracing::warn!(
                caller = %ctx.caller,
                token = %token,
                "Deposit of ineligible token rejected"
            );
            return Err(SettleError::IneligibleToken {
                token,
                required: Eligibility::Depositable,
            });
        }
        let custodian = self.config.custodian;
        self.ledger
            .deposit(&mut self.custody, custodian, ctx.caller, token, amount)?;
        tracing::info!(caller = %ctx.caller, token = %token, amount, "Deposit accepted");
        Ok(())
    }

    /// Release `amount` of `token` from custody back to the caller.
    pub fn withdraw(&mut self, ctx: &CallContext, token: TokenId, amount: Amount) -> Result<()> {
        Self::ensure_nonzero(amount, "withdraw")?;
        let custodian = self.config.custodian;
        self.ledger
            .withdraw(&mut self.custody, custodian, ctx.caller, token, amount)?;
        tracing::info!(caller = %ctx.caller, token = %token, amount, "Withdrawal released");
        Ok(())
    }

    /// Redeem custodied pool tokens into certificates without retiring them.
    pub fn redeem(
        &mut self,
        ctx: &CallContext,
        pool: TokenId,
        amount: Amount,
    ) -> Result<RetirementBatch> {
        Self::ensure_nonzero(amount, "redeem")?;
        let custodian = self.config.custodian;
        self.transaction("redeem", |this| {
            RedemptionEngine::new(&mut this.offsets, &mut this.ledger, &this.registry, custodian)
                .redeem(ctx.caller, pool, amount)
        })
    }

    /// Retire custodied certificates.
    pub fn retire(&mut self, ctx: &CallContext, batch: &RetirementBatch) -> Result<()> {
        let custodian = self.config.custodian;
        self.transaction("retire", |this| {
            RetirementEngine::new(&mut this.offsets, &mut this.ledger, custodian)
                .retire(ctx.caller, batch)
        })?;
        tracing::info!(caller = %ctx.caller, certificates = batch.len(), "Certificates retired");
        Ok(())
    }

    // =================================================================
    // Administration
    // =================================================================

    pub fn set_token(&mut self, caller: AccountId, symbol: &str, token: TokenId) -> Result<()> {
        self.registry.set_token(caller, symbol, token)
    }

    pub fn delete_token(&mut self, caller: AccountId, symbol: &str) -> Result<()> {
        self.registry.delete_token(caller, symbol)
    }

    pub fn transfer_admin(&mut self, caller: AccountId, new_admin: AccountId) -> Result<()> {
        self.registry.transfer_admin(caller, new_admin)
    }

    /// Point deposit eligibility at a different external certificate registry.
    pub fn set_contract_registry(&mut self, caller: AccountId, registry: AccountId) -> Result<()> {
        if caller != self.registry.admin() {
            return Err(SettleError::Unauthorized { caller });
        }
        self.contract_registry = registry;
        tracing::info!(registry = %registry, "Contract registry updated");
        Ok(())
    }

    // =================================================================
    // Accessors
    // =================================================================

    #[must_use]
    pub fn config(&self) -> &SettlementConfig {
        &self.config
    }

    #[must_use]
    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    #[must_use]
    pub fn registry(&self) -> &EligibilityRegistry {
        &self.registry
    }

    #[must_use]
    pub fn contract_registry(&self) -> AccountId {
        self.contract_registry
    }

    #[must_use]
    pub fn router(&self) -> &R {
        &self.router
    }

    #[must_use]
    pub fn custody(&self) -> &C {
        &self.custody
    }

    #[must_use]
    pub fn offsets(&self) -> &O {
        &self.offsets
    }

    // =================================================================
    // Internals
    // =================================================================

    fn ensure_nonzero(amount: Amount, operation: &'static str) -> Result<()> {
        if amount == 0 {
            return Err(SettleError::ZeroAmount { operation });
        }
        Ok(())
    }

    /// Run `f` inside a ledger transaction, rolling back on error.
    fn transaction<T>(
        &mut self,
        operation: &str,
        f: impl FnOnce(&mut Self) -> Result<T>,
    ) -> Result<T> {
        self.ledger.begin()?;
        match f(self) {
            Ok(value) => {
                self.ledger.commit()?;
                Ok(value)
            }
            Err(err) => {
                self.ledger.rollback()?;
                tracing::warn!(operation, error = %err, "Invocation aborted, ledger rolled back");
                Err(err)
            }
        }
    }

    fn atomically(
        &mut self,
        workflow: Workflow,
        f: impl FnOnce(&mut Self) -> Result<OffsetReceipt>,
    ) -> Result<OffsetReceipt> {
        let receipt = self.transaction(&workflow.to_string(), f)?;
        tracing::info!(
            workflow = %workflow,
            receipt = %receipt.id,
            owner = %receipt.owner,
            pool = %receipt.pool,
            pool_amount = receipt.pool_amount,
            input_spent = receipt.input_spent,
            certificates = receipt.retired.len(),
            "Offset settled"
        );
        Ok(receipt)
    }

    fn deadline(&self, ctx: &CallContext) -> Result<DateTime<Utc>> {
        let grace = i64::try_from(self.config.deadline_grace_secs)
            .ok()
            .and_then(TimeDelta::try_seconds)
            .ok_or_else(|| {
                SettleError::Configuration(format!(
                    "deadline grace of {}s out of range",
                    self.config.deadline_grace_secs
                ))
            })?;
        ctx.at.checked_add_signed(grace).ok_or_else(|| SettleError::ArithmeticOverflow {
            context: format!("deadline {} + {grace}", ctx.at),
        })
    }

    fn native_plan(&self, pool: TokenId, strategy: RoutingStrategy) -> Result<PathPlan> {
        let wrapped = self.registry.require(&self.config.wrapped_native_symbol)?;
        self.registry.require_redeemable(pool)?;
        self.planner.plan(&self.registry, wrapped, pool, strategy)
    }

    fn quote_plan(
        &self,
        source: TokenId,
        pool: TokenId,
        strategy: RoutingStrategy,
    ) -> Result<PathPlan> {
        self.registry.require_swappable(source)?;
        self.registry.require_redeemable(pool)?;
        self.planner.plan(&self.registry, source, pool, strategy)
    }

    fn gateway(&mut self) -> ExchangeGateway<'_, R, C> {
        ExchangeGateway::new(
            &mut self.router,
            &mut self.custody,
            &mut self.ledger,
            &self.registry,
            self.config.custodian,
        )
    }

    fn redeem_and_retire(
        &mut self,
        owner: AccountId,
        pool: TokenId,
        amount: Amount,
    ) -> Result<RetirementBatch> {
        let custodian = self.config.custodian;
        let batch =
            RedemptionEngine::new(&mut self.offsets, &mut self.ledger, &self.registry, custodian)
                .redeem(owner, pool, amount)?;
        RetirementEngine::new(&mut self.offsets, &mut self.ledger, custodian)
            .retire(owner, &batch)?;
        Ok(batch)
    }
}
