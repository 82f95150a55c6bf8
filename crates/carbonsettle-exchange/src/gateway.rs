//! Router-backed exchange into the custodial ledger.
//!
//! The gateway moves the caller's funds into the custodian, trades them
//! through the router along a planned path, and credits the swap output to
//! the caller's ledger entry. The custodian is both sender and recipient of
//! every swap.
//!
//! ## Exact output (token source)
//! ```text
//! quote amounts_in → pull required → approve router(required)
//!   → swap_exact_output(max_in = required) → check output == desired
//!   → refund unspent input → revoke leftover allowance → credit desired
//! ```
//!
//! ## Exact output (native source)
//! ```text
//! quote amounts_in → attached >= required → collect attached
//!   → swap_native_exact_output(value = attached) → refund attached - spent
//!   → credit desired
//! ```
//!
//! ## Exact input
//! ```text
//! resolve floor → pull/collect amount_in → (approve router)
//!   → swap → check output >= floor → (revoke) → credit realized output
//! ```
//!
//! Eligibility and path endpoints are validated before the first external
//! call. Ledger credits happen only after the router has returned, since
//! the realized output is unknown until then.

use carbonsettle_ledger::{EligibilityRegistry, Ledger};
use carbonsettle_types::{
    AccountId, AmmRouter, Amount, OutputFloor, PathPlan, Result, SettleError, SwapRoute,
    TokenCustody, TokenId, amount, ensure_success,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What funds a swap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwapSource {
    /// Native currency attached to the call. The plan's head token stands in
    /// for it on the router.
    Native { attached: Amount },
    /// A fungible token pulled from the caller's allowance.
    Token(TokenId),
}

/// What a completed swap did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeOutcome {
    pub path: PathPlan,
    /// Per-hop amounts as realized by the router.
    pub amounts: Vec<Amount>,
    /// Source units the router actually consumed.
    pub input_spent: Amount,
    /// Destination units credited to the caller.
    pub output: Amount,
}

fn checked_amounts(
    call: &'static str,
    amounts: Vec<Amount>,
    plan: &PathPlan,
) -> Result<Vec<Amount>> {
    if amounts.len() != plan.len() {
        return Err(SettleError::external(
            call,
            format!("returned {} amounts for a {}-token path", amounts.len(), plan.len()),
        ));
    }
    Ok(amounts)
}

fn input_of(amounts: &[Amount]) -> Amount {
    amounts.first().copied().unwrap_or_default()
}

fn output_of(amounts: &[Amount]) -> Amount {
    amounts.last().copied().unwrap_or_default()
}

/// Per-hop inputs needed to receive exactly `desired` at the end of `plan`.
pub fn quote_exact_output<R: AmmRouter>(
    router: &R,
    plan: &PathPlan,
    desired: Amount,
) -> Result<Vec<Amount>> {
    let amounts = router.quote_amounts_in(desired, plan.hops())?;
    checked_amounts("router.quote_amounts_in", amounts, plan)
}

/// Per-hop outputs for spending exactly `amount_in` at the head of `plan`.
pub fn quote_exact_input<R: AmmRouter>(
    router: &R,
    plan: &PathPlan,
    amount_in: Amount,
) -> Result<Vec<Amount>> {
    let amounts = router.quote_amounts_out(amount_in, plan.hops())?;
    checked_amounts("router.quote_amounts_out", amounts, plan)
}

/// Source units required to receive exactly `desired`.
pub fn required_input<R: AmmRouter>(
    router: &R,
    plan: &PathPlan,
    desired: Amount,
) -> Result<Amount> {
    quote_exact_output(router, plan, desired).map(|amounts| input_of(&amounts))
}

/// Destination units expected for exactly `amount_in`.
pub fn expected_output<R: AmmRouter>(
    router: &R,
    plan: &PathPlan,
    amount_in: Amount,
) -> Result<Amount> {
    quote_exact_input(router, plan, amount_in).map(|amounts| output_of(&amounts))
}

/// Borrowed view over the collaborators one swap needs.
pub struct ExchangeGateway<'a, R, C> {
    router: &'a mut R,
    custody: &'a mut C,
    ledger: &'a mut Ledger,
    registry: &'a EligibilityRegistry,
    custodian: AccountId,
}

impl<'a, R: AmmRouter, C: TokenCustody> ExchangeGateway<'a, R, C> {
    pub fn new(
        router: &'a mut R,
        custody: &'a mut C,
        ledger: &'a mut Ledger,
        registry: &'a EligibilityRegistry,
        custodian: AccountId,
    ) -> Self {
        Self {
            router,
            custody,
            ledger,
            registry,
            custodian,
        }
    }

    /// Receive exactly `desired` of `destination`, crediting it to `caller`.
    ///
    /// # Errors
    /// - `IneligibleToken` / `InvalidPath` before any external call
    /// - `InsufficientAttachedValue` if native value cannot cover the quote
    /// - `OutputMismatch` if the router delivers anything but `desired`
    /// - `ExternalCallFailure` for refused pulls, approvals or refunds
    pub fn exact_output(
        &mut self,
        caller: AccountId,
        source: SwapSource,
        destination: TokenId,
        desired: Amount,
        plan: &PathPlan,
        deadline: DateTime<Utc>,
    ) -> Result<ExchangeOutcome> {
        if desired == 0 {
            return Err(SettleError::ZeroAmount {
                operation: "exact_output",
            });
        }
        let source_token = self.check_route(source, destination, plan)?;
        let required = required_input(&*self.router, plan, desired)?;
        let route = self.route(deadline);

        tracing::debug!(
            caller = %caller,
            source = %source_token,
            destination = %destination,
            desired,
            required,
            path = %plan,
            "Exact-output swap quoted"
        );

        let realized = match source {
            SwapSource::Native { attached } => {
                if attached < required {
                    return Err(SettleError::InsufficientAttachedValue {
                        needed: required,
                        attached,
                    });
                }
                self.collect_native(caller, attached)?;
                let realized = self
                    .router
                    .swap_native_exact_output(desired, attached, plan.hops(), route)?;
                let realized = checked_amounts("router.swap_native_exact_output", realized, plan)?;
                Self::ensure_exact(desired, &realized)?;

                let refund = amount::checked_sub(attached, input_of(&realized), "native refund")?;
                if refund > 0 {
                    let ok = self.custody.send_native(self.custodian, caller, refund)?;
                    ensure_success(ok, "native.send", || {
                        format!("refund of {refund} native to {caller} refused")
                    })?;
                }
                realized
            }
            SwapSource::Token(token) => {
                self.pull(token, caller, required)?;
                self.approve_router(token, required)?;
                let realized = self
                    .router
                    .swap_exact_output(desired, required, plan.hops(), route)?;
                let realized = checked_amounts("router.swap_exact_output", realized, plan)?;
                Self::ensure_exact(desired, &realized)?;

                let refund =
                    amount::checked_sub(required, input_of(&realized), "unspent input refund")?;
                if refund > 0 {
                    let ok = self.custody.transfer(token, self.custodian, caller, refund)?;
                    ensure_success(ok, "token.transfer", || {
                        format!("refund of {refund} {token} to {caller} refused")
                    })?;
                }
                self.revoke_router(token)?;
                realized
            }
        };

        self.ledger.credit(caller, destination, desired)?;
        let input_spent = input_of(&realized);
        tracing::info!(
            caller = %caller,
            destination = %destination,
            input_spent,
            output = desired,
            "Exact-output swap settled"
        );
        Ok(ExchangeOutcome {
            path: plan.clone(),
            amounts: realized,
            input_spent,
            output: desired,
        })
    }

    /// Spend exactly `amount_in` of the source, crediting whatever the router
    /// returns (at least the resolved `floor`) to `caller`.
    ///
    /// For a native source `amount_in` is taken out of the attached value.
    #[allow(clippy::too_many_arguments)]
    pub fn exact_input(
        &mut self,
        caller: AccountId,
        source: SwapSource,
        amount_in: Amount,
        destination: TokenId,
        plan: &PathPlan,
        floor: OutputFloor,
        deadline: DateTime<Utc>,
    ) -> Result<ExchangeOutcome> {
        if amount_in == 0 {
            return Err(SettleError::ZeroAmount {
                operation: "exact_input",
            });
        }
        let source_token = self.check_route(source, destination, plan)?;
        let router = &*self.router;
        let minimum = floor.resolve(|| expected_output(router, plan, amount_in))?;
        let route = self.route(deadline);

        tracing::debug!(
            caller = %caller,
            source = %source_token,
            destination = %destination,
            amount_in,
            minimum,
            path = %plan,
            "Exact-input swap starting"
        );

        let realized = match source {
            SwapSource::Native { attached } => {
                if attached < amount_in {
                    return Err(SettleError::InsufficientAttachedValue {
                        needed: amount_in,
                        attached,
                    });
                }
                self.collect_native(caller, amount_in)?;
                let realized = self
                    .router
                    .swap_native_exact_input(amount_in, minimum, plan.hops(), route)?;
                checked_amounts("router.swap_native_exact_input", realized, plan)?
            }
            SwapSource::Token(token) => {
                self.pull(token, caller, amount_in)?;
                self.approve_router(token, amount_in)?;
                let realized = self
                    .router
                    .swap_exact_input(amount_in, minimum, plan.hops(), route)?;
                let realized = checked_amounts("router.swap_exact_input", realized, plan)?;
                self.revoke_router(token)?;
                realized
            }
        };

        let output = output_of(&realized);
        if output < minimum {
            return Err(SettleError::OutputBelowMinimum {
                minimum,
                realized: output,
            });
        }
        self.ledger.credit(caller, destination, output)?;
        let input_spent = input_of(&realized);
        tracing::info!(
            caller = %caller,
            destination = %destination,
            input_spent,
            output,
            "Exact-input swap settled"
        );
        Ok(ExchangeOutcome {
            path: plan.clone(),
            amounts: realized,
            input_spent,
            output,
        })
    }

    // -----------------------------------------------------------------
    // Steps
    // -----------------------------------------------------------------

    /// Eligibility and plan shape. Returns the token at the head of the plan.
    ///
    /// Only a token source must be swappable; a native plan's head is the
    /// wrapped stand-in chosen by the planner.
    fn check_route(
        &self,
        source: SwapSource,
        destination: TokenId,
        plan: &PathPlan,
    ) -> Result<TokenId> {
        let source_token = match source {
            SwapSource::Token(token) => {
                self.registry.require_swappable(token)?;
                token
            }
            SwapSource::Native { .. } => plan.source(),
        };
        self.registry.require_redeemable(destination)?;
        plan.ensure_endpoints(source_token, destination)?;
        Ok(source_token)
    }

    fn route(&self, deadline: DateTime<Utc>) -> SwapRoute {
        SwapRoute {
            sender: self.custodian,
            recipient: self.custodian,
            deadline,
        }
    }

    fn ensure_exact(desired: Amount, realized: &[Amount]) -> Result<()> {
        let delivered = output_of(realized);
        if delivered != desired {
            return Err(SettleError::OutputMismatch {
                requested: desired,
                realized: delivered,
            });
        }
        Ok(())
    }

    fn pull(&mut self, token: TokenId, from: AccountId, amount: Amount) -> Result<()> {
        let ok = self
            .custody
            .transfer_from(token, self.custodian, from, self.custodian, amount)?;
        ensure_success(ok, "token.transfer_from", || {
            format!("pull of {amount} {token} from {from} refused")
        })
    }

    fn collect_native(&mut self, from: AccountId, amount: Amount) -> Result<()> {
        let ok = self.custody.collect_native(from, self.custodian, amount)?;
        ensure_success(ok, "native.collect", || {
            format!("collection of {amount} native from {from} refused")
        })
    }

    fn approve_router(&mut self, token: TokenId, amount: Amount) -> Result<()> {
        let spender = self.router.address();
        let ok = self.custody.approve(token, self.custodian, spender, amount)?;
        ensure_success(ok, "token.approve", || {
            format!("approval of {amount} {token} for router refused")
        })
    }

    /// Zero any allowance the router did not consume.
    fn revoke_router(&mut self, token: TokenId) -> Result<()> {
        let spender = self.router.address();
        let leftover = self.custody.allowance(token, self.custodian, spender);
        if leftover == 0 {
            return Ok(());
        }
        let ok = self.custody.approve(token, self.custodian, spender, 0)?;
        ensure_success(ok, "token.approve", || {
            format!("revocation of {leftover} {token} router allowance refused")
        })?;
        tracing::debug!(token = %token, leftover, "Router allowance revoked");
        Ok(())
    }
}
