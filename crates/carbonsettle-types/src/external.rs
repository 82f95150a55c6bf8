//! Interfaces of the external collaborators.
//!
//! The orchestrator never reaches into these systems directly; it only
//! calls the traits below. Every call is synchronous and either returns a
//! result or fails the whole invocation.
//!
//! Token pulls and pushes follow fungible-token conventions and report
//! success with a `bool`. Callers must check it (see [`ensure_success`]).

use chrono::{DateTime, Utc};

use crate::{AccountId, Amount, Result, RetirementBatch, SettleError, TokenId};

/// Turn a `false` success flag from a custody call into an error.
pub fn ensure_success(ok: bool, call: &'static str, detail: impl FnOnce() -> String) -> Result<()> {
    if ok {
        Ok(())
    } else {
        Err(SettleError::external(call, detail()))
    }
}

/// Who the router acts for, where output goes, and until when the swap is valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapRoute {
    /// Account whose allowance / native value funds the swap.
    pub sender: AccountId,
    /// Account receiving the swap output.
    pub recipient: AccountId,
    /// The router must abort if executed after this instant.
    pub deadline: DateTime<Utc>,
}

/// Automated-market-maker router. Pricing is opaque.
///
/// Every method returns the per-hop amounts along `path`: element 0 is the
/// input, the last element is the output.
pub trait AmmRouter {
    /// The router's own account, used as allowance spender.
    fn address(&self) -> AccountId;

    /// Inputs required along `path` to receive exactly `amount_out`.
    fn quote_amounts_in(&self, amount_out: Amount, path: &[TokenId]) -> Result<Vec<Amount>>;

    /// Outputs along `path` for exactly `amount_in`.
    fn quote_amounts_out(&self, amount_in: Amount, path: &[TokenId]) -> Result<Vec<Amount>>;

    /// Receive exactly `amount_out`, spending at most `amount_in_max` of the
    /// sender's allowance.
    fn swap_exact_output(
        &mut self,
        amount_out: Amount,
        amount_in_max: Amount,
        path: &[TokenId],
        route: SwapRoute,
    ) -> Result<Vec<Amount>>;

    /// Spend exactly `amount_in` of the sender's allowance, receiving at
    /// least `amount_out_min`.
    fn swap_exact_input(
        &mut self,
        amount_in: Amount,
        amount_out_min: Amount,
        path: &[TokenId],
        route: SwapRoute,
    ) -> Result<Vec<Amount>>;

    /// Native-currency variant of [`AmmRouter::swap_exact_output`]. `value`
    /// is taken from the sender; whatever is not spent goes back to it.
    fn swap_native_exact_output(
        &mut self,
        amount_out: Amount,
        value: Amount,
        path: &[TokenId],
        route: SwapRoute,
    ) -> Result<Vec<Amount>>;

    /// Native-currency variant of [`AmmRouter::swap_exact_input`].
    fn swap_native_exact_input(
        &mut self,
        value: Amount,
        amount_out_min: Amount,
        path: &[TokenId],
        route: SwapRoute,
    ) -> Result<Vec<Amount>>;
}

/// Fungible-token and native-currency custody operations.
pub trait TokenCustody {
    fn balance_of(&self, token: TokenId, holder: AccountId) -> Amount;

    fn allowance(&self, token: TokenId, owner: AccountId, spender: AccountId) -> Amount;

    /// `spender` moves `amount` from `from` to `to` using `from`'s allowance.
    fn transfer_from(
        &mut self,
        token: TokenId,
        spender: AccountId,
        from: AccountId,
        to: AccountId,
        amount: Amount,
    ) -> Result<bool>;

    /// `from` pushes `amount` to `to`.
    fn transfer(
        &mut self,
        token: TokenId,
        from: AccountId,
        to: AccountId,
        amount: Amount,
    ) -> Result<bool>;

    /// Set (not add to) `spender`'s allowance over `owner`'s tokens.
    fn approve(
        &mut self,
        token: TokenId,
        owner: AccountId,
        spender: AccountId,
        amount: Amount,
    ) -> Result<bool>;

    fn native_balance(&self, holder: AccountId) -> Amount;

    /// Take native value attached to a call into `to`'s custody.
    fn collect_native(&mut self, from: AccountId, to: AccountId, amount: Amount) -> Result<bool>;

    /// Send native value from `from` to `to`.
    fn send_native(&mut self, from: AccountId, to: AccountId, amount: Amount) -> Result<bool>;
}

/// Pool certificate token: automatic (lowest-quality-first) redemption.
pub trait CertificatePool {
    /// Burn `amount` of `pool` held by `holder` and hand `holder` the
    /// underlying certificates. The returned amounts sum to `amount`.
    fn automatic_redeem(
        &mut self,
        pool: TokenId,
        holder: AccountId,
        amount: Amount,
    ) -> Result<RetirementBatch>;
}

/// Certificate token: irreversible retirement.
pub trait CertificateRetirement {
    fn retire(&mut self, certificate: TokenId, holder: AccountId, amount: Amount) -> Result<()>;
}

/// External registry of recognized certificate tokens.
pub trait CertificateRegistry {
    fn is_certificate(&self, registry: AccountId, token: TokenId) -> bool;
}
