//! In-memory chain for tests.
//!
//! [`MockChain`] holds token balances, allowances, native balances, router
//! exchange rates, pool inventories and a log of every external call. The
//! router, custody and offset handles it hands out share that state, so a
//! test can drive the orchestrator and then inspect balances and call
//! counts through the chain.
//!
//! Router pricing is a fixed rational rate per pair: `out = in * num / den`
//! per hop, with exact-output quotes rounded up.

use std::{
    cell::RefCell,
    collections::{HashMap, HashSet, VecDeque},
    rc::Rc,
};

use chrono::{DateTime, Utc};

use crate::{
    AccountId, AmmRouter, Amount, CertificatePool, CertificateRegistry, CertificateRetirement,
    Result, RetirementBatch, SettleError, SwapRoute, TokenCustody, TokenId,
};

/// One recorded call into an external collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExternalCall {
    QuoteAmountsIn { amount_out: Amount, path: Vec<TokenId> },
    QuoteAmountsOut { amount_in: Amount, path: Vec<TokenId> },
    SwapExactOutput { amount_out: Amount, amount_in_max: Amount, path: Vec<TokenId> },
    SwapExactInput { amount_in: Amount, amount_out_min: Amount, path: Vec<TokenId> },
    SwapNativeExactOutput { amount_out: Amount, value: Amount, path: Vec<TokenId> },
    SwapNativeExactInput { value: Amount, amount_out_min: Amount, path: Vec<TokenId> },
    TransferFrom { token: TokenId, from: AccountId, to: AccountId, amount: Amount },
    Transfer { token: TokenId, from: AccountId, to: AccountId, amount: Amount },
    Approve { token: TokenId, owner: AccountId, spender: AccountId, amount: Amount },
    CollectNative { from: AccountId, amount: Amount },
    SendNative { to: AccountId, amount: Amount },
    AutomaticRedeem { pool: TokenId, amount: Amount },
    Retire { certificate: TokenId, amount: Amount },
}

impl ExternalCall {
    /// Whether this is a router swap of any kind.
    #[must_use]
    pub fn is_swap(&self) -> bool {
        matches!(
            self,
            Self::SwapExactOutput { .. }
                | Self::SwapExactInput { .. }
                | Self::SwapNativeExactOutput { .. }
                | Self::SwapNativeExactInput { .. }
        )
    }
}

#[derive(Debug, Default)]
struct ChainState {
    balances: HashMap<(TokenId, AccountId), Amount>,
    native: HashMap<AccountId, Amount>,
    allowances: HashMap<(TokenId, AccountId, AccountId), Amount>,
    rates: HashMap<(TokenId, TokenId), (Amount, Amount)>,
    inventories: HashMap<TokenId, VecDeque<(TokenId, Amount)>>,
    certificates: HashSet<TokenId>,
    calls: Vec<ExternalCall>,
    failing: HashSet<&'static str>,
    block_time: Option<DateTime<Utc>>,
    output_shortfall: Amount,
    input_rebate: Amount,
    redemption_skim: Amount,
    ignore_output_minimum: bool,
}

impl ChainState {
    fn balance(&self, token: TokenId, holder: AccountId) -> Amount {
        self.balances.get(&(token, holder)).copied().unwrap_or(0)
    }

    fn add(&mut self, token: TokenId, holder: AccountId, amount: Amount) -> Result<()> {
        let entry = self.balances.entry((token, holder)).or_insert(0);
        *entry = entry
            .checked_add(amount)
            .ok_or_else(|| SettleError::external("mock.mint", "balance overflow"))?;
        Ok(())
    }

    fn take(
        &mut self,
        token: TokenId,
        holder: AccountId,
        amount: Amount,
        call: &'static str,
    ) -> Result<()> {
        let entry = self.balances.entry((token, holder)).or_insert(0);
        *entry = entry
            .checked_sub(amount)
            .ok_or_else(|| SettleError::external(call, "insufficient token balance"))?;
        Ok(())
    }

    fn take_native(&mut self, holder: AccountId, amount: Amount, call: &'static str) -> Result<()> {
        let entry = self.native.entry(holder).or_insert(0);
        *entry = entry
            .checked_sub(amount)
            .ok_or_else(|| SettleError::external(call, "insufficient native balance"))?;
        Ok(())
    }

    fn add_native(&mut self, holder: AccountId, amount: Amount) {
        *self.native.entry(holder).or_insert(0) += amount;
    }

    fn fail_if_forced(&self, call: &'static str) -> Result<()> {
        if self.failing.contains(call) {
            return Err(SettleError::external(call, "forced failure"));
        }
        Ok(())
    }

    fn check_deadline(&self, route: &SwapRoute, call: &'static str) -> Result<()> {
        match self.block_time {
            Some(now) if route.deadline < now => Err(SettleError::external(call, "EXPIRED")),
            _ => Ok(()),
        }
    }

    fn rate(&self, from: TokenId, to: TokenId, call: &'static str) -> Result<(Amount, Amount)> {
        self.rates
            .get(&(from, to))
            .copied()
            .ok_or_else(|| SettleError::external(call, format!("no pool for {from} -> {to}")))
    }

    fn amounts_out(
        &self,
        amount_in: Amount,
        path: &[TokenId],
        call: &'static str,
    ) -> Result<Vec<Amount>> {
        let mut amounts = Vec::with_capacity(path.len());
        amounts.push(amount_in);
        for hop in path.windows(2) {
            let (num, den) = self.rate(hop[0], hop[1], call)?;
            let last = amounts[amounts.len() - 1];
            let out = last
                .checked_mul(num)
                .ok_or_else(|| SettleError::external(call, "quote overflow"))?
                / den;
            amounts.push(out);
        }
        Ok(amounts)
    }

    fn amounts_in(
        &self,
        amount_out: Amount,
        path: &[TokenId],
        call: &'static str,
    ) -> Result<Vec<Amount>> {
        let mut amounts = vec![0; path.len()];
        let Some(last) = amounts.last_mut() else {
            return Err(SettleError::external(call, "empty path"));
        };
        *last = amount_out;
        for i in (1..path.len()).rev() {
            let (num, den) = self.rate(path[i - 1], path[i], call)?;
            let needed = amounts[i]
                .checked_mul(den)
                .ok_or_else(|| SettleError::external(call, "quote overflow"))?
                .div_ceil(num);
            amounts[i - 1] = needed;
        }
        Ok(amounts)
    }

    fn pull_with_allowance(
        &mut self,
        token: TokenId,
        owner: AccountId,
        spender: AccountId,
        amount: Amount,
        call: &'static str,
    ) -> Result<()> {
        let key = (token, owner, spender);
        let allowed = self.allowances.get(&key).copied().unwrap_or(0);
        if allowed < amount {
            return Err(SettleError::external(call, "TRANSFER_FROM_FAILED: allowance"));
        }
        self.take(token, owner, amount, call)?;
        self.allowances.insert(key, allowed - amount);
        Ok(())
    }
}

/// Shared in-memory chain. Cloning yields another handle to the same state.
#[derive(Debug, Clone, Default)]
pub struct MockChain {
    state: Rc<RefCell<ChainState>>,
}

impl MockChain {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Account the mock router acts as.
    #[must_use]
    pub fn router_address() -> AccountId {
        AccountId::from_label("mock-router")
    }

    /// Registry account whose certificates [`CertificateRegistry`] recognizes.
    #[must_use]
    pub fn registry_address() -> AccountId {
        AccountId::from_label("mock-certificate-registry")
    }

    #[must_use]
    pub fn router(&self) -> MockRouter {
        MockRouter {
            state: Rc::clone(&self.state),
        }
    }

    #[must_use]
    pub fn custody(&self) -> MockCustody {
        MockCustody {
            state: Rc::clone(&self.state),
        }
    }

    #[must_use]
    pub fn offsets(&self) -> MockOffsets {
        MockOffsets {
            state: Rc::clone(&self.state),
        }
    }

    // --- setup -------------------------------------------------------------

    pub fn mint(&self, token: TokenId, holder: AccountId, amount: Amount) {
        self.state
            .borrow_mut()
            .add(token, holder, amount)
            .expect("mint overflow");
    }

    pub fn fund_native(&self, holder: AccountId, amount: Amount) {
        self.state.borrow_mut().add_native(holder, amount);
    }

    /// Set an allowance directly, without recording a call.
    pub fn approve(&self, token: TokenId, owner: AccountId, spender: AccountId, amount: Amount) {
        self.state
            .borrow_mut()
            .allowances
            .insert((token, owner, spender), amount);
    }

    /// `out = in * num / den` for the `from → to` hop.
    pub fn set_rate(&self, from: TokenId, to: TokenId, num: Amount, den: Amount) {
        assert!(num > 0 && den > 0, "rates must be positive");
        self.state.borrow_mut().rates.insert((from, to), (num, den));
    }

    /// Append a certificate to a pool's inventory (lowest quality first)
    /// and register it as a recognized certificate.
    pub fn add_inventory(&self, pool: TokenId, certificate: TokenId, amount: Amount) {
        let mut state = self.state.borrow_mut();
        state
            .inventories
            .entry(pool)
            .or_default()
            .push_back((certificate, amount));
        state.certificates.insert(certificate);
    }

    pub fn register_certificate(&self, certificate: TokenId) {
        self.state.borrow_mut().certificates.insert(certificate);
    }

    /// Make every subsequent call with this name fail.
    pub fn fail(&self, call: &'static str) {
        self.state.borrow_mut().failing.insert(call);
    }

    pub fn heal(&self, call: &'static str) {
        self.state.borrow_mut().failing.remove(call);
    }

    /// Routers reject swaps whose deadline is before this instant.
    pub fn set_block_time(&self, at: DateTime<Utc>) {
        self.state.borrow_mut().block_time = Some(at);
    }

    /// Exact-output swaps deliver this much less than requested.
    pub fn set_output_shortfall(&self, shortfall: Amount) {
        self.state.borrow_mut().output_shortfall = shortfall;
    }

    /// Exact-output token swaps spend this much less than quoted.
    pub fn set_input_rebate(&self, rebate: Amount) {
        self.state.borrow_mut().input_rebate = rebate;
    }

    /// Exact-input swaps skip their `amount_out_min` check, leaving the
    /// floor to the caller.
    pub fn set_ignore_output_minimum(&self, ignore: bool) {
        self.state.borrow_mut().ignore_output_minimum = ignore;
    }

    /// Automatic redemption returns this much less than it burned.
    pub fn set_redemption_skim(&self, skim: Amount) {
        self.state.borrow_mut().redemption_skim = skim;
    }

    // --- inspection --------------------------------------------------------

    #[must_use]
    pub fn balance(&self, token: TokenId, holder: AccountId) -> Amount {
        self.state.borrow().balance(token, holder)
    }

    #[must_use]
    pub fn native(&self, holder: AccountId) -> Amount {
        self.state.borrow().native.get(&holder).copied().unwrap_or(0)
    }

    #[must_use]
    pub fn allowance(&self, token: TokenId, owner: AccountId, spender: AccountId) -> Amount {
        self.state
            .borrow()
            .allowances
            .get(&(token, owner, spender))
            .copied()
            .unwrap_or(0)
    }

    #[must_use]
    pub fn calls(&self) -> Vec<ExternalCall> {
        self.state.borrow().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state.borrow_mut().calls.clear();
    }

    /// `(certificate, amount)` for every retire call, in order.
    #[must_use]
    pub fn retirements(&self) -> Vec<(TokenId, Amount)> {
        self.state
            .borrow()
            .calls
            .iter()
            .filter_map(|call| match call {
                ExternalCall::Retire { certificate, amount } => Some((*certificate, *amount)),
                _ => None,
            })
            .collect()
    }

    /// Number of recorded calls matching `pred`.
    pub fn count(&self, pred: impl Fn(&ExternalCall) -> bool) -> usize {
        self.state.borrow().calls.iter().filter(|c| pred(c)).count()
    }
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Router handle over a [`MockChain`].
#[derive(Debug, Clone)]
pub struct MockRouter {
    state: Rc<RefCell<ChainState>>,
}

impl AmmRouter for MockRouter {
    fn address(&self) -> AccountId {
        MockChain::router_address()
    }

    fn quote_amounts_in(&self, amount_out: Amount, path: &[TokenId]) -> Result<Vec<Amount>> {
        let mut state = self.state.borrow_mut();
        state.calls.push(ExternalCall::QuoteAmountsIn {
            amount_out,
            path: path.to_vec(),
        });
        state.fail_if_forced("router.quote_amounts_in")?;
        state.amounts_in(amount_out, path, "router.quote_amounts_in")
    }

    fn quote_amounts_out(&self, amount_in: Amount, path: &[TokenId]) -> Result<Vec<Amount>> {
        let mut state = self.state.borrow_mut();
        state.calls.push(ExternalCall::QuoteAmountsOut {
            amount_in,
            path: path.to_vec(),
        });
        state.fail_if_forced("router.quote_amounts_out")?;
        state.amounts_out(amount_in, path, "router.quote_amounts_out")
    }

    fn swap_exact_output(
        &mut self,
        amount_out: Amount,
        amount_in_max: Amount,
        path: &[TokenId],
        route: SwapRoute,
    ) -> Result<Vec<Amount>> {
        const CALL: &str = "router.swap_exact_output";
        let mut state = self.state.borrow_mut();
        state.calls.push(ExternalCall::SwapExactOutput {
            amount_out,
            amount_in_max,
            path: path.to_vec(),
        });
        state.fail_if_forced(CALL)?;
        state.check_deadline(&route, CALL)?;
        let mut amounts = state.amounts_in(amount_out, path, CALL)?;
        if amounts[0] > amount_in_max {
            return Err(SettleError::external(CALL, "EXCESSIVE_INPUT_AMOUNT"));
        }
        amounts[0] = amounts[0].saturating_sub(state.input_rebate);
        let delivered = amount_out.saturating_sub(state.output_shortfall);
        let last = amounts.len() - 1;
        amounts[last] = delivered;
        state.pull_with_allowance(
            path[0],
            route.sender,
            MockChain::router_address(),
            amounts[0],
            CALL,
        )?;
        state.add(path[last], route.recipient, delivered)?;
        Ok(amounts)
    }

    fn swap_exact_input(
        &mut self,
        amount_in: Amount,
        amount_out_min: Amount,
        path: &[TokenId],
        route: SwapRoute,
    ) -> Result<Vec<Amount>> {
        const CALL: &str = "router.swap_exact_input";
        let mut state = self.state.borrow_mut();
        state.calls.push(ExternalCall::SwapExactInput {
            amount_in,
            amount_out_min,
            path: path.to_vec(),
        });
        state.fail_if_forced(CALL)?;
        state.check_deadline(&route, CALL)?;
        let amounts = state.amounts_out(amount_in, path, CALL)?;
        let out = amounts[amounts.len() - 1];
        if out < amount_out_min && !state.ignore_output_minimum {
            return Err(SettleError::external(CALL, "INSUFFICIENT_OUTPUT_AMOUNT"));
        }
        state.pull_with_allowance(
            path[0],
            route.sender,
            MockChain::router_address(),
            amount_in,
            CALL,
        )?;
        state.add(path[path.len() - 1], route.recipient, out)?;
        Ok(amounts)
    }

    fn swap_native_exact_output(
        &mut self,
        amount_out: Amount,
        value: Amount,
        path: &[TokenId],
        route: SwapRoute,
    ) -> Result<Vec<Amount>> {
        const CALL: &str = "router.swap_native_exact_output";
        let mut state = self.state.borrow_mut();
        state.calls.push(ExternalCall::SwapNativeExactOutput {
            amount_out,
            value,
            path: path.to_vec(),
        });
        state.fail_if_forced(CALL)?;
        state.check_deadline(&route, CALL)?;
        let mut amounts = state.amounts_in(amount_out, path, CALL)?;
        if amounts[0] > value {
            return Err(SettleError::external(CALL, "EXCESSIVE_INPUT_AMOUNT"));
        }
        let delivered = amount_out.saturating_sub(state.output_shortfall);
        let last = amounts.len() - 1;
        amounts[last] = delivered;
        // Only the spent part leaves the sender; the rest is refunded in place.
        state.take_native(route.sender, amounts[0], CALL)?;
        state.add(path[last], route.recipient, delivered)?;
        Ok(amounts)
    }

    fn swap_native_exact_input(
        &mut self,
        value: Amount,
        amount_out_min: Amount,
        path: &[TokenId],
        route: SwapRoute,
    ) -> Result<Vec<Amount>> {
        const CALL: &str = "router.swap_native_exact_input";
        let mut state = self.state.borrow_mut();
        state.calls.push(ExternalCall::SwapNativeExactInput {
            value,
            amount_out_min,
            path: path.to_vec(),
        });
        state.fail_if_forced(CALL)?;
        state.check_deadline(&route, CALL)?;
        let amounts = state.amounts_out(value, path, CALL)?;
        let out = amounts[amounts.len() - 1];
        if out < amount_out_min && !state.ignore_output_minimum {
            return Err(SettleError::external(CALL, "INSUFFICIENT_OUTPUT_AMOUNT"));
        }
        state.take_native(route.sender, value, CALL)?;
        state.add(path[path.len() - 1], route.recipient, out)?;
        Ok(amounts)
    }
}

// ---------------------------------------------------------------------------
// Custody
// ---------------------------------------------------------------------------

/// Token / native custody handle over a [`MockChain`].
#[derive(Debug, Clone)]
pub struct MockCustody {
    state: Rc<RefCell<ChainState>>,
}

impl TokenCustody for MockCustody {
    fn balance_of(&self, token: TokenId, holder: AccountId) -> Amount {
        self.state.borrow().balance(token, holder)
    }

    fn allowance(&self, token: TokenId, owner: AccountId, spender: AccountId) -> Amount {
        self.state
            .borrow()
            .allowances
            .get(&(token, owner, spender))
            .copied()
            .unwrap_or(0)
    }

    fn transfer_from(
        &mut self,
        token: TokenId,
        spender: AccountId,
        from: AccountId,
        to: AccountId,
        amount: Amount,
    ) -> Result<bool> {
        let mut state = self.state.borrow_mut();
        state.calls.push(ExternalCall::TransferFrom {
            token,
            from,
            to,
            amount,
        });
        if state.failing.contains("token.transfer_from") {
            return Ok(false);
        }
        if state
            .pull_with_allowance(token, from, spender, amount, "token.transfer_from")
            .is_err()
        {
            return Ok(false);
        }
        state.add(token, to, amount)?;
        Ok(true)
    }

    fn transfer(
        &mut self,
        token: TokenId,
        from: AccountId,
        to: AccountId,
        amount: Amount,
    ) -> Result<bool> {
        let mut state = self.state.borrow_mut();
        state.calls.push(ExternalCall::Transfer {
            token,
            from,
            to,
            amount,
        });
        if state.failing.contains("token.transfer") || state.balance(token, from) < amount {
            return Ok(false);
        }
        state.take(token, from, amount, "token.transfer")?;
        state.add(token, to, amount)?;
        Ok(true)
    }

    fn approve(
        &mut self,
        token: TokenId,
        owner: AccountId,
        spender: AccountId,
        amount: Amount,
    ) -> Result<bool> {
        let mut state = self.state.borrow_mut();
        state.calls.push(ExternalCall::Approve {
            token,
            owner,
            spender,
            amount,
        });
        if state.failing.contains("token.approve") {
            return Ok(false);
        }
        state.allowances.insert((token, owner, spender), amount);
        Ok(true)
    }

    fn native_balance(&self, holder: AccountId) -> Amount {
        self.state.borrow().native.get(&holder).copied().unwrap_or(0)
    }

    fn collect_native(&mut self, from: AccountId, to: AccountId, amount: Amount) -> Result<bool> {
        let mut state = self.state.borrow_mut();
        state.calls.push(ExternalCall::CollectNative { from, amount });
        if state.failing.contains("native.collect") {
            return Ok(false);
        }
        if state.take_native(from, amount, "native.collect").is_err() {
            return Ok(false);
        }
        state.add_native(to, amount);
        Ok(true)
    }

    fn send_native(&mut self, from: AccountId, to: AccountId, amount: Amount) -> Result<bool> {
        let mut state = self.state.borrow_mut();
        state.calls.push(ExternalCall::SendNative { to, amount });
        if state.failing.contains("native.send") {
            return Ok(false);
        }
        if state.take_native(from, amount, "native.send").is_err() {
            return Ok(false);
        }
        state.add_native(to, amount);
        Ok(true)
    }
}

// ---------------------------------------------------------------------------
// Offset primitives
// ---------------------------------------------------------------------------

/// Pool redemption, certificate retirement and certificate registry handle.
#[derive(Debug, Clone)]
pub struct MockOffsets {
    state: Rc<RefCell<ChainState>>,
}

impl CertificatePool for MockOffsets {
    fn automatic_redeem(
        &mut self,
        pool: TokenId,
        holder: AccountId,
        amount: Amount,
    ) -> Result<RetirementBatch> {
        const CALL: &str = "pool.automatic_redeem";
        let mut state = self.state.borrow_mut();
        state.calls.push(ExternalCall::AutomaticRedeem { pool, amount });
        state.fail_if_forced(CALL)?;
        if state.balance(pool, holder) < amount {
            return Err(SettleError::external(CALL, "holder lacks pool tokens"));
        }

        // Plan the draw before touching state so a shortfall changes nothing.
        let inventory = state.inventories.get(&pool).cloned().unwrap_or_default();
        let mut remaining = amount;
        let mut batch = RetirementBatch::default();
        for (certificate, available) in &inventory {
            if remaining == 0 {
                break;
            }
            let take = remaining.min(*available);
            if take > 0 && *available > 0 {
                batch.certificates.push(*certificate);
                batch.amounts.push(take);
                remaining -= take;
            }
        }
        if remaining > 0 {
            return Err(SettleError::external(CALL, "pool inventory exhausted"));
        }

        state.take(pool, holder, amount, CALL)?;
        let queue = state.inventories.entry(pool).or_default();
        for take in &batch.amounts {
            // Empty entries were skipped while planning.
            while queue.front().is_some_and(|entry| entry.1 == 0) {
                queue.pop_front();
            }
            if let Some(front) = queue.front_mut() {
                front.1 -= take;
                if front.1 == 0 {
                    queue.pop_front();
                }
            }
        }
        let skim = state.redemption_skim;
        if let Some(last) = batch.amounts.last_mut() {
            *last = last.saturating_sub(skim);
        }
        for (certificate, got) in batch.iter() {
            state.add(certificate, holder, got)?;
        }
        Ok(batch)
    }
}

impl CertificateRetirement for MockOffsets {
    fn retire(&mut self, certificate: TokenId, holder: AccountId, amount: Amount) -> Result<()> {
        const CALL: &str = "certificate.retire";
        let mut state = self.state.borrow_mut();
        state.calls.push(ExternalCall::Retire {
            certificate,
            amount,
        });
        state.fail_if_forced(CALL)?;
        state.take(certificate, holder, amount, CALL)
    }
}

impl CertificateRegistry for MockOffsets {
    fn is_certificate(&self, registry: AccountId, token: TokenId) -> bool {
        registry == MockChain::registry_address()
            && self.state.borrow().certificates.contains(&token)
    }
}
