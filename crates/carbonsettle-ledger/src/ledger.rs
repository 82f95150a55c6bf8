//! Custodial ledger.
//!
//! Tracks per-(owner, token) balances of tokens held by the custodian on
//! the owner's behalf. All mutations are atomic: either the full operation
//! succeeds or the balance is unchanged. Balances never go negative and
//! never wrap.
//!
//! A journal can be opened around a multi-step invocation; rolling it back
//! restores every entry touched since [`Ledger::begin`].

use std::collections::HashMap;

use carbonsettle_types::{
    AccountId, Amount, Result, SettleError, TokenCustody, TokenId, amount, ensure_success,
};
use serde::{Deserialize, Serialize};

type Key = (AccountId, TokenId);

/// One `(owner, token) → amount` row, as exposed to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub owner: AccountId,
    pub token: TokenId,
    pub amount: Amount,
}

/// The single source of truth for what an owner may redeem, retire, or withdraw.
#[derive(Debug, Default)]
pub struct Ledger {
    /// Per-(owner, token) balances.
    balances: HashMap<Key, Amount>,
    /// Prior values of touched entries while a transaction is open.
    journal: Option<Vec<(Key, Option<Amount>)>>,
}

impl Ledger {
    /// Create a new empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self {
            balances: HashMap::new(),
            journal: None,
        }
    }

    fn set(&mut self, key: Key, value: Amount) {
        let previous = self.balances.insert(key, value);
        if let Some(journal) = self.journal.as_mut() {
            journal.push((key, previous));
        }
    }

    /// Credit `amount` to `(owner, token)`.
    ///
    /// # Errors
    /// Returns `ArithmeticOverflow` if the balance would exceed `Amount::MAX`.
    pub fn credit(&mut self, owner: AccountId, token: TokenId, amount: Amount) -> Result<()> {
        let next = amount::checked_add(self.balance(owner, token), amount, "ledger credit")?;
        self.set((owner, token), next);
        Ok(())
    }

    /// Debit `amount` from `(owner, token)`.
    ///
    /// # Errors
    /// Returns `InsufficientLedgerBalance` if balance < amount.
    pub fn debit(&mut self, owner: AccountId, token: TokenId, amount: Amount) -> Result<()> {
        self.ensure_covers(owner, token, amount)?;
        let next = amount::checked_sub(self.balance(owner, token), amount, "ledger debit")?;
        self.set((owner, token), next);
        Ok(())
    }

    /// Check that `(owner, token)` holds at least `amount`, without mutating.
    pub fn ensure_covers(&self, owner: AccountId, token: TokenId, amount: Amount) -> Result<()> {
        let available = self.balance(owner, token);
        if available < amount {
            return Err(SettleError::InsufficientLedgerBalance {
                owner,
                token,
                needed: amount,
                available,
            });
        }
        Ok(())
    }

    /// Pull `amount` of `token` from `owner` into the custodian, then credit.
    ///
    /// The owner must have granted the custodian an allowance. The credit is
    /// checked for overflow before the pull so a failing credit never
    /// strands pulled tokens.
    pub fn deposit<C: TokenCustody>(
        &mut self,
        custody: &mut C,
        custodian: AccountId,
        owner: AccountId,
        token: TokenId,
        amount: Amount,
    ) -> Result<()> {
        amount::checked_add(self.balance(owner, token), amount, "ledger deposit")?;

        let pulled = custody.transfer_from(token, custodian, owner, custodian, amount)?;
        ensure_success(pulled, "token.transfer_from", || {
            format!("pull of {amount} {token} from {owner} refused")
        })?;

        self.credit(owner, token, amount)?;
        tracing::debug!(owner = %owner, token = %token, amount, "Deposit credited");
        Ok(())
    }

    /// Debit `(owner, token)`, then release `amount` from the custodian to `owner`.
    ///
    /// The ledger is debited before the external transfer so no observer
    /// can see the pre-withdrawal balance once tokens have left custody. If
    /// the transfer fails the debit is reversed and the error returned.
    pub fn withdraw<C: TokenCustody>(
        &mut self,
        custody: &mut C,
        custodian: AccountId,
        owner: AccountId,
        token: TokenId,
        amount: Amount,
    ) -> Result<()> {
        self.debit(owner, token, amount)?;

        let released = custody
            .transfer(token, custodian, owner, amount)
            .and_then(|ok| {
                ensure_success(ok, "token.transfer", || {
                    format!("release of {amount} {token} to {owner} refused")
                })
            });
        if let Err(err) = released {
            self.credit(owner, token, amount)?;
            tracing::warn!(
                owner = %owner,
                token = %token,
                amount,
                error = %err,
                "Withdraw reverted"
            );
            return Err(err);
        }

        tracing::debug!(owner = %owner, token = %token, amount, "Withdraw released");
        Ok(())
    }

    /// Balance of `(owner, token)`; zero if never credited.
    #[must_use]
    pub fn balance(&self, owner: AccountId, token: TokenId) -> Amount {
        self.balances.get(&(owner, token)).copied().unwrap_or(0)
    }

    /// Sum of every owner's balance of `token`.
    pub fn total_supply(&self, token: TokenId) -> Result<Amount> {
        amount::checked_sum(
            self.balances
                .iter()
                .filter(|((_, t), _)| *t == token)
                .map(|(_, amount)| amount),
            "ledger total supply",
        )
    }

    /// Every entry for `owner`, sorted by token.
    #[must_use]
    pub fn entries_for(&self, owner: AccountId) -> Vec<LedgerEntry> {
        let mut entries: Vec<LedgerEntry> = self
            .balances
            .iter()
            .filter(|((o, _), _)| *o == owner)
            .map(|(&(owner, token), &amount)| LedgerEntry {
                owner,
                token,
                amount,
            })
            .collect();
        entries.sort_by_key(|e| e.token);
        entries
    }

    // -----------------------------------------------------------------
    // Transactions
    // -----------------------------------------------------------------

    /// Open a journal. Every mutation until `commit`/`rollback` is recorded.
    ///
    /// # Errors
    /// Returns `LedgerTransaction` if a transaction is already open.
    pub fn begin(&mut self) -> Result<()> {
        if self.journal.is_some() {
            return Err(SettleError::LedgerTransaction {
                reason: "transaction already open".to_string(),
            });
        }
        self.journal = Some(Vec::new());
        Ok(())
    }

    /// Keep every mutation since `begin`.
    pub fn commit(&mut self) -> Result<()> {
        self.journal
            .take()
            .map(|_| ())
            .ok_or_else(|| SettleError::LedgerTransaction {
                reason: "commit without an open transaction".to_string(),
            })
    }

    /// Undo every mutation since `begin`, newest first.
    pub fn rollback(&mut self) -> Result<()> {
        let journal = self
            .journal
            .take()
            .ok_or_else(|| SettleError::LedgerTransaction {
                reason: "rollback without an open transaction".to_string(),
            })?;
        let undone = journal.len();
        for (key, previous) in journal.into_iter().rev() {
            match previous {
                Some(value) => {
                    self.balances.insert(key, value);
                }
                None => {
                    self.balances.remove(&key);
                }
            }
        }
        tracing::debug!(undone, "Ledger transaction rolled back");
        Ok(())
    }

    #[must_use]
    pub fn in_transaction(&self) -> bool {
        self.journal.is_some()
    }
}
