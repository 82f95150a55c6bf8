//! Eligibility registry.
//!
//! Maps administrative symbols to token identities and classifies tokens as
//! swappable (exchange inputs) or redeemable (pool certificate tokens).
//! Classification follows the symbol classes fixed at construction and the
//! tokens registered *at call time*; nothing is cached.

use std::collections::{BTreeMap, BTreeSet};

use carbonsettle_types::{
    AccountId, Eligibility, EligibilityConfig, Result, SettleError, TokenId,
};

#[derive(Debug, Clone)]
pub struct EligibilityRegistry {
    admin: AccountId,
    tokens: BTreeMap<String, TokenId>,
    swappable_symbols: BTreeSet<String>,
    redeemable_symbols: BTreeSet<String>,
}

impl EligibilityRegistry {
    /// Registry administered by `admin`, seeded from `config`.
    #[must_use]
    pub fn new(admin: AccountId, config: &EligibilityConfig) -> Self {
        Self {
            admin,
            tokens: config.tokens.clone(),
            swappable_symbols: config.swappable_symbols.iter().cloned().collect(),
            redeemable_symbols: config.redeemable_symbols.iter().cloned().collect(),
        }
    }

    #[must_use]
    pub fn admin(&self) -> AccountId {
        self.admin
    }

    fn ensure_admin(&self, caller: AccountId) -> Result<()> {
        if caller != self.admin {
            tracing::warn!(caller = %caller, "Rejected registry mutation from non-admin");
            return Err(SettleError::Unauthorized { caller });
        }
        Ok(())
    }

    // -----------------------------------------------------------------
    // Administration
    // -----------------------------------------------------------------

    /// Register (or re-point) `symbol` to `token`.
    pub fn set_token(&mut self, caller: AccountId, symbol: &str, token: TokenId) -> Result<()> {
        self.ensure_admin(caller)?;
        let previous = self.tokens.insert(symbol.to_string(), token);
        tracing::info!(symbol, token = %token, replaced = previous.is_some(), "Token registered");
        Ok(())
    }

    /// Remove `symbol`. Removing an unknown symbol is a no-op.
    pub fn delete_token(&mut self, caller: AccountId, symbol: &str) -> Result<()> {
        self.ensure_admin(caller)?;
        if let Some(token) = self.tokens.remove(symbol) {
            tracing::info!(symbol, token = %token, "Token deregistered");
        }
        Ok(())
    }

    /// Hand the admin role to `new_admin`.
    pub fn transfer_admin(&mut self, caller: AccountId, new_admin: AccountId) -> Result<()> {
        self.ensure_admin(caller)?;
        self.admin = new_admin;
        tracing::info!(from = %caller, to = %new_admin, "Registry admin transferred");
        Ok(())
    }

    // -----------------------------------------------------------------
    // Lookups
    // -----------------------------------------------------------------

    #[must_use]
    pub fn resolve(&self, symbol: &str) -> Option<TokenId> {
        self.tokens.get(symbol).copied()
    }

    /// Like [`resolve`](Self::resolve) but fails with `TokenNotRegistered`.
    pub fn require(&self, symbol: &str) -> Result<TokenId> {
        self.resolve(symbol)
            .ok_or_else(|| SettleError::TokenNotRegistered {
                symbol: symbol.to_string(),
            })
    }

    fn registered_under<'a>(
        &'a self,
        symbols: &'a BTreeSet<String>,
    ) -> impl Iterator<Item = TokenId> + 'a {
        symbols.iter().filter_map(|s| self.resolve(s))
    }

    #[must_use]
    pub fn is_swappable(&self, token: TokenId) -> bool {
        self.registered_under(&self.swappable_symbols)
            .any(|t| t == token)
    }

    #[must_use]
    pub fn is_redeemable(&self, token: TokenId) -> bool {
        self.registered_under(&self.redeemable_symbols)
            .any(|t| t == token)
    }

    /// Swappable or redeemable.
    #[must_use]
    pub fn is_eligible(&self, token: TokenId) -> bool {
        self.is_swappable(token) || self.is_redeemable(token)
    }

    pub fn require_swappable(&self, token: TokenId) -> Result<()> {
        if self.is_swappable(token) {
            Ok(())
        } else {
            Err(SettleError::IneligibleToken {
                token,
                required: Eligibility::Swappable,
            })
        }
    }

    pub fn require_redeemable(&self, token: TokenId) -> Result<()> {
        if self.is_redeemable(token) {
            Ok(())
        } else {
            Err(SettleError::IneligibleToken {
                token,
                required: Eligibility::Redeemable,
            })
        }
    }

    /// All registered `(symbol, token)` pairs, ordered by symbol.
    pub fn tokens(&self) -> impl Iterator<Item = (&str, TokenId)> + '_ {
        self.tokens.iter().map(|(s, t)| (s.as_str(), *t))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(label: &str) -> TokenId {
        TokenId::from_label(label)
    }

    fn registry() -> (EligibilityRegistry, AccountId) {
        let admin = AccountId::from_label("admin");
        let config = EligibilityConfig::default()
            .with_token("USDC", t("USDC"))
            .with_token("WMATIC", t("WMATIC"))
            .with_token("BCT", t("BCT"));
        (EligibilityRegistry::new(admin, &config), admin)
    }

    #[test]
    fn classification_follows_symbol_classes() {
        let (reg, _) = registry();
        assert!(reg.is_swappable(t("USDC")));
        assert!(reg.is_swappable(t("WMATIC")));
        assert!(!reg.is_swappable(t("BCT")));
        assert!(reg.is_redeemable(t("BCT")));
        assert!(!reg.is_redeemable(t("USDC")));
        assert!(!reg.is_eligible(t("DAI")));
    }

    #[test]
    fn lookups_reflect_mutations_immediately() {
        let (mut reg, admin) = registry();
        assert!(!reg.is_redeemable(t("NCT")));
        reg.set_token(admin, "NCT", t("NCT")).unwrap();
        assert!(reg.is_redeemable(t("NCT")));

        reg.delete_token(admin, "USDC").unwrap();
        assert!(!reg.is_swappable(t("USDC")));
        assert!(matches!(
            reg.require("USDC"),
            Err(SettleError::TokenNotRegistered { .. })
        ));

        // Re-pointing a symbol drops the old token from its class.
        reg.set_token(admin, "BCT", t("BCT-v2")).unwrap();
        assert!(!reg.is_redeemable(t("BCT")));
        assert!(reg.is_redeemable(t("BCT-v2")));
    }

    #[test]
    fn unknown_symbol_is_unclassified() {
        let (mut reg, admin) = registry();
        reg.set_token(admin, "DAI", t("DAI")).unwrap();
        assert_eq!(reg.resolve("DAI"), Some(t("DAI")));
        assert!(!reg.is_eligible(t("DAI")));
    }

    #[test]
    fn non_admin_cannot_mutate() {
        let (mut reg, _) = registry();
        let mallory = AccountId::from_label("mallory");
        assert!(matches!(
            reg.set_token(mallory, "NCT", t("NCT")),
            Err(SettleError::Unauthorized { caller }) if caller == mallory
        ));
        assert!(reg.delete_token(mallory, "USDC").is_err());
        assert!(reg.transfer_admin(mallory, mallory).is_err());
        assert!(reg.is_swappable(t("USDC")));
    }

    #[test]
    fn transfer_admin_moves_authority() {
        let (mut reg, admin) = registry();
        let next = AccountId::from_label("next-admin");
        reg.transfer_admin(admin, next).unwrap();
        assert_eq!(reg.admin(), next);
        assert!(reg.set_token(admin, "NCT", t("NCT")).is_err());
        reg.set_token(next, "NCT", t("NCT")).unwrap();
    }

    #[test]
    fn require_helpers_name_the_missing_class() {
        let (reg, _) = registry();
        assert!(reg.require_swappable(t("USDC")).is_ok());
        assert!(matches!(
            reg.require_swappable(t("BCT")),
            Err(SettleError::IneligibleToken { required: Eligibility::Swappable, .. })
        ));
        assert!(matches!(
            reg.require_redeemable(t("USDC")),
            Err(SettleError::IneligibleToken { required: Eligibility::Redeemable, .. })
        ));
    }

    #[test]
    fn tokens_are_listed_by_symbol() {
        let (reg, _) = registry();
        let symbols: Vec<&str> = reg.tokens().map(|(s, _)| s).collect();
        assert_eq!(symbols, vec!["BCT", "USDC", "WMATIC"]);
    }
}
