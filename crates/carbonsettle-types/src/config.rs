//! Configuration types for the settlement orchestrator.
//!
//! Configuration is plain serde data, usually loaded from JSON. It fixes
//! the principals (admin, custodian, external certificate registry), the
//! initial eligible-token set, the routing pivots, and the exact-input
//! output floor policy.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{AccountId, Amount, Result, SettleError, TokenId, amount, constants};

/// Minimum-output policy for exact-input swaps.
///
/// `None` accepts whatever the market returns, which is how the exact-input
/// workflows behave unless a floor is configured or passed per call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OutputFloor {
    #[default]
    None,
    /// Absolute minimum output in destination-token units.
    Minimum(Amount),
    /// Fraction of the quoted output that may be lost to slippage, e.g. `0.005`.
    Tolerance(Decimal),
}

impl OutputFloor {
    /// Resolve to an absolute minimum. `quote` is only invoked for
    /// [`OutputFloor::Tolerance`].
    pub fn resolve(self, quote: impl FnOnce() -> Result<Amount>) -> Result<Amount> {
        match self {
            Self::None => Ok(0),
            Self::Minimum(min) => Ok(min),
            Self::Tolerance(tolerance) => amount::apply_tolerance(quote()?, tolerance),
        }
    }
}

/// Initial eligible-token set and the symbol classes that drive
/// swappable / redeemable lookups.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EligibilityConfig {
    /// Symbol → token registered at construction.
    #[serde(default)]
    pub tokens: BTreeMap<String, TokenId>,
    /// Symbols whose tokens may be used as exchange inputs.
    pub swappable_symbols: Vec<String>,
    /// Symbols whose tokens are pool certificate tokens.
    pub redeemable_symbols: Vec<String>,
}

impl Default for EligibilityConfig {
    fn default() -> Self {
        Self {
            tokens: BTreeMap::new(),
            swappable_symbols: constants::DEFAULT_SWAPPABLE_SYMBOLS
                .iter()
                .map(ToString::to_string)
                .collect(),
            redeemable_symbols: constants::DEFAULT_REDEEMABLE_SYMBOLS
                .iter()
                .map(ToString::to_string)
                .collect(),
        }
    }
}

impl EligibilityConfig {
    /// Builder-style helper to register a token.
    #[must_use]
    pub fn with_token(mut self, symbol: impl Into<String>, token: TokenId) -> Self {
        self.tokens.insert(symbol.into(), token);
        self
    }
}

/// Top-level orchestrator configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementConfig {
    /// The single principal allowed to mutate eligibility and registry references.
    pub admin: AccountId,
    /// Account that holds all custodied tokens on behalf of ledger owners.
    pub custodian: AccountId,
    /// External certificate registry consulted for deposit eligibility.
    pub contract_registry: AccountId,
    #[serde(default)]
    pub eligibility: EligibilityConfig,
    /// Pivot asset for default routing.
    pub stablecoin_symbol: String,
    /// Token standing in for the native currency at the head of native paths.
    pub wrapped_native_symbol: String,
    /// Seconds added to the invocation time to form the router deadline.
    #[serde(default)]
    pub deadline_grace_secs: u64,
    /// Floor applied to exact-input swaps when the caller passes none.
    #[serde(default)]
    pub default_output_floor: OutputFloor,
}

impl SettlementConfig {
    /// Config with default symbols and policies for the given principals.
    #[must_use]
    pub fn new(admin: AccountId, custodian: AccountId, contract_registry: AccountId) -> Self {
        Self {
            admin,
            custodian,
            contract_registry,
            eligibility: EligibilityConfig::default(),
            stablecoin_symbol: constants::DEFAULT_STABLECOIN_SYMBOL.to_string(),
            wrapped_native_symbol: constants::DEFAULT_WRAPPED_NATIVE_SYMBOL.to_string(),
            deadline_grace_secs: constants::DEFAULT_DEADLINE_GRACE_SECS,
            default_output_floor: OutputFloor::None,
        }
    }

    /// Parse and validate a JSON document.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check internal consistency.
    ///
    /// # Errors
    /// Returns [`SettleError::Configuration`] describing the first problem found.
    pub fn validate(&self) -> Result<()> {
        if self.custodian == self.admin {
            return Err(SettleError::Configuration(
                "custodian and admin must be distinct accounts".to_string(),
            ));
        }
        let swappable = &self.eligibility.swappable_symbols;
        let redeemable = &self.eligibility.redeemable_symbols;
        if !swappable.contains(&self.stablecoin_symbol) {
            return Err(SettleError::Configuration(format!(
                "stablecoin symbol {:?} is not a swappable symbol",
                self.stablecoin_symbol
            )));
        }
        if !swappable.contains(&self.wrapped_native_symbol) {
            return Err(SettleError::Configuration(format!(
                "wrapped native symbol {:?} is not a swappable symbol",
                self.wrapped_native_symbol
            )));
        }
        if let Some(both) = swappable.iter().find(|s| redeemable.contains(s)) {
            return Err(SettleError::Configuration(format!(
                "symbol {both:?} is both swappable and redeemable"
            )));
        }
        if let OutputFloor::Tolerance(tolerance) = self.default_output_floor {
            if tolerance.is_sign_negative() || tolerance > Decimal::ONE {
                return Err(SettleError::Configuration(format!(
                    "default slippage tolerance {tolerance} outside [0, 1]"
                )));
            }
        }
        Ok(())
    }
}
