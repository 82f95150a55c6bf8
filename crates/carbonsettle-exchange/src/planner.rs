//! Path planning.
//!
//! ```text
//! Default:            source == stablecoin ? [source, dest] : [source, stablecoin, dest]
//! DirectOverride:     [source, dest]
//! MultiHopOverride(i): [source, i, dest]
//! ```
//!
//! The stablecoin is looked up in the registry on every call. No liquidity
//! probing happens here; a pool too shallow for the trade surfaces as a
//! router failure in the gateway.

use carbonsettle_ledger::EligibilityRegistry;
use carbonsettle_types::{PathPlan, Result, RoutingStrategy, SettleError, TokenId, constants};

#[derive(Debug, Clone)]
pub struct PathPlanner {
    stablecoin_symbol: String,
}

impl PathPlanner {
    #[must_use]
    pub fn new(stablecoin_symbol: impl Into<String>) -> Self {
        Self {
            stablecoin_symbol: stablecoin_symbol.into(),
        }
    }

    #[must_use]
    pub fn stablecoin_symbol(&self) -> &str {
        &self.stablecoin_symbol
    }

    /// Plan the hops from `source` to `destination`.
    ///
    /// # Errors
    /// `TokenNotRegistered` if the default strategy needs a stablecoin that is
    /// not registered; `InvalidPath` for degenerate plans.
    pub fn plan(
        &self,
        registry: &EligibilityRegistry,
        source: TokenId,
        destination: TokenId,
        strategy: RoutingStrategy,
    ) -> Result<PathPlan> {
        let plan = match strategy {
            RoutingStrategy::Default => {
                let stablecoin = registry.require(&self.stablecoin_symbol)?;
                if source == stablecoin {
                    PathPlan::direct(source, destination)?
                } else {
                    Self::via(source, stablecoin, destination)?
                }
            }
            RoutingStrategy::DirectOverride => PathPlan::direct(source, destination)?,
            RoutingStrategy::MultiHopOverride(intermediary) => {
                Self::via(source, intermediary, destination)?
            }
        };
        tracing::debug!(strategy = %strategy, path = %plan, "Path planned");
        Ok(plan)
    }

    fn via(source: TokenId, intermediary: TokenId, destination: TokenId) -> Result<PathPlan> {
        if intermediary == source || intermediary == destination {
            return Err(SettleError::InvalidPath {
                reason: format!("intermediary {intermediary} repeats an endpoint"),
            });
        }
        PathPlan::via(source, intermediary, destination)
    }
}

impl Default for PathPlanner {
    fn default() -> Self {
        Self::new(constants::DEFAULT_STABLECOIN_SYMBOL)
    }
}

#[cfg(test)]
mod tests {
    use carbonsettle_types::{AccountId, EligibilityConfig};

    use super::*;

    fn t(label: &str) -> TokenId {
        TokenId::from_label(label)
    }

    fn registry() -> EligibilityRegistry {
        let config = EligibilityConfig::default()
            .with_token("USDC", t("USDC"))
            .with_token("WMATIC", t("WMATIC"))
            .with_token("BCT", t("BCT"));
        EligibilityRegistry::new(AccountId::from_label("admin"), &config)
    }

    #[test]
    fn default_pivots_through_stablecoin() {
        let plan = PathPlanner::default()
            .plan(&registry(), t("WMATIC"), t("BCT"), RoutingStrategy::Default)
            .unwrap();
        assert_eq!(plan.hops(), &[t("WMATIC"), t("USDC"), t("BCT")]);
        assert_eq!(plan.intermediary(), Some(t("USDC")));
    }

    #[test]
    fn default_from_stablecoin_is_direct() {
        let plan = PathPlanner::default()
            .plan(&registry(), t("USDC"), t("BCT"), RoutingStrategy::Default)
            .unwrap();
        assert_eq!(plan.hops(), &[t("USDC"), t("BCT")]);
    }

    #[test]
    fn overrides_ignore_the_stablecoin() {
        let planner = PathPlanner::default();
        let reg = registry();
        let direct = planner
            .plan(&reg, t("WMATIC"), t("BCT"), RoutingStrategy::DirectOverride)
            .unwrap();
        assert_eq!(direct.hops(), &[t("WMATIC"), t("BCT")]);

        let multi = planner
            .plan(
                &reg,
                t("USDC"),
                t("BCT"),
                RoutingStrategy::MultiHopOverride(t("WETH")),
            )
            .unwrap();
        assert_eq!(multi.hops(), &[t("USDC"), t("WETH"), t("BCT")]);
    }

    #[test]
    fn default_needs_a_registered_stablecoin() {
        let mut reg = registry();
        reg.delete_token(AccountId::from_label("admin"), "USDC").unwrap();
        let err = PathPlanner::default()
            .plan(&reg, t("WMATIC"), t("BCT"), RoutingStrategy::Default)
            .unwrap_err();
        assert!(matches!(err, SettleError::TokenNotRegistered { .. }));

        // Overrides still work without one.
        assert!(PathPlanner::default()
            .plan(&reg, t("WMATIC"), t("BCT"), RoutingStrategy::DirectOverride)
            .is_ok());
    }

    #[test]
    fn stablecoin_is_resolved_at_call_time() {
        let mut reg = registry();
        let planner = PathPlanner::default();
        reg.set_token(AccountId::from_label("admin"), "USDC", t("USDC-v2"))
            .unwrap();
        let plan = planner
            .plan(&reg, t("WMATIC"), t("BCT"), RoutingStrategy::Default)
            .unwrap();
        assert_eq!(plan.intermediary(), Some(t("USDC-v2")));
    }

    #[test]
    fn degenerate_intermediary_rejected() {
        let err = PathPlanner::default()
            .plan(
                &registry(),
                t("WMATIC"),
                t("BCT"),
                RoutingStrategy::MultiHopOverride(t("BCT")),
            )
            .unwrap_err();
        assert!(matches!(err, SettleError::InvalidPath { .. }));
    }
}
