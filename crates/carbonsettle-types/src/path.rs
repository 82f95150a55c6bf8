//! Exchange routing types.
//!
//! A [`PathPlan`] is the ordered hop sequence handed to the router. It is
//! built per invocation by the path planner from a [`RoutingStrategy`] and
//! is never persisted.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{Result, SettleError, TokenId, constants};

/// How the path planner chooses the hops between source and destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum RoutingStrategy {
    /// Pivot through the registered stablecoin unless the source already is it.
    #[default]
    Default,
    /// Always trade source → destination directly.
    DirectOverride,
    /// Always trade source → intermediary → destination.
    MultiHopOverride(TokenId),
}

impl fmt::Display for RoutingStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Default => write!(f, "DEFAULT"),
            Self::DirectOverride => write!(f, "DIRECT"),
            Self::MultiHopOverride(via) => write!(f, "MULTI_HOP({via})"),
        }
    }
}

/// Ordered, validated hop sequence: first = source, last = destination.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "Vec<TokenId>", into = "Vec<TokenId>")]
pub struct PathPlan(Vec<TokenId>);

impl PathPlan {
    /// Build a plan, enforcing length 2..=3 and source ≠ destination.
    ///
    /// # Errors
    /// Returns [`SettleError::InvalidPath`] if the shape is wrong.
    pub fn new(hops: Vec<TokenId>) -> Result<Self> {
        let (Some(first), Some(last)) = (hops.first(), hops.last()) else {
            return Err(SettleError::InvalidPath {
                reason: "path is empty".to_string(),
            });
        };
        if !(constants::MIN_PATH_LEN..=constants::MAX_PATH_LEN).contains(&hops.len()) {
            return Err(SettleError::InvalidPath {
                reason: format!(
                    "path has {} hops, expected {}..={}",
                    hops.len(),
                    constants::MIN_PATH_LEN,
                    constants::MAX_PATH_LEN
                ),
            });
        }
        if first == last {
            return Err(SettleError::InvalidPath {
                reason: format!("source and destination are both {first}"),
            });
        }
        Ok(Self(hops))
    }

    /// `[source, destination]`.
    pub fn direct(source: TokenId, destination: TokenId) -> Result<Self> {
        Self::new(vec![source, destination])
    }

    /// `[source, via, destination]`.
    pub fn via(source: TokenId, via: TokenId, destination: TokenId) -> Result<Self> {
        Self::new(vec![source, via, destination])
    }

    #[must_use]
    pub fn source(&self) -> TokenId {
        self.0[0]
    }

    #[must_use]
    pub fn destination(&self) -> TokenId {
        self.0[self.0.len() - 1]
    }

    /// The middle hop of a three-token plan.
    #[must_use]
    pub fn intermediary(&self) -> Option<TokenId> {
        (self.0.len() == 3).then(|| self.0[1])
    }

    #[must_use]
    pub fn hops(&self) -> &[TokenId] {
        &self.0
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always `false`; a plan holds at least two tokens.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Check that the plan starts at `source` and ends at `destination`.
    ///
    /// # Errors
    /// Returns [`SettleError::InvalidPath`] if either endpoint differs.
    pub fn ensure_endpoints(&self, source: TokenId, destination: TokenId) -> Result<()> {
        if self.source() != source || self.destination() != destination {
            return Err(SettleError::InvalidPath {
                reason: format!(
                    "plan {self} does not run from {source} to {destination}"
                ),
            });
        }
        Ok(())
    }
}

impl TryFrom<Vec<TokenId>> for PathPlan {
    type Error = SettleError;

    fn try_from(hops: Vec<TokenId>) -> Result<Self> {
        Self::new(hops)
    }
}

impl From<PathPlan> for Vec<TokenId> {
    fn from(plan: PathPlan) -> Self {
        plan.0
    }
}

impl fmt::Display for PathPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hops: Vec<String> = self.0.iter().map(TokenId::short).collect();
        write!(f, "[{}]", hops.join(" -> "))
    }
}
