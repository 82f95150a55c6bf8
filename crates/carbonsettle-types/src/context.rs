//! Invocation context.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{AccountId, Amount};

/// Who is calling, how much native value is attached, and when.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallContext {
    /// The invoking principal; also the ledger owner for workflows.
    pub caller: AccountId,
    /// Native currency attached to the call.
    pub value: Amount,
    /// Invocation time, used to derive the router deadline.
    pub at: DateTime<Utc>,
}

impl CallContext {
    /// A context for `caller` at the current time with no attached value.
    #[must_use]
    pub fn new(caller: AccountId) -> Self {
        Self {
            caller,
            value: 0,
            at: Utc::now(),
        }
    }

    #[must_use]
    pub fn with_value(mut self, value: Amount) -> Self {
        self.value = value;
        self
    }

    #[must_use]
    pub fn at(mut self, at: DateTime<Utc>) -> Self {
        self.at = at;
        self
    }
}
