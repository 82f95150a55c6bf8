//! # carbonsettle-types
//!
//! Shared types, errors, and configuration for the **carbonsettle**
//! settlement orchestrator.
//!
//! This crate is the leaf dependency of the workspace; every other crate
//! depends on it. It defines:
//!
//! - **Identifiers**: [`AccountId`], [`TokenId`], [`ReceiptId`]
//! - **Amounts**: [`Amount`] and checked arithmetic helpers
//! - **Routing model**: [`PathPlan`], [`RoutingStrategy`]
//! - **Certificate model**: [`RetirementBatch`]
//! - **Invocation model**: [`CallContext`], [`OffsetReceipt`], [`Workflow`]
//! - **Configuration**: [`SettlementConfig`], [`EligibilityConfig`], [`OutputFloor`]
//! - **External collaborators**: [`AmmRouter`], [`TokenCustody`],
//!   [`CertificatePool`], [`CertificateRetirement`], [`CertificateRegistry`]
//! - **Errors**: [`SettleError`] with `CS_ERR_` prefix codes
//! - **Constants**: system-wide defaults
//!
//! With the `test-helpers` feature, [`testing`] provides an in-memory chain
//! that implements every external trait and records each call made to it.

pub mod amount;
pub mod batch;
pub mod config;
pub mod constants;
pub mod context;
pub mod error;
pub mod external;
pub mod ids;
pub mod path;
pub mod receipt;

#[cfg(any(test, feature = "test-helpers"))]
pub mod testing;

// Re-export all primary types at crate root for ergonomic imports:
//   use carbonsettle_types::{AccountId, TokenId, PathPlan, SettleError, ...};

pub use amount::*;
pub use batch::*;
pub use config::*;
pub use context::*;
pub use error::*;
pub use external::*;
pub use ids::*;
pub use path::*;
pub use receipt::*;

// Constants are accessed via `carbonsettle_types::constants::FOO`
// (not re-exported to avoid name collisions).
