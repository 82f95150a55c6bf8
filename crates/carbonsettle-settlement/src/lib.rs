//! # carbonsettle-settlement
//!
//! **Finality plane**: turns custodied pool certificate tokens into retired
//! certificates and wires the exchange plane in front of it.
//!
//! ## Components
//!
//! 1. **RedemptionEngine**: pool token → certificates, conservation checked
//! 2. **RetirementEngine**: whole-batch validation, then per-index
//!    debit + retire
//! 3. **SettlementOrchestrator**: the five offset workflows, query helpers,
//!    stand-alone ledger operations and the admin surface, each invocation
//!    wrapped in a ledger transaction
//!
//! ## Invariant
//!
//! ```text
//! Σ certificates retired == pool tokens redeemed == pool tokens acquired
//! ```

pub mod orchestrator;
pub mod redemption;
pub mod retirement;

pub use orchestrator::SettlementOrchestrator;
pub use redemption::RedemptionEngine;
pub use retirement::RetirementEngine;
