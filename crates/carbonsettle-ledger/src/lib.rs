//! # carbonsettle-ledger
//!
//! **Custody plane**: the per-owner ledger of custodied tokens, the
//! registry deciding which tokens may enter it, and the conservation
//! checks tying the two to real holdings.
//!
//! ## Components
//!
//! 1. **Ledger**: `(owner, token) → amount`, checked arithmetic, journaled
//!    transactions for all-or-nothing invocations
//! 2. **EligibilityRegistry**: symbol → token aliases; swappable and
//!    redeemable lookups evaluated at call time; admin-only mutation
//! 3. **conservation**: redemption in == out, ledger ≤ custody
//!
//! ## Ordering
//!
//! ```text
//! deposit:  custody.transfer_from → ledger.credit
//! withdraw: ledger.debit          → custody.transfer
//! ```

pub mod conservation;
pub mod ledger;
pub mod registry;

pub use conservation::{CustodyReport, verify_custody, verify_redemption};
pub use ledger::{Ledger, LedgerEntry};
pub use registry::EligibilityRegistry;
