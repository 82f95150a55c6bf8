//! # carbonsettle-exchange
//!
//! **Exchange plane**: turns a caller's native value or swappable token into
//! a pool certificate token held in custody and credited on the ledger.
//!
//! ## Components
//!
//! 1. **PathPlanner**: hop sequence from a [`RoutingStrategy`](carbonsettle_types::RoutingStrategy)
//! 2. **ExchangeGateway**: exact-output / exact-input swaps through the
//!    router, with refunds and allowance hygiene
//! 3. **quote helpers**: read-only router quotes along a plan

pub mod gateway;
pub mod planner;

pub use gateway::{
    ExchangeGateway, ExchangeOutcome, SwapSource, expected_output, quote_exact_input,
    quote_exact_output, required_input,
};
pub use planner::PathPlanner;
