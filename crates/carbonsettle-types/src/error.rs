//! Error types for the carbonsettle orchestrator.
//!
//! All errors use the `CS_ERR_` prefix convention for easy grepping in logs.
//! Error codes are grouped by subsystem:
//! - 1xx: Eligibility / administration errors
//! - 2xx: Ledger errors
//! - 3xx: Routing / exchange errors
//! - 4xx: Redemption / retirement errors
//! - 5xx: External collaborator errors
//! - 9xx: General / internal errors

use std::fmt;

use thiserror::Error;

use crate::{AccountId, Amount, TokenId};

/// Which eligible set a token was checked against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Eligibility {
    /// Accepted as an exchange input.
    Swappable,
    /// Accepted as a pool certificate token.
    Redeemable,
    /// Accepted for custodial deposit.
    Depositable,
}

impl fmt::Display for Eligibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Swappable => write!(f, "SWAPPABLE"),
            Self::Redeemable => write!(f, "REDEEMABLE"),
            Self::Depositable => write!(f, "DEPOSITABLE"),
        }
    }
}

/// Central error enum for all carbonsettle operations.
#[derive(Debug, Error)]
pub enum SettleError {
    // =================================================================
    // Eligibility / Administration Errors (1xx)
    // =================================================================
    /// The token is not in the eligible set required by the operation.
    #[error("CS_ERR_100: Token {token} is not {required}")]
    IneligibleToken {
        token: TokenId,
        required: Eligibility,
    },

    /// No token is registered under this symbol.
    #[error("CS_ERR_101: No token registered for symbol {symbol:?}")]
    TokenNotRegistered { symbol: String },

    /// A non-admin principal invoked an administrative operation.
    #[error("CS_ERR_102: Unauthorized: {caller} is not the admin")]
    Unauthorized { caller: AccountId },

    /// A workflow or ledger operation was called with a zero amount.
    #[error("CS_ERR_103: Amount must be non-zero for {operation}")]
    ZeroAmount { operation: &'static str },

    // =================================================================
    // Ledger Errors (2xx)
    // =================================================================
    /// The owner's ledger balance cannot cover the requested debit.
    #[error(
        "CS_ERR_200: Insufficient ledger balance for {owner} in {token}: need {needed}, have {available}"
    )]
    InsufficientLedgerBalance {
        owner: AccountId,
        token: TokenId,
        needed: Amount,
        available: Amount,
    },

    /// A credit would push a balance past the representable maximum.
    #[error("CS_ERR_201: Arithmetic overflow in {context}")]
    ArithmeticOverflow { context: String },

    /// A subtraction would produce a negative value.
    #[error("CS_ERR_202: Arithmetic underflow in {context}")]
    ArithmeticUnderflow { context: String },

    /// Ledger transaction misuse (nested begin, commit without begin, ...).
    #[error("CS_ERR_203: Ledger transaction error: {reason}")]
    LedgerTransaction { reason: String },

    // =================================================================
    // Routing / Exchange Errors (3xx)
    // =================================================================
    /// The path plan is structurally invalid or does not match the swap.
    #[error("CS_ERR_300: Invalid path: {reason}")]
    InvalidPath { reason: String },

    /// An exact-output swap delivered a different amount than requested.
    #[error("CS_ERR_301: Output mismatch: requested {requested}, realized {realized}")]
    OutputMismatch { requested: Amount, realized: Amount },

    /// An exact-input swap delivered less than the configured floor.
    #[error("CS_ERR_302: Output below minimum: minimum {minimum}, realized {realized}")]
    OutputBelowMinimum { minimum: Amount, realized: Amount },

    /// The native value attached to the call cannot cover the quoted input.
    #[error("CS_ERR_303: Insufficient attached value: need {needed}, attached {attached}")]
    InsufficientAttachedValue { needed: Amount, attached: Amount },

    // =================================================================
    // Redemption / Retirement Errors (4xx)
    // =================================================================
    /// Parallel certificate/amount sequences are empty or of unequal length.
    #[error("CS_ERR_400: Arity mismatch: {certificates} certificates, {amounts} amounts")]
    ArityMismatch { certificates: usize, amounts: usize },

    /// Value in does not equal value out, or the ledger exceeds custody.
    #[error("CS_ERR_401: Conservation violation: {reason}")]
    ConservationViolation { reason: String },

    // =================================================================
    // External Collaborator Errors (5xx)
    // =================================================================
    /// A router, custody, redemption or retirement call reported failure.
    #[error("CS_ERR_500: External call {call} failed: {reason}")]
    ExternalCallFailure { call: &'static str, reason: String },

    // =================================================================
    // General / Internal (9xx)
    // =================================================================
    /// Unrecoverable internal error.
    #[error("CS_ERR_900: Internal error: {0}")]
    Internal(String),

    /// Serialization / deserialization error.
    #[error("CS_ERR_901: Serialization error: {0}")]
    Serialization(String),

    /// Configuration error (invalid config file, missing fields, etc.).
    #[error("CS_ERR_902: Configuration error: {0}")]
    Configuration(String),
}

impl SettleError {
    /// Shorthand for [`SettleError::ExternalCallFailure`].
    pub fn external(call: &'static str, reason: impl Into<String>) -> Self {
        Self::ExternalCallFailure {
            call,
            reason: reason.into(),
        }
    }
}

/// Crate-wide `Result` alias.
pub type Result<T> = std::result::Result<T, SettleError>;

impl From<serde_json::Error> for SettleError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
