//! Identifiers used throughout carbonsettle.
//!
//! Owners and tokens are 20-byte address-like identifiers rendered as
//! `0x`-prefixed lowercase hex. Both serialize as that hex string so they
//! can be written by hand in configuration files. Receipts use UUIDv7 for
//! time-ordered sorting.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::SettleError;

/// Length in bytes of an address-like identifier.
pub const ADDRESS_LEN: usize = 20;

fn parse_address(s: &str) -> Result<[u8; ADDRESS_LEN], SettleError> {
    let digits = s.strip_prefix("0x").unwrap_or(s);
    let bytes = hex::decode(digits)
        .map_err(|e| SettleError::Serialization(format!("invalid address {s:?}: {e}")))?;
    bytes.try_into().map_err(|raw: Vec<u8>| {
        SettleError::Serialization(format!(
            "invalid address {s:?}: expected {ADDRESS_LEN} bytes, got {}",
            raw.len()
        ))
    })
}

fn derive_address(domain: &[u8], label: &str) -> [u8; ADDRESS_LEN] {
    let mut hasher = Sha256::new();
    hasher.update(domain);
    hasher.update(label.as_bytes());
    let hash = hasher.finalize();
    let mut bytes = [0u8; ADDRESS_LEN];
    bytes.copy_from_slice(&hash[..ADDRESS_LEN]);
    bytes
}

// ---------------------------------------------------------------------------
// AccountId
// ---------------------------------------------------------------------------

/// Identity of a principal: a ledger owner, the admin, the custodian, or
/// an external contract such as the router.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AccountId(pub [u8; ADDRESS_LEN]);

impl AccountId {
    /// The all-zero account.
    pub const ZERO: Self = Self([0u8; ADDRESS_LEN]);

    #[must_use]
    pub fn from_bytes(bytes: [u8; ADDRESS_LEN]) -> Self {
        Self(bytes)
    }

    /// Deterministic account derived from a human-readable label.
    ///
    /// Every call with the same label yields the same account, which keeps
    /// fixtures and sample configs stable.
    #[must_use]
    pub fn from_label(label: &str) -> Self {
        Self(derive_address(b"carbonsettle:account:v1:", label))
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8; ADDRESS_LEN] {
        &self.0
    }

    /// First four bytes as hex, for compact log fields.
    #[must_use]
    pub fn short(&self) -> String {
        hex::encode(&self.0[..4])
    }

    #[cfg(any(test, feature = "test-helpers"))]
    #[must_use]
    pub fn random() -> Self {
        Self(rand::random())
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl FromStr for AccountId {
    type Err = SettleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_address(s).map(Self)
    }
}

impl TryFrom<String> for AccountId {
    type Error = SettleError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<AccountId> for String {
    fn from(id: AccountId) -> Self {
        id.to_string()
    }
}

// ---------------------------------------------------------------------------
// TokenId
// ---------------------------------------------------------------------------

/// Identity of a fungible token: a stablecoin, a wrapped native asset, a
/// pool certificate token, or an individual certificate token.
///
/// Symbols such as `"USDC"` are administrative aliases kept in the
/// eligibility registry; they are not part of the identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TokenId(pub [u8; ADDRESS_LEN]);

impl TokenId {
    #[must_use]
    pub fn from_bytes(bytes: [u8; ADDRESS_LEN]) -> Self {
        Self(bytes)
    }

    /// Deterministic token derived from a label (usually its symbol).
    #[must_use]
    pub fn from_label(label: &str) -> Self {
        Self(derive_address(b"carbonsettle:token:v1:", label))
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8; ADDRESS_LEN] {
        &self.0
    }

    #[must_use]
    pub fn short(&self) -> String {
        hex::encode(&self.0[..4])
    }

    #[cfg(any(test, feature = "test-helpers"))]
    #[must_use]
    pub fn random() -> Self {
        Self(rand::random())
    }
}

impl fmt::Display for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl FromStr for TokenId {
    type Err = SettleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_address(s).map(Self)
    }
}

impl TryFrom<String> for TokenId {
    type Error = SettleError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TokenId> for String {
    fn from(id: TokenId) -> Self {
        id.to_string()
    }
}

// ---------------------------------------------------------------------------
// ReceiptId
// ---------------------------------------------------------------------------

/// Unique identifier of a workflow receipt. Uses UUIDv7 for time-ordered sorting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct ReceiptId(pub Uuid);

impl ReceiptId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for ReceiptId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ReceiptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rcpt:{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
