//! Workflow receipts.
//!
//! Every completed offset workflow returns an [`OffsetReceipt`] naming the
//! certificates that were retired on the owner's behalf. The receipt
//! carries a SHA-256 digest of its settlement content so it can be checked
//! independently of how it was transported.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::{AccountId, Amount, PathPlan, ReceiptId, RetirementBatch, TokenId};

/// Which of the five offset pipelines produced a receipt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Workflow {
    /// Pool certificate tokens deposited directly.
    PoolTokenIn,
    /// Native currency in, fixed pool-token output.
    NativeExactOut,
    /// Native currency in, all attached value swapped.
    NativeExactIn,
    /// Swappable token in, fixed pool-token output.
    TokenExactOut,
    /// Swappable token in, fixed input amount.
    TokenExactIn,
}

impl fmt::Display for Workflow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PoolTokenIn => write!(f, "POOL_TOKEN_IN"),
            Self::NativeExactOut => write!(f, "NATIVE_EXACT_OUT"),
            Self::NativeExactIn => write!(f, "NATIVE_EXACT_IN"),
            Self::TokenExactOut => write!(f, "TOKEN_EXACT_OUT"),
            Self::TokenExactIn => write!(f, "TOKEN_EXACT_IN"),
        }
    }
}

/// Result of one offset workflow invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OffsetReceipt {
    pub id: ReceiptId,
    pub workflow: Workflow,
    /// Ledger owner the certificates were retired for.
    pub owner: AccountId,
    /// Pool certificate token that was redeemed.
    pub pool: TokenId,
    /// Realized exchange path, when a swap ran.
    pub path: Option<PathPlan>,
    /// Source amount actually spent (native or token units).
    pub input_spent: Amount,
    /// Pool tokens redeemed.
    pub pool_amount: Amount,
    /// Certificates and amounts retired, in redemption order.
    pub retired: RetirementBatch,
    pub completed_at: DateTime<Utc>,
    /// SHA-256 over the settlement content (everything except id and time).
    pub digest: [u8; 32],
}

impl OffsetReceipt {
    #[must_use]
    pub fn new(
        workflow: Workflow,
        owner: AccountId,
        pool: TokenId,
        path: Option<PathPlan>,
        input_spent: Amount,
        pool_amount: Amount,
        retired: RetirementBatch,
    ) -> Self {
        let digest = Self::compute_digest(
            workflow,
            owner,
            pool,
            path.as_ref(),
            input_spent,
            pool_amount,
            &retired,
        );
        Self {
            id: ReceiptId::new(),
            workflow,
            owner,
            pool,
            path,
            input_spent,
            pool_amount,
            retired,
            completed_at: Utc::now(),
            digest,
        }
    }

    fn compute_digest(
        workflow: Workflow,
        owner: AccountId,
        pool: TokenId,
        path: Option<&PathPlan>,
        input_spent: Amount,
        pool_amount: Amount,
        retired: &RetirementBatch,
    ) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(b"carbonsettle:receipt:v1:");
        hasher.update(workflow.to_string().as_bytes());
        hasher.update(owner.as_bytes());
        hasher.update(pool.as_bytes());
        if let Some(path) = path {
            for hop in path.hops() {
                hasher.update(hop.as_bytes());
            }
        }
        hasher.update(input_spent.to_le_bytes());
        hasher.update(pool_amount.to_le_bytes());
        for (certificate, amount) in retired.iter() {
            hasher.update(certificate.as_bytes());
            hasher.update(amount.to_le_bytes());
        }
        hasher.finalize().into()
    }

    /// Recompute the digest and compare with the stored one.
    #[must_use]
    pub fn verify_digest(&self) -> bool {
        Self::compute_digest(
            self.workflow,
            self.owner,
            self.pool,
            self.path.as_ref(),
            self.input_spent,
            self.pool_amount,
            &self.retired,
        ) == self.digest
    }

    #[must_use]
    pub fn digest_hex(&self) -> String {
        hex::encode(self.digest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> OffsetReceipt {
        OffsetReceipt::new(
            Workflow::TokenExactOut,
            AccountId::from_label("alice"),
            TokenId::from_label("BCT"),
            Some(
                PathPlan::direct(TokenId::from_label("USDC"), TokenId::from_label("BCT")).unwrap(),
            ),
            250,
            100,
            RetirementBatch::new(
                vec![TokenId::from_label("TCO2-A"), TokenId::from_label("TCO2-B")],
                vec![60, 40],
            ),
        )
    }

    #[test]
    fn digest_verifies_and_detects_tampering() {
        let mut receipt = sample();
        assert!(receipt.verify_digest());
        assert_eq!(receipt.digest_hex().len(), 64);

        receipt.retired.amounts[0] = 61;
        assert!(!receipt.verify_digest());
    }

    #[test]
    fn digest_ignores_id_and_time() {
        let a = sample();
        let b = sample();
        assert_ne!(a.id, b.id);
        assert_eq!(a.digest, b.digest);
    }

    #[test]
    fn serde_roundtrip() {
        let receipt = sample();
        let json = serde_json::to_string(&receipt).unwrap();
        let back: OffsetReceipt = serde_json::from_str(&json).unwrap();
        assert_eq!(receipt, back);
        assert!(back.verify_digest());
    }

    #[test]
    fn workflow_display() {
        assert_eq!(Workflow::PoolTokenIn.to_string(), "POOL_TOKEN_IN");
        assert_eq!(Workflow::NativeExactIn.to_string(), "NATIVE_EXACT_IN");
    }
}
