//! Anchor blocks
//!
//! A block groups a contiguous run of ledger events under one Merkle root
//! and chains to the previous block by hash. Blocks are what an external
//! anchoring service publishes; the ledger only computes and keeps them.

use crate::crypto::{self, KeyPair};
use crate::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Sealed run of events
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnchorBlock {
    /// Block height (sequential, genesis = 0)
    pub height: u64,

    /// First event sequence covered
    pub first_sequence: u64,

    /// Last event sequence covered
    pub last_sequence: u64,

    /// Merkle root of all covered events
    pub merkle_root: [u8; 32],

    /// Hash of previous block (zero for genesis)
    pub previous_hash: [u8; 32],

    /// Hash of this block's header
    pub block_hash: [u8; 32],

    /// Seal timestamp
    pub sealed_at: DateTime<Utc>,

    /// Ed25519 signature over `block_hash`
    #[serde(with = "serde_bytes", default)]
    pub signature: Option<Vec<u8>>,
}

impl AnchorBlock {
    pub(crate) fn seal(
        height: u64,
        previous_hash: [u8; 32],
        first_sequence: u64,
        last_sequence: u64,
        merkle_root: [u8; 32],
        sealed_at: DateTime<Utc>,
        signer: Option<&KeyPair>,
    ) -> Self {
        let mut block = Self {
            height,
            first_sequence,
            last_sequence,
            merkle_root,
            previous_hash,
            block_hash: [0u8; 32],
            sealed_at,
            signature: None,
        };
        block.block_hash = block.compute_hash();
        block.signature = signer.map(|key| key.sign(&block.block_hash).to_vec());
        block
    }

    /// Number of events covered
    pub fn event_count(&self) -> u64 {
        self.last_sequence - self.first_sequence + 1
    }

    /// Compute block hash
    pub fn compute_hash(&self) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(self.height.to_be_bytes());
        hasher.update(self.first_sequence.to_be_bytes());
        hasher.update(self.last_sequence.to_be_bytes());
        hasher.update(self.merkle_root);
        hasher.update(self.previous_hash);
        hasher.update(self.sealed_at.timestamp_nanos_opt().unwrap_or(0).to_be_bytes());

        hasher.finalize().into()
    }

    /// Check the signature against a public key
    pub fn verify_signature(&self, public_key: &[u8; 32]) -> Result<()> {
        let signature = self
            .signature
            .as_deref()
            .ok_or_else(|| crate::Error::Signature("block is unsigned".to_string()))?;
        crypto::verify_signature(&self.block_hash, signature, public_key)
    }

    /// Hex of the Merkle root, as published
    pub fn merkle_root_hex(&self) -> String {
        crypto::to_hex(&self.merkle_root)
    }
}
