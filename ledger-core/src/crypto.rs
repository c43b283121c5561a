//! Cryptographic operations for the ledger
//!
//! This module provides:
//! - SHA-256 digests for events, anchor blocks and content-addressed ids
//! - Merkle roots over event hashes
//! - Ed25519 key pairs for signing anchor blocks

use crate::{Error, Result};
use ed25519_dalek::{Signature as DalekSignature, Signer, SigningKey, Verifier, VerifyingKey};
use sha2::{Digest, Sha256};

/// Ed25519 key pair for signing
#[derive(Debug)]
pub struct KeyPair {
    signing_key: SigningKey,
    verifying_key: VerifyingKey,
}

impl KeyPair {
    /// Generate a new random key pair
    pub fn generate() -> Self {
        Self::from_seed(&rand::random::<[u8; 32]>())
    }

    /// Create from seed (32 bytes) - deterministic generation
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        let signing_key = SigningKey::from_bytes(seed);
        let verifying_key = signing_key.verifying_key();

        Self {
            signing_key,
            verifying_key,
        }
    }

    /// Get public key bytes
    pub fn public_key(&self) -> [u8; 32] {
        self.verifying_key.to_bytes()
    }

    /// Sign a message
    pub fn sign(&self, message: &[u8]) -> [u8; 64] {
        self.signing_key.sign(message).to_bytes()
    }
}

/// Verify a signature with a public key
pub fn verify_signature(message: &[u8], signature: &[u8], public_key: &[u8; 32]) -> Result<()> {
    let bytes: [u8; 64] = signature
        .try_into()
        .map_err(|_| Error::Signature(format!("expected 64 bytes, got {}", signature.len())))?;
    let verifying_key = VerifyingKey::from_bytes(public_key)
        .map_err(|e| Error::Signature(format!("Bad public key: {}", e)))?;

    verifying_key
        .verify(message, &DalekSignature::from_bytes(&bytes))
        .map_err(|e| Error::Signature(format!("Verification failed: {}", e)))
}

/// Hash an event using SHA-256 over its canonical bytes
pub fn hash_event(event: &crate::types::LedgerEvent) -> Result<[u8; 32]> {
    Ok(hash_bytes(&event.canonical_bytes()?))
}

/// Hash arbitrary bytes using SHA-256
pub fn hash_bytes(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Lowercase hex SHA-256 of a UTF-8 payload
pub fn sha256_hex(payload: &str) -> String {
    to_hex(&hash_bytes(payload.as_bytes()))
}

/// Lowercase hex rendering
pub fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Create a Merkle root from event hashes
///
/// If a level has odd length, its last hash is duplicated.
pub fn merkle_root(event_hashes: &[[u8; 32]]) -> [u8; 32] {
    if event_hashes.is_empty() {
        return [0u8; 32];
    }

    let mut current_level: Vec<[u8; 32]> = event_hashes.to_vec();

    while current_level.len() > 1 {
        current_level = current_level
            .chunks(2)
            .map(|pair| {
                let left = &pair[0];
                let right = pair.get(1).unwrap_or(left);

                let mut hasher = Sha256::new();
                hasher.update(left);
                hasher.update(right);
                hasher.finalize().into()
            })
            .collect();
    }

    current_level[0]
}
