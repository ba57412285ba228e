//! secp256k1 key held in process memory.
//!
//! The key is read from the environment by the caller; it is never logged
//! and `Debug` only shows the derived address.

use crate::{keccak256, Address, LedgerError};
use k256::ecdsa::{SigningKey, VerifyingKey};
use k256::elliptic_curve::sec1::ToEncodedPoint;
use std::fmt;

/// A recoverable signature split the way EIP-1559 transactions carry it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecoverableSignature {
    pub y_parity: u8,
    pub r: [u8; 32],
    pub s: [u8; 32],
}

pub struct LocalSigner {
    key: SigningKey,
    address: Address,
}

impl LocalSigner {
    /// Parse a 32-byte hex private key (`0x` prefix optional).
    pub fn from_hex(key_hex: &str) -> Result<Self, LedgerError> {
        let trimmed = key_hex.trim();
        let body = trimmed.strip_prefix("0x").unwrap_or(trimmed);
        let bytes = hex::decode(body).map_err(|e| LedgerError::InvalidKey(e.to_string()))?;
        if bytes.len() != 32 {
            return Err(LedgerError::InvalidKey(format!(
                "expected 32 bytes, got {}",
                bytes.len()
            )));
        }
        let key = SigningKey::from_slice(&bytes).map_err(|e| LedgerError::InvalidKey(e.to_string()))?;
        let address = address_of(key.verifying_key());
        Ok(Self { key, address })
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn sign_prehash(&self, hash: &[u8; 32]) -> Result<RecoverableSignature, LedgerError> {
        let (sig, recid) = self
            .key
            .sign_prehash_recoverable(hash)
            .map_err(|e| LedgerError::Signing(e.to_string()))?;
        let bytes = sig.to_bytes();
        let mut r = [0u8; 32];
        let mut s = [0u8; 32];
        r.copy_from_slice(&bytes[..32]);
        s.copy_from_slice(&bytes[32..]);
        Ok(RecoverableSignature {
            y_parity: recid.to_byte(),
            r,
            s,
        })
    }
}

impl fmt::Debug for LocalSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalSigner")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

/// Ethereum address of a public key: last 20 bytes of keccak(X || Y).
pub fn address_of(key: &VerifyingKey) -> Address {
    let point = key.to_encoded_point(false);
    let hash = keccak256(&point.as_bytes()[1..]);
    let mut out = [0u8; 20];
    out.copy_from_slice(&hash[12..]);
    Address(out)
}
