//! EIP-1559 (type 2) transaction building and signing.

use crate::rlp;
use crate::signer::LocalSigner;
use crate::{keccak256, Address, LedgerError, TxHash};
use serde::{Deserialize, Serialize};

const EIP1559_TYPE: u8 = 0x02;

/// Fee settings passed through to every submitted transaction.
///
/// Defaults match the XRPL EVM sidechain deployment the registry was first
/// rolled out on. `gas_limit: None` asks the node via `eth_estimateGas`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GasConfig {
    pub gas_limit: Option<u64>,
    pub max_fee_per_gas: u128,
    pub max_priority_fee_per_gas: u128,
}

impl Default for GasConfig {
    fn default() -> Self {
        Self {
            gas_limit: Some(2_100_000_000),
            max_fee_per_gas: 10_000_000_000_000_000_000_000,
            max_priority_fee_per_gas: 100_000_000_000_000_000_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Eip1559Request {
    pub chain_id: u64,
    pub nonce: u64,
    pub max_priority_fee_per_gas: u128,
    pub max_fee_per_gas: u128,
    pub gas_limit: u64,
    pub to: Address,
    pub value: u128,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct SignedTransaction {
    pub raw: Vec<u8>,
    pub hash: TxHash,
}

impl SignedTransaction {
    pub fn raw_hex(&self) -> String {
        format!("0x{}", hex::encode(&self.raw))
    }
}

impl Eip1559Request {
    fn fields(&self) -> Vec<Vec<u8>> {
        vec![
            rlp::encode_uint(self.chain_id as u128),
            rlp::encode_uint(self.nonce as u128),
            rlp::encode_uint(self.max_priority_fee_per_gas),
            rlp::encode_uint(self.max_fee_per_gas),
            rlp::encode_uint(self.gas_limit as u128),
            rlp::encode_bytes(self.to.as_bytes()),
            rlp::encode_uint(self.value),
            rlp::encode_bytes(&self.data),
            // empty access list
            rlp::encode_list(&[]),
        ]
    }

    fn typed(payload: Vec<u8>) -> Vec<u8> {
        let mut out = Vec::with_capacity(1 + payload.len());
        out.push(EIP1559_TYPE);
        out.extend_from_slice(&payload);
        out
    }

    /// keccak256(0x02 || rlp([chain_id, ..., access_list]))
    pub fn signing_hash(&self) -> [u8; 32] {
        keccak256(&Self::typed(rlp::encode_list(&self.fields())))
    }

    pub fn sign(&self, signer: &LocalSigner) -> Result<SignedTransaction, LedgerError> {
        let sig = signer.sign_prehash(&self.signing_hash())?;
        let mut fields = self.fields();
        fields.push(rlp::encode_uint(sig.y_parity as u128));
        fields.push(rlp::encode_scalar(&sig.r));
        fields.push(rlp::encode_scalar(&sig.s));
        let raw = Self::typed(rlp::encode_list(&fields));
        let hash = TxHash(keccak256(&raw));
        Ok(SignedTransaction { raw, hash })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> Eip1559Request {
        Eip1559Request {
            chain_id: 1440002,
            nonce: 7,
            max_priority_fee_per_gas: 1_000_000_000,
            max_fee_per_gas: 50_000_000_000,
            gas_limit: 3_000_000,
            to: "0x228dfCFf73CcF0a65034aA55621122a5aaD49FE7".parse().unwrap(),
            value: 0,
            data: crate::abi::encode_list_identifiers(),
        }
    }

    #[test]
    fn signed_envelope_shape() {
        let signer =
            LocalSigner::from_hex("4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318")
                .unwrap();
        let tx = request().sign(&signer).unwrap();

        assert_eq!(tx.raw[0], EIP1559_TYPE);
        // list header follows the type byte
        assert!(tx.raw[1] >= 0xc0);
        assert_eq!(tx.hash, TxHash(keccak256(&tx.raw)));
        assert!(tx.raw_hex().starts_with("0x02"));
    }

    #[test]
    fn signing_hash_depends_on_nonce() {
        let a = request();
        let mut b = request();
        b.nonce += 1;
        assert_ne!(a.signing_hash(), b.signing_hash());
    }

    #[test]
    fn default_gas_config_fits() {
        let gas = GasConfig::default();
        assert!(gas.max_priority_fee_per_gas <= gas.max_fee_per_gas);
        assert_eq!(gas.gas_limit, Some(2_100_000_000));
    }
}
