//! Typed binding for the deployed UEN registry contract.

use crate::abi::{self, AbiDescriptor};
use crate::rpc::JsonRpcClient;
use crate::signer::LocalSigner;
use crate::tx::{Eip1559Request, GasConfig};
use crate::{Address, CancelFlag, LedgerError, RecordLedger, TxReceipt};

pub use crate::rpc::ReceiptWait;

pub struct UenRegistry {
    rpc: JsonRpcClient,
    contract: Address,
    chain_id: u64,
    signer: Option<LocalSigner>,
    gas: GasConfig,
    receipt_wait: ReceiptWait,
}

impl UenRegistry {
    /// Connect and verify the interface. Fails on an unreachable endpoint or
    /// an ABI without the registry functions, before anything is sent.
    pub fn connect(
        rpc: JsonRpcClient,
        contract: Address,
        abi: &AbiDescriptor,
    ) -> Result<Self, LedgerError> {
        abi.require_registry()?;
        let chain_id = rpc.chain_id()?;
        tracing::info!(chain_id, rpc = %rpc.url(), contract = %contract, "connected to EVM network");
        Ok(Self {
            rpc,
            contract,
            chain_id,
            signer: None,
            gas: GasConfig::default(),
            receipt_wait: ReceiptWait::default(),
        })
    }

    pub fn with_signer(mut self, signer: LocalSigner) -> Self {
        self.signer = Some(signer);
        self
    }

    pub fn with_gas(mut self, gas: GasConfig) -> Self {
        self.gas = gas;
        self
    }

    pub fn with_receipt_wait(mut self, wait: ReceiptWait) -> Self {
        self.receipt_wait = wait;
        self
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    pub fn contract(&self) -> Address {
        self.contract
    }

    pub fn signer_address(&self) -> Option<Address> {
        self.signer.as_ref().map(LocalSigner::address)
    }
}

impl RecordLedger for UenRegistry {
    fn list_all_identifiers(&self) -> Result<Vec<String>, LedgerError> {
        let data = self.rpc.call(self.contract, &abi::encode_list_identifiers())?;
        abi::decode_string_array(&data)
    }

    fn get_display_name(&self, identifier: &str) -> Result<String, LedgerError> {
        let data = self.rpc.call(self.contract, &abi::encode_get_name(identifier))?;
        abi::decode_string(&data)
    }

    fn add_records(
        &self,
        identifiers: &[String],
        names: &[String],
        cancel: &CancelFlag,
    ) -> Result<TxReceipt, LedgerError> {
        if identifiers.len() != names.len() {
            return Err(LedgerError::InvalidBatch {
                identifiers: identifiers.len(),
                names: names.len(),
            });
        }
        let signer = self.signer.as_ref().ok_or(LedgerError::MissingSigner)?;
        cancel.check()?;

        let data = abi::encode_add_records(identifiers, names);
        let from = signer.address();
        let nonce = self.rpc.get_transaction_count(from)?;
        let gas_limit = match self.gas.gas_limit {
            Some(limit) => limit,
            None => self.rpc.estimate_gas(from, self.contract, &data, 0)?,
        };
        let request = Eip1559Request {
            chain_id: self.chain_id,
            nonce,
            max_priority_fee_per_gas: self.gas.max_priority_fee_per_gas,
            max_fee_per_gas: self.gas.max_fee_per_gas,
            gas_limit,
            to: self.contract,
            value: 0,
            data,
        };
        let signed = request.sign(signer)?;

        // Last point at which an interrupt leaves the ledger untouched.
        cancel.check()?;
        let tx_hash = self.rpc.send_raw_transaction(&signed)?;
        tracing::info!(tx = %tx_hash, nonce, count = identifiers.len(), "transaction sent");

        let receipt = match self.rpc.wait_for_receipt(tx_hash, &self.receipt_wait, cancel) {
            Err(LedgerError::Cancelled) => {
                tracing::warn!(tx = %tx_hash, "cancelled while waiting; transaction was already broadcast");
                return Err(LedgerError::Cancelled);
            }
            other => other?,
        };
        if !receipt.success {
            return Err(LedgerError::Reverted { tx_hash });
        }
        Ok(receipt)
    }
}
