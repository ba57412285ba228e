//! Ledger side of the UEN registry sync.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                        RecordLedger (trait)                      │
//! │   list_all_identifiers · get_display_name · add_records          │
//! ├───────────────────────────────┬──────────────────────────────────┤
//! │  UenRegistry (EVM contract)   │  MemoryLedger (in-process)       │
//! │   ├─ abi    call encoding     │   scripted failures, dry runs    │
//! │   ├─ tx     EIP-1559 + RLP    │                                  │
//! │   ├─ signer secp256k1         │                                  │
//! │   └─ rpc    JSON-RPC/HTTP     │                                  │
//! └───────────────────────────────┴──────────────────────────────────┘
//! ```
//!
//! Everything here is blocking: one call, one round trip. Receipt waits are
//! bounded and observe a [`CancelFlag`].

pub mod abi;
mod cancel;
mod error;
pub mod memory;
pub mod registry;
pub mod rlp;
pub mod rpc;
pub mod signer;
pub mod tx;
mod types;

pub use cancel::CancelFlag;
pub use error::LedgerError;
pub use memory::MemoryLedger;
pub use registry::{ReceiptWait, UenRegistry};
pub use rpc::JsonRpcClient;
pub use signer::LocalSigner;
pub use tx::GasConfig;
pub use types::{keccak256, Address, TxHash, TxReceipt};

/// The operations the reconciliation loop needs from a ledger.
///
/// `add_records` is the only state-changing call. It returns once the
/// transaction is confirmed, or fails; a failed call may still have been
/// broadcast (see [`LedgerError::ReceiptTimeout`]).
pub trait RecordLedger {
    /// Every identifier currently stored, in ledger order.
    fn list_all_identifiers(&self) -> Result<Vec<String>, LedgerError>;

    fn get_display_name(&self, identifier: &str) -> Result<String, LedgerError>;

    /// Store `identifiers[i] → names[i]` in one transaction.
    fn add_records(
        &self,
        identifiers: &[String],
        names: &[String],
        cancel: &CancelFlag,
    ) -> Result<TxReceipt, LedgerError>;
}

impl<L: RecordLedger + ?Sized> RecordLedger for &L {
    fn list_all_identifiers(&self) -> Result<Vec<String>, LedgerError> {
        (**self).list_all_identifiers()
    }

    fn get_display_name(&self, identifier: &str) -> Result<String, LedgerError> {
        (**self).get_display_name(identifier)
    }

    fn add_records(
        &self,
        identifiers: &[String],
        names: &[String],
        cancel: &CancelFlag,
    ) -> Result<TxReceipt, LedgerError> {
        (**self).add_records(identifiers, names, cancel)
    }
}
