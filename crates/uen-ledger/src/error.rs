use crate::TxHash;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("http error {status}: {body}")]
    Http { status: u16, body: String },
    #[error("rpc error {code}: {message}")]
    Rpc { code: i64, message: String },
    #[error("invalid rpc response: {0}")]
    Decode(String),
    #[error("abi error: {0}")]
    Abi(String),
    #[error("failed to read abi descriptor {path}: {message}")]
    AbiDescriptor { path: PathBuf, message: String },
    #[error("invalid address: {0}")]
    InvalidAddress(String),
    #[error("invalid signing key: {0}")]
    InvalidKey(String),
    #[error("signing failed: {0}")]
    Signing(String),
    #[error("no signing key configured")]
    MissingSigner,
    #[error("batch has {identifiers} identifiers but {names} names")]
    InvalidBatch { identifiers: usize, names: usize },
    #[error("transaction {tx_hash} reverted")]
    Reverted { tx_hash: TxHash },
    #[error("no receipt for {tx_hash} after {waited:?}")]
    ReceiptTimeout { tx_hash: TxHash, waited: Duration },
    #[error("cancelled")]
    Cancelled,
}

impl LedgerError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// The transaction was broadcast but its fate is unknown.
    pub fn is_receipt_timeout(&self) -> bool {
        matches!(self, Self::ReceiptTimeout { .. })
    }
}

impl From<reqwest::Error> for LedgerError {
    fn from(e: reqwest::Error) -> Self {
        Self::Transport(e.to_string())
    }
}
