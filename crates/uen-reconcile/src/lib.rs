//! Upload reconciliation: drive a local record set into the ledger.
//!
//! ```text
//! local ──► pending = local − remote − quarantined ──► empty? ──► Synced
//!                 ▲                                        │
//!                 │                                        ▼
//!                 │                      batch = first max(limit,1) pending
//!                 │                                        │
//!                 │               ┌──────── add_records ───┴───────────┐
//!                 │               ▼                                    ▼
//!                 │        ok: refresh remote                 err: limit /= 2
//!                 │            limit += 1                     (timeout: refresh remote)
//!                 │        (nothing landed: err)
//!                 └───────────────┴────────────────────────────────────┘
//! ```
//!
//! Batches are strictly sequential; each is selected against the remote set
//! observed after the previous confirmation, so an identifier already on the
//! ledger is never resubmitted. The loop is bounded by [`RetryPolicy`].

mod engine;
mod policy;
mod state;

pub use engine::{Outcome, ReconcileEvent, ReconcileEventHandler, ReconcileReport, Reconciler};
pub use policy::RetryPolicy;
pub use state::{Batch, RemoteRecordSet, UploadState};

use std::time::Duration;
use uen_ledger::LedgerError;

#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    #[error("reading remote state failed {attempts} times in a row: {source}")]
    RemoteRead {
        attempts: usize,
        #[source]
        source: LedgerError,
    },
    #[error(
        "circuit breaker opened after {consecutive_failures} consecutive failures in {elapsed:?} (last error: {last_error})"
    )]
    CircuitOpen {
        consecutive_failures: usize,
        elapsed: Duration,
        last_error: String,
    },
}
