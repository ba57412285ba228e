//! The reconciliation loop.

use crate::{Batch, ReconcileError, RemoteRecordSet, RetryPolicy, UploadState};
use serde::Serialize;
use std::time::{Duration, Instant};
use uen_ledger::rpc::sleep_with_cancel;
use uen_ledger::{CancelFlag, LedgerError, RecordLedger, TxHash};
use uen_records::LocalRecordSet;

// ============================================================================
// Events
// ============================================================================

/// Progress notifications, emitted in order.
#[derive(Debug, Clone)]
pub enum ReconcileEvent {
    RemoteLoaded {
        remote_total: usize,
        local_total: usize,
        pending: usize,
    },
    BatchCommitted {
        size: usize,
        tx_hash: TxHash,
        remote_total: usize,
        local_total: usize,
        next_limit: usize,
    },
    BatchFailed {
        size: usize,
        error: String,
        next_limit: usize,
    },
    Quarantined {
        identifier: String,
        failures: usize,
    },
    RemoteReadFailed {
        attempt: usize,
        error: String,
    },
    Synced {
        remote_total: usize,
        local_total: usize,
    },
    Cancelled,
}

pub type ReconcileEventHandler = Box<dyn Fn(&ReconcileEvent)>;

// ============================================================================
// Report
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// Nothing left to submit.
    Synced,
    /// Interrupted by the user; treated as a clean stop.
    Cancelled,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReconcileReport {
    pub outcome: Outcome,
    pub batches_committed: usize,
    pub records_committed: usize,
    pub failed_attempts: usize,
    pub final_limit: usize,
    pub local_total: usize,
    pub remote_total: usize,
    /// Identifiers given up on; empty means every local record is on the ledger.
    pub quarantined: Vec<String>,
    #[serde(skip)]
    pub elapsed: Duration,
}

// ============================================================================
// Reconciler
// ============================================================================

pub struct Reconciler<L> {
    ledger: L,
    policy: RetryPolicy,
    cancel: CancelFlag,
    handlers: Vec<ReconcileEventHandler>,
}

/// Consecutive failures of the same single-identifier batch.
struct SingleStreak {
    identifier: String,
    failures: usize,
}

impl<L: RecordLedger> Reconciler<L> {
    pub fn new(ledger: L, policy: RetryPolicy, cancel: CancelFlag) -> Self {
        Self {
            ledger,
            policy,
            cancel,
            handlers: Vec::new(),
        }
    }

    pub fn on_event(&mut self, handler: ReconcileEventHandler) {
        self.handlers.push(handler);
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    fn emit(&self, event: ReconcileEvent) {
        for handler in &self.handlers {
            handler(&event);
        }
    }

    /// Read the remote set, retrying transient failures with a fixed delay.
    /// Never touches the batch limit. `None` when `cancel` is raised while
    /// waiting to retry.
    pub fn read_remote(&self) -> Result<Option<RemoteRecordSet>, ReconcileError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.ledger.list_all_identifiers() {
                Ok(ids) => {
                    tracing::debug!(count = ids.len(), "remote identifiers loaded");
                    return Ok(Some(RemoteRecordSet::from(ids)));
                }
                Err(source) if attempt >= self.policy.max_remote_read_failures.max(1) => {
                    return Err(ReconcileError::RemoteRead {
                        attempts: attempt,
                        source,
                    });
                }
                Err(err) => {
                    tracing::warn!(attempt, error = %err, "remote read failed, retrying");
                    self.emit(ReconcileEvent::RemoteReadFailed {
                        attempt,
                        error: err.to_string(),
                    });
                    if sleep_with_cancel(self.policy.remote_read_delay, &self.cancel).is_err() {
                        return Ok(None);
                    }
                }
            }
        }
    }

    fn out_of_time(&self, started: Instant) -> bool {
        self.policy
            .max_duration
            .is_some_and(|max| started.elapsed() >= max)
    }

    /// Drive `local` onto the ledger, starting at batch size `initial_limit`.
    pub fn run(
        &self,
        local: &LocalRecordSet,
        initial_limit: usize,
    ) -> Result<ReconcileReport, ReconcileError> {
        let started = Instant::now();
        let mut report = ReconcileReport {
            outcome: Outcome::Synced,
            batches_committed: 0,
            records_committed: 0,
            failed_attempts: 0,
            final_limit: initial_limit,
            local_total: local.len(),
            remote_total: 0,
            quarantined: Vec::new(),
            elapsed: Duration::ZERO,
        };
        let Some(remote) = self.read_remote()? else {
            let state = UploadState::new(local, RemoteRecordSet::default(), initial_limit);
            return Ok(self.cancelled(report, &state, started));
        };
        let mut state = UploadState::new(local, remote, initial_limit);
        report.remote_total = state.remote().len();
        self.emit(ReconcileEvent::RemoteLoaded {
            remote_total: state.remote().len(),
            local_total: local.len(),
            pending: state.pending_count(),
        });

        let mut consecutive_failures = 0usize;
        let mut last_error: Option<String> = None;
        let mut streak: Option<SingleStreak> = None;

        loop {
            let Some(batch) = state.next_batch() else {
                tracing::info!(
                    remote = state.remote().len(),
                    local = local.len(),
                    quarantined = state.quarantined().len(),
                    "local records fully represented on-chain"
                );
                self.emit(ReconcileEvent::Synced {
                    remote_total: state.remote().len(),
                    local_total: local.len(),
                });
                return Ok(finish(report, &state, Outcome::Synced, started));
            };

            if self.cancel.is_cancelled() {
                return Ok(self.cancelled(report, &state, started));
            }
            if self.out_of_time(started) {
                return Err(ReconcileError::CircuitOpen {
                    consecutive_failures,
                    elapsed: started.elapsed(),
                    last_error: last_error.unwrap_or_else(|| "run time budget exhausted".to_string()),
                });
            }

            tracing::debug!(size = batch.len(), limit = state.limit(), "submitting batch");
            let (error, refresh) = match self
                .ledger
                .add_records(&batch.identifiers, &batch.names, &self.cancel)
            {
                Ok(receipt) => {
                    let Some(remote) = self.read_remote()? else {
                        return Ok(self.cancelled(report, &state, started));
                    };
                    if !batch.identifiers.iter().any(|id| remote.contains(id)) {
                        // Confirmed but nothing landed: the contract dropped
                        // the records or the node serves stale state.
                        state = state.with_remote(remote);
                        tracing::warn!(
                            size = batch.len(),
                            tx = %receipt.tx_hash,
                            "batch confirmed but none of its identifiers are on the ledger"
                        );
                        (
                            format!(
                                "transaction {} confirmed but none of its {} identifiers reached the ledger",
                                receipt.tx_hash,
                                batch.len()
                            ),
                            false,
                        )
                    } else {
                        state = state.after_success(remote);
                        consecutive_failures = 0;
                        streak = None;
                        report.batches_committed += 1;
                        report.records_committed += batch.len();
                        tracing::info!(
                            added = batch.len(),
                            tx = %receipt.tx_hash,
                            remote = state.remote().len(),
                            local = local.len(),
                            limit = state.limit(),
                            "batch committed"
                        );
                        self.emit(ReconcileEvent::BatchCommitted {
                            size: batch.len(),
                            tx_hash: receipt.tx_hash,
                            remote_total: state.remote().len(),
                            local_total: local.len(),
                            next_limit: state.limit(),
                        });
                        continue;
                    }
                }
                Err(err) if err.is_cancelled() => {
                    return Ok(self.cancelled(report, &state, started));
                }
                Err(err) => (err.to_string(), refresh_after(&err)),
            };

            consecutive_failures += 1;
            report.failed_attempts += 1;
            state = state.after_failure();
            tracing::warn!(
                size = batch.len(),
                error = %error,
                next_limit = state.limit(),
                "batch failed, reducing limit"
            );
            self.emit(ReconcileEvent::BatchFailed {
                size: batch.len(),
                error: error.clone(),
                next_limit: state.limit(),
            });

            let quarantined = state.quarantined().len();
            state = self.track_single_failures(state, &batch, &mut streak);
            if state.quarantined().len() > quarantined {
                // the failures are accounted for by the quarantine
                consecutive_failures = 0;
            }

            if consecutive_failures >= self.policy.max_consecutive_failures.max(1)
                || self.out_of_time(started)
            {
                return Err(ReconcileError::CircuitOpen {
                    consecutive_failures,
                    elapsed: started.elapsed(),
                    last_error: error,
                });
            }
            last_error = Some(error);

            if refresh {
                // The transaction may still land; never select against a
                // stale remote set after that.
                let Some(remote) = self.read_remote()? else {
                    return Ok(self.cancelled(report, &state, started));
                };
                state = state.with_remote(remote);
            }
        }
    }

    fn track_single_failures<'a>(
        &self,
        state: UploadState<'a>,
        batch: &Batch,
        streak: &mut Option<SingleStreak>,
    ) -> UploadState<'a> {
        if batch.len() != 1 || self.policy.quarantine_after == 0 {
            *streak = None;
            return state;
        }
        let identifier = &batch.identifiers[0];
        let failures = match streak {
            Some(s) if s.identifier == *identifier => {
                s.failures += 1;
                s.failures
            }
            _ => {
                *streak = Some(SingleStreak {
                    identifier: identifier.clone(),
                    failures: 1,
                });
                1
            }
        };
        if failures < self.policy.quarantine_after {
            return state;
        }
        tracing::error!(identifier = %identifier, failures, "quarantining identifier");
        self.emit(ReconcileEvent::Quarantined {
            identifier: identifier.clone(),
            failures,
        });
        *streak = None;
        state.quarantine(identifier)
    }

    fn cancelled(
        &self,
        report: ReconcileReport,
        state: &UploadState<'_>,
        started: Instant,
    ) -> ReconcileReport {
        tracing::warn!("interrupt received, stopping upload");
        self.emit(ReconcileEvent::Cancelled);
        finish(report, state, Outcome::Cancelled, started)
    }
}

fn refresh_after(err: &LedgerError) -> bool {
    err.is_receipt_timeout()
}

fn finish(
    mut report: ReconcileReport,
    state: &UploadState<'_>,
    outcome: Outcome,
    started: Instant,
) -> ReconcileReport {
    report.outcome = outcome;
    report.final_limit = state.limit();
    report.remote_total = state.remote().len();
    report.quarantined = state.quarantined().iter().cloned().collect();
    report.elapsed = started.elapsed();
    report
}
