//! In-process ledger.
//!
//! Used for `--dry-run` uploads (seeded from a remote snapshot) and as the
//! scripted ledger in tests: failures, oversized batches, poisoned
//! identifiers and interrupts can all be injected.

use crate::{keccak256, CancelFlag, LedgerError, RecordLedger, TxHash, TxReceipt};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet, VecDeque};

enum Scripted {
    Fail(LedgerError),
    /// Apply the batch, then report the error (e.g. a receipt timeout on a
    /// transaction that was in fact mined).
    CommitThenFail(LedgerError),
}

#[derive(Default)]
struct State {
    order: Vec<String>,
    names: HashMap<String, String>,
    max_batch: Option<usize>,
    rejected: HashSet<String>,
    scripted: VecDeque<Scripted>,
    read_failures: VecDeque<LedgerError>,
    cancel_on_attempt: Option<usize>,
    attempts: Vec<Vec<String>>,
    block: u64,
}

#[derive(Default)]
pub struct MemoryLedger {
    state: Mutex<State>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records<I, K, V>(self, records: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        {
            let mut st = self.state.lock();
            for (id, name) in records {
                commit(&mut *st, id.into(), name.into());
            }
        }
        self
    }

    /// Reject batches larger than `max` the way an out-of-gas call would.
    pub fn with_max_batch(self, max: usize) -> Self {
        self.state.lock().max_batch = Some(max);
        self
    }

    /// Any batch containing `identifier` reverts.
    pub fn reject(self, identifier: impl Into<String>) -> Self {
        self.state.lock().rejected.insert(identifier.into());
        self
    }

    /// The attempt numbered `attempt` (1-based) raises `cancel` and aborts.
    pub fn cancel_on_attempt(self, attempt: usize) -> Self {
        self.state.lock().cancel_on_attempt = Some(attempt);
        self
    }

    pub fn fail_next_submission(&self, err: LedgerError) {
        self.state.lock().scripted.push_back(Scripted::Fail(err));
    }

    pub fn commit_then_fail_next(&self, err: LedgerError) {
        self.state.lock().scripted.push_back(Scripted::CommitThenFail(err));
    }

    pub fn fail_next_read(&self, err: LedgerError) {
        self.state.lock().read_failures.push_back(err);
    }

    /// Every batch passed to `add_records`, successful or not.
    pub fn attempts(&self) -> Vec<Vec<String>> {
        self.state.lock().attempts.clone()
    }

    pub fn stored_identifiers(&self) -> Vec<String> {
        self.state.lock().order.clone()
    }

    pub fn len(&self) -> usize {
        self.state.lock().order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn commit(st: &mut State, id: String, name: String) {
    if !st.names.contains_key(&id) {
        st.order.push(id.clone());
    }
    st.names.insert(id, name);
}

fn receipt(st: &mut State) -> TxReceipt {
    st.block += 1;
    TxReceipt {
        tx_hash: TxHash(keccak256(&st.block.to_be_bytes())),
        block_number: st.block,
        gas_used: 21_000,
        success: true,
    }
}

impl RecordLedger for MemoryLedger {
    fn list_all_identifiers(&self) -> Result<Vec<String>, LedgerError> {
        let mut st = self.state.lock();
        if let Some(err) = st.read_failures.pop_front() {
            return Err(err);
        }
        Ok(st.order.clone())
    }

    fn get_display_name(&self, identifier: &str) -> Result<String, LedgerError> {
        Ok(self
            .state
            .lock()
            .names
            .get(identifier)
            .cloned()
            .unwrap_or_default())
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
        let mut st = self.state.lock();
        st.attempts.push(identifiers.to_vec());
        if st.cancel_on_attempt == Some(st.attempts.len()) {
            cancel.cancel();
        }
        cancel.check()?;

        let apply = |st: &mut State| {
            for (id, name) in identifiers.iter().zip(names) {
                commit(st, id.clone(), name.clone());
            }
        };
        match st.scripted.pop_front() {
            Some(Scripted::Fail(err)) => return Err(err),
            Some(Scripted::CommitThenFail(err)) => {
                apply(&mut *st);
                return Err(err);
            }
            None => {}
        }
        if st.max_batch.is_some_and(|max| identifiers.len() > max) {
            return Err(LedgerError::Rpc {
                code: -32000,
                message: "gas required exceeds allowance".to_string(),
            });
        }
        if let Some(bad) = identifiers.iter().find(|id| st.rejected.contains(*id)) {
            return Err(LedgerError::Rpc {
                code: 3,
                message: format!("execution reverted: invalid uen {bad}"),
            });
        }
        apply(&mut *st);
        Ok(receipt(&mut *st))
    }
}
