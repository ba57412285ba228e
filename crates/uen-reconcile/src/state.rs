use serde::Serialize;
use std::collections::{BTreeSet, HashSet};
use uen_records::LocalRecordSet;

/// Identifiers on the ledger, in ledger order, with a membership index.
#[derive(Debug, Clone, Default)]
pub struct RemoteRecordSet {
    ordered: Vec<String>,
    index: HashSet<String>,
}

impl RemoteRecordSet {
    pub fn contains(&self, identifier: &str) -> bool {
        self.index.contains(identifier)
    }

    /// Entries as reported, duplicates included.
    pub fn len(&self) -> usize {
        self.ordered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ordered.is_empty()
    }

    pub fn distinct(&self) -> usize {
        self.index.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> + '_ {
        self.ordered.iter().map(String::as_str)
    }
}

impl From<Vec<String>> for RemoteRecordSet {
    fn from(ordered: Vec<String>) -> Self {
        let index = ordered.iter().cloned().collect();
        Self { ordered, index }
    }
}

/// One `add_records` call worth of records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Batch {
    pub identifiers: Vec<String>,
    pub names: Vec<String>,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.identifiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.identifiers.is_empty()
    }
}

/// The value threaded through the loop. Every transition consumes the
/// state and returns the next one.
#[derive(Debug, Clone)]
pub struct UploadState<'a> {
    limit: usize,
    local: &'a LocalRecordSet,
    remote: RemoteRecordSet,
    quarantined: BTreeSet<String>,
}

impl<'a> UploadState<'a> {
    pub fn new(local: &'a LocalRecordSet, remote: RemoteRecordSet, limit: usize) -> Self {
        Self {
            limit,
            local,
            remote,
            quarantined: BTreeSet::new(),
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Size actually used for selection. `limit` may halve down to zero;
    /// a zero-sized batch would never make progress, so selection clamps
    /// at one.
    pub fn effective_limit(&self) -> usize {
        self.limit.max(1)
    }

    pub fn local(&self) -> &'a LocalRecordSet {
        self.local
    }

    pub fn remote(&self) -> &RemoteRecordSet {
        &self.remote
    }

    pub fn quarantined(&self) -> &BTreeSet<String> {
        &self.quarantined
    }

    /// Local records not yet on the ledger and not quarantined, in local order.
    pub fn pending(&self) -> impl Iterator<Item = (&'a str, &'a str)> + '_ {
        self.local
            .iter()
            .filter(move |(id, _)| !self.remote.contains(id) && !self.quarantined.contains(*id))
    }

    pub fn pending_count(&self) -> usize {
        self.pending().count()
    }

    /// Every local identifier is on the ledger.
    pub fn is_fully_synced(&self) -> bool {
        self.local.identifiers().all(|id| self.remote.contains(id))
    }

    /// `None` once nothing is pending.
    pub fn next_batch(&self) -> Option<Batch> {
        let (identifiers, names): (Vec<String>, Vec<String>) = self
            .pending()
            .take(self.effective_limit())
            .map(|(id, name)| (id.to_string(), name.to_string()))
            .unzip();
        if identifiers.is_empty() {
            None
        } else {
            Some(Batch { identifiers, names })
        }
    }

    /// Confirmed batch: adopt the refreshed remote set and ramp up by one.
    pub fn after_success(self, remote: RemoteRecordSet) -> Self {
        Self {
            limit: self.limit.saturating_add(1),
            remote,
            ..self
        }
    }

    /// Failed batch: halve the limit (floor, down to zero).
    pub fn after_failure(self) -> Self {
        Self {
            limit: self.limit / 2,
            ..self
        }
    }

    pub fn with_remote(self, remote: RemoteRecordSet) -> Self {
        Self { remote, ..self }
    }

    pub fn quarantine(mut self, identifier: &str) -> Self {
        self.quarantined.insert(identifier.to_string());
        self
    }
}
