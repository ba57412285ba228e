use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// One registered entity as it appears in the open-data dump.
///
/// Extra fields in the source objects (status, dates, ...) are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    #[serde(rename = "uen")]
    pub identifier: String,
    #[serde(rename = "entity_name")]
    pub display_name: String,
}

impl Record {
    pub fn new(identifier: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            display_name: display_name.into(),
        }
    }
}

/// Identifier → display name, in first-seen order.
///
/// Re-inserting an identifier replaces its name in place; the entry keeps the
/// position it was first inserted at. Batches are drawn in this order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocalRecordSet {
    entries: IndexMap<String, String>,
}

impl LocalRecordSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite. Returns the previous display name, if any.
    pub fn upsert(&mut self, record: Record) -> Option<String> {
        self.entries.insert(record.identifier, record.display_name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, identifier: &str) -> bool {
        self.entries.contains_key(identifier)
    }

    pub fn display_name(&self, identifier: &str) -> Option<&str> {
        self.entries.get(identifier).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn identifiers(&self) -> impl Iterator<Item = &str> + '_ {
        self.entries.keys().map(String::as_str)
    }
}

impl Extend<Record> for LocalRecordSet {
    fn extend<T: IntoIterator<Item = Record>>(&mut self, iter: T) {
        for record in iter {
            self.upsert(record);
        }
    }
}

impl FromIterator<Record> for LocalRecordSet {
    fn from_iter<T: IntoIterator<Item = Record>>(iter: T) -> Self {
        let mut set = Self::new();
        set.extend(iter);
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upsert_keeps_first_position_and_last_name() {
        let mut set = LocalRecordSet::new();
        set.upsert(Record::new("53123456A", "Acme Pte Ltd"));
        set.upsert(Record::new("201912345K", "Beta LLP"));
        let prev = set.upsert(Record::new("53123456A", "Acme Holdings Pte Ltd"));

        assert_eq!(prev.as_deref(), Some("Acme Pte Ltd"));
        assert_eq!(set.len(), 2);
        assert_eq!(
            set.identifiers().collect::<Vec<_>>(),
            vec!["53123456A", "201912345K"]
        );
        assert_eq!(set.display_name("53123456A"), Some("Acme Holdings Pte Ltd"));
    }

    #[test]
    fn record_ignores_extra_fields() {
        let raw = r#"{"uen":"T08LL1234A","entity_name":"Gamma LLP","entity_status_description":"Live"}"#;
        let record: Record = serde_json::from_str(raw).unwrap();
        assert_eq!(record, Record::new("T08LL1234A", "Gamma LLP"));
    }
}
