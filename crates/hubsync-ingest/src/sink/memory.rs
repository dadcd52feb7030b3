use super::{RecordSink, UpsertOutcome};
use crate::error::SinkError;
use crate::models::Record;
use async_trait::async_trait;
use std::collections::btree_map::{BTreeMap, Entry};

/// Keeps records in memory, keyed by `(namespace, name)`
///
/// Backs `--dry-run` and the end-to-end tests.
#[derive(Debug, Default)]
pub struct MemorySink {
    records: BTreeMap<(String, String), Record>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, namespace: &str, name: &str) -> Option<&Record> {
        self.records.get(&(namespace.to_string(), name.to_string()))
    }

    /// Stored records ordered by namespace, then name
    pub fn records(&self) -> impl Iterator<Item = &Record> {
        self.records.values()
    }
}

#[async_trait]
impl RecordSink for MemorySink {
    fn name(&self) -> &str {
        "memory"
    }

    async fn upsert(&mut self, record: &Record) -> Result<UpsertOutcome, SinkError> {
        match self
            .records
            .entry((record.namespace.clone(), record.name.clone()))
        {
            Entry::Occupied(_) => Ok(UpsertOutcome::AlreadyPresent),
            Entry::Vacant(slot) => {
                slot.insert(record.clone());
                Ok(UpsertOutcome::Inserted)
            },
        }
    }
}
