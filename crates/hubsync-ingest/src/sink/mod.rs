//! Idempotent persistence of normalized records
//!
//! A sink writes each [`Record`] at most once per natural key `(name, namespace)`. Writing a key
//! that is already present is not an error: the first write wins and later ones report
//! [`UpsertOutcome::AlreadyPresent`].

mod memory;
mod postgres;

pub use memory::MemorySink;
pub use postgres::{PgSink, MIGRATOR};

use crate::error::SinkError;
use crate::models::Record;
use async_trait::async_trait;

/// What a single upsert did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    /// The natural key was already stored; nothing changed
    AlreadyPresent,
}

#[async_trait]
pub trait RecordSink: Send {
    /// Sink name used in logs
    fn name(&self) -> &str;

    /// Insert `record` unless its natural key is already stored
    async fn upsert(&mut self, record: &Record) -> Result<UpsertOutcome, SinkError>;
}
