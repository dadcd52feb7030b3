//! Hubsync Ingest Library
//!
//! Harvests repository listings from a paginated registry API into PostgreSQL.
//!
//! # Pipeline
//!
//! - **fetcher**: follows `next` cursors page by page, backing off on HTTP 429
//! - **transform**: normalizes each repository (size string, category slots, tier label)
//! - **sink**: writes records idempotently, first write per `(name, namespace)` wins
//! - **driver**: runs sources one at a time and applies the failure policy
//!
//! # Example
//!
//! ```no_run
//! use hubsync_ingest::driver::{FailurePolicy, Ingestor};
//! use hubsync_ingest::fetcher::{PageFetcher, ReqwestTransport, RetryPolicy};
//! use hubsync_ingest::sink::MemorySink;
//! use hubsync_ingest::sources::default_sources;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> anyhow::Result<()> {
//!     let fetcher = PageFetcher::new(ReqwestTransport::new(None)?, RetryPolicy::default());
//!     let base = url::Url::parse("https://hub.docker.com/v2/repositories/")?;
//!     let mut ingestor = Ingestor::new(fetcher, MemorySink::new(), base);
//!     ingestor.run(&default_sources()[..1], FailurePolicy::Abort).await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod driver;
pub mod error;
pub mod fetcher;
pub mod models;
pub mod sink;
pub mod sources;
pub mod transform;

pub use error::{FetchError, IngestError, SinkError};
