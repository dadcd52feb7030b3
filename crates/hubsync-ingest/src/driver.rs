//! Drives each source through the fetcher, the transform and the sink
//!
//! Sources are handled one after another, pages one after another, records one after another.
//! A record that cannot be written is logged and skipped. A page that cannot be fetched ends
//! its source; what happens to the remaining sources is decided by [`FailurePolicy`].

use crate::error::IngestError;
use crate::fetcher::{PageFetcher, Sleeper, TokioSleeper, Transport};
use crate::sink::{RecordSink, UpsertOutcome};
use crate::sources::{Source, Tier};
use crate::transform::normalize;
use futures::TryStreamExt;
use serde::Serialize;
use tracing::{debug, error, info, warn};
use url::Url;

/// What to do with the remaining sources once one fails to fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Stop the run at the first failed source
    #[default]
    Abort,
    /// Record the failure and move on to the next source
    Continue,
}

/// Counters for one source
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceReport {
    pub namespace: String,
    pub tier: Tier,
    pub pages: usize,
    pub inserted: usize,
    pub already_present: usize,
    pub failed: usize,
}

impl SourceReport {
    fn new(source: &Source) -> Self {
        Self {
            namespace: source.namespace.clone(),
            tier: source.tier,
            pages: 0,
            inserted: 0,
            already_present: 0,
            failed: 0,
        }
    }
}

/// Outcome of a whole run
#[derive(Debug, Default)]
pub struct RunReport {
    /// Sources that were paginated to the end
    pub completed: Vec<SourceReport>,
    /// Sources abandoned under [`FailurePolicy::Continue`]
    pub failed: Vec<IngestError>,
}

impl RunReport {
    pub fn inserted(&self) -> usize {
        self.completed.iter().map(|r| r.inserted).sum()
    }

    pub fn already_present(&self) -> usize {
        self.completed.iter().map(|r| r.already_present).sum()
    }

    pub fn write_failures(&self) -> usize {
        self.completed.iter().map(|r| r.failed).sum()
    }

    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Owns the fetcher and the sink for the length of a run
pub struct Ingestor<T, K, S = TokioSleeper> {
    fetcher: PageFetcher<T, S>,
    sink: K,
    registry_base: Url,
}

impl<T, K, S> Ingestor<T, K, S>
where
    T: Transport,
    K: RecordSink,
    S: Sleeper,
{
    pub fn new(fetcher: PageFetcher<T, S>, sink: K, registry_base: Url) -> Self {
        Self {
            fetcher,
            sink,
            registry_base,
        }
    }

    pub fn sink(&self) -> &K {
        &self.sink
    }

    /// Give back the sink so the caller can release it
    pub fn into_sink(self) -> K {
        self.sink
    }

    /// Paginate one source to the end, writing every record
    #[tracing::instrument(skip(self, source), fields(namespace = %source.namespace, tier = %source.tier))]
    pub async fn ingest(&mut self, source: &Source) -> Result<SourceReport, IngestError> {
        let root = source
            .root_url(&self.registry_base)
            .map_err(|error| IngestError::RootUrl {
                namespace: source.namespace.clone(),
                error,
            })?;

        info!(url = %root, "Ingesting source");

        let mut report = SourceReport::new(source);
        let mut pages = std::pin::pin!(self.fetcher.pages(&root));

        while let Some(page) = pages.try_next().await.map_err(|error| IngestError::Fetch {
            namespace: source.namespace.clone(),
            url: error.url().to_string(),
            error,
        })? {
            report.pages += 1;
            debug!(page = report.pages, total = page.count, items = page.results.len(), "Fetched page");

            for item in page.results {
                let record = normalize(item, source);
                debug!(
                    repository = %format!("{}/{}", record.namespace, record.name),
                    storage_size = %record.storage_size,
                    category = %record.category,
                    "Normalized repository"
                );

                match self.sink.upsert(&record).await {
                    Ok(UpsertOutcome::Inserted) => {
                        report.inserted += 1;
                        info!("Inserted repository: {}/{}", record.namespace, record.name);
                    },
                    Ok(UpsertOutcome::AlreadyPresent) => {
                        report.already_present += 1;
                        debug!("Repository already stored: {}/{}", record.namespace, record.name);
                    },
                    Err(e) => {
                        report.failed += 1;
                        warn!(
                            sink = self.sink.name(),
                            error = %e,
                            "Error inserting repository {}/{}, skipping",
                            record.namespace,
                            record.name
                        );
                    },
                }
            }
        }

        info!(
            pages = report.pages,
            inserted = report.inserted,
            already_present = report.already_present,
            failed = report.failed,
            "Source complete"
        );

        Ok(report)
    }

    /// Ingest `sources` in order
    ///
    /// Under [`FailurePolicy::Abort`] the first source failure is returned as the error.
    pub async fn run(
        &mut self,
        sources: &[Source],
        policy: FailurePolicy,
    ) -> Result<RunReport, IngestError> {
        let mut run = RunReport::default();

        for source in sources {
            match self.ingest(source).await {
                Ok(report) => run.completed.push(report),
                Err(e) if policy == FailurePolicy::Continue => {
                    error!(namespace = %e.namespace(), error = %e, "Source failed, continuing with next source");
                    run.failed.push(e);
                },
                Err(e) => return Err(e),
            }
        }

        info!(
            sources = run.completed.len(),
            failed_sources = run.failed.len(),
            inserted = run.inserted(),
            already_present = run.already_present(),
            write_failures = run.write_failures(),
            "Run complete"
        );

        Ok(run)
    }
}
