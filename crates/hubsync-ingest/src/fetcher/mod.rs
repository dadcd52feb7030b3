//! Paginated fetching with bounded retry on HTTP 429
//!
//! [`PageFetcher::pages`] follows the `next` cursor of each page until the registry returns an
//! empty one. Every page request goes through [`PageFetcher::fetch_page`], which retries the same
//! URL while the registry answers 429 and gives up with [`FetchError::RateLimitExceeded`] once
//! the [`RetryPolicy`] is exhausted.

pub mod retry;
pub mod transport;

pub use retry::{RetryPolicy, RetryState, DEFAULT_BACKOFF, DEFAULT_MAX_ATTEMPTS};
pub use transport::{HttpReply, ReqwestTransport, Sleeper, TokioSleeper, Transport};

use crate::error::FetchError;
use crate::models::Page;
use futures::stream::{self, Stream};
use tracing::{debug, info};
use url::Url;

/// Fetches registry pages through an injected transport and sleeper
pub struct PageFetcher<T, S = TokioSleeper> {
    transport: T,
    sleeper: S,
    policy: RetryPolicy,
}

impl<T: Transport> PageFetcher<T> {
    /// Fetcher that backs off on the tokio timer
    pub fn new(transport: T, policy: RetryPolicy) -> Self {
        Self::with_sleeper(transport, TokioSleeper, policy)
    }
}

impl<T: Transport, S: Sleeper> PageFetcher<T, S> {
    pub fn with_sleeper(transport: T, sleeper: S, policy: RetryPolicy) -> Self {
        Self {
            transport,
            sleeper,
            policy,
        }
    }

    /// Fetch and decode a single page, retrying while rate limited
    pub async fn fetch_page(&self, url: &Url) -> Result<Page, FetchError> {
        let mut state = RetryState::start();

        loop {
            state = match state {
                RetryState::Requesting { attempt } => {
                    debug!(url = %url, attempt, "Requesting page");
                    let reply = self.transport.get(url).await?;
                    let rate_limited = reply.is_rate_limited();
                    state.on_reply(reply, rate_limited, &self.policy)
                },
                RetryState::Backoff { attempt, delay } => {
                    info!(
                        url = %url,
                        attempt,
                        max_attempts = self.policy.max_attempts,
                        delay = ?delay,
                        "Received 429 Too Many Requests, retrying after {:?}",
                        delay
                    );
                    self.sleeper.sleep(delay).await;
                    state.on_backoff_elapsed()
                },
                RetryState::Succeeded { reply, .. } => {
                    if !reply.status.is_success() {
                        return Err(FetchError::Status {
                            url: url.to_string(),
                            status: reply.status,
                        });
                    }
                    return serde_json::from_slice(&reply.body).map_err(|source| {
                        FetchError::Decode {
                            url: url.to_string(),
                            source,
                        }
                    });
                },
                RetryState::Failed { attempts } => {
                    return Err(FetchError::RateLimitExceeded {
                        url: url.to_string(),
                        attempts,
                    });
                },
            };
        }
    }

    /// Lazily walk every page starting at `start`
    ///
    /// The stream ends after the page with an empty cursor, or right after the first error.
    /// It cannot be restarted; call `pages` again to walk from the beginning.
    pub fn pages(&self, start: &Url) -> impl Stream<Item = Result<Page, FetchError>> + '_ {
        stream::try_unfold(Some(start.to_string()), move |cursor| async move {
            let Some(cursor) = cursor else {
                return Ok(None);
            };

            let url =
                Url::parse(&cursor).map_err(|source| FetchError::InvalidCursor { cursor, source })?;
            let page = self.fetch_page(&url).await?;
            let next = page.next_cursor().map(str::to_owned);

            Ok::<_, FetchError>(Some((page, next)))
        })
    }
}
