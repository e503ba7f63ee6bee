//! Paginated keyword acquisition against one marketplace.
//!
//! A session requests pages strictly in order, decodes their items into
//! [`ListingRecord`]s and stops at the result cap, on an empty page, or on a
//! non-success status. Timeouts and other page failures are recorded and the
//! session moves on to the next page. `search` always returns a result.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::error::TransportError;
use crate::listing::{AcquisitionResult, ListingRecord};
use crate::marketplace::{DecodedItem, Marketplace, PageTransport};
use crate::pacing::{
    Clock, Pacer, RandomDelayPacer, SystemClock, DEFAULT_DELAY_MAX, DEFAULT_DELAY_MIN,
};

/// Items requested per page.
pub const DEFAULT_ITEMS_PER_PAGE: usize = 60;

/// Upper bound for a single page request.
pub const DEFAULT_PAGE_TIMEOUT: Duration = Duration::from_secs(30);

/// Configuration owned by one session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub items_per_page: usize,
    /// Lower bound of the randomized inter-page delay.
    pub delay_min: Duration,
    /// Upper bound of the randomized inter-page delay.
    pub delay_max: Duration,
    pub page_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            items_per_page: DEFAULT_ITEMS_PER_PAGE,
            delay_min: DEFAULT_DELAY_MIN,
            delay_max: DEFAULT_DELAY_MAX,
            page_timeout: DEFAULT_PAGE_TIMEOUT,
        }
    }
}

/// One marketplace, one transport, and the pacing policy between pages.
pub struct AcquisitionSession<M, T> {
    marketplace: M,
    transport: T,
    config: SessionConfig,
    pacer: Arc<dyn Pacer>,
    clock: Arc<dyn Clock>,
    cancel: CancellationToken,
}

impl<M: Marketplace, T: PageTransport> AcquisitionSession<M, T> {
    /// Create a session that paces pages with a random delay drawn from the
    /// configured bounds.
    pub fn new(marketplace: M, transport: T, config: SessionConfig) -> Self {
        let pacer = RandomDelayPacer::new(config.delay_min, config.delay_max);
        Self {
            marketplace,
            transport,
            config,
            pacer: Arc::new(pacer),
            clock: Arc::new(SystemClock),
            cancel: CancellationToken::new(),
        }
    }

    /// Replace the pacer.
    pub fn with_pacer(mut self, pacer: impl Pacer + 'static) -> Self {
        self.pacer = Arc::new(pacer);
        self
    }

    /// Replace the clock used for `scraped_at`.
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Observe `token` at page boundaries.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn marketplace(&self) -> &M {
        &self.marketplace
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Search `keyword` over at most `max_pages` pages, keeping at most
    /// `max_results` listings.
    #[instrument(
        level = "info",
        skip(self),
        fields(platform = %self.marketplace.platform())
    )]
    pub async fn search(
        &self,
        keyword: &str,
        max_pages: u32,
        max_results: usize,
    ) -> AcquisitionResult {
        let start = Instant::now();
        let items_per_page = self.config.items_per_page;

        let mut listings: Vec<ListingRecord> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        let mut errors: Vec<String> = Vec::new();
        let mut warnings: Vec<String> = Vec::new();
        let mut pages_scraped = 0u32;
        let mut cancelled = false;
        let mut pace_next = false;
        let mut last_scraped_at: Option<DateTime<Utc>> = None;

        info!("Starting marketplace search");

        for page in 0..max_pages {
            if listings.len() >= max_results {
                break;
            }

            if self.cancel.is_cancelled() {
                info!(page = page + 1, "Search cancelled");
                cancelled = true;
                break;
            }

            if pace_next {
                let interrupted = tokio::select! {
                    _ = self.pacer.pause(page) => false,
                    _ = self.cancel.cancelled() => true,
                };
                if interrupted {
                    info!(page = page + 1, "Search cancelled while pacing");
                    cancelled = true;
                    break;
                }
                pace_next = false;
            }

            let Some(offset) = (page as usize).checked_mul(items_per_page) else {
                let message = format!("Offset overflow on page {}", page + 1);
                warn!("{message}");
                errors.push(message);
                break;
            };
            let request = self.marketplace.build_request(keyword, items_per_page, offset);
            debug!(page = page + 1, offset, "Requesting page");

            let outcome = tokio::time::timeout(
                self.config.page_timeout,
                self.transport.fetch_page(&request),
            )
            .await
            .unwrap_or(Err(TransportError::Timeout));

            let response = match outcome {
                Ok(response) => response,
                Err(TransportError::Timeout) => {
                    let message = format!("Timeout on page {}", page + 1);
                    warn!("{message}");
                    errors.push(message);
                    continue;
                }
                Err(err) => {
                    let message = format!("Error on page {}: {err}", page + 1);
                    warn!("{message}");
                    errors.push(message);
                    continue;
                }
            };

            if !response.is_success() {
                let message = format!("API returned status {}", response.status);
                warn!("{message}");
                errors.push(message);
                break;
            }

            let items = self.marketplace.extract_items(&response.body);
            if items.is_empty() {
                info!(page = page + 1, "No more items");
                break;
            }

            for raw in items {
                if listings.len() >= max_results {
                    break;
                }

                let scraped_at = self.next_timestamp(&mut last_scraped_at);
                match self.marketplace.decode_item(raw, scraped_at) {
                    Ok(DecodedItem {
                        listing,
                        warnings: item_warnings,
                    }) => {
                        for warning in item_warnings {
                            warn!(warning = %warning, "Decode warning");
                            warnings.push(warning);
                        }
                        if !seen.insert(listing.id.clone()) {
                            debug!(id = %listing.id, "Skipping duplicate listing");
                            continue;
                        }
                        listings.push(listing);
                    }
                    Err(err) => {
                        let message = format!("Skipped item on page {}: {err}", page + 1);
                        warn!("{message}");
                        warnings.push(message);
                    }
                }
            }

            pages_scraped += 1;
            pace_next = true;
            info!(
                page = page + 1,
                items = items.len(),
                total = listings.len(),
                "Page decoded"
            );
        }

        let duration_ms = start.elapsed().as_millis() as u64;
        info!(
            total = listings.len(),
            pages_scraped,
            errors = errors.len(),
            duration_ms,
            "Search completed"
        );

        AcquisitionResult::assemble(
            self.marketplace.platform(),
            keyword,
            listings,
            pages_scraped,
            duration_ms,
            errors,
            warnings,
            cancelled,
        )
    }

    /// Next `scraped_at`, never earlier than the previous one in this session.
    fn next_timestamp(&self, last: &mut Option<DateTime<Utc>>) -> DateTime<Utc> {
        let now = self.clock.now();
        let timestamp = match *last {
            Some(previous) if previous > now => previous,
            _ => now,
        };
        *last = Some(timestamp);
        timestamp
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listing::Platform;
    use crate::marketplace::{SyntheticMarketplace, SyntheticTransport};
    use crate::pacing::NoDelay;
    use chrono::TimeZone;
    use std::sync::Mutex;

    fn synthetic_session(
        catalog_size: usize,
    ) -> AcquisitionSession<SyntheticMarketplace, SyntheticTransport> {
        let marketplace = SyntheticMarketplace::ruten().with_catalog_size(catalog_size);
        let transport = SyntheticTransport::new(marketplace.clone());
        AcquisitionSession::new(marketplace, transport, SessionConfig::default()).with_pacer(NoDelay)
    }

    /// Clock that steps backwards on every call.
    struct BackwardsClock {
        next: Mutex<DateTime<Utc>>,
    }

    impl Clock for BackwardsClock {
        fn now(&self) -> DateTime<Utc> {
            let mut next = self.next.lock().unwrap();
            let now = *next;
            *next = now - chrono::Duration::seconds(1);
            now
        }
    }

    #[test]
    fn test_default_config() {
        let config = SessionConfig::default();
        assert_eq!(config.items_per_page, 60);
        assert_eq!(config.delay_min, Duration::from_secs(1));
        assert_eq!(config.delay_max, Duration::from_secs(3));
    }

    #[tokio::test]
    async fn test_synthetic_search_single_page() {
        let result = synthetic_session(10).search("手機殼", 5, 100).await;
        assert_eq!(result.platform, Platform::Ruten);
        assert_eq!(result.total_found, 10);
        assert_eq!(result.pages_scraped, 1);
        assert!(result.errors.is_empty());
        assert!(result.success);
    }

    #[tokio::test]
    async fn test_zero_limits_yield_empty_result() {
        let session = synthetic_session(10);

        let result = session.search("x", 0, 100).await;
        assert_eq!(result.total_found, 0);
        assert_eq!(result.pages_scraped, 0);
        assert!(result.success);

        let result = session.search("x", 5, 0).await;
        assert_eq!(result.total_found, 0);
        assert_eq!(result.pages_scraped, 0);
        assert!(result.success);
    }

    #[tokio::test]
    async fn test_cap_applies_within_page() {
        let result = synthetic_session(10).search("x", 5, 4).await;
        assert_eq!(result.total_found, 4);
        assert_eq!(result.pages_scraped, 1);
    }

    #[tokio::test]
    async fn test_scraped_at_never_decreases() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let session = synthetic_session(10).with_clock(BackwardsClock {
            next: Mutex::new(start),
        });

        let result = session.search("x", 1, 10).await;
        assert_eq!(result.total_found, 10);
        assert!(result.listings.iter().all(|l| l.scraped_at == start));
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let token = CancellationToken::new();
        token.cancel();
        let result = synthetic_session(10)
            .with_cancellation(token)
            .search("x", 3, 100)
            .await;

        assert!(result.cancelled);
        assert_eq!(result.pages_scraped, 0);
        assert!(result.success);
    }
}
