//! HTTP location history source.
//!
//! Fetches history from a paged location API with:
//! - Time-window sharding, fetched concurrently
//! - Dispatch rate limiting (spaces out request starts)
//! - Window shrinking: each page narrows `max-time` to just before the oldest
//!   record seen, until a page comes back empty
//! - Automatic retry with exponential backoff on 429 and transport errors
//!
//! Requests look like
//! `GET {base_url}?granularity=best&max-results=N&min-time=MS&max-time=MS`
//! with a bearer token, and answer in the `{"data": {"items": [...]}}` shape
//! understood by [`parse_records`].

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::error::{Error, Result};
use crate::source::{append_records, parse_records, HistorySource, LocationRecord};
use crate::History;

/// Connection settings for [`HttpHistorySource`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpSourceConfig {
    /// Location feed endpoint
    pub base_url: String,
    /// Bearer token sent with every request
    pub access_token: String,
    /// Records requested per page (default: 1000)
    pub max_results: u32,
    /// Number of sub-windows the requested range is split into (default: 4)
    pub shards: u32,
    /// Maximum requests in flight (default: 8)
    pub max_concurrency: usize,
    /// Retries per page on 429 or transport errors (default: 3)
    pub max_retries: u32,
    /// Minimum spacing between request starts in ms (default: 100)
    pub dispatch_interval_ms: u64,
}

impl Default for HttpSourceConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.googleapis.com/latitude/v1/location".to_string(),
            access_token: String::new(),
            max_results: 1000,
            shards: 4,
            max_concurrency: 8,
            max_retries: 3,
            dispatch_interval_ms: 100,
        }
    }
}

/// Dispatch rate limiter: spaces out when requests START.
struct DispatchRateLimiter {
    interval: Duration,
    next_dispatch: Mutex<Instant>,
    dispatched_count: AtomicU32,
    consecutive_429s: AtomicU32,
}

impl DispatchRateLimiter {
    fn new(interval: Duration) -> Self {
        Self {
            interval,
            next_dispatch: Mutex::new(Instant::now()),
            dispatched_count: AtomicU32::new(0),
            consecutive_429s: AtomicU32::new(0),
        }
    }

    /// Wait for our dispatch slot. Each caller gets a unique slot spaced
    /// `interval` apart.
    async fn wait_for_dispatch_slot(&self) -> u32 {
        let (wait_duration, dispatch_num) = {
            let mut next = self.next_dispatch.lock().await;
            let now = Instant::now();

            let dispatch_at = if *next > now { *next } else { now };
            *next = dispatch_at + self.interval;

            let num = self.dispatched_count.fetch_add(1, Ordering::Relaxed) + 1;
            (dispatch_at.saturating_duration_since(now), num)
        };

        // Wait outside the lock
        if wait_duration > Duration::from_millis(5) {
            debug!("[Dispatch #{}] Waiting {:?} for slot", dispatch_num, wait_duration);
            tokio::time::sleep(wait_duration).await;
        }

        dispatch_num
    }

    fn record_success(&self) {
        self.consecutive_429s.store(0, Ordering::Relaxed);
    }

    fn record_429(&self) -> Duration {
        let count = self.consecutive_429s.fetch_add(1, Ordering::Relaxed) + 1;
        // 1s, 2s, 4s max
        let backoff = Duration::from_millis(500 * (1 << count.min(3)));
        warn!("[DispatchRateLimiter] Got 429! Consecutive: {}, backing off {:?}", count, backoff);
        backoff
    }
}

/// Split `[start_ms, end_ms]` into at most `shards` contiguous inclusive
/// windows. Empty when `end_ms < start_ms`.
pub fn split_shards(start_ms: i64, end_ms: i64, shards: u32) -> Vec<(i64, i64)> {
    if end_ms < start_ms {
        return Vec::new();
    }

    let span = end_ms as i128 - start_ms as i128 + 1;
    let n = (shards.max(1) as i128).min(span);

    (0..n)
        .map(|i| {
            let lo = start_ms as i128 + span * i / n;
            let hi = start_ms as i128 + span * (i + 1) / n - 1;
            (lo as i64, hi as i64)
        })
        .collect()
}

/// Query parameters for one page of the feed.
fn page_query(max_results: u32, min_ms: i64, max_ms: i64) -> [(&'static str, String); 4] {
    [
        ("granularity", "best".to_string()),
        ("max-results", max_results.to_string()),
        ("min-time", min_ms.to_string()),
        ("max-time", max_ms.to_string()),
    ]
}

/// History source backed by a remote location feed.
pub struct HttpHistorySource {
    client: Client,
    config: HttpSourceConfig,
    rate_limiter: Arc<DispatchRateLimiter>,
}

impl HttpHistorySource {
    pub fn new(config: HttpSourceConfig) -> Result<Self> {
        let client = Client::builder()
            .pool_max_idle_per_host(config.max_concurrency.max(1) * 2)
            .pool_idle_timeout(Duration::from_secs(60))
            .tcp_keepalive(Duration::from_secs(30))
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| Error::HistoryFetch(format!("Failed to create HTTP client: {}", e)))?;

        let interval = Duration::from_millis(config.dispatch_interval_ms);
        Ok(Self {
            client,
            config,
            rate_limiter: Arc::new(DispatchRateLimiter::new(interval)),
        })
    }

    pub fn config(&self) -> &HttpSourceConfig {
        &self.config
    }

    /// Fetch every record between `start` and `end`, sharded and concurrent.
    pub async fn fetch_range_async(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<History> {
        use futures::stream::{self, StreamExt};

        let shards = split_shards(start.timestamp_millis(), end.timestamp_millis(), self.config.shards);
        info!(
            "[HttpHistorySource] Fetching {} .. {} in {} shards (max concurrent: {})",
            start,
            end,
            shards.len(),
            self.config.max_concurrency
        );

        let started = Instant::now();
        let results: Vec<Result<History>> = stream::iter(shards)
            .map(|(lo, hi)| self.fetch_window(lo, hi))
            .buffer_unordered(self.config.max_concurrency.max(1))
            .collect()
            .await;

        let mut history = History::new();
        for shard in results {
            history.extend_from(&shard?);
        }

        info!(
            "[HttpHistorySource] DONE: {} points in {:.2}s",
            history.len(),
            started.elapsed().as_secs_f64()
        );
        Ok(history)
    }

    /// Page backwards through one window until a page comes back empty.
    async fn fetch_window(&self, min_ms: i64, mut max_ms: i64) -> Result<History> {
        let mut history = History::new();

        while max_ms >= min_ms {
            let page = self.fetch_page(min_ms, max_ms).await?;
            if page.is_empty() {
                break;
            }

            let oldest = append_records(&page, &mut history)?;
            debug!(
                "[HttpHistorySource] window {}..{}: {} records, oldest {:?}",
                min_ms,
                max_ms,
                page.len(),
                oldest
            );

            match oldest {
                Some(ts) if ts <= max_ms => max_ms = ts - 1,
                // No usable timestamp to shrink by; further pages would repeat
                _ => break,
            }
        }

        Ok(history)
    }

    async fn fetch_page(&self, min_ms: i64, max_ms: i64) -> Result<Vec<LocationRecord>> {
        let query = page_query(self.config.max_results, min_ms, max_ms);
        let mut retries = 0;

        loop {
            let dispatch_num = self.rate_limiter.wait_for_dispatch_slot().await;
            let req_start = Instant::now();

            let response = self
                .client
                .get(&self.config.base_url)
                .query(&query)
                .bearer_auth(&self.config.access_token)
                .send()
                .await;

            match response {
                Ok(resp) => {
                    let status = resp.status();

                    if status == StatusCode::TOO_MANY_REQUESTS {
                        retries += 1;
                        if retries > self.config.max_retries {
                            return Err(Error::HistoryFetch("Max retries exceeded (429)".to_string()));
                        }
                        let wait = self.rate_limiter.record_429();
                        warn!(
                            "[Fetch #{}] 429 Too Many Requests, retry {} with {:?} backoff",
                            dispatch_num, retries, wait
                        );
                        tokio::time::sleep(wait).await;
                        continue;
                    }

                    self.rate_limiter.record_success();

                    if !status.is_success() {
                        return Err(Error::HistoryFetch(format!("HTTP {}", status)));
                    }

                    let bytes = resp
                        .bytes()
                        .await
                        .map_err(|e| Error::HistoryFetch(format!("Body download error: {}", e)))?;
                    let records = parse_records(&bytes)
                        .map_err(|e| Error::HistoryFetch(format!("JSON parse error: {}", e)))?;

                    debug!(
                        "[Fetch #{}] {}..{} -> {} records ({:.1}KB) in {:?}",
                        dispatch_num,
                        min_ms,
                        max_ms,
                        records.len(),
                        bytes.len() as f64 / 1024.0,
                        req_start.elapsed()
                    );
                    return Ok(records);
                }
                Err(e) => {
                    retries += 1;
                    if retries > self.config.max_retries {
                        return Err(Error::HistoryFetch(format!("Request error: {}", e)));
                    }
                    let wait = Duration::from_millis(200 * (1 << retries.min(5)));
                    warn!("[Fetch #{}] Error: {}, retry {} after {:?}", dispatch_num, e, retries, wait);
                    tokio::time::sleep(wait).await;
                }
            }
        }
    }
}

/// Blocking wrapper: runs the async fetch on its own tokio runtime.
///
/// Must not be called from inside an async context.
impl HistorySource for HttpHistorySource {
    fn fetch_range(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<History> {
        let rt = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(self.config.max_concurrency.clamp(1, 8))
            .enable_all()
            .build()?;

        rt.block_on(self.fetch_range_async(start, end))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_shards_covers_range() {
        let shards = split_shards(0, 99, 4);
        assert_eq!(shards, vec![(0, 24), (25, 49), (50, 74), (75, 99)]);
    }

    #[test]
    fn test_split_shards_uneven() {
        let shards = split_shards(10, 16, 3);
        assert_eq!(shards, vec![(10, 11), (12, 13), (14, 16)]);
    }

    #[test]
    fn test_split_shards_never_exceeds_span() {
        assert_eq!(split_shards(5, 6, 10), vec![(5, 5), (6, 6)]);
        assert_eq!(split_shards(5, 5, 0), vec![(5, 5)]);
        assert!(split_shards(6, 5, 4).is_empty());
    }

    #[test]
    fn test_page_query() {
        let query = page_query(1000, 1, 2);
        assert_eq!(query[0], ("granularity", "best".to_string()));
        assert_eq!(query[1], ("max-results", "1000".to_string()));
        assert_eq!(query[2], ("min-time", "1".to_string()));
        assert_eq!(query[3], ("max-time", "2".to_string()));
    }

    #[test]
    fn test_config_defaults_from_partial_json() {
        let config: HttpSourceConfig = serde_json::from_str(r#"{"access_token": "t", "shards": 2}"#).unwrap();
        assert_eq!(config.access_token, "t");
        assert_eq!(config.shards, 2);
        assert_eq!(config.max_results, 1000);
    }

    #[tokio::test]
    async fn test_dispatch_rate_limiter() {
        let limiter = DispatchRateLimiter::new(Duration::from_millis(50));

        // First request should not wait
        let start = Instant::now();
        assert_eq!(limiter.wait_for_dispatch_slot().await, 1);
        assert!(start.elapsed() < Duration::from_millis(10));

        // Second request should wait ~50ms
        let start2 = Instant::now();
        assert_eq!(limiter.wait_for_dispatch_slot().await, 2);
        let elapsed = start2.elapsed();
        assert!(elapsed >= Duration::from_millis(40), "Expected ~50ms wait, got {:?}", elapsed);
    }
}
