use std::{collections::BTreeMap, sync::Mutex, time::Duration};

use chrono::Utc;
use reqwest::{header::HeaderMap, StatusCode};

#[cfg(test)]
#[path = "ratelimit_test.rs"]
mod tests;

/// Grace added on top of the advertised reset so the next request lands in
/// the fresh window.
const RESET_GRACE_MS: u64 = 900;
const DEFAULT_RETRY_AFTER_SECS: u64 = 1;

/// Per-endpoint buckets learned from `X-RateLimit-*` response headers.
#[derive(Default, Debug)]
pub struct RateLimits {
    endpoints: Mutex<BTreeMap<String, RateLimit>>,
}

impl RateLimits {
    /// How long to wait before hitting `url`, if at all. Consumes one request
    /// from the bucket.
    pub fn pre_check(&self, url: &str) -> Option<Duration> {
        self.pre_check_at(url, Utc::now().timestamp())
    }

    fn pre_check_at(&self, url: &str, now: i64) -> Option<Duration> {
        let mut endpoints = self.endpoints.lock().unwrap_or_else(|e| e.into_inner());
        endpoints.get_mut(url)?.pre_check(now)
    }

    /// Records the bucket state a response advertised. Returns the delay to
    /// wait before retrying when the request was rejected with 429.
    pub fn check_for_ratelimit(
        &self,
        url: &str,
        status: StatusCode,
        headers: &HeaderMap,
    ) -> Option<Duration> {
        let mut endpoints = self.endpoints.lock().unwrap_or_else(|e| e.into_inner());
        endpoints
            .entry(url.to_owned())
            .or_default()
            .check_for_ratelimit(status, headers)
    }
}

#[derive(Default, Debug)]
struct RateLimit {
    reset: i64,
    limit: i64,
    remaining: i64,
}

impl RateLimit {
    fn pre_check(&mut self, now: i64) -> Option<Duration> {
        if self.limit == 0 {
            // not initialized
            return None;
        }

        let difference = self.reset - now;
        if difference < 0 {
            self.remaining = self.limit - 1;
            return None;
        }

        let delay = (self.remaining <= 0).then(|| {
            Duration::from_secs(difference as u64)
                .saturating_add(Duration::from_millis(RESET_GRACE_MS))
        });
        self.remaining -= 1;
        delay
    }

    fn check_for_ratelimit(&mut self, status: StatusCode, headers: &HeaderMap) -> Option<Duration> {
        if let Some(reset) = header_i64(headers, "X-RateLimit-Reset") {
            self.reset = reset;
        }
        if let Some(limit) = header_i64(headers, "X-RateLimit-Limit") {
            self.limit = limit;
        }
        if let Some(remaining) = header_i64(headers, "X-RateLimit-Remaining") {
            self.remaining = remaining;
        }
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = header_i64(headers, "Retry-After")
                .and_then(|secs| u64::try_from(secs).ok())
                .unwrap_or(DEFAULT_RETRY_AFTER_SECS);
            return Some(Duration::from_secs(retry_after));
        }
        None
    }
}

fn header_i64(headers: &HeaderMap, name: &str) -> Option<i64> {
    let value = headers.get(name)?.to_str().ok()?;
    match value.parse::<f64>() {
        Ok(parsed) => Some(parsed as i64),
        Err(_) => {
            tracing::warn!(header = name, value, "unable to parse ratelimit header");
            None
        }
    }
}
