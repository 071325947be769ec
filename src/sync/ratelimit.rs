//! The sliding-window rate limiter and retry loop from
//! `live.py::SkypeLogin.request`, ported as an async combinator so the sync
//! engine can wrap every remote call through it.

use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, warn};

use crate::config::Config;

/// One request's outcome as the caller's closure reports it, so
/// [`RateLimiter::call`] can tell a rate-limited (HTTP 429) failure —
/// which gets the longer `LiveSyncAuthRateLimitDelay` backoff — from an
/// ordinary transient error. The wrapped `E` is kept in both cases so the
/// final, retries-exhausted error can still be returned to the caller.
#[derive(Debug)]
pub struct CallError<E> {
    pub error: E,
    pub rate_limited: bool,
}

impl<E> CallError<E> {
    pub fn other(error: E) -> Self {
        Self { error, rate_limited: false }
    }

    pub fn rate_limited(error: E) -> Self {
        Self { error, rate_limited: true }
    }
}

/// Tracks recent call timestamps to keep the call rate under
/// `LiveSyncRateLimit` calls per `LiveSyncRateWindow` seconds, and retries
/// failed calls up to `LiveSyncRetryLimit` times with `LiveSyncRetryDelay`
/// (or `LiveSyncAuthRateLimitDelay` on a 429) between attempts.
pub struct RateLimiter {
    limit: usize,
    window: Duration,
    retry_limit: u32,
    retry_delay: Duration,
    rate_limited_delay: Duration,
    stamps: Vec<Instant>,
}

impl RateLimiter {
    pub fn from_config(config: &Config) -> Self {
        Self {
            limit: config.get_u32("LiveSyncRateLimit", 10) as usize,
            window: Duration::from_secs(config.get_u64("LiveSyncRateWindow", 60)),
            retry_limit: config.get_u32("LiveSyncRetryLimit", 3),
            retry_delay: Duration::from_secs(config.get_u64("LiveSyncRetryDelay", 20)),
            rate_limited_delay: Duration::from_secs(config.get_u64("LiveSyncAuthRateLimitDelay", 120)),
            stamps: Vec::new(),
        }
    }

    /// Records a call attempt and sleeps however long is needed to stay
    /// under the configured rate, mirroring `request`'s append-then-trim
    /// timestamp queue and its two delay branches (window full vs. spacing
    /// calls evenly within a not-yet-full window).
    async fn throttle(&mut self) {
        let now = Instant::now();
        self.stamps.push(now);
        while self.stamps.len() > self.limit {
            self.stamps.remove(0);
        }

        let delay = if self.stamps.len() >= self.limit {
            let span = self.stamps.last().unwrap().duration_since(self.stamps[0]);
            self.window.saturating_sub(span)
        } else if self.stamps.len() > 1 {
            let interval = self.window / self.limit.max(1) as u32;
            let span = self.stamps[self.stamps.len() - 1].duration_since(self.stamps[self.stamps.len() - 2]);
            interval.saturating_sub(span)
        } else {
            Duration::ZERO
        };

        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }

    /// Runs `attempt` through the throttle and retry loop. `attempt` reports
    /// [`CallError::RateLimited`] to get the longer backoff; any other
    /// error goes through the ordinary retry delay. Matches the original's
    /// `finally: self.query_stamps[-1] = datetime.datetime.now()` by
    /// refreshing the last stamp after every attempt, successful or not.
    pub async fn call<T, E, F, Fut>(&mut self, mut attempt: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, CallError<E>>>,
    {
        let mut tries = 0u32;
        loop {
            self.throttle().await;
            let result = attempt().await;
            if let Some(last) = self.stamps.last_mut() {
                *last = Instant::now();
            }
            match result {
                Ok(v) => return Ok(v),
                Err(err) => {
                    tries += 1;
                    let delay = if err.rate_limited {
                        self.rate_limited_delay
                    } else {
                        self.retry_delay
                    };
                    if tries > self.retry_limit {
                        return Err(err.error);
                    }
                    warn!(tries, ?delay, "retrying rate-limited or failed remote call");
                    tokio::time::sleep(delay).await;
                    debug!("resuming after backoff");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn succeeds_on_first_try_without_delay() {
        let mut limiter = RateLimiter::from_config(&Config::with_defaults());
        let result: Result<i32, ()> = limiter.call(|| async { Ok(42) }).await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn retries_until_retry_limit_then_fails() {
        let mut config_values = std::collections::HashMap::new();
        config_values.insert("LiveSyncRetryLimit".to_string(), serde_json::Value::from(1));
        config_values.insert("LiveSyncRetryDelay".to_string(), serde_json::Value::from(0));
        let config = Config::with_defaults().merge(config_values);
        let mut limiter = RateLimiter::from_config(&config);
        let attempts = std::cell::Cell::new(0);
        let result: Result<i32, &str> = limiter
            .call(|| {
                attempts.set(attempts.get() + 1);
                async { Err(CallError::other("boom")) }
            })
            .await;
        assert!(result.is_err());
        assert_eq!(attempts.get(), 2);
    }
}
