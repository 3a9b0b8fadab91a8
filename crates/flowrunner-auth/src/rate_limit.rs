//! Sliding-window request limiting plus progressive login lockout.
//!
//! Single-process, in-memory buckets — fine for the reference deployment
//! this crate targets. A distributed deployment would back this with a
//! shared store instead; nothing above this module depends on that choice.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use crate::config::RateLimitConfig;
use crate::error::{AccountError, AccountResult};

#[derive(Clone)]
pub struct RateLimiter {
    config: RateLimitConfig,
    buckets: Arc<RwLock<HashMap<String, RateBucket>>>,
    login_attempts: Arc<RwLock<HashMap<String, LoginAttempts>>>,
}

#[derive(Debug, Clone)]
struct RateBucket {
    requests: Vec<Instant>,
    window_start: Instant,
}

#[derive(Debug, Clone)]
struct LoginAttempts {
    failed_count: u32,
    last_failed: Instant,
    lockout_duration: Duration,
    locked_until: Option<Instant>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            buckets: Arc::new(RwLock::new(HashMap::new())),
            login_attempts: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn check_account_limit(&self, account_id: &str) -> AccountResult<()> {
        if !self.config.enabled {
            return Ok(());
        }
        let key = format!("account:{}", account_id);
        self.check_limit(
            &key,
            self.config.api_requests_per_window,
            Duration::from_secs(self.config.api_window_secs),
        )
        .await
    }

    pub async fn check_login_limit(&self, identifier: &str) -> AccountResult<()> {
        if !self.config.enabled {
            return Ok(());
        }

        {
            let attempts = self.login_attempts.read().await;
            if let Some(attempt_info) = attempts.get(identifier) {
                if let Some(locked_until) = attempt_info.locked_until {
                    if Instant::now() < locked_until {
                        let remaining = locked_until.duration_since(Instant::now());
                        return Err(AccountError::account_locked(remaining));
                    }
                }
            }
        }

        let key = format!("login:{}", identifier);
        self.check_limit(
            &key,
            self.config.login_attempts,
            Duration::from_secs(self.config.login_window_secs),
        )
        .await
    }

    pub async fn record_failed_login(&self, identifier: &str) {
        let mut attempts = self.login_attempts.write().await;

        let entry = attempts.entry(identifier.to_string()).or_insert(LoginAttempts {
            failed_count: 0,
            last_failed: Instant::now(),
            lockout_duration: Duration::from_secs(self.config.lockout_duration_secs),
            locked_until: None,
        });

        entry.failed_count += 1;
        entry.last_failed = Instant::now();

        if entry.failed_count >= self.config.login_attempts {
            let max_lockout = Duration::from_secs(self.config.max_lockout_duration_secs);
            let lockout = entry.lockout_duration.min(max_lockout);
            entry.locked_until = Some(Instant::now() + lockout);

            entry.lockout_duration = Duration::from_secs_f64(
                (entry.lockout_duration.as_secs_f64() * self.config.lockout_multiplier)
                    .min(max_lockout.as_secs_f64()),
            );

            tracing::warn!(
                identifier = identifier,
                lockout_seconds = lockout.as_secs(),
                "account locked after repeated failed logins"
            );
        }
    }

    pub async fn record_successful_login(&self, identifier: &str) {
        let mut attempts = self.login_attempts.write().await;
        attempts.remove(identifier);
    }

    pub async fn is_locked_out(&self, identifier: &str) -> Option<Duration> {
        let attempts = self.login_attempts.read().await;
        let attempt_info = attempts.get(identifier)?;
        let locked_until = attempt_info.locked_until?;
        let now = Instant::now();
        if now < locked_until {
            Some(locked_until.duration_since(now))
        } else {
            None
        }
    }

    async fn check_limit(&self, key: &str, limit: u32, window: Duration) -> AccountResult<()> {
        let mut buckets = self.buckets.write().await;
        let now = Instant::now();

        let bucket = buckets.entry(key.to_string()).or_insert(RateBucket {
            requests: Vec::new(),
            window_start: now,
        });

        bucket.requests.retain(|&t| now.duration_since(t) < window);

        if bucket.requests.len() >= limit as usize {
            let retry_after = match bucket.requests.first() {
                Some(&oldest) => window.saturating_sub(now.duration_since(oldest)),
                None => window,
            };
            return Err(AccountError::rate_limited(retry_after));
        }

        bucket.requests.push(now);
        Ok(())
    }

    /// Periodic sweep dropping buckets and attempt records that have aged
    /// out. Callers drive this on a timer; it is not invoked by any of the
    /// check/record methods themselves.
    pub async fn cleanup(&self) {
        let mut buckets = self.buckets.write().await;
        let now = Instant::now();
        let max_window = Duration::from_secs(
            self.config
                .api_window_secs
                .max(self.config.login_window_secs),
        );
        buckets.retain(|_, bucket| now.duration_since(bucket.window_start) < max_window * 2);

        let mut attempts = self.login_attempts.write().await;
        let max_lockout = Duration::from_secs(self.config.max_lockout_duration_secs);
        attempts.retain(|_, attempt| {
            if let Some(locked_until) = attempt.locked_until {
                if now < locked_until {
                    return true;
                }
            }
            now.duration_since(attempt.last_failed) < max_lockout
        });
    }

    pub async fn reset_login_attempts(&self, identifier: &str) {
        let mut attempts = self.login_attempts.write().await;
        attempts.remove(identifier);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> RateLimitConfig {
        RateLimitConfig {
            enabled: true,
            login_attempts: 5,
            login_window_secs: 60,
            api_requests_per_window: 10,
            api_window_secs: 1,
            lockout_duration_secs: 60,
            lockout_multiplier: 2.0,
            max_lockout_duration_secs: 3600,
        }
    }

    #[tokio::test]
    async fn account_limit_rejects_after_threshold() {
        let limiter = RateLimiter::new(test_config());
        for _ in 0..10 {
            assert!(limiter.check_account_limit("acc_1").await.is_ok());
        }
        let result = limiter.check_account_limit("acc_1").await;
        assert!(matches!(result, Err(AccountError::RateLimitExceeded { .. })));
    }

    #[tokio::test]
    async fn login_lockout_after_repeated_failures() {
        let limiter = RateLimiter::new(test_config());
        for _ in 0..5 {
            limiter.record_failed_login("user@example.com").await;
        }
        let result = limiter.check_login_limit("user@example.com").await;
        assert!(matches!(result, Err(AccountError::AccountLocked { .. })));
    }

    #[tokio::test]
    async fn successful_login_clears_failed_attempts() {
        let limiter = RateLimiter::new(test_config());
        for _ in 0..3 {
            limiter.record_failed_login("user@example.com").await;
        }
        limiter.record_successful_login("user@example.com").await;
        assert!(limiter.check_login_limit("user@example.com").await.is_ok());
    }

    #[tokio::test]
    async fn disabled_limiter_never_rejects() {
        let mut config = test_config();
        config.enabled = false;
        let limiter = RateLimiter::new(config);
        for _ in 0..100 {
            assert!(limiter.check_account_limit("acc_1").await.is_ok());
        }
    }
}
