//! Rate limiting for Slack Web API calls.
//!
//! Slack groups its methods into tiers with different per-minute budgets.
//! Each tier gets its own token bucket so a burst of `chat.postMessage` calls
//! during a broadcast does not starve `users.info` lookups.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Configuration for one token bucket.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Maximum number of requests allowed in the window.
    pub max_requests: u32,
    /// Time window for rate limiting.
    pub window: Duration,
    /// Burst capacity (allows temporary spikes).
    pub burst_capacity: u32,
}

impl RateLimitConfig {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            burst_capacity: max_requests / 6,
        }
    }

    /// Tier 2: 20+ requests per minute (`conversations.list`, `reactions.list`).
    pub fn tier2() -> Self {
        Self {
            max_requests: 20,
            window: Duration::from_secs(60),
            burst_capacity: 5,
        }
    }

    /// Tier 3: 50+ requests per minute (`conversations.join`, `conversations.info`).
    pub fn tier3() -> Self {
        Self {
            max_requests: 50,
            window: Duration::from_secs(60),
            burst_capacity: 10,
        }
    }

    /// Tier 4: 100+ requests per minute (`users.info`).
    pub fn tier4() -> Self {
        Self {
            max_requests: 100,
            window: Duration::from_secs(60),
            burst_capacity: 20,
        }
    }

    /// `chat.postMessage`: roughly one message per second.
    pub fn post_message() -> Self {
        Self {
            max_requests: 1,
            window: Duration::from_secs(1),
            burst_capacity: 3,
        }
    }
}

/// Token bucket rate limiter.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    config: RateLimitConfig,
    state: Arc<Mutex<RateLimiterState>>,
}

#[derive(Debug)]
struct RateLimiterState {
    tokens: f64,
    last_update: Instant,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        let initial_tokens = (config.max_requests + config.burst_capacity) as f64;
        Self {
            config,
            state: Arc::new(Mutex::new(RateLimiterState {
                tokens: initial_tokens,
                last_update: Instant::now(),
            })),
        }
    }

    /// Take a token, or return how long to wait for the next one.
    pub async fn try_acquire(&self) -> Result<(), Duration> {
        let mut state = self.state.lock().await;

        let now = Instant::now();
        let elapsed = now.duration_since(state.last_update);
        let refill_rate = self.config.max_requests as f64 / self.config.window.as_secs_f64();
        let max_tokens = (self.config.max_requests + self.config.burst_capacity) as f64;
        state.tokens = (state.tokens + elapsed.as_secs_f64() * refill_rate).min(max_tokens);
        state.last_update = now;

        if state.tokens >= 1.0 {
            state.tokens -= 1.0;
            Ok(())
        } else {
            Err(Duration::from_secs_f64((1.0 - state.tokens) / refill_rate))
        }
    }

    /// Take a token, sleeping until one is available.
    pub async fn acquire(&self) {
        while let Err(wait) = self.try_acquire().await {
            tracing::trace!(wait_ms = wait.as_millis() as u64, "rate limited locally");
            tokio::time::sleep(wait).await;
        }
    }
}

/// Slack Web API rate limit tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    Tier2,
    Tier3,
    Tier4,
    PostMessage,
}

impl Tier {
    /// Tier of a Web API method.
    pub fn of(method: &str) -> Self {
        match method {
            "chat.postMessage" => Tier::PostMessage,
            "users.info" => Tier::Tier4,
            "conversations.list" | "reactions.list" | "apps.connections.open" => Tier::Tier2,
            _ => Tier::Tier3,
        }
    }
}

/// One limiter per Slack tier.
#[derive(Debug, Clone)]
pub struct TieredRateLimiter {
    tier2: RateLimiter,
    tier3: RateLimiter,
    tier4: RateLimiter,
    post_message: RateLimiter,
}

impl TieredRateLimiter {
    pub fn slack() -> Self {
        Self {
            tier2: RateLimiter::new(RateLimitConfig::tier2()),
            tier3: RateLimiter::new(RateLimitConfig::tier3()),
            tier4: RateLimiter::new(RateLimitConfig::tier4()),
            post_message: RateLimiter::new(RateLimitConfig::post_message()),
        }
    }

    /// Wait for a token in the tier of `method`.
    pub async fn acquire(&self, method: &str) {
        let limiter = match Tier::of(method) {
            Tier::Tier2 => &self.tier2,
            Tier::Tier3 => &self.tier3,
            Tier::Tier4 => &self.tier4,
            Tier::PostMessage => &self.post_message,
        };
        limiter.acquire().await;
    }
}

impl Default for TieredRateLimiter {
    fn default() -> Self {
        Self::slack()
    }
}
