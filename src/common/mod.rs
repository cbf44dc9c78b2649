//! Shared utilities for the Slack and Flyte connectors.
//!
//! Rate limiting in front of the Slack Web API and exponential backoff for
//! reconnecting and re-registering.

pub mod rate_limit;
pub mod retry;

pub use rate_limit::{RateLimitConfig, RateLimiter, Tier, TieredRateLimiter};
pub use retry::{with_retry, RetryPolicy};
