//! Per-user token-bucket rate limiting.

mod bucket;
mod limiter;

pub use bucket::TokenBucket;
pub use limiter::RateLimiter;
