//! Guarded outbound HTTP: whitelist, rate limit, per-attempt timeout and
//! exponential-backoff retry, in that order.

pub mod client;
pub mod rate_limiter;
pub mod whitelist;

pub use client::{GuardedTransport, Transport, TransportConfig, TransportStats};
pub use rate_limiter::{FixedWindowLimiter, RateLimitConfig};
pub use whitelist::Whitelist;
