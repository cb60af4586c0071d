//! Resilience patterns for cloudguide-runtime.
//!
//! Retry with backoff is applied to rate-limited hosted-model calls only.
//! Every other failure becomes answer text at the unit that owns the call.

mod retry;

pub use retry::RateLimitRetry;
