//! Redis-backed counter store
//!
//! Backs the distributed rate-limit gates. Degrades to a no-op pool when
//! Redis is unreachable so the limiter can fall back to in-process windows.

mod atomic;
mod pool;

pub use atomic::QuotaDecision;
pub use pool::RedisPool;
