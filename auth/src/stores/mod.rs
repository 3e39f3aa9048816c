//! Storage implementations for the token core.
//!
//! - **TTL Store** (memory, Redis) - Token records and rate-limit counters
//! - **Rate Limiter** (memory, Redis) - Fixed-window counters with atomic increment
//! - **Session Store** (any TTL store) - Sessions established by the flows
//! - **User Repository** (PostgreSQL, feature `postgres`) - Identity store

pub mod kv_redis;
pub mod memory;
#[cfg(feature = "postgres")]
pub mod postgres;
pub mod rate_limiter_memory;
pub mod rate_limiter_redis;
pub mod session_kv;

// Re-exports
pub use kv_redis::RedisKeyValueStore;
pub use memory::MemoryStore;
#[cfg(feature = "postgres")]
pub use postgres::PostgresUserRepository;
pub use rate_limiter_memory::MemoryRateLimiter;
pub use rate_limiter_redis::RedisRateLimiter;
pub use session_kv::StoreSessionStore;
