//! PostgreSQL storage implementations.
//!
//! This module provides the persistent identity store (user accounts).

pub mod user;

// Re-exports
pub use user::PostgresUserRepository;
