//! PostgreSQL user repository implementation.
//!
//! Reads and writes the `users` table. Emails are stored normalized
//! (trimmed, lower-cased) and carry a unique constraint, which is what makes
//! a concurrent duplicate registration fail cleanly.
//!
//! # Example
//!
//! ```no_run
//! use passlink_auth::stores::postgres::PostgresUserRepository;
//! use sqlx::PgPool;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let pool = PgPool::connect("postgresql://localhost/auth").await?;
//! let repo = PostgresUserRepository::new(pool);
//! repo.migrate().await?;
//! # Ok(())
//! # }
//! ```

use crate::error::{AuthError, Result};
use crate::providers::{NewUser, User, UserRepository};
use crate::state::UserId;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

const CREATE_USERS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS users (
    user_id        UUID PRIMARY KEY,
    email          TEXT NOT NULL UNIQUE,
    name           TEXT,
    email_verified BOOLEAN NOT NULL DEFAULT FALSE,
    created_at     TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at     TIMESTAMPTZ NOT NULL DEFAULT NOW()
)";

const USER_COLUMNS: &str = "user_id, email, name, email_verified, created_at, updated_at";

/// PostgreSQL user repository.
#[derive(Clone)]
pub struct PostgresUserRepository {
    /// PostgreSQL connection pool.
    pool: PgPool,
}

impl PostgresUserRepository {
    /// Create a new PostgreSQL user repository.
    ///
    /// # Arguments
    ///
    /// * `pool` - PostgreSQL connection pool
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create the `users` table if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns error if the DDL statement fails.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(CREATE_USERS_TABLE)
            .execute(&self.pool)
            .await
            .map_err(|e| AuthError::DatabaseError(format!("Migration failed: {e}")))?;
        Ok(())
    }

    fn map_row(row: &PgRow) -> Result<User> {
        let decode = |e: sqlx::Error| AuthError::DatabaseError(format!("Failed to decode user: {e}"));

        Ok(User {
            user_id: UserId(row.try_get("user_id").map_err(decode)?),
            email: row.try_get("email").map_err(decode)?,
            name: row.try_get("name").map_err(decode)?,
            email_verified: row.try_get("email_verified").map_err(decode)?,
            created_at: row.try_get("created_at").map_err(decode)?,
            updated_at: row.try_get("updated_at").map_err(decode)?,
        })
    }
}

impl UserRepository for PostgresUserRepository {
    async fn get_user_by_id(&self, user_id: UserId) -> Result<User> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE user_id = $1"))
            .bind(user_id.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AuthError::DatabaseError(format!("Failed to get user: {e}")))?
            .ok_or(AuthError::ResourceNotFound)?;

        Self::map_row(&row)
    }

    async fn get_user_by_email(&self, email: &str) -> Result<User> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1"))
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AuthError::DatabaseError(format!("Failed to get user: {e}")))?
            .ok_or(AuthError::ResourceNotFound)?;

        Self::map_row(&row)
    }

    async fn email_exists(&self, email: &str) -> Result<bool> {
        let row = sqlx::query("SELECT EXISTS(SELECT 1 FROM users WHERE email = $1) AS present")
            .bind(email)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| AuthError::DatabaseError(format!("Failed to check email: {e}")))?;

        row.try_get("present")
            .map_err(|e| AuthError::DatabaseError(format!("Failed to check email: {e}")))
    }

    async fn create_user(&self, user: NewUser) -> Result<Option<User>> {
        // ON CONFLICT leaves an existing account untouched and returns no row
        let row = sqlx::query(&format!(
            "INSERT INTO users (user_id, email, name, email_verified) \
             VALUES ($1, $2, $3, $4) \
             ON CONFLICT (email) DO NOTHING \
             RETURNING {USER_COLUMNS}"
        ))
        .bind(UserId::new().0)
        .bind(&user.email)
        .bind(&user.name)
        .bind(user.email_verified)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AuthError::DatabaseError(format!("Failed to create user: {e}")))?;

        match row {
            Some(row) => {
                let created = Self::map_row(&row)?;
                tracing::info!(user_id = %created.user_id, "Created user");
                Ok(Some(created))
            }
            None => {
                tracing::info!("User not created: email already registered");
                Ok(None)
            }
        }
    }
}
