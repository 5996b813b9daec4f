//! # termsync-db
//!
//! PostgreSQL term catalog for termsync.
//!
//! This crate provides:
//! - Connection pool management
//! - [`PgTermRepository`], the [`TermStore`] over the `term`,
//!   `term_relation` and `terminology` tables
//! - Embedded schema migrations (`migrations` feature)
//!
//! ## Example
//!
//! ```rust,ignore
//! use termsync_db::{Database, TermStore};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::connect("postgres://localhost/termsync").await?;
//!     let ids = db.terms.terminology_ids().await?;
//!     println!("{} terminologies", ids.len());
//!     Ok(())
//! }
//! ```
pub mod pool;
pub mod terms;

// Test fixtures for integration tests
// Note: Always compiled so integration tests (in tests/) can use DEFAULT_TEST_DATABASE_URL
pub mod test_fixtures;

// Re-export core types
pub use termsync_core::*;

pub use pool::{create_pool, log_pool_metrics};
pub use terms::PgTermRepository;

/// Database handle holding the pool and the repositories built on it.
#[derive(Clone)]
pub struct Database {
    pool: sqlx::Pool<sqlx::Postgres>,
    pub terms: PgTermRepository,
}

impl Database {
    /// Wrap an existing pool.
    pub fn new(pool: sqlx::Pool<sqlx::Postgres>) -> Self {
        Self {
            terms: PgTermRepository::new(pool.clone()),
            pool,
        }
    }

    /// Create a new Database instance by connecting to the given URL.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = create_pool(url).await?;
        Ok(Self::new(pool))
    }

    /// Run pending migrations.
    #[cfg(feature = "migrations")]
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| Error::Database(sqlx::Error::Migrate(Box::new(e))))?;
        Ok(())
    }

    /// Get the underlying connection pool.
    pub fn pool(&self) -> &sqlx::Pool<sqlx::Postgres> {
        &self.pool
    }
}
