//! Database connection utilities.

use crate::RepositoryResult;
use diesel::pg::PgConnection;
use diesel::r2d2::{ConnectionManager, Pool};
use fabula_error::{RepositoryError, RepositoryErrorKind};
use tracing::instrument;

/// Shared PostgreSQL connection pool.
pub type PgPool = Pool<ConnectionManager<PgConnection>>;

/// Build a connection pool for the PostgreSQL database.
///
/// Reads the `DATABASE_URL` environment variable to determine the connection
/// string.
///
/// # Errors
///
/// Returns an error if:
/// - `DATABASE_URL` environment variable is not set
/// - The pool cannot establish its initial connections
#[instrument(name = "database.create_pool")]
pub fn create_pool() -> RepositoryResult<PgPool> {
    let database_url = std::env::var("DATABASE_URL").map_err(|_| {
        tracing::error!("DATABASE_URL environment variable not set");
        RepositoryError::new(RepositoryErrorKind::Connection(
            "DATABASE_URL environment variable not set".to_string(),
        ))
    })?;

    tracing::debug!("Creating PostgreSQL connection pool");
    Pool::builder()
        .build(ConnectionManager::<PgConnection>::new(database_url))
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to create database connection pool");
            RepositoryError::new(RepositoryErrorKind::Connection(e.to_string()))
        })
}
