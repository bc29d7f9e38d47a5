use diesel::pg::PgConnection;
use failure::Fail;
use r2d2_diesel::ConnectionManager;
use serde::Deserialize;
use std::env;

use crate::config::Config;

pub mod models;
pub mod schema;
pub mod types;

/// A single connection to a database.
pub type Connection = PgConnection;

/// A pool of database connections.
pub type Pool = r2d2::Pool<ConnectionManager<PgConnection>>;

/// Database configuration.
#[derive(Clone, Debug, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
}

/// Find the correct database URL based on configuration and environment.
pub fn database_url(cfg: &Config) -> Result<String, GetDatabaseUrlError> {
    match env::var("DATABASE_URL") {
        Ok(url) => return Ok(url),
        Err(env::VarError::NotUnicode(_)) => {
            return Err(GetDatabaseUrlError::VarInvalidUnicode);
        }
        Err(env::VarError::NotPresent) => (),
    }

    if let Some(ref db) = cfg.database {
        return Ok(db.url.clone());
    }

    Err(GetDatabaseUrlError::NotConfigured)
}

#[derive(Debug, Fail)]
pub enum GetDatabaseUrlError {
    #[fail(display = "No database connection configured")]
    NotConfigured,
    #[fail(display = "DATABASE_URL contains invalid Unicode")]
    VarInvalidUnicode,
}

/// Create a new connection.
pub fn connect(cfg: &Config) -> Result<Connection, ConnectionError> {
    use diesel::Connection;

    let url = database_url(cfg)?;
    let conn = PgConnection::establish(&url)?;

    Ok(conn)
}

/// Create a connection pool for the database.
///
/// In release builds pending migrations are applied before the pool is
/// returned.
pub fn pool(cfg: &Config) -> Result<Pool, ConnectionError> {
    let url = database_url(cfg)?;
    let manager = ConnectionManager::new(url);
    let pool = Pool::new(manager)?;

    // Try to connect to database to detect errors early.
    let conn = pool.get()?;

    // Run migrations in production build.
    if cfg!(not(debug_assertions)) {
        embedded_migrations::run_with_output(&*conn, &mut ::std::io::stderr())
            .map_err(ConnectionError::Migration)?;
    }

    Ok(pool)
}

#[derive(Debug, Fail)]
pub enum ConnectionError {
    #[fail(display = "{}", _0)]
    Configuration(#[cause] GetDatabaseUrlError),
    #[fail(display = "{}", _0)]
    Pool(#[cause] r2d2::Error),
    #[fail(display = "{}", _0)]
    Database(#[cause] diesel::ConnectionError),
    #[cfg(debug_assertions)]
    #[fail(display = "could not perform migrations")]
    Migration(()),
    #[cfg(not(debug_assertions))]
    #[fail(display = "{}", _0)]
    Migration(#[cause] diesel_migrations::RunMigrationsError),
}

impl_from! { for ConnectionError ;
    GetDatabaseUrlError => |e| ConnectionError::Configuration(e),
    r2d2::Error => |e| ConnectionError::Pool(e),
    diesel::ConnectionError => |e| ConnectionError::Database(e),
}

// Embed migrations when building for production.
#[cfg(not(debug_assertions))]
embed_migrations!();

// `pool` requires embedded_migrations::run_with_output to typecheck, even
// if it's never used.
#[cfg(debug_assertions)]
mod embedded_migrations {
    use diesel::pg::PgConnection;
    pub fn run_with_output<W>(_: &PgConnection, _: &mut W) -> Result<(), ()> {
        Ok(())
    }
}
