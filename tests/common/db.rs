//! PostgreSQL test databases.
//!
//! Tests using these fixtures are skipped unless `DATABASE_URL` points at
//! a database the tests may migrate.

use diesel::{Connection as _, pg::PgConnection};
use diesel_migrations::{find_migrations_directory, run_pending_migrations_in_directory};
use failure::Error;
use lazy_static::lazy_static;
use publisher::{Config, db, store::PgStore};
use std::{env, sync::Mutex};

use super::{env::Env, support::{Fixture, Skip}};

/// Publishing environment over a PostgreSQL store.
pub type PgEnv = Env<PgStore>;

lazy_static! {
    /// Set once this test binary applied migrations.
    static ref MIGRATED: Mutex<bool> = Mutex::new(false);
}

/// Connect to the test database.
///
/// Pending migrations are applied on first use. The connection runs inside
/// a test transaction which is never committed, so tests don't see each
/// other's data and leave nothing behind.
pub fn connect() -> Result<PgConnection, Error> {
    if env::var_os("DATABASE_URL").is_none() {
        return Err(Skip("DATABASE_URL is not set").into());
    }

    let config = Config::default();

    {
        let mut migrated = match MIGRATED.lock() {
            Ok(guard) => guard,
            Err(poison) => poison.into_inner(),
        };

        if !*migrated {
            let conn = db::connect(&config)?;
            let migrations_dir = find_migrations_directory()?;
            run_pending_migrations_in_directory(
                &conn, &migrations_dir, &mut ::std::io::stderr())?;
            *migrated = true;
        }
    }

    let conn = db::connect(&config)?;
    conn.begin_test_transaction()?;

    Ok(conn)
}

impl Fixture for PgEnv {
    fn make() -> Result<Self, Error> {
        Ok(Env::new(PgStore::new(connect()?)))
    }
}
