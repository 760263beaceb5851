//! Schema migrations, tracked with SQLite's `user_version` pragma.
//!
//! Each entry in [`MIGRATIONS`] runs once, in order, inside its own
//! transaction together with the version bump.

pub mod v001_initial;

use rusqlite::Connection;
use tracing::{debug, info};

use crate::error::{Result, StoreError};

type Up = fn(&Connection) -> rusqlite::Result<()>;

const MIGRATIONS: &[(u32, &str, Up)] = &[(1, "initial", v001_initial::up)];

/// Version of the newest migration.
pub const CURRENT_VERSION: u32 = 1;

pub fn run_migrations(conn: &mut Connection) -> Result<()> {
    let current: u32 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;
    debug!(current, latest = CURRENT_VERSION, "schema version");

    for &(version, name, up) in MIGRATIONS.iter().filter(|(v, _, _)| *v > current) {
        info!(version, name, "applying migration");
        let fail = |e: rusqlite::Error| StoreError::Migration {
            version,
            reason: e.to_string(),
        };
        let tx = conn.transaction()?;
        up(&tx).map_err(fail)?;
        tx.pragma_update(None, "user_version", version)?;
        tx.commit()?;
    }
    Ok(())
}
