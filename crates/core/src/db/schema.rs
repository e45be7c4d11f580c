//! Schema migrations, tracked through SQLite's `user_version` pragma.

use rusqlite::Connection;
use tracing::info;

use crate::errors::DatabaseError;

/// `(version, description, sql)`, ascending.
static MIGRATIONS: &[(u32, &str, &str)] = &[
    (
        1,
        "merge history",
        r#"
        CREATE TABLE IF NOT EXISTS history (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            created_at  TEXT NOT NULL,
            initial     TEXT NOT NULL,
            response    TEXT NOT NULL,
            result      TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_history_created_at ON history (created_at);
        "#,
    ),
    (
        2,
        "nsx connection profiles",
        r#"
        CREATE TABLE IF NOT EXISTS nsx_configs (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            name        TEXT    NOT NULL UNIQUE,
            description TEXT    NOT NULL DEFAULT '',
            host        TEXT    NOT NULL,
            username    TEXT    NOT NULL,
            password    TEXT    NOT NULL DEFAULT '',
            insecure    INTEGER NOT NULL DEFAULT 0,
            created_at  TEXT    NOT NULL,
            updated_at  TEXT    NOT NULL
        );
        "#,
    ),
];

/// Apply every migration newer than the stored version, each in its own
/// transaction. Returns the resulting schema version.
pub fn run_migrations(conn: &Connection) -> Result<u32, DatabaseError> {
    let stored = get_schema_version(conn)?;
    let mut current = stored;

    for &(version, description, sql) in MIGRATIONS.iter().filter(|m| m.0 > stored) {
        info!(from = current, to = version, description, "migrating database");
        let batch = format!("BEGIN;\n{sql}\nPRAGMA user_version = {version};\nCOMMIT;");
        if let Err(e) = conn.execute_batch(&batch) {
            // leave no half-applied migration behind
            let _ = conn.execute_batch("ROLLBACK;");
            return Err(DatabaseError::MigrationFailed {
                version,
                detail: e.to_string(),
            });
        }
        current = version;
    }

    Ok(current)
}

fn get_schema_version(conn: &Connection) -> Result<u32, DatabaseError> {
    Ok(conn.pragma_query_value(None, "user_version", |row| row.get(0))?)
}
