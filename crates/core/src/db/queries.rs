//! Typed query helpers for the ldapmerge database.

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};
use serde::Serialize;
use tracing::{debug, warn};

use super::Database;
use crate::errors::DatabaseError;
use crate::models::{CertificateResponse, ConnectionProfile, Domain, HistoryEntry};

/// Number of history entries returned when no limit is given.
pub const DEFAULT_HISTORY_LIMIT: u32 = 100;

/// Summary of the database file and its contents.
#[derive(Debug, Clone, Serialize)]
pub struct DbInfo {
    pub path: String,
    pub size: u64,
    pub size_human: String,
    pub version: String,
    pub tables: i64,
    pub wal_mode: bool,
    pub history_count: i64,
    pub config_count: i64,
}

// ---------------------------------------------------------------------------
// Query implementations
// ---------------------------------------------------------------------------

impl Database {
    // -- history ------------------------------------------------------------

    /// Record a merge: both inputs and the result.
    pub fn save_history(
        &self,
        initial: &[Domain],
        response: &CertificateResponse,
        result: &[Domain],
    ) -> Result<HistoryEntry, DatabaseError> {
        let created_at = Utc::now();
        let initial_json = encode("initial", initial)?;
        let response_json = encode("response", response)?;
        let result_json = encode("result", result)?;

        let conn = self.conn();
        conn.execute(
            "INSERT INTO history (created_at, initial, response, result)
             VALUES (?1, ?2, ?3, ?4)",
            params![created_at.to_rfc3339(), initial_json, response_json, result_json],
        )?;
        let id = conn.last_insert_rowid();
        debug!(id, domains = result.len(), "saved history entry");

        Ok(HistoryEntry {
            id,
            created_at,
            initial: initial.to_vec(),
            response: response.clone(),
            result: result.to_vec(),
        })
    }

    /// Fetch one history entry by id.
    pub fn get_history(&self, id: i64) -> Result<HistoryEntry, DatabaseError> {
        let conn = self.conn();
        let row = conn
            .query_row(
                "SELECT id, created_at, initial, response, result FROM history WHERE id = ?1",
                params![id],
                raw_history,
            )
            .optional()?;
        match row {
            Some(raw) => raw.decode(),
            None => Err(DatabaseError::NotFound {
                entity: "history entry".into(),
                id: id.to_string(),
            }),
        }
    }

    /// List history entries, newest first. Entries whose stored JSON no
    /// longer decodes are skipped with a warning.
    pub fn list_history(&self, limit: Option<u32>) -> Result<Vec<HistoryEntry>, DatabaseError> {
        let limit = limit.unwrap_or(DEFAULT_HISTORY_LIMIT);
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, created_at, initial, response, result FROM history
             ORDER BY id DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit], raw_history)?;

        let mut entries = Vec::new();
        for row in rows {
            let raw = row?;
            let id = raw.id;
            match raw.decode() {
                Ok(entry) => entries.push(entry),
                Err(e) => warn!(id, error = %e, "skipping unreadable history entry"),
            }
        }
        Ok(entries)
    }

    pub fn count_history(&self) -> Result<i64, DatabaseError> {
        let conn = self.conn();
        let count = conn.query_row("SELECT COUNT(*) FROM history", [], |row| row.get(0))?;
        Ok(count)
    }

    // -- nsx_configs --------------------------------------------------------

    /// Insert a profile when it has no id, update it otherwise.
    ///
    /// On update a `None` password keeps the stored one.
    pub fn save_profile(&self, profile: &ConnectionProfile) -> Result<ConnectionProfile, DatabaseError> {
        let now = Utc::now();
        let conn = self.conn();

        let id = match profile.id {
            None => {
                conn.execute(
                    "INSERT INTO nsx_configs
                        (name, description, host, username, password, insecure, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
                    params![
                        profile.name,
                        profile.description,
                        profile.host,
                        profile.username,
                        profile.password.as_deref().unwrap_or_default(),
                        profile.insecure,
                        now.to_rfc3339(),
                    ],
                )?;
                let id = conn.last_insert_rowid();
                debug!(id, name = %profile.name, "inserted connection profile");
                id
            }
            Some(id) => {
                let changed = conn.execute(
                    "UPDATE nsx_configs SET
                        name = ?2, description = ?3, host = ?4, username = ?5,
                        password = COALESCE(?6, password), insecure = ?7, updated_at = ?8
                     WHERE id = ?1",
                    params![
                        id,
                        profile.name,
                        profile.description,
                        profile.host,
                        profile.username,
                        profile.password,
                        profile.insecure,
                        now.to_rfc3339(),
                    ],
                )?;
                if changed == 0 {
                    return Err(profile_not_found(id));
                }
                debug!(id, name = %profile.name, "updated connection profile");
                id
            }
        };
        drop(conn);
        self.get_profile(id)
    }

    /// Fetch a profile by id, including its password.
    pub fn get_profile(&self, id: i64) -> Result<ConnectionProfile, DatabaseError> {
        let conn = self.conn();
        conn.query_row(
            "SELECT id, name, description, host, username, insecure, created_at, updated_at, password
             FROM nsx_configs WHERE id = ?1",
            params![id],
            profile_with_password,
        )
        .optional()?
        .ok_or_else(|| profile_not_found(id))
    }

    /// Fetch a profile by its unique name, including its password.
    pub fn get_profile_by_name(&self, name: &str) -> Result<ConnectionProfile, DatabaseError> {
        let conn = self.conn();
        conn.query_row(
            "SELECT id, name, description, host, username, insecure, created_at, updated_at, password
             FROM nsx_configs WHERE name = ?1",
            params![name],
            profile_with_password,
        )
        .optional()?
        .ok_or_else(|| DatabaseError::NotFound {
            entity: "connection profile".into(),
            id: name.to_string(),
        })
    }

    /// List all profiles ordered by name. Passwords are not loaded.
    pub fn list_profiles(&self) -> Result<Vec<ConnectionProfile>, DatabaseError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, name, description, host, username, insecure, created_at, updated_at
             FROM nsx_configs ORDER BY name",
        )?;
        let rows = stmt.query_map([], profile_row)?;
        let mut profiles = Vec::new();
        for row in rows {
            profiles.push(row?);
        }
        Ok(profiles)
    }

    pub fn delete_profile(&self, id: i64) -> Result<(), DatabaseError> {
        let conn = self.conn();
        let deleted = conn.execute("DELETE FROM nsx_configs WHERE id = ?1", params![id])?;
        if deleted == 0 {
            return Err(profile_not_found(id));
        }
        debug!(id, "deleted connection profile");
        Ok(())
    }

    pub fn count_profiles(&self) -> Result<i64, DatabaseError> {
        let conn = self.conn();
        let count = conn.query_row("SELECT COUNT(*) FROM nsx_configs", [], |row| row.get(0))?;
        Ok(count)
    }

    // -- info ---------------------------------------------------------------

    /// Describe the database file, engine and row counts.
    pub fn info(&self) -> Result<DbInfo, DatabaseError> {
        let (version, journal_mode, tables) = {
            let conn = self.conn();
            let version: String = conn.query_row("SELECT sqlite_version()", [], |row| row.get(0))?;
            let journal_mode: String =
                conn.pragma_query_value(None, "journal_mode", |row| row.get(0))?;
            let tables: i64 = conn.query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%'",
                [],
                |row| row.get(0),
            )?;
            (version, journal_mode, tables)
        };

        let size = self
            .path()
            .and_then(|p| std::fs::metadata(p).ok())
            .map(|m| m.len())
            .unwrap_or(0);

        Ok(DbInfo {
            path: self
                .path()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| ":memory:".into()),
            size,
            size_human: format_bytes(size),
            version,
            tables,
            wal_mode: journal_mode.eq_ignore_ascii_case("wal"),
            history_count: self.count_history()?,
            config_count: self.count_profiles()?,
        })
    }
}

/// Render a byte count with binary units: `"512 B"`, `"44.0 KB"`.
pub fn format_bytes(bytes: u64) -> String {
    const UNIT: u64 = 1024;
    if bytes < UNIT {
        return format!("{bytes} B");
    }
    let mut div = UNIT;
    let mut exp = 0;
    let mut n = bytes / UNIT;
    while n >= UNIT {
        div *= UNIT;
        exp += 1;
        n /= UNIT;
    }
    let prefix = ['K', 'M', 'G', 'T', 'P', 'E'][exp];
    format!("{:.1} {}B", bytes as f64 / div as f64, prefix)
}

// ---------------------------------------------------------------------------
// Row mapping
// ---------------------------------------------------------------------------

/// A history row before its JSON columns are decoded.
struct RawHistory {
    id: i64,
    created_at: String,
    initial: String,
    response: String,
    result: String,
}

impl RawHistory {
    fn decode(self) -> Result<HistoryEntry, DatabaseError> {
        Ok(HistoryEntry {
            id: self.id,
            created_at: parse_datetime(&self.created_at),
            initial: decode("initial", &self.initial)?,
            response: decode("response", &self.response)?,
            result: decode("result", &self.result)?,
        })
    }
}

fn raw_history(row: &Row<'_>) -> rusqlite::Result<RawHistory> {
    Ok(RawHistory {
        id: row.get(0)?,
        created_at: row.get(1)?,
        initial: row.get(2)?,
        response: row.get(3)?,
        result: row.get(4)?,
    })
}

fn profile_row(row: &Row<'_>) -> rusqlite::Result<ConnectionProfile> {
    let created_at: String = row.get(6)?;
    let updated_at: String = row.get(7)?;
    Ok(ConnectionProfile {
        id: Some(row.get(0)?),
        name: row.get(1)?,
        description: row.get(2)?,
        host: row.get(3)?,
        username: row.get(4)?,
        password: None,
        insecure: row.get(5)?,
        created_at: Some(parse_datetime(&created_at)),
        updated_at: Some(parse_datetime(&updated_at)),
    })
}

fn profile_with_password(row: &Row<'_>) -> rusqlite::Result<ConnectionProfile> {
    let mut profile = profile_row(row)?;
    let password: String = row.get(8)?;
    profile.password = Some(password).filter(|p| !p.is_empty());
    Ok(profile)
}

fn profile_not_found(id: i64) -> DatabaseError {
    DatabaseError::NotFound {
        entity: "connection profile".into(),
        id: id.to_string(),
    }
}

fn encode<T: Serialize + ?Sized>(column: &'static str, value: &T) -> Result<String, DatabaseError> {
    serde_json::to_string(value).map_err(|source| DatabaseError::Json { column, source })
}

fn decode<T: serde::de::DeserializeOwned>(column: &'static str, text: &str) -> Result<T, DatabaseError> {
    serde_json::from_str(text).map_err(|source| DatabaseError::Json { column, source })
}

/// Stored timestamps are RFC 3339; anything unreadable maps to now.
fn parse_datetime(s: &str) -> DateTime<Utc> {
    chrono::DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::LdapServer;

    fn setup_db() -> Database {
        let db = Database::in_memory().unwrap();
        db.initialize().unwrap();
        db
    }

    fn domains() -> Vec<Domain> {
        vec![Domain {
            id: "example.lab".into(),
            domain_name: "example.lab".into(),
            base_dn: "DC=example,DC=lab".into(),
            alternative_domain_names: Vec::new(),
            servers: vec![LdapServer::new("ldaps://dc1.example.lab:636")],
        }]
    }

    fn profile(name: &str) -> ConnectionProfile {
        ConnectionProfile {
            name: name.into(),
            description: "lab manager".into(),
            host: "https://nsx.example.lab".into(),
            username: "admin".into(),
            password: Some("VMware1!".into()),
            insecure: true,
            ..Default::default()
        }
    }

    #[test]
    fn test_history_crud() {
        let db = setup_db();
        let initial = domains();
        let response = CertificateResponse::default();
        let mut result = domains();
        result[0].servers[0].certificates = vec!["CERT".into()];

        let saved = db.save_history(&initial, &response, &result).unwrap();
        assert!(saved.id > 0);

        let loaded = db.get_history(saved.id).unwrap();
        assert_eq!(loaded.initial, initial);
        assert_eq!(loaded.result, result);
        assert_eq!(db.count_history().unwrap(), 1);

        assert!(matches!(
            db.get_history(999),
            Err(DatabaseError::NotFound { .. })
        ));
    }

    #[test]
    fn test_list_history_newest_first_and_limited() {
        let db = setup_db();
        for _ in 0..3 {
            db.save_history(&domains(), &CertificateResponse::default(), &domains())
                .unwrap();
        }
        let all = db.list_history(None).unwrap();
        assert_eq!(all.len(), 3);
        assert!(all[0].id > all[1].id && all[1].id > all[2].id);

        let limited = db.list_history(Some(2)).unwrap();
        assert_eq!(limited.len(), 2);
        assert_eq!(limited[0].id, all[0].id);
    }

    #[test]
    fn test_list_history_skips_corrupt_rows() {
        let db = setup_db();
        db.save_history(&domains(), &CertificateResponse::default(), &domains())
            .unwrap();
        db.conn()
            .execute(
                "INSERT INTO history (created_at, initial, response, result)
                 VALUES (?1, 'not json', '{}', '[]')",
                params![Utc::now().to_rfc3339()],
            )
            .unwrap();

        assert_eq!(db.count_history().unwrap(), 2);
        assert_eq!(db.list_history(None).unwrap().len(), 1);
    }

    #[test]
    fn test_profile_crud() {
        let db = setup_db();
        let saved = db.save_profile(&profile("lab")).unwrap();
        let id = saved.id.unwrap();
        assert_eq!(saved.password.as_deref(), Some("VMware1!"));
        assert!(saved.created_at.is_some());

        let by_name = db.get_profile_by_name("lab").unwrap();
        assert_eq!(by_name.id, Some(id));

        let mut changed = by_name.clone();
        changed.host = "https://nsx2.example.lab".into();
        changed.password = None;
        let updated = db.save_profile(&changed).unwrap();
        assert_eq!(updated.host, "https://nsx2.example.lab");
        assert_eq!(updated.password.as_deref(), Some("VMware1!"));

        let listed = db.list_profiles().unwrap();
        assert_eq!(listed.len(), 1);
        assert!(listed[0].password.is_none());

        db.delete_profile(id).unwrap();
        assert_eq!(db.count_profiles().unwrap(), 0);
        assert!(matches!(
            db.delete_profile(id),
            Err(DatabaseError::NotFound { .. })
        ));
    }

    #[test]
    fn test_update_missing_profile() {
        let db = setup_db();
        let mut p = profile("ghost");
        p.id = Some(42);
        assert!(matches!(
            db.save_profile(&p),
            Err(DatabaseError::NotFound { .. })
        ));
    }

    #[test]
    fn test_duplicate_profile_name_is_rejected() {
        let db = setup_db();
        db.save_profile(&profile("lab")).unwrap();
        let err = db.save_profile(&profile("lab")).unwrap_err();
        assert!(err.is_unique_violation());
    }

    #[test]
    fn test_info() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open(dir.path().join("data.db")).unwrap();
        db.save_profile(&profile("lab")).unwrap();

        let info = db.info().unwrap();
        assert!(info.wal_mode);
        assert_eq!(info.tables, 2);
        assert_eq!(info.config_count, 1);
        assert_eq!(info.history_count, 0);
        assert!(info.size > 0);
        assert!(info.path.ends_with("data.db"));
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(0), "0 B");
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(1024), "1.0 KB");
        assert_eq!(format_bytes(45_056), "44.0 KB");
        assert_eq!(format_bytes(5 * 1024 * 1024), "5.0 MB");
    }
}
