//! Error types for the ldapmerge core library.
//!
//! One `thiserror` enum per subsystem, wrapped by [`CoreError`]. The merge
//! engine has none: it only sees already-parsed input and cannot fail.

use thiserror::Error;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Input(#[from] InputError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error(transparent)]
    Nsx(#[from] NsxError),

    #[error(transparent)]
    Sync(#[from] SyncError),
}

// ---------------------------------------------------------------------------
// Input errors
// ---------------------------------------------------------------------------

/// Errors raised while reading or decoding merge input, before the merge
/// engine ever runs.
#[derive(Debug, Error)]
pub enum InputError {
    /// The input file could not be read.
    #[error("failed to read {kind} file '{path}': {source}")]
    Read {
        kind: &'static str,
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The input file is not valid JSON of the expected shape.
    #[error("failed to parse {kind} JSON from '{path}': {source}")]
    Parse {
        kind: &'static str,
        path: String,
        #[source]
        source: serde_json::Error,
    },

    /// The merged output could not be encoded.
    #[error("failed to encode JSON: {0}")]
    Encode(#[from] serde_json::Error),

    /// The merged output could not be written.
    #[error("failed to write output file '{path}': {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

/// Loading or validating `.ldapmerge.toml`.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("configuration file not found: {0}")]
    FileNotFound(String),

    #[error("configuration parse error: {0}")]
    ParseError(String),

    #[error("invalid configuration value for '{field}': {detail}")]
    InvalidValue { field: String, detail: String },

    #[error("configuration I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Database errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("database error: {0}")]
    SqliteError(#[from] rusqlite::Error),

    #[error("database migration failed (version {version}): {detail}")]
    MigrationFailed { version: u32, detail: String },

    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// A stored JSON document could not be encoded or decoded.
    #[error("stored {column} document is invalid: {source}")]
    Json {
        column: &'static str,
        #[source]
        source: serde_json::Error,
    },

    /// Creating the database directory failed.
    #[error("database I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl DatabaseError {
    /// True when a UNIQUE (or other) constraint rejected the write.
    pub fn is_unique_violation(&self) -> bool {
        matches!(
            self,
            Self::SqliteError(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation
        )
    }
}

// ---------------------------------------------------------------------------
// NSX API errors
// ---------------------------------------------------------------------------

/// Errors from the NSX Manager REST API client.
#[derive(Debug, Error)]
pub enum NsxError {
    /// HTTP-level transport error (network, TLS, timeout).
    #[error("NSX HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    /// The NSX Manager rejected the credentials.
    #[error("NSX authentication failed (HTTP {status}): {message}")]
    Unauthorized { status: u16, message: String },

    /// NSX returned a structured error body.
    #[error("NSX API error {status}: {message} (code: {code})")]
    Api {
        status: u16,
        code: i64,
        module: String,
        message: String,
    },

    /// NSX returned an error status without a recognisable error body.
    #[error("NSX API error {status}: {body}")]
    Status { status: u16, body: String },

    /// The base URL or a request path could not be built.
    #[error("invalid NSX URL '{0}'")]
    InvalidUrl(String),

    /// The response body did not match the expected shape.
    #[error("failed to parse NSX response: {0}")]
    ParseError(String),
}

impl NsxError {
    /// HTTP status associated with the error, if the server answered.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Unauthorized { status, .. }
            | Self::Api { status, .. }
            | Self::Status { status, .. } => Some(*status),
            Self::HttpError(e) => e.status().map(|s| s.as_u16()),
            Self::InvalidUrl(_) | Self::ParseError(_) => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Sync pipeline errors
// ---------------------------------------------------------------------------

/// Errors that abort the pull → merge → push pipeline.
///
/// Individual push failures are not errors: they are recorded per domain in
/// the push report.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Pulling the current identity sources failed.
    #[error("pull failed: {0}")]
    Pull(#[source] NsxError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_messages() {
        let err = DatabaseError::NotFound {
            entity: "history entry".into(),
            id: "7".into(),
        };
        assert_eq!(err.to_string(), "history entry not found: 7");

        let err = NsxError::Api {
            status: 404,
            code: 404,
            module: "policy".into(),
            message: "source not found".into(),
        };
        assert_eq!(err.to_string(), "NSX API error 404: source not found (code: 404)");

        let err = ConfigError::InvalidValue {
            field: "logging.level".into(),
            detail: "unknown level".into(),
        };
        assert!(err.to_string().contains("logging.level"));
    }

    #[test]
    fn test_nsx_error_status() {
        let err = NsxError::Unauthorized {
            status: 401,
            message: "bad credentials".into(),
        };
        assert_eq!(err.status(), Some(401));
        assert_eq!(NsxError::ParseError("x".into()).status(), None);
    }

    #[test]
    fn test_core_error_from_subsystem() {
        let db_err = DatabaseError::NotFound {
            entity: "profile".into(),
            id: "lab".into(),
        };
        let core_err: CoreError = db_err.into();
        assert!(matches!(core_err, CoreError::Database(_)));

        let nsx_err = NsxError::InvalidUrl("::".into());
        let core_err: CoreError = nsx_err.into();
        assert!(matches!(core_err, CoreError::Nsx(_)));
    }
}
