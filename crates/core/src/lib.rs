//! ldapmerge core library.
//!
//! This crate provides the components for merging LDAP identity-source
//! configurations with SSL certificates: the data model, the merge engine,
//! SQLite persistence for history and connection profiles, the NSX Manager
//! API client, and the pull → merge → push pipeline.

pub mod config;
pub mod db;
pub mod errors;
pub mod merge;
pub mod models;
pub mod nsx;
pub mod sync;
pub mod version;

// Re-exports for convenience.
pub use config::AppConfig;
pub use db::Database;
pub use merge::{merge, reconcile, CertificateIndex};
pub use models::{CertificateMatchItem, CertificateResponse, Domain, FlagValue, LdapServer};
pub use nsx::{NsxClient, NsxClientConfig};
pub use sync::{push_domains, PushReport, SyncPipeline};
