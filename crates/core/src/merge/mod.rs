//! Merge engine: joins domain configurations with certificate fetch results
//! by LDAP server URL.
//!
//! The engine is two pure steps. [`CertificateIndex::build`] groups
//! non-empty certificate payloads by URL, then [`reconcile`] copies the
//! domain list and replaces each server's certificates with its index
//! entry. Neither step performs I/O or can fail; file handling lives in
//! [`io`].

pub mod index;
pub mod io;
pub mod reconcile;

pub use index::{CertificateIndex, CertificateMatch};
pub use io::{load_domains, load_response, merge_files, to_json, write_json};
pub use reconcile::{count_certificates, merge, reconcile};
