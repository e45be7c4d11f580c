//! VMware NSX Manager integration: API client, wire types and conversion
//! to and from the ldapmerge domain model.

pub mod client;
pub mod convert;
pub mod types;

pub use client::{NsxClient, NsxClientConfig, DEFAULT_TIMEOUT};
pub use convert::{domain_to_source, domains_to_sources, source_to_domain, sources_to_domains};
pub use types::{
    FetchCertificateResult, LdapIdentitySource, LdapIdentitySourceList, NsxLdapServer,
    ProbeResult, SearchResult,
};
