//! Wire types of the NSX Manager LDAP identity-source API.

use serde::{Deserialize, Serialize};

/// An LDAP identity source as NSX stores it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LdapIdentitySource {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub display_name: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub resource_type: String,

    #[serde(default)]
    pub domain_name: String,

    #[serde(default)]
    pub base_dn: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub alternative_domain_names: Vec<String>,

    #[serde(default)]
    pub ldap_servers: Vec<NsxLdapServer>,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub path: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub realization_id: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub relative_path: String,
}

/// One LDAP server inside an NSX identity source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NsxLdapServer {
    pub url: String,

    #[serde(default)]
    pub use_starttls: bool,

    #[serde(default)]
    pub enabled: bool,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub bind_identity: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub password: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub certificates: Vec<String>,
}

/// Response of the list endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LdapIdentitySourceList {
    #[serde(default)]
    pub results: Vec<LdapIdentitySource>,

    #[serde(default)]
    pub result_count: i64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,
}

/// Result of any of the probe actions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProbeResult {
    #[serde(default)]
    pub results: Vec<ProbeResultItem>,
}

impl ProbeResult {
    pub fn all_succeeded(&self) -> bool {
        self.results.iter().all(|r| r.success)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProbeResultItem {
    #[serde(default)]
    pub ldap_server_url: String,

    #[serde(default)]
    pub success: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct FetchCertificateRequest<'a> {
    pub ldap_server_url: &'a str,
}

/// Certificate presented by an LDAP server, as fetched by NSX.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FetchCertificateResult {
    #[serde(default)]
    pub pem_encoded: String,

    #[serde(default)]
    pub details: Vec<NsxCertificateDetail>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NsxCertificateDetail {
    #[serde(default)]
    pub subject_cn: String,
    #[serde(default)]
    pub subject_dn: String,
    #[serde(default)]
    pub issuer_cn: String,
    #[serde(default)]
    pub issuer_dn: String,
    #[serde(default)]
    pub not_before: String,
    #[serde(default)]
    pub not_after: String,
    #[serde(default)]
    pub serial_number: String,
    #[serde(default)]
    pub signature_algorithm: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct SearchRequest<'a> {
    pub filter_value: &'a str,
}

/// Users and groups matched by a directory search.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchResult {
    #[serde(default)]
    pub results: Vec<SearchResultItem>,

    #[serde(default)]
    pub result_count: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchResultItem {
    #[serde(default)]
    pub dn: String,

    #[serde(default)]
    pub name: String,

    /// `user` or `group`.
    #[serde(rename = "type", default)]
    pub kind: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// Error body returned by NSX on failure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub http_status: u16,

    #[serde(default)]
    pub error_code: i64,

    #[serde(default)]
    pub module_name: String,

    #[serde(default)]
    pub error_message: String,
}
