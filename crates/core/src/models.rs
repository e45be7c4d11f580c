//! Domain model types used throughout ldapmerge.
//!
//! These types bridge the merge engine, the history store, the NSX client
//! and the web API. Field names on the wire are fixed: inputs come from
//! files written by other tools (NSX exports, Ansible runs) and outputs are
//! fed back to them.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize, Serializer};

// ---------------------------------------------------------------------------
// Flag values
// ---------------------------------------------------------------------------

/// A tri-state boolean carried as text (`"true"`, `"false"` or unset).
///
/// The merge engine never interprets these values; they are stored and
/// forwarded exactly as received so that `"True"` does not come back out as
/// `"true"`. Only the NSX converter looks inside, via [`FlagValue::as_bool`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct FlagValue(String);

impl FlagValue {
    /// The unset value.
    pub fn unset() -> Self {
        Self(String::new())
    }

    /// Canonical text for a native boolean.
    pub fn from_bool(value: bool) -> Self {
        Self(if value { "true" } else { "false" }.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_unset(&self) -> bool {
        self.0.is_empty()
    }

    /// Interpret the text as a boolean. Returns `None` when unset or when the
    /// text is not one of the accepted spellings.
    pub fn as_bool(&self) -> Option<bool> {
        match self.0.as_str() {
            "1" | "t" | "T" | "true" | "TRUE" | "True" => Some(true),
            "0" | "f" | "F" | "false" | "FALSE" | "False" => Some(false),
            _ => None,
        }
    }
}

impl From<&str> for FlagValue {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for FlagValue {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for FlagValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for FlagValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for FlagValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct FlagVisitor;

        impl<'de> Visitor<'de> for FlagVisitor {
            type Value = FlagValue;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a string, a boolean or null")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<FlagValue, E> {
                Ok(FlagValue::from(v))
            }

            fn visit_string<E: de::Error>(self, v: String) -> Result<FlagValue, E> {
                Ok(FlagValue::from(v))
            }

            fn visit_bool<E: de::Error>(self, v: bool) -> Result<FlagValue, E> {
                Ok(FlagValue::from_bool(v))
            }

            fn visit_unit<E: de::Error>(self) -> Result<FlagValue, E> {
                Ok(FlagValue::unset())
            }

            fn visit_none<E: de::Error>(self) -> Result<FlagValue, E> {
                Ok(FlagValue::unset())
            }
        }

        deserializer.deserialize_any(FlagVisitor)
    }
}

/// Treat an explicit JSON `null` the same as a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

// ---------------------------------------------------------------------------
// Domains and LDAP servers
// ---------------------------------------------------------------------------

/// One LDAP endpoint within a domain.
///
/// `url` is the merge key; every other field is passenger data.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LdapServer {
    #[serde(default)]
    pub url: String,

    #[serde(rename = "starttls", default)]
    pub use_starttls: FlagValue,

    #[serde(default)]
    pub enabled: FlagValue,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bind_username: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bind_password: Option<String>,

    /// PEM-encoded certificates, opaque to ldapmerge.
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub certificates: Vec<String>,
}

impl LdapServer {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }
}

/// A named LDAP identity source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Domain {
    #[serde(default)]
    pub id: String,

    #[serde(default)]
    pub domain_name: String,

    #[serde(default)]
    pub base_dn: String,

    #[serde(default, deserialize_with = "null_as_default")]
    pub alternative_domain_names: Vec<String>,

    #[serde(rename = "ldap_servers", default, deserialize_with = "null_as_default")]
    pub servers: Vec<LdapServer>,
}

// ---------------------------------------------------------------------------
// Certificate fetch results
// ---------------------------------------------------------------------------

/// Subject information attached to a fetched certificate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateDetail {
    #[serde(default)]
    pub subject_cn: String,
}

/// Certificate payload of one Ansible loop result.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateJson {
    #[serde(default)]
    pub pem_encoded: String,

    #[serde(default, deserialize_with = "null_as_default")]
    pub details: Vec<CertificateDetail>,
}

/// The loop item an Ansible result was produced for.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseItem {
    #[serde(default)]
    pub url: String,

    #[serde(rename = "starttls", default)]
    pub use_starttls: FlagValue,

    #[serde(default)]
    pub enabled: FlagValue,
}

/// One result of the certificate-fetch run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateResult {
    #[serde(default)]
    pub json: CertificateJson,

    #[serde(default)]
    pub item: ResponseItem,

    #[serde(default)]
    pub ansible_loop_var: String,
}

/// The full certificate-fetch response document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateResponse {
    #[serde(default, deserialize_with = "null_as_default")]
    pub results: Vec<CertificateResult>,
}

impl CertificateResponse {
    /// Flatten the response into match items.
    pub fn match_items(&self) -> Vec<CertificateMatchItem> {
        self.results.iter().map(CertificateMatchItem::from).collect()
    }
}

/// A single certificate fetch result keyed by server URL.
///
/// An empty `pem_encoded` means no certificate was obtained.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateMatchItem {
    pub match_url: String,
    pub pem_encoded: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<CertificateDetail>,
}

impl CertificateMatchItem {
    pub fn new(match_url: impl Into<String>, pem_encoded: impl Into<String>) -> Self {
        Self {
            match_url: match_url.into(),
            pem_encoded: pem_encoded.into(),
            details: Vec::new(),
        }
    }
}

impl From<&CertificateResult> for CertificateMatchItem {
    fn from(result: &CertificateResult) -> Self {
        Self {
            match_url: result.item.url.clone(),
            pem_encoded: result.json.pem_encoded.clone(),
            details: result.json.details.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Merge request (HTTP body)
// ---------------------------------------------------------------------------

/// Request body of the merge endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MergeRequest {
    #[serde(default, deserialize_with = "null_as_default")]
    pub initial: Vec<Domain>,

    #[serde(default)]
    pub response: CertificateResponse,
}

// ---------------------------------------------------------------------------
// History
// ---------------------------------------------------------------------------

/// A recorded merge: both inputs and the result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: i64,
    pub created_at: DateTime<Utc>,
    pub initial: Vec<Domain>,
    pub response: CertificateResponse,
    pub result: Vec<Domain>,
}

// ---------------------------------------------------------------------------
// Connection profiles
// ---------------------------------------------------------------------------

/// Saved NSX Manager connection parameters.
///
/// The password is write-only: it is accepted on input but never serialized.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConnectionProfile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,

    pub name: String,

    #[serde(default)]
    pub description: String,

    pub host: String,

    pub username: String,

    #[serde(default, skip_serializing)]
    pub password: Option<String>,

    #[serde(default)]
    pub insecure: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}
