//! Certificate index: server URL to the ordered PEM payloads fetched for it.

use std::collections::HashMap;

use crate::models::{CertificateMatchItem, CertificateResponse, CertificateResult};

/// A record that pairs a server URL with a fetched certificate.
pub trait CertificateMatch {
    /// The LDAP server URL the certificate was fetched for.
    fn match_url(&self) -> &str;

    /// The PEM payload; empty when nothing was obtained.
    fn pem_encoded(&self) -> &str;
}

impl CertificateMatch for CertificateMatchItem {
    fn match_url(&self) -> &str {
        &self.match_url
    }

    fn pem_encoded(&self) -> &str {
        &self.pem_encoded
    }
}

impl CertificateMatch for CertificateResult {
    fn match_url(&self) -> &str {
        &self.item.url
    }

    fn pem_encoded(&self) -> &str {
        &self.json.pem_encoded
    }
}

impl<T: CertificateMatch + ?Sized> CertificateMatch for &T {
    fn match_url(&self) -> &str {
        (**self).match_url()
    }

    fn pem_encoded(&self) -> &str {
        (**self).pem_encoded()
    }
}

/// Lookup from server URL to certificates, in input order per URL.
///
/// Only non-empty payloads are stored, so a URL whose fetches all failed is
/// absent rather than mapped to an empty list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CertificateIndex {
    by_url: HashMap<String, Vec<String>>,
}

impl CertificateIndex {
    /// Build an index from match records. Records with an empty URL or an
    /// empty payload are skipped.
    pub fn build<I>(items: I) -> Self
    where
        I: IntoIterator,
        I::Item: CertificateMatch,
    {
        let mut by_url: HashMap<String, Vec<String>> = HashMap::new();
        for item in items {
            let url = item.match_url();
            let pem = item.pem_encoded();
            if url.is_empty() || pem.is_empty() {
                continue;
            }
            by_url
                .entry(url.to_string())
                .or_default()
                .push(pem.to_string());
        }
        Self { by_url }
    }

    pub fn from_response(response: &CertificateResponse) -> Self {
        Self::build(&response.results)
    }

    /// Certificates for a URL, matched byte-for-byte.
    pub fn get(&self, url: &str) -> Option<&[String]> {
        self.by_url.get(url).map(Vec::as_slice)
    }

    pub fn contains(&self, url: &str) -> bool {
        self.by_url.contains_key(url)
    }

    /// Number of distinct URLs with at least one certificate.
    pub fn len(&self) -> usize {
        self.by_url.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_url.is_empty()
    }

    /// Total number of certificates across all URLs.
    pub fn certificate_count(&self) -> usize {
        self.by_url.values().map(Vec::len).sum()
    }
}
