//! Attach indexed certificates to the LDAP servers of a domain list.

use crate::models::{CertificateResponse, Domain, LdapServer};

use super::index::CertificateIndex;

/// Produce a copy of `domains` with every server's certificates replaced by
/// the index entry for its URL.
///
/// Servers without an entry come out with no certificates, even if the input
/// carried some. Domain and server order are preserved.
pub fn reconcile(domains: &[Domain], index: &CertificateIndex) -> Vec<Domain> {
    domains
        .iter()
        .map(|domain| Domain {
            id: domain.id.clone(),
            domain_name: domain.domain_name.clone(),
            base_dn: domain.base_dn.clone(),
            alternative_domain_names: domain.alternative_domain_names.clone(),
            servers: domain
                .servers
                .iter()
                .map(|server| reconcile_server(server, index))
                .collect(),
        })
        .collect()
}

fn reconcile_server(server: &LdapServer, index: &CertificateIndex) -> LdapServer {
    let certificates = index
        .get(&server.url)
        .map(<[String]>::to_vec)
        .unwrap_or_default();

    LdapServer {
        url: server.url.clone(),
        use_starttls: server.use_starttls.clone(),
        enabled: server.enabled.clone(),
        bind_username: server.bind_username.clone(),
        bind_password: server.bind_password.clone(),
        certificates,
    }
}

/// Index `response` and reconcile `domains` against it.
pub fn merge(domains: &[Domain], response: &CertificateResponse) -> Vec<Domain> {
    let index = CertificateIndex::from_response(response);
    reconcile(domains, &index)
}

/// Total number of certificates attached across all servers.
pub fn count_certificates(domains: &[Domain]) -> usize {
    domains
        .iter()
        .flat_map(|d| d.servers.iter())
        .map(|s| s.certificates.len())
        .sum()
}
