//! Conversion between ldapmerge domains and NSX identity sources.
//!
//! This is the only place where the textual `starttls`/`enabled` flags are
//! interpreted. Values that do not parse as a boolean become `false`.

use super::types::{LdapIdentitySource, NsxLdapServer};
use crate::models::{Domain, FlagValue, LdapServer};

const RESOURCE_TYPE: &str = "LdapIdentitySource";

pub fn domain_to_source(domain: &Domain) -> LdapIdentitySource {
    LdapIdentitySource {
        id: domain.id.clone(),
        display_name: domain.domain_name.clone(),
        resource_type: RESOURCE_TYPE.to_string(),
        domain_name: domain.domain_name.clone(),
        base_dn: domain.base_dn.clone(),
        alternative_domain_names: domain.alternative_domain_names.clone(),
        ldap_servers: domain.servers.iter().map(server_to_nsx).collect(),
        ..LdapIdentitySource::default()
    }
}

fn server_to_nsx(server: &LdapServer) -> NsxLdapServer {
    NsxLdapServer {
        url: server.url.clone(),
        use_starttls: server.use_starttls.as_bool().unwrap_or(false),
        enabled: server.enabled.as_bool().unwrap_or(false),
        bind_identity: server.bind_username.clone().unwrap_or_default(),
        password: server.bind_password.clone().unwrap_or_default(),
        certificates: server.certificates.clone(),
    }
}

pub fn source_to_domain(source: &LdapIdentitySource) -> Domain {
    Domain {
        id: source.id.clone(),
        domain_name: source.domain_name.clone(),
        base_dn: source.base_dn.clone(),
        alternative_domain_names: source.alternative_domain_names.clone(),
        servers: source.ldap_servers.iter().map(server_from_nsx).collect(),
    }
}

fn server_from_nsx(server: &NsxLdapServer) -> LdapServer {
    LdapServer {
        url: server.url.clone(),
        use_starttls: FlagValue::from_bool(server.use_starttls),
        enabled: FlagValue::from_bool(server.enabled),
        bind_username: non_empty(&server.bind_identity),
        bind_password: non_empty(&server.password),
        certificates: server.certificates.clone(),
    }
}

fn non_empty(s: &str) -> Option<String> {
    (!s.is_empty()).then(|| s.to_string())
}

pub fn domains_to_sources(domains: &[Domain]) -> Vec<LdapIdentitySource> {
    domains.iter().map(domain_to_source).collect()
}

pub fn sources_to_domains(sources: &[LdapIdentitySource]) -> Vec<Domain> {
    sources.iter().map(source_to_domain).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn domain() -> Domain {
        Domain {
            id: "example.lab".into(),
            domain_name: "example.lab".into(),
            base_dn: "DC=example,DC=lab".into(),
            alternative_domain_names: vec!["EXAMPLE".into()],
            servers: vec![LdapServer {
                url: "ldaps://dc1.example.lab:636".into(),
                use_starttls: FlagValue::from("False"),
                enabled: FlagValue::from("1"),
                bind_username: Some("svc@example.lab".into()),
                bind_password: Some("pw".into()),
                certificates: vec!["CERT".into()],
            }],
        }
    }

    #[test]
    fn test_domain_to_source() {
        let source = domain_to_source(&domain());
        assert_eq!(source.id, "example.lab");
        assert_eq!(source.display_name, "example.lab");
        assert_eq!(source.resource_type, "LdapIdentitySource");
        let server = &source.ldap_servers[0];
        assert!(!server.use_starttls);
        assert!(server.enabled);
        assert_eq!(server.bind_identity, "svc@example.lab");
        assert_eq!(server.password, "pw");
        assert_eq!(server.certificates, vec!["CERT"]);
    }

    #[test]
    fn test_unparsable_flag_is_false() {
        let mut d = domain();
        d.servers[0].enabled = FlagValue::from("yes");
        d.servers[0].use_starttls = FlagValue::unset();
        let source = domain_to_source(&d);
        assert!(!source.ldap_servers[0].enabled);
        assert!(!source.ldap_servers[0].use_starttls);
    }

    #[test]
    fn test_source_to_domain_formats_flags() {
        let back = source_to_domain(&domain_to_source(&domain()));
        let server = &back.servers[0];
        assert_eq!(server.use_starttls.as_str(), "false");
        assert_eq!(server.enabled.as_str(), "true");
        assert_eq!(server.bind_username.as_deref(), Some("svc@example.lab"));
        assert_eq!(back.alternative_domain_names, vec!["EXAMPLE"]);
    }

    #[test]
    fn test_empty_bind_fields_become_none() {
        let source = LdapIdentitySource {
            id: "x".into(),
            ldap_servers: vec![NsxLdapServer {
                url: "ldap://x:389".into(),
                ..Default::default()
            }],
            ..Default::default()
        };
        let d = source_to_domain(&source);
        assert!(d.servers[0].bind_username.is_none());
        assert!(d.servers[0].bind_password.is_none());
    }
}
