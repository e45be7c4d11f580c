//! NSX Manager REST API client for LDAP identity sources.

use std::fmt;
use std::time::Duration;

use reqwest::header::ACCEPT;
use reqwest::{Method, RequestBuilder, StatusCode, Url};
use serde::de::DeserializeOwned;
use tracing::{debug, info, instrument};

use super::types::{
    ApiErrorBody, FetchCertificateRequest, FetchCertificateResult, LdapIdentitySource,
    LdapIdentitySourceList, ProbeResult, SearchRequest, SearchResult,
};
use crate::errors::NsxError;

/// Path of the identity-source collection.
const SOURCES_PATH: [&str; 5] = ["policy", "api", "v1", "aaa", "ldap-identity-sources"];

/// Default request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Connection parameters for [`NsxClient`].
#[derive(Clone)]
pub struct NsxClientConfig {
    /// Base URL. `https://` is assumed when no scheme is given.
    pub host: String,
    pub username: String,
    pub password: String,
    /// Skip TLS certificate verification (self-signed managers).
    pub insecure: bool,
    pub timeout: Duration,
}

impl NsxClientConfig {
    pub fn new(
        host: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            username: username.into(),
            password: password.into(),
            insecure: false,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl fmt::Debug for NsxClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NsxClientConfig")
            .field("host", &self.host)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("insecure", &self.insecure)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Asynchronous NSX Manager API client using HTTP basic auth.
#[derive(Clone)]
pub struct NsxClient {
    http: reqwest::Client,
    base_url: Url,
    username: String,
    password: String,
}

impl NsxClient {
    pub fn new(config: NsxClientConfig) -> Result<Self, NsxError> {
        let base_url = parse_base_url(&config.host)?;
        let timeout = if config.timeout.is_zero() {
            DEFAULT_TIMEOUT
        } else {
            config.timeout
        };
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .danger_accept_invalid_certs(config.insecure)
            .build()?;
        info!(base_url = %base_url, insecure = config.insecure, "created NsxClient");
        Ok(Self {
            http,
            base_url,
            username: config.username,
            password: config.password,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    // -- identity sources ---------------------------------------------------

    /// `GET /policy/api/v1/aaa/ldap-identity-sources`
    #[instrument(skip(self))]
    pub async fn list_sources(&self) -> Result<LdapIdentitySourceList, NsxError> {
        let url = self.sources_url(&[])?;
        let body = self.execute(self.request(Method::GET, url)).await?;
        let list: LdapIdentitySourceList = parse(&body)?;
        debug!(count = list.results.len(), "listed identity sources");
        Ok(list)
    }

    /// `GET /policy/api/v1/aaa/ldap-identity-sources/{id}`
    #[instrument(skip(self))]
    pub async fn get_source(&self, id: &str) -> Result<LdapIdentitySource, NsxError> {
        let url = self.sources_url(&[id])?;
        let body = self.execute(self.request(Method::GET, url)).await?;
        parse(&body)
    }

    /// `PATCH /policy/api/v1/aaa/ldap-identity-sources/{id}`: create or
    /// partially update.
    #[instrument(skip(self, source), fields(id = %source.id))]
    pub async fn patch_source(
        &self,
        source: &LdapIdentitySource,
    ) -> Result<LdapIdentitySource, NsxError> {
        let url = self.sources_url(&[&source.id])?;
        let body = self
            .execute(self.request(Method::PATCH, url).json(source))
            .await?;
        // NSX answers a PATCH with an empty body.
        if body.trim().is_empty() {
            return Ok(source.clone());
        }
        parse(&body)
    }

    /// `PUT /policy/api/v1/aaa/ldap-identity-sources/{id}`: create or
    /// replace.
    #[instrument(skip(self, source), fields(id = %source.id))]
    pub async fn put_source(
        &self,
        source: &LdapIdentitySource,
    ) -> Result<LdapIdentitySource, NsxError> {
        let url = self.sources_url(&[&source.id])?;
        let body = self
            .execute(self.request(Method::PUT, url).json(source))
            .await?;
        if body.trim().is_empty() {
            return Ok(source.clone());
        }
        parse(&body)
    }

    /// `DELETE /policy/api/v1/aaa/ldap-identity-sources/{id}`
    #[instrument(skip(self))]
    pub async fn delete_source(&self, id: &str) -> Result<(), NsxError> {
        let url = self.sources_url(&[id])?;
        self.execute(self.request(Method::DELETE, url)).await?;
        info!(id, "deleted identity source");
        Ok(())
    }

    // -- actions ------------------------------------------------------------

    /// Test connectivity to the servers of an unsaved source.
    #[instrument(skip(self, source), fields(id = %source.id))]
    pub async fn probe_ldap_server(
        &self,
        source: &LdapIdentitySource,
    ) -> Result<ProbeResult, NsxError> {
        self.collection_action("probe_ldap_server", source).await
    }

    /// Verify a full identity-source definition before creating it.
    #[instrument(skip(self, source), fields(id = %source.id))]
    pub async fn probe_identity_source(
        &self,
        source: &LdapIdentitySource,
    ) -> Result<ProbeResult, NsxError> {
        self.collection_action("probe_identity_source", source).await
    }

    /// Ask NSX to fetch the certificate an LDAP server presents.
    #[instrument(skip(self))]
    pub async fn fetch_certificate(
        &self,
        ldap_server_url: &str,
    ) -> Result<FetchCertificateResult, NsxError> {
        self.collection_action("fetch_certificate", &FetchCertificateRequest { ldap_server_url })
            .await
    }

    /// `POST /policy/api/v1/aaa/ldap-identity-sources/{id}?action=probe`
    #[instrument(skip(self))]
    pub async fn probe_source(&self, id: &str) -> Result<ProbeResult, NsxError> {
        let mut url = self.sources_url(&[id])?;
        url.set_query(Some("action=probe"));
        let body = self.execute(self.request(Method::POST, url)).await?;
        parse(&body)
    }

    /// `POST /policy/api/v1/aaa/ldap-identity-sources/{id}/search`
    #[instrument(skip(self))]
    pub async fn search(&self, id: &str, filter_value: &str) -> Result<SearchResult, NsxError> {
        let url = self.sources_url(&[id, "search"])?;
        let body = self
            .execute(
                self.request(Method::POST, url)
                    .json(&SearchRequest { filter_value }),
            )
            .await?;
        parse(&body)
    }

    // -- plumbing -----------------------------------------------------------

    async fn collection_action<B, T>(&self, action: &str, payload: &B) -> Result<T, NsxError>
    where
        B: serde::Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let mut url = self.sources_url(&[])?;
        url.query_pairs_mut().append_pair("action", action);
        let body = self
            .execute(self.request(Method::POST, url).json(payload))
            .await?;
        parse(&body)
    }

    /// Collection URL with `segments` appended, each percent-encoded.
    fn sources_url(&self, segments: &[&str]) -> Result<Url, NsxError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| NsxError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(SOURCES_PATH)
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.http
            .request(method, url)
            .basic_auth(&self.username, Some(&self.password))
            .header(ACCEPT, "application/json")
    }

    async fn execute(&self, request: RequestBuilder) -> Result<String, NsxError> {
        let resp = request.send().await?;
        let status = resp.status();
        let body = resp.text().await?;
        if status.is_success() {
            return Ok(body);
        }
        Err(error_from_response(status, &body))
    }
}

fn parse_base_url(host: &str) -> Result<Url, NsxError> {
    let host = host.trim().trim_end_matches('/');
    if host.is_empty() {
        return Err(NsxError::InvalidUrl(String::new()));
    }
    let with_scheme = if host.contains("://") {
        host.to_string()
    } else {
        format!("https://{host}")
    };
    let url = Url::parse(&with_scheme).map_err(|_| NsxError::InvalidUrl(host.to_string()))?;
    if url.cannot_be_a_base() {
        return Err(NsxError::InvalidUrl(host.to_string()));
    }
    Ok(url)
}

fn parse<T: DeserializeOwned>(body: &str) -> Result<T, NsxError> {
    serde_json::from_str(body).map_err(|e| NsxError::ParseError(e.to_string()))
}

/// Map a non-success response to an error, preferring the structured NSX
/// error body when one is present.
fn error_from_response(status: StatusCode, body: &str) -> NsxError {
    let code = status.as_u16();
    let api: Option<ApiErrorBody> = serde_json::from_str::<ApiErrorBody>(body)
        .ok()
        .filter(|e| !e.error_message.is_empty());

    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        let message = api
            .map(|e| e.error_message)
            .unwrap_or_else(|| status.canonical_reason().unwrap_or("unauthorized").to_string());
        return NsxError::Unauthorized {
            status: code,
            message,
        };
    }

    match api {
        Some(e) => NsxError::Api {
            status: code,
            code: e.error_code,
            module: e.module_name,
            message: e.error_message,
        },
        None => NsxError::Status {
            status: code,
            body: body.trim().to_string(),
        },
    }
}
