//! Pull → merge → push pipeline against an NSX Manager.
//!
//! [`SyncPipeline::run`] pulls the current identity sources, merges them with
//! certificates (from a loaded response or fetched live through NSX), and
//! unless running dry pushes every merged domain back. A failed pull aborts
//! the run; a failed push is recorded in the [`PushReport`] and the
//! remaining domains are still attempted.

use std::collections::HashSet;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::errors::SyncError;
use crate::merge::{count_certificates, reconcile, CertificateIndex};
use crate::models::{CertificateMatchItem, CertificateResponse, Domain};
use crate::nsx::{convert, NsxClient};

// ---------------------------------------------------------------------------
// Push
// ---------------------------------------------------------------------------

/// Result of pushing one domain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PushOutcome {
    pub source_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PushOutcome {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Per-domain results of a push, in input order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PushReport {
    pub outcomes: Vec<PushOutcome>,
}

impl PushReport {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }

    pub fn is_success(&self) -> bool {
        self.failed() == 0
    }
}

/// PUT every domain to NSX. Every domain is attempted regardless of earlier
/// failures.
pub async fn push_domains(client: &NsxClient, domains: &[Domain]) -> PushReport {
    push_domains_with(client, domains, |_| {}).await
}

async fn push_domains_with<F>(client: &NsxClient, domains: &[Domain], mut on_outcome: F) -> PushReport
where
    F: FnMut(&PushOutcome),
{
    let mut report = PushReport::default();
    for domain in domains {
        let source = convert::domain_to_source(domain);
        let outcome = match client.put_source(&source).await {
            Ok(_) => {
                info!(id = %source.id, "pushed identity source");
                PushOutcome {
                    source_id: source.id,
                    error: None,
                }
            }
            Err(e) => {
                warn!(id = %source.id, error = %e, "failed to push identity source");
                PushOutcome {
                    source_id: source.id,
                    error: Some(e.to_string()),
                }
            }
        };
        on_outcome(&outcome);
        report.outcomes.push(outcome);
    }
    report
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// Where the certificates for a sync come from.
#[derive(Debug, Clone)]
pub enum CertificateSource {
    /// A previously captured certificate-fetch response.
    Response(CertificateResponse),
    /// Ask NSX to fetch the certificate of every pulled server URL.
    Fetch,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SyncOptions {
    /// Stop after merging; nothing is pushed.
    pub dry_run: bool,
}

/// Outcome of a pipeline run.
#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    /// Number of identity sources pulled.
    pub pulled: usize,
    /// The merged domains, pushed unless dry-running.
    pub merged: Vec<Domain>,
    /// Certificates attached across all merged servers.
    pub certificates: usize,
    /// `None` on a dry run.
    pub push: Option<PushReport>,
}

impl SyncReport {
    pub fn is_success(&self) -> bool {
        self.push.as_ref().map_or(true, PushReport::is_success)
    }
}

/// Progress notifications emitted while a pipeline runs.
#[derive(Debug)]
pub enum SyncEvent<'a> {
    Pulled { count: usize },
    CertificateFetched { url: &'a str, found: bool },
    Merged { domains: &'a [Domain], certificates: usize },
    PushSkipped,
    PushStarted { count: usize },
    Pushed(&'a PushOutcome),
}

pub struct SyncPipeline<'a> {
    client: &'a NsxClient,
    certificates: CertificateSource,
    options: SyncOptions,
}

impl<'a> SyncPipeline<'a> {
    pub fn new(client: &'a NsxClient, certificates: CertificateSource, options: SyncOptions) -> Self {
        Self {
            client,
            certificates,
            options,
        }
    }

    pub async fn run(&self) -> Result<SyncReport, SyncError> {
        self.run_with(|_| {}).await
    }

    /// Run the pipeline, reporting progress to `on_event`.
    pub async fn run_with<F>(&self, mut on_event: F) -> Result<SyncReport, SyncError>
    where
        F: FnMut(SyncEvent<'_>),
    {
        info!(dry_run = self.options.dry_run, "starting sync");

        let list = self.client.list_sources().await.map_err(SyncError::Pull)?;
        let initial = convert::sources_to_domains(&list.results);
        on_event(SyncEvent::Pulled {
            count: initial.len(),
        });

        let index = match &self.certificates {
            CertificateSource::Response(response) => CertificateIndex::from_response(response),
            CertificateSource::Fetch => {
                let items = self.fetch_certificates(&initial, &mut on_event).await;
                CertificateIndex::build(&items)
            }
        };

        let merged = reconcile(&initial, &index);
        let certificates = count_certificates(&merged);
        info!(domains = merged.len(), certificates, "merged certificates");
        on_event(SyncEvent::Merged {
            domains: &merged,
            certificates,
        });

        let push = if self.options.dry_run {
            on_event(SyncEvent::PushSkipped);
            None
        } else {
            on_event(SyncEvent::PushStarted {
                count: merged.len(),
            });
            let report = push_domains_with(self.client, &merged, |outcome| {
                on_event(SyncEvent::Pushed(outcome))
            })
            .await;
            info!(
                succeeded = report.succeeded(),
                failed = report.failed(),
                "push finished"
            );
            Some(report)
        };

        Ok(SyncReport {
            pulled: initial.len(),
            merged,
            certificates,
            push,
        })
    }

    /// Fetch the certificate of every distinct server URL. Failures count
    /// as "no certificate".
    async fn fetch_certificates<F>(&self, domains: &[Domain], on_event: &mut F) -> Vec<CertificateMatchItem>
    where
        F: FnMut(SyncEvent<'_>),
    {
        let mut seen = HashSet::new();
        let mut items = Vec::new();
        for server in domains.iter().flat_map(|d| d.servers.iter()) {
            if server.url.is_empty() || !seen.insert(server.url.as_str()) {
                continue;
            }
            let item = match self.client.fetch_certificate(&server.url).await {
                Ok(result) => {
                    debug!(url = %server.url, found = !result.pem_encoded.is_empty(), "fetched certificate");
                    CertificateMatchItem::new(&server.url, result.pem_encoded)
                }
                Err(e) => {
                    warn!(url = %server.url, error = %e, "certificate fetch failed");
                    CertificateMatchItem::new(&server.url, "")
                }
            };
            on_event(SyncEvent::CertificateFetched {
                url: &server.url,
                found: !item.pem_encoded.is_empty(),
            });
            items.push(item);
        }
        items
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_report_counts() {
        let report = PushReport {
            outcomes: vec![
                PushOutcome {
                    source_id: "a".into(),
                    error: None,
                },
                PushOutcome {
                    source_id: "b".into(),
                    error: Some("NSX API error 400: bad".into()),
                },
                PushOutcome {
                    source_id: "c".into(),
                    error: None,
                },
            ],
        };
        assert_eq!(report.succeeded(), 2);
        assert_eq!(report.failed(), 1);
        assert!(!report.is_success());
        assert!(PushReport::default().is_success());
    }

    #[test]
    fn test_dry_run_report_is_success() {
        let report = SyncReport {
            pulled: 1,
            merged: Vec::new(),
            certificates: 0,
            push: None,
        };
        assert!(report.is_success());
    }
}
