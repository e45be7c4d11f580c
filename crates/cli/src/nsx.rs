//! `ldapmerge sync` and the `ldapmerge nsx ...` subcommands.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Args, Subcommand};
use tracing::info;

use ldapmerge_core::config::AppConfig;
use ldapmerge_core::merge::{load_domains, load_response, to_json, write_json};
use ldapmerge_core::nsx::convert;
use ldapmerge_core::sync::{CertificateSource, PushReport, SyncEvent, SyncOptions};
use ldapmerge_core::{push_domains, SyncPipeline};

use crate::connection::ConnectionArgs;
use crate::style;

// ---------------------------------------------------------------------------
// Arguments
// ---------------------------------------------------------------------------

#[derive(Args, Debug)]
pub struct SyncArgs {
    #[command(flatten)]
    pub connection: ConnectionArgs,

    /// Certificate response JSON file (e.g. from Ansible).
    #[arg(
        short,
        long,
        required_unless_present = "fetch_certs",
        conflicts_with = "fetch_certs"
    )]
    pub response: Option<PathBuf>,

    /// Ask NSX to fetch the certificate of every LDAP server instead.
    #[arg(long)]
    pub fetch_certs: bool,

    /// Save the merged result to a file.
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Pull and merge, but do not push to NSX.
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Subcommand, Debug)]
pub enum NsxAction {
    /// Fetch all LDAP identity sources as domains.
    Pull,
    /// Update identity sources from a domains JSON file.
    Push {
        /// Merged domains JSON file.
        #[arg(short, long)]
        file: PathBuf,
    },
    /// Show one identity source.
    Get { id: String },
    /// Delete an identity source.
    Delete { id: String },
    /// Test connectivity of a saved identity source.
    Probe { id: String },
    /// Fetch the certificate an LDAP server presents.
    FetchCert { url: String },
    /// Search users and groups in an identity source.
    Search { id: String, filter: String },
}

// ---------------------------------------------------------------------------
// sync
// ---------------------------------------------------------------------------

pub async fn cmd_sync(args: SyncArgs, config: &AppConfig) -> Result<()> {
    let client = args.connection.client(config)?;

    let certificates = match &args.response {
        Some(path) => CertificateSource::Response(
            load_response(path).context("failed to load response file")?,
        ),
        None => CertificateSource::Fetch,
    };
    let pipeline = SyncPipeline::new(
        &client,
        certificates,
        SyncOptions {
            dry_run: args.dry_run,
        },
    );

    println!("{}", style::step(1, 3, "Pulling current configuration from NSX..."));

    let output = args.output.as_deref();
    let mut save_error = None;
    let report = pipeline
        .run_with(|event| match event {
            SyncEvent::Pulled { count } => {
                println!("  {}", style::success(&format!("Fetched {count} LDAP identity sources")));
                println!("{}", style::step(2, 3, "Merging with certificate data..."));
            }
            SyncEvent::CertificateFetched { url, found } => {
                if found {
                    println!("  {}", style::success(url));
                } else {
                    println!("  {}", style::dim(&format!("- {url} (no certificate)")));
                }
            }
            SyncEvent::Merged {
                domains,
                certificates,
            } => {
                println!(
                    "  {}",
                    style::success(&format!(
                        "Merged {} domains, {certificates} certificates attached",
                        domains.len()
                    ))
                );
                if let Some(path) = output {
                    match write_json(path, domains, true) {
                        Ok(()) => println!(
                            "  {}",
                            style::success(&format!("Saved result to {}", path.display()))
                        ),
                        Err(e) => {
                            println!("  {}", style::error(&format!("{e}")));
                            save_error = Some(e);
                        }
                    }
                }
            }
            SyncEvent::PushSkipped => {
                println!("{}", style::step(3, 3, "Skipped (dry-run mode)"));
            }
            SyncEvent::PushStarted { .. } => {
                println!("{}", style::step(3, 3, "Pushing configuration to NSX..."));
            }
            SyncEvent::Pushed(outcome) => match &outcome.error {
                None => println!("  {}", style::success(&outcome.source_id)),
                Some(e) => println!("  {}", style::error(&format!("{}: {e}", outcome.source_id))),
            },
        })
        .await
        .context("sync failed")?;

    if let Some(e) = save_error {
        return Err(e).context("failed to save merged result");
    }

    println!();
    match &report.push {
        None => println!("{}", style::success("Sync completed (dry-run)")),
        Some(push) => finish_push(push, "Sync")?,
    }
    Ok(())
}

/// Print the push summary and fail when any domain was rejected.
fn finish_push(push: &PushReport, what: &str) -> Result<()> {
    if push.is_success() {
        println!("{}", style::success(&format!("{what} completed successfully")));
        return Ok(());
    }
    println!(
        "{}",
        style::warn(&format!(
            "{what} completed with errors: {} succeeded, {} failed",
            push.succeeded(),
            push.failed()
        ))
    );
    bail!("{} of {} domains failed to push", push.failed(), push.outcomes.len())
}

// ---------------------------------------------------------------------------
// nsx
// ---------------------------------------------------------------------------

pub async fn cmd_nsx(action: NsxAction, connection: &ConnectionArgs, config: &AppConfig) -> Result<()> {
    let client = connection.client(config)?;

    match action {
        NsxAction::Pull => {
            let list = client
                .list_sources()
                .await
                .context("failed to list identity sources")?;
            let domains = convert::sources_to_domains(&list.results);
            info!(count = domains.len(), "pulled identity sources");
            println!("{}", to_json(&domains, true)?);
        }
        NsxAction::Push { file } => cmd_push(&client, &file).await?,
        NsxAction::Get { id } => {
            let source = client
                .get_source(&id)
                .await
                .with_context(|| format!("failed to get identity source '{id}'"))?;
            println!("{}", to_json(&source, true)?);
        }
        NsxAction::Delete { id } => {
            client
                .delete_source(&id)
                .await
                .with_context(|| format!("failed to delete identity source '{id}'"))?;
            println!("{}", style::success(&format!("Deleted LDAP identity source: {id}")));
        }
        NsxAction::Probe { id } => {
            let result = client
                .probe_source(&id)
                .await
                .with_context(|| format!("failed to probe identity source '{id}'"))?;
            println!("Probe results for {id}:");
            for item in &result.results {
                let line = match &item.error_message {
                    Some(msg) => format!("{} - {msg}", item.ldap_server_url),
                    None => item.ldap_server_url.clone(),
                };
                if item.success {
                    println!("  {}", style::success(&line));
                } else {
                    println!("  {}", style::error(&line));
                }
            }
            if !result.all_succeeded() {
                bail!("probe failed for identity source '{id}'");
            }
        }
        NsxAction::FetchCert { url } => {
            let result = client
                .fetch_certificate(&url)
                .await
                .with_context(|| format!("failed to fetch certificate from {url}"))?;
            println!("Certificate from {url}:");
            println!();
            for d in &result.details {
                println!("  Subject CN : {}", d.subject_cn);
                println!("  Subject DN : {}", d.subject_dn);
                println!("  Issuer CN  : {}", d.issuer_cn);
                println!("  Not before : {}", d.not_before);
                println!("  Not after  : {}", d.not_after);
                println!("  Algorithm  : {}", d.signature_algorithm);
                println!();
            }
            if result.pem_encoded.is_empty() {
                println!("{}", style::warn("No certificate returned"));
            } else {
                println!("PEM certificate:");
                println!("{}", result.pem_encoded);
            }
        }
        NsxAction::Search { id, filter } => {
            let result = client
                .search(&id, &filter)
                .await
                .with_context(|| format!("failed to search identity source '{id}'"))?;
            println!(
                "Search results for '{filter}' in {id} ({} found):",
                result.result_count
            );
            println!();
            for item in &result.results {
                let icon = if item.kind.eq_ignore_ascii_case("group") {
                    "[group]"
                } else {
                    "[user] "
                };
                println!("{icon} {}", style::header(&item.name));
                println!("        DN: {}", item.dn);
                if let Some(name) = &item.display_name {
                    println!("        Display name: {name}");
                }
                if let Some(email) = &item.email {
                    println!("        Email: {email}");
                }
            }
        }
    }
    Ok(())
}

async fn cmd_push(client: &ldapmerge_core::NsxClient, file: &Path) -> Result<()> {
    let domains = load_domains(file).context("failed to load domains file")?;
    println!("Updating {} LDAP identity sources...", domains.len());

    let report = push_domains(client, &domains).await;
    for outcome in &report.outcomes {
        match &outcome.error {
            None => println!("  {}", style::success(&outcome.source_id)),
            Some(e) => println!("  {}", style::error(&format!("{}: {e}", outcome.source_id))),
        }
    }
    println!();
    finish_push(&report, "Push")
}
