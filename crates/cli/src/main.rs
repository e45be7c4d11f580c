//! ldapmerge command-line tool.
//!
//! Merges LDAP identity-source configurations with SSL certificates, either
//! from local JSON files or live against NSX Manager, and serves the same
//! merge over a REST API.

mod connection;
mod logging;
mod nsx;
mod style;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, ContentArrangement, Table};
use tracing::info;

use ldapmerge_core::config::{AppConfig, DEFAULT_CONFIG_TOML};
use ldapmerge_core::db::{format_bytes, Database};
use ldapmerge_core::merge::{count_certificates, merge_files, to_json, write_json};
use ldapmerge_core::models::ConnectionProfile;
use ldapmerge_core::version;
use ldapmerge_web::WebServer;

use crate::connection::ConnectionArgs;
use crate::logging::LogOptions;
use crate::nsx::{NsxAction, SyncArgs};

// ---------------------------------------------------------------------------
// CLI argument definitions
// ---------------------------------------------------------------------------

/// LDAP configuration merger for VMware NSX.
#[derive(Parser, Debug)]
#[command(
    name = "ldapmerge",
    version,
    about = "Merge LDAP identity-source configurations with SSL certificates"
)]
struct Cli {
    /// Path to the TOML configuration file (default: ~/.ldapmerge.toml).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log directory.
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    /// Log level: trace, debug, info, warn, error.
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Also write logs to the console.
    #[arg(long, global = true)]
    log_console: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(flatten)]
    Logged(LoggedCommand),

    /// Generate a default configuration file.
    Init {
        /// Output path (default: ~/.ldapmerge.toml).
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Validate the configuration file.
    Validate,

    /// Show version information.
    Version,
}

/// Commands that load the configuration and write to the log file.
#[derive(Subcommand, Debug)]
enum LoggedCommand {
    /// Merge an initial domains file with a certificate response file.
    Merge {
        /// Initial domains JSON file.
        #[arg(short, long)]
        initial: PathBuf,

        /// Certificate response JSON file.
        #[arg(short, long)]
        response: PathBuf,

        /// Output file (default: stdout).
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Compact JSON output (no indentation).
        #[arg(short, long)]
        compact: bool,
    },

    /// Full pipeline: pull from NSX, merge certificates, push back.
    Sync(SyncArgs),

    /// Direct NSX API operations.
    Nsx {
        #[command(flatten)]
        connection: ConnectionArgs,

        #[command(subcommand)]
        action: NsxAction,
    },

    /// Start the REST API server.
    Server {
        /// Listen address (default from config: 0.0.0.0:8080).
        #[arg(short, long)]
        listen: Option<String>,

        /// SQLite database path.
        #[arg(long)]
        db: Option<PathBuf>,
    },

    /// Inspect recorded merges.
    History {
        #[command(subcommand)]
        action: HistoryAction,
    },

    /// Manage saved NSX connection profiles.
    Profile {
        #[command(subcommand)]
        action: ProfileAction,
    },
}

#[derive(Subcommand, Debug)]
enum HistoryAction {
    /// List recent merges, newest first.
    List {
        #[arg(short, long, default_value = "20")]
        limit: u32,
    },
    /// Print one merge record as JSON.
    Show { id: i64 },
}

#[derive(Subcommand, Debug)]
enum ProfileAction {
    /// List saved profiles.
    List,
    /// Save a new profile.
    Add {
        #[arg(long)]
        name: String,

        #[arg(long)]
        host: String,

        #[arg(short = 'u', long)]
        username: String,

        /// Read the password from this environment variable.
        #[arg(long, conflicts_with = "password")]
        password_env: Option<String>,

        #[arg(short = 'P', long)]
        password: Option<String>,

        /// Skip TLS certificate verification for this manager.
        #[arg(short = 'k', long)]
        insecure: bool,

        #[arg(long, default_value = "")]
        description: String,
    },
    /// Show one profile.
    Show { name: String },
    /// Delete a profile.
    Delete { name: String },
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", style::error(&format!("Error: {:#}", e)));
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let Cli {
        config: config_path,
        log_dir,
        log_level,
        log_console,
        command,
    } = cli;

    // These never touch the log directory.
    let command = match command {
        Commands::Version => {
            println!("{}", version::full());
            return Ok(());
        }
        Commands::Init { output } => return cmd_init(output),
        Commands::Validate => return cmd_validate(config_path.as_deref()),
        Commands::Logged(command) => command,
    };

    let config = AppConfig::load(config_path.as_deref()).context("failed to load configuration")?;
    let _guard = logging::init(&LogOptions::from_config(
        &config.logging,
        log_dir,
        log_level,
        log_console,
    ))
    .context("failed to initialize logging")?;
    info!(version = version::VERSION, "ldapmerge started");

    match command {
        LoggedCommand::Merge {
            initial,
            response,
            output,
            compact,
        } => cmd_merge(&initial, &response, output.as_deref(), compact),
        LoggedCommand::Sync(args) => nsx::cmd_sync(args, &config).await,
        LoggedCommand::Nsx { connection, action } => nsx::cmd_nsx(action, &connection, &config).await,
        LoggedCommand::Server { listen, db } => cmd_server(&config, listen, db).await,
        LoggedCommand::History { action } => cmd_history(&open_database(&config)?, action),
        LoggedCommand::Profile { action } => cmd_profile(&open_database(&config)?, action),
    }
}

fn open_database(config: &AppConfig) -> Result<Database> {
    Database::open(&config.server.db_path).with_context(|| {
        format!(
            "failed to open database: {}",
            config.server.db_path.display()
        )
    })
}

// ---------------------------------------------------------------------------
// Subcommand implementations
// ---------------------------------------------------------------------------

fn cmd_merge(initial: &Path, response: &Path, output: Option<&Path>, compact: bool) -> Result<()> {
    info!(
        initial = %initial.display(),
        response = %response.display(),
        "starting merge"
    );
    let result = merge_files(initial, response).context("merge failed")?;
    info!(
        domains = result.len(),
        certificates = count_certificates(&result),
        "merge completed"
    );

    match output {
        Some(path) => {
            write_json(path, &result, !compact).context("failed to write output file")?;
            info!(file = %path.display(), "output written");
            eprintln!("Output written to {}", path.display());
        }
        None => println!("{}", to_json(&result, !compact)?),
    }
    Ok(())
}

async fn cmd_server(config: &AppConfig, listen: Option<String>, db: Option<PathBuf>) -> Result<()> {
    let listen = listen.unwrap_or_else(|| config.server.listen.clone());
    let db_path = db.unwrap_or_else(|| config.server.db_path.clone());

    let db = Database::open(&db_path)
        .with_context(|| format!("failed to open database: {}", db_path.display()))?;
    info!(listen = %listen, db = %db_path.display(), "starting API server");
    println!("{}", style::success(&format!("Listening on http://{listen}")));
    println!("  {}", style::dim(&format!("Database: {}", db_path.display())));

    WebServer::new(db).start(&listen).await
}

fn cmd_history(db: &Database, action: HistoryAction) -> Result<()> {
    match action {
        HistoryAction::List { limit } => {
            let entries = db
                .list_history(Some(limit))
                .context("failed to list history")?;
            if entries.is_empty() {
                println!("No merge history found.");
                return Ok(());
            }

            let mut table = Table::new();
            table.load_preset(UTF8_FULL);
            table.set_content_arrangement(ContentArrangement::Dynamic);
            table.set_header(vec!["ID", "Created", "Domains", "Servers", "Certificates"]);
            for entry in &entries {
                let servers: usize = entry.result.iter().map(|d| d.servers.len()).sum();
                table.add_row(vec![
                    Cell::new(entry.id),
                    Cell::new(entry.created_at.format("%Y-%m-%d %H:%M:%S")),
                    Cell::new(entry.result.len()),
                    Cell::new(servers),
                    Cell::new(count_certificates(&entry.result)),
                ]);
            }
            println!("{table}");
            println!("{} entr(ies) shown", entries.len());
        }
        HistoryAction::Show { id } => {
            let entry = db
                .get_history(id)
                .with_context(|| format!("failed to load history entry {id}"))?;
            println!("{}", to_json(&entry, true)?);
        }
    }
    Ok(())
}

fn cmd_profile(db: &Database, action: ProfileAction) -> Result<()> {
    match action {
        ProfileAction::List => {
            let profiles = db.list_profiles().context("failed to list profiles")?;
            if profiles.is_empty() {
                println!("No connection profiles saved.");
                return Ok(());
            }

            let mut table = Table::new();
            table.load_preset(UTF8_FULL);
            table.set_content_arrangement(ContentArrangement::Dynamic);
            table.set_header(vec!["Name", "Host", "Username", "TLS", "Description"]);
            for p in &profiles {
                let tls = if p.insecure {
                    Cell::new("insecure").fg(comfy_table::Color::Yellow)
                } else {
                    Cell::new("verified").fg(comfy_table::Color::Green)
                };
                table.add_row(vec![
                    Cell::new(&p.name),
                    Cell::new(&p.host),
                    Cell::new(&p.username),
                    tls,
                    Cell::new(truncate(&p.description, 40)),
                ]);
            }
            println!("{table}");
        }
        ProfileAction::Add {
            name,
            host,
            username,
            password_env,
            password,
            insecure,
            description,
        } => {
            let password = match password_env {
                Some(var) => Some(std::env::var(&var).with_context(|| {
                    format!("environment variable {var} is not set")
                })?),
                None => password,
            };
            let saved = db
                .save_profile(&ConnectionProfile {
                    name,
                    description,
                    host,
                    username,
                    password,
                    insecure,
                    ..ConnectionProfile::default()
                })
                .context("failed to save profile")?;
            info!(name = %saved.name, "saved connection profile");
            println!("{}", style::success(&format!("Saved profile '{}'", saved.name)));
        }
        ProfileAction::Show { name } => {
            let p = db
                .get_profile_by_name(&name)
                .with_context(|| format!("failed to load profile '{name}'"))?;
            println!("{}", style::header(&format!("Profile: {}", p.name)));
            println!();
            println!("  Host        : {}", p.host);
            println!("  Username    : {}", p.username);
            println!(
                "  Password    : {}",
                if p.password.is_some() { "set" } else { "NOT SET" }
            );
            println!("  Insecure    : {}", p.insecure);
            if !p.description.is_empty() {
                println!("  Description : {}", p.description);
            }
            if let Some(created) = p.created_at {
                println!("  Created at  : {created}");
            }
            if let Some(updated) = p.updated_at {
                println!("  Updated at  : {updated}");
            }
        }
        ProfileAction::Delete { name } => {
            let p = db
                .get_profile_by_name(&name)
                .with_context(|| format!("failed to load profile '{name}'"))?;
            let Some(id) = p.id else {
                bail!("profile '{name}' has no id");
            };
            db.delete_profile(id).context("failed to delete profile")?;
            info!(name = %name, "deleted connection profile");
            println!("{}", style::success(&format!("Deleted profile '{name}'")));
        }
    }
    Ok(())
}

fn cmd_init(output: Option<PathBuf>) -> Result<()> {
    let Some(output) = output.or_else(AppConfig::default_path) else {
        bail!("cannot determine home directory; pass --output");
    };
    if output.exists() {
        bail!(
            "file already exists: {}. Use a different path or remove the existing file.",
            output.display()
        );
    }
    std::fs::write(&output, DEFAULT_CONFIG_TOML).context("failed to write config file")?;

    println!("Default configuration written to {}", output.display());
    println!();
    println!("Next steps:");
    println!("  1. Set nsx.host and nsx.username for your NSX Manager");
    println!("  2. Export the variable named by nsx.password_env");
    println!("  3. Validate with: ldapmerge validate --config {}", output.display());
    Ok(())
}

fn cmd_validate(explicit: Option<&Path>) -> Result<()> {
    let path = match explicit {
        Some(p) => Some(p.to_path_buf()),
        None => AppConfig::default_path().filter(|p| p.exists()),
    };

    let mut config = match &path {
        Some(p) => {
            println!("Validating configuration: {}", p.display());
            println!();
            let config = AppConfig::load_from_file(p).context("failed to parse configuration")?;
            println!("  [OK] TOML structure is valid");
            config
        }
        None => {
            println!("No configuration file found; checking built-in defaults");
            println!();
            AppConfig::default()
        }
    };

    config.apply_env_overrides();
    config
        .resolve_env_vars()
        .context("failed to resolve environment variables")?;
    println!("  [OK] Environment variable references processed");

    if let Err(e) = config.validate() {
        println!("  [FAIL] Validation error: {}", e);
        bail!("configuration validation failed");
    }
    println!("  [OK] All values are valid");

    println!();
    println!("Configuration summary:");
    println!("  Log directory : {}", config.logging.dir.display());
    println!("  Log level     : {}", config.logging.level);
    println!("  Listen        : {}", config.server.listen);
    println!(
        "  Database      : {} ({})",
        config.server.db_path.display(),
        std::fs::metadata(&config.server.db_path)
            .map(|m| format_bytes(m.len()))
            .unwrap_or_else(|_| "not created yet".into())
    );
    println!(
        "  NSX host      : {}",
        config.nsx.host.as_deref().unwrap_or("not set")
    );
    println!(
        "  NSX user      : {}",
        config.nsx.username.as_deref().unwrap_or("not set")
    );
    println!(
        "  NSX password  : {}",
        if config.nsx.password.is_some() {
            "set"
        } else {
            "NOT SET"
        }
    );
    println!();
    println!("Configuration is valid.");
    Ok(())
}

/// Truncate a string to `max` characters, adding "..." if it was longer.
fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{kept}...")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_sync_requires_a_certificate_source() {
        let args = ["ldapmerge", "sync", "--host", "h", "-u", "u", "-P", "p"];
        assert!(Cli::try_parse_from(args).is_err());

        let args = ["ldapmerge", "sync", "--host", "h", "--fetch-certs", "-r", "r.json"];
        assert!(Cli::try_parse_from(args).is_err());

        let args = ["ldapmerge", "sync", "--profile", "lab", "--fetch-certs", "--dry-run"];
        let cli = Cli::try_parse_from(args).unwrap();
        match cli.command {
            Commands::Logged(LoggedCommand::Sync(args)) => {
                assert!(args.fetch_certs);
                assert!(args.dry_run);
                assert_eq!(args.connection.profile.as_deref(), Some("lab"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "ldapmerge",
            "merge",
            "-i",
            "a.json",
            "-r",
            "b.json",
            "-c",
            "--log-level",
            "debug",
        ])
        .unwrap();
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
        assert!(matches!(cli.command, Commands::Logged(LoggedCommand::Merge { compact: true, .. })));
    }

    #[test]
    fn test_standalone_commands_are_not_logged() {
        for (args, standalone) in [
            (&["ldapmerge", "version"][..], true),
            (&["ldapmerge", "validate"][..], true),
            (&["ldapmerge", "init", "-o", "x.toml"][..], true),
            (&["ldapmerge", "history", "list"][..], false),
            (&["ldapmerge", "profile", "list"][..], false),
        ] {
            let cli = Cli::try_parse_from(args).unwrap();
            assert_eq!(
                !matches!(cli.command, Commands::Logged(_)),
                standalone,
                "{args:?}"
            );
        }
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("a very long description", 10), "a very ...");
    }
}
