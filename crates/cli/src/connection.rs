//! NSX connection flags shared by `sync` and `nsx`.
//!
//! Each parameter resolves from the explicit flag first, then the named
//! profile from the store, then the `[nsx]` section of the config file.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Args;

use ldapmerge_core::config::{AppConfig, NsxConfig};
use ldapmerge_core::db::Database;
use ldapmerge_core::models::ConnectionProfile;
use ldapmerge_core::{NsxClient, NsxClientConfig};

#[derive(Args, Debug, Clone, Default)]
pub struct ConnectionArgs {
    /// NSX Manager host URL (e.g. https://nsx.example.com).
    #[arg(long, global = true)]
    pub host: Option<String>,

    /// NSX API username.
    #[arg(short = 'u', long, global = true)]
    pub username: Option<String>,

    /// NSX API password.
    #[arg(short = 'P', long, global = true)]
    pub password: Option<String>,

    /// Use a saved connection profile.
    #[arg(long, global = true)]
    pub profile: Option<String>,

    /// Skip TLS certificate verification.
    #[arg(short = 'k', long, global = true)]
    pub insecure: bool,

    /// API request timeout in seconds.
    #[arg(long, global = true)]
    pub timeout: Option<u64>,
}

impl ConnectionArgs {
    /// Build a client, loading the named profile from the store if needed.
    pub fn client(&self, config: &AppConfig) -> Result<NsxClient> {
        let profile = match &self.profile {
            Some(name) => {
                let db = Database::open(&config.server.db_path)
                    .context("failed to open database")?;
                let profile = db
                    .get_profile_by_name(name)
                    .with_context(|| format!("failed to load profile '{name}'"))?;
                Some(profile)
            }
            None => None,
        };

        let client_config = self.resolve(profile.as_ref(), &config.nsx)?;
        tracing::info!(
            host = %client_config.host,
            username = %client_config.username,
            profile = ?self.profile,
            "resolved NSX connection"
        );
        NsxClient::new(client_config).context("failed to create NSX client")
    }

    /// Merge flags, profile and config into client settings.
    pub fn resolve(
        &self,
        profile: Option<&ConnectionProfile>,
        nsx: &NsxConfig,
    ) -> Result<NsxClientConfig> {
        let pick = |flag: &Option<String>,
                    from_profile: Option<&str>,
                    from_config: &Option<String>| {
            flag.clone()
                .or_else(|| from_profile.map(str::to_string))
                .or_else(|| from_config.clone())
                .filter(|v| !v.is_empty())
        };

        let Some(host) = pick(&self.host, profile.map(|p| p.host.as_str()), &nsx.host) else {
            bail!("NSX host not set; use --host, --profile or nsx.host in the config file");
        };
        let Some(username) = pick(
            &self.username,
            profile.map(|p| p.username.as_str()),
            &nsx.username,
        ) else {
            bail!("NSX username not set; use -u, --profile or nsx.username in the config file");
        };
        let Some(password) = pick(
            &self.password,
            profile.and_then(|p| p.password.as_deref()),
            &nsx.password,
        ) else {
            bail!("NSX password not set; use -P, --profile or nsx.password_env in the config file");
        };

        let insecure = self.insecure || profile.map_or(nsx.insecure, |p| p.insecure);
        let timeout = self.timeout.unwrap_or(nsx.timeout_secs);

        Ok(NsxClientConfig {
            host,
            username,
            password,
            insecure,
            timeout: Duration::from_secs(timeout),
        })
    }
}
