//! `ccs.toml` and its merge with command-line flags.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context};
use ccs_client::ClientConfig;
use ccs_protocol::Credentials;
use ccs_sync::{LayoutConfig, SyncConfig};
use serde::Deserialize;

use crate::cli::Cli;

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub instance: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub application_key: Option<String>,
    pub root: Option<PathBuf>,
    pub grab_concurrency: Option<usize>,
    pub put_concurrency: Option<usize>,
    pub locale: Option<String>,
    pub all_locales: Option<bool>,
    pub transfer_mode: Option<bool>,
    pub timeout_secs: Option<u64>,
    pub no_snippet_locale: Option<String>,
    #[serde(default)]
    pub kinds: Vec<LayoutConfig>,
}

impl FileConfig {
    pub fn parse(text: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Read `path`. A missing file is an empty configuration.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        match fs::read_to_string(path) {
            Ok(text) => Self::parse(&text).with_context(|| format!("invalid config {}", path.display())),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e).with_context(|| format!("cannot read {}", path.display())),
        }
    }
}

/// Everything a command needs, flags taking precedence over the file.
#[derive(Debug)]
pub struct Settings {
    pub client: ClientConfig,
    pub sync: SyncConfig,
    pub kinds: Vec<LayoutConfig>,
}

pub fn resolve(cli: &Cli, file: FileConfig, cwd: &Path) -> anyhow::Result<Settings> {
    let Some(instance) = cli.node.clone().or(file.instance) else {
        bail!("no server given; pass --node or set `instance` in the config file");
    };

    let application_key = cli.application_key.clone().or(file.application_key);
    let username = cli.username.clone().or(file.username);
    let password = cli.password.clone().or(file.password);
    let credentials = match (application_key, username, password) {
        (Some(key), _, _) => Credentials::ApplicationKey(key),
        (None, Some(username), Some(password)) => Credentials::Password { username, password },
        _ => bail!("no credentials; set an application key, or a username and password"),
    };

    let transfer_mode = cli.transfer || file.transfer_mode.unwrap_or(false);
    let mut client = ClientConfig::new(instance, credentials)
        .with_locale(cli.locale.clone().or(file.locale))
        .with_all_locales(cli.all_locales || file.all_locales.unwrap_or(false))
        .with_transfer_mode(transfer_mode);
    if let Some(secs) = file.timeout_secs {
        client = client.with_timeout(Duration::from_secs(secs));
    }
    if let Some(name) = file.no_snippet_locale {
        client = client.with_no_snippet_locale(name);
    }

    let root = cwd.join(cli.root.clone().or(file.root).unwrap_or_else(|| PathBuf::from(".")));
    let mut sync = SyncConfig::new(root).with_transfer_mode(transfer_mode);
    if let Some(n) = cli.grab_concurrency.or(file.grab_concurrency) {
        sync = sync.with_grab_concurrency(n);
    }
    if let Some(n) = cli.put_concurrency.or(file.put_concurrency) {
        sync = sync.with_put_concurrency(n);
    }

    Ok(Settings { client, sync, kinds: file.kinds })
}
