//! Subcommands and the wiring they share
//!
//! Every command that talks to the remote store builds a [`Session`]: the
//! loaded configuration, a remote store (Drive, or in-memory for dry runs),
//! and a sync protocol recording into the transaction log.

pub mod audit;
pub mod config;
pub mod ls;
pub mod mkpath;
pub mod run;
pub mod upload;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use gdup_audit::{AuditRecorder, FileAuditSink, MemoryAuditSink, SessionContext};
use gdup_core::{
    config::Config,
    domain::newtypes::RemoteId,
    ports::{audit_sink::IAuditSink, remote_store::IRemoteStore},
};
use gdup_drive::{DriveClient, DriveRemoteStore, InMemoryRemoteStore};
use gdup_sync::SyncProtocol;
use tracing::{debug, info};

/// Where the configuration comes from
#[derive(Debug, Clone)]
pub struct ConfigSource {
    path: PathBuf,
    explicit: bool,
}

impl ConfigSource {
    /// `--config` when given, the platform default otherwise
    pub fn resolve(cli_path: Option<PathBuf>) -> Self {
        match cli_path {
            Some(path) => Self {
                path,
                explicit: true,
            },
            None => Self {
                path: Config::default_path(),
                explicit: false,
            },
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_explicit(&self) -> bool {
        self.explicit
    }

    /// Loads the configuration
    ///
    /// A missing default file yields the defaults; a missing `--config`
    /// file or one that does not parse is an error.
    pub fn load(&self) -> Result<Config> {
        if !self.explicit && !self.path.exists() {
            debug!(path = %self.path.display(), "No configuration file, using defaults");
            return Ok(Config::default());
        }
        let config = Config::load(&self.path)
            .with_context(|| format!("Failed to load configuration from {}", self.path.display()))?;
        info!(config_path = %self.path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Loads and validates the configuration
    pub fn load_valid(&self) -> Result<Config> {
        let config = self.load()?;
        let errors = config.validate();
        if !errors.is_empty() {
            let details: Vec<String> = errors.iter().map(ToString::to_string).collect();
            bail!("Invalid configuration: {}", details.join("; "));
        }
        Ok(config)
    }
}

/// A remote store plus an audited protocol on top of it
pub struct Session {
    pub protocol: SyncProtocol,
    pub target_root: RemoteId,
    /// Set for dry runs; holds what would have been created
    pub dry_run_store: Option<Arc<InMemoryRemoteStore>>,
}

impl Session {
    /// Wires the store and the transaction log for `config`
    ///
    /// Dry runs use an in-memory store and keep their records in memory, so
    /// neither Drive nor the transaction log is touched.
    pub fn open(config: &Config, dry_run: bool) -> Result<Self> {
        let target_root = parse_remote_id(&config.target_root).context("Invalid target_root")?;

        let (store, sink, dry_run_store): (Arc<dyn IRemoteStore>, Arc<dyn IAuditSink>, _) = if dry_run {
            let store = Arc::new(InMemoryRemoteStore::new());
            (store.clone(), Arc::new(MemoryAuditSink::new()), Some(store))
        } else {
            let token = config.drive.resolve_access_token().with_context(|| {
                format!(
                    "No Drive access token. Set drive.access_token or {}",
                    gdup_core::config::ACCESS_TOKEN_ENV
                )
            })?;
            let client = DriveClient::with_base_urls(token, &config.drive.api_url, &config.drive.upload_url);
            let log_path = config.audit.resolved_file();
            let sink = FileAuditSink::open(&log_path)
                .with_context(|| format!("Failed to open transaction log {}", log_path.display()))?;
            info!(log = %log_path.display(), "Recording transactions");
            (Arc::new(DriveRemoteStore::new(client)), Arc::new(sink), None)
        };

        let session = SessionContext::detect();
        debug!(session_id = %session.session_id(), host = session.host(), "Audit session");
        let recorder = Arc::new(AuditRecorder::new(sink, session));

        Ok(Self {
            protocol: SyncProtocol::new(store, recorder),
            target_root,
            dry_run_store,
        })
    }
}

/// Parses a remote folder id given on the command line or in the config
pub fn parse_remote_id(value: &str) -> Result<RemoteId> {
    RemoteId::new(value.to_string()).with_context(|| format!("'{value}' is not a valid remote id"))
}
