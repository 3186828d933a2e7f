//! Controller configuration persistence
//!
//! The full controller state (mode, both rule lists, topology and timers) is
//! written after every accepted mutation through a [`ConfigStore`]. The
//! default store is a JSON file that seals the configuration with its SHA-256
//! digest:
//!
//! ```json
//! { "sha256": "<hex digest of config>", "config": { "mode": "blacklist", ... } }
//! ```
//!
//! Digest and configuration are replaced by one rename, so the file on disk is
//! always either the previous or the new state. A bare configuration object
//! without the envelope is also accepted (hand-written files).

use crate::core::error::{Error, Result};
use crate::core::firewall::{ListKind, Mode, RuleList};
use crate::core::flows::DatapathId;
use crate::utils::get_data_dir;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing::warn;

/// File name of the controller configuration inside the data directory
pub const CONFIG_FILE_NAME: &str = "controller.json";

/// Identifiers of the managed switch and the ports traffic crosses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topology {
    /// Datapath id of the switch this controller has authority over
    #[serde(default = "default_datapath_id")]
    pub datapath_id: DatapathId,
    /// Switch port facing the protected network's upstream
    #[serde(default = "default_ingress_port")]
    pub ingress_port: u32,
    /// Switch port facing the protected network
    #[serde(default = "default_egress_port")]
    pub egress_port: u32,
}

impl Default for Topology {
    fn default() -> Self {
        Self {
            datapath_id: default_datapath_id(),
            ingress_port: default_ingress_port(),
            egress_port: default_egress_port(),
        }
    }
}

/// Everything the controller persists
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControllerConfig {
    #[serde(default)]
    pub mode: Mode,
    #[serde(default)]
    pub blacklist: RuleList,
    #[serde(default)]
    pub whitelist: RuleList,
    #[serde(default)]
    pub topology: Topology,
    /// Idle time after which installed flows expire on the switch
    #[serde(default = "default_flow_active_time")]
    pub flow_active_time_secs: u64,
    /// How long per-flow statistics are kept by the stats collector
    #[serde(default = "default_stats_retention")]
    pub stats_retention_secs: u64,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            mode: Mode::default(),
            blacklist: RuleList::new(),
            whitelist: RuleList::new(),
            topology: Topology::default(),
            flow_active_time_secs: default_flow_active_time(),
            stats_retention_secs: default_stats_retention(),
        }
    }
}

impl ControllerConfig {
    pub fn list(&self, kind: ListKind) -> &RuleList {
        match kind {
            ListKind::Blacklist => &self.blacklist,
            ListKind::Whitelist => &self.whitelist,
        }
    }

    pub fn list_mut(&mut self, kind: ListKind) -> &mut RuleList {
        match kind {
            ListKind::Blacklist => &mut self.blacklist,
            ListKind::Whitelist => &mut self.whitelist,
        }
    }

    /// Reports settings that load fine but are unlikely to be intended.
    ///
    /// Never rejects a configuration; the rule lists are kept either way.
    pub fn warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if self.topology.ingress_port == self.topology.egress_port {
            warnings.push(format!(
                "ingress and egress port are both {}",
                self.topology.ingress_port
            ));
        }
        warnings
    }
}

fn default_datapath_id() -> DatapathId {
    DatapathId(1)
}

fn default_ingress_port() -> u32 {
    1
}

fn default_egress_port() -> u32 {
    2
}

fn default_flow_active_time() -> u64 {
    10
}

fn default_stats_retention() -> u64 {
    3600
}

/// Durable storage for the controller configuration
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// Loads the last saved configuration; `Ok(None)` if nothing was saved yet.
    ///
    /// # Errors
    ///
    /// Returns `Error::Corrupted` if stored data exists but cannot be trusted.
    async fn load(&self) -> Result<Option<ControllerConfig>>;

    /// Durably records the configuration, replacing the previous one.
    async fn save(&self, config: &ControllerConfig) -> Result<()>;
}

/// On-disk envelope written by [`JsonConfigStore`]
///
/// A missing digest skips verification, so the checksum can be dropped by
/// hand when editing the configuration.
#[derive(Serialize, Deserialize)]
struct SealedConfig<'a> {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    sha256: Option<String>,
    #[serde(borrow)]
    config: &'a RawValue,
}

/// JSON file store with atomic writes and an embedded checksum
#[derive(Debug, Clone)]
pub struct JsonConfigStore {
    path: PathBuf,
}

impl JsonConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at `<data dir>/controller.json`, if the platform has a data dir
    pub fn default_location() -> Option<Self> {
        get_data_dir().map(|dir| Self::new(dir.join(CONFIG_FILE_NAME)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = OsString::from(self.path.as_os_str());
        name.push(".tmp");
        PathBuf::from(name)
    }
}

fn sha256_hex(data: &[u8]) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

#[async_trait]
impl ConfigStore for JsonConfigStore {
    async fn load(&self) -> Result<Option<ControllerConfig>> {
        if !tokio::fs::try_exists(&self.path).await? {
            return Ok(None);
        }

        let json = tokio::fs::read_to_string(&self.path).await?;

        let body = match serde_json::from_str::<SealedConfig<'_>>(&json) {
            Ok(sealed) => {
                let actual = sha256_hex(sealed.config.get().as_bytes());
                if let Some(expected) = sealed.sha256
                    && expected != actual
                {
                    return Err(Error::Corrupted(format!(
                        "checksum mismatch for {} (expected: {}, got: {})",
                        self.path.display(),
                        expected,
                        actual
                    )));
                }
                sealed.config.get()
            }
            Err(_) => json.as_str(),
        };

        let config: ControllerConfig = serde_json::from_str(body)
            .map_err(|e| Error::Corrupted(format!("{}: {e}", self.path.display())))?;
        for warning in config.warnings() {
            warn!("{}: {}", self.path.display(), warning);
        }
        Ok(Some(config))
    }

    /// Seals the configuration with its digest, writes it to a temporary file
    /// with 0o600 permissions, syncs, then renames over the target.
    async fn save(&self, config: &ControllerConfig) -> Result<()> {
        let body = serde_json::to_string_pretty(config)?;
        let sha256 = sha256_hex(body.as_bytes());
        let raw = RawValue::from_string(body)?;
        let sealed = SealedConfig {
            sha256: Some(sha256),
            config: &raw,
        };
        let json = serde_json::to_string_pretty(&sealed)?;

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }

        let temp_path = self.temp_path();

        #[cfg(unix)]
        {
            use tokio::fs::OpenOptions;
            use tokio::io::AsyncWriteExt;

            // Permissions set BEFORE any data is written
            let mut file = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .mode(0o600)
                .open(&temp_path)
                .await?;

            file.write_all(json.as_bytes()).await?;
            file.sync_all().await?;
        }

        #[cfg(not(unix))]
        {
            use tokio::io::AsyncWriteExt;

            let mut file = tokio::fs::File::create(&temp_path).await?;
            file.write_all(json.as_bytes()).await?;
            file.sync_all().await?;
        }

        if let Err(e) = tokio::fs::rename(&temp_path, &self.path).await {
            let _ = tokio::fs::remove_file(&temp_path).await;
            if e.kind() == std::io::ErrorKind::StorageFull {
                return Err(Error::Io(std::io::Error::new(
                    std::io::ErrorKind::StorageFull,
                    "Disk full: cannot save configuration. Free up space and try again.",
                )));
            }
            return Err(Error::Io(e));
        }
        Ok(())
    }
}
