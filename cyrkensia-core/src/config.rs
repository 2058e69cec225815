//! Layered server configuration
//!
//! Configuration is assembled from ordered sources, lowest precedence first:
//!
//! 1. built-in defaults
//! 2. system file (`/etc/cyrkensia/config.json`)
//! 3. user file (`~/.config/cyrkensia/config.json`)
//! 4. explicit file (`--config` or `CYRKENSIA_CONFIG`)
//! 5. command-line flags
//!
//! A field takes the value of the highest source that sets it. Empty strings
//! and a zero port count as unset and never overwrite anything.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Error, Result};

pub const SYSTEM_CONFIG_PATH: &str = "/etc/cyrkensia/config.json";
/// Relative to the user's home directory.
pub const USER_CONFIG_PATH: &str = ".config/cyrkensia/config.json";
pub const CONFIG_ENVVAR: &str = "CYRKENSIA_CONFIG";

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_NAME: &str = "Cyrkensia";
pub const DEFAULT_ICON: &str = "cyrkensia";

/// Repository owner or maintainer
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Owner {
    pub name: String,
    pub website: String,
    pub email: String,
}

/// One configuration source as it appears on disk or on the command line.
///
/// Every field is optional in practice: an empty value means "not set here".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigLayer {
    pub port: u16,
    pub root: String,
    #[serde(rename = "bindAddr")]
    pub bind_addr: String,
    pub hosticon: String,
    pub uuid: String,
    #[serde(rename = "vendorName")]
    pub vendor_name: String,
    pub htpasswd: String,
    #[serde(rename = "pemTLS")]
    pub pem_tls: String,
    #[serde(rename = "keyTLS")]
    pub key_tls: String,
    pub owners: Vec<Owner>,
}

impl ConfigLayer {
    /// Built-in defaults. The content root deliberately has none.
    pub fn defaults() -> Self {
        Self {
            port: DEFAULT_PORT,
            bind_addr: DEFAULT_BIND_ADDR.into(),
            vendor_name: DEFAULT_NAME.into(),
            hosticon: DEFAULT_ICON.into(),
            ..Default::default()
        }
    }

    /// Parse a JSON config file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|e| Error::ConfigSource {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        serde_json::from_str(&raw).map_err(|e| Error::ConfigSource {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Fill every unset field of `self` from `lower`.
    pub fn fill_from(&mut self, lower: &ConfigLayer) {
        fill_if_empty(&mut self.root, &lower.root);
        fill_if_empty(&mut self.bind_addr, &lower.bind_addr);
        fill_if_empty(&mut self.hosticon, &lower.hosticon);
        fill_if_empty(&mut self.uuid, &lower.uuid);
        fill_if_empty(&mut self.vendor_name, &lower.vendor_name);
        fill_if_empty(&mut self.htpasswd, &lower.htpasswd);
        fill_if_empty(&mut self.pem_tls, &lower.pem_tls);
        fill_if_empty(&mut self.key_tls, &lower.key_tls);
        if self.port == 0 {
            self.port = lower.port;
        }
        // Arrays are replaced wholesale, never merged element-wise
        if self.owners.is_empty() {
            self.owners = lower.owners.clone();
        }
    }
}

fn fill_if_empty(field: &mut String, value: &str) {
    if field.is_empty() && !value.is_empty() {
        *field = value.to_string();
    }
}

/// Merge layers given in ascending precedence (last one wins).
pub fn merge_layers<I>(layers: I) -> ConfigLayer
where
    I: IntoIterator<Item = ConfigLayer>,
    I::IntoIter: DoubleEndedIterator,
{
    let mut merged = ConfigLayer::default();
    for layer in layers.into_iter().rev() {
        merged.fill_from(&layer);
    }
    merged
}

/// TLS certificate and key paths
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsPaths {
    pub cert: PathBuf,
    pub key: PathBuf,
}

/// Resolved, validated configuration. Immutable once the server starts.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub port: u16,
    /// Content root, the trust boundary for every served path
    pub root: PathBuf,
    pub name: String,
    pub icon: String,
    pub uuid: String,
    /// htpasswd file; `Some` switches the server into gated mode
    pub htpasswd: Option<PathBuf>,
    pub tls: Option<TlsPaths>,
    pub owners: Vec<Owner>,
}

impl ServerConfig {
    /// Whether file delivery requires credentials
    pub fn gated(&self) -> bool {
        self.htpasswd.is_some()
    }

    /// `host:port`, with IPv6 literals bracketed
    pub fn listen_addr(&self) -> String {
        if self.bind_addr.contains(':') && !self.bind_addr.starts_with('[') {
            format!("[{}]:{}", self.bind_addr, self.port)
        } else {
            format!("{}:{}", self.bind_addr, self.port)
        }
    }
}

impl TryFrom<ConfigLayer> for ServerConfig {
    type Error = Error;

    fn try_from(layer: ConfigLayer) -> Result<Self> {
        if layer.bind_addr.is_empty() {
            return Err(Error::StartupConfig("no bind address configured (bindAddr)".into()));
        }
        if layer.root.is_empty() {
            return Err(Error::StartupConfig("no content root configured (root)".into()));
        }
        if layer.port == 0 {
            return Err(Error::StartupConfig("no port configured (port)".into()));
        }

        let tls = match (layer.pem_tls.is_empty(), layer.key_tls.is_empty()) {
            (false, false) => Some(TlsPaths {
                cert: PathBuf::from(&layer.pem_tls),
                key: PathBuf::from(&layer.key_tls),
            }),
            (true, true) => None,
            _ => {
                warn!("Only one of pemTLS/keyTLS is set, serving plain HTTP");
                None
            }
        };

        Ok(ServerConfig {
            bind_addr: layer.bind_addr,
            port: layer.port,
            root: PathBuf::from(layer.root),
            name: layer.vendor_name,
            icon: layer.hosticon,
            uuid: layer.uuid,
            htpasswd: (!layer.htpasswd.is_empty()).then(|| PathBuf::from(layer.htpasswd)),
            tls,
            owners: layer.owners,
        })
    }
}

/// A single configuration source
#[derive(Debug, Clone)]
pub enum ConfigSource {
    /// Values already in memory (defaults, flags)
    Layer { label: &'static str, layer: ConfigLayer },
    /// JSON file; skipped when missing or malformed
    File(PathBuf),
}

impl ConfigSource {
    fn load(&self) -> Option<ConfigLayer> {
        match self {
            ConfigSource::Layer { layer, .. } => Some(layer.clone()),
            ConfigSource::File(path) => {
                if !path.exists() {
                    debug!("Config file {:?} not present, skipping", path);
                    return None;
                }
                match ConfigLayer::load(path) {
                    Ok(layer) => {
                        debug!("Loaded config file {:?}", path);
                        Some(layer)
                    }
                    Err(e) => {
                        warn!("{}, skipping", e);
                        None
                    }
                }
            }
        }
    }
}

/// Ordered list of sources, lowest precedence first
#[derive(Debug, Clone, Default)]
pub struct ConfigResolver {
    sources: Vec<ConfigSource>,
}

impl ConfigResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// defaults < system file < user file < explicit file < flags
    pub fn standard(explicit: Option<&Path>, flags: ConfigLayer) -> Self {
        let mut resolver = Self::new()
            .layer("defaults", ConfigLayer::defaults())
            .file(SYSTEM_CONFIG_PATH);
        if let Some(path) = user_config_path() {
            resolver = resolver.file(path);
        }
        if let Some(path) = explicit {
            resolver = resolver.file(path);
        }
        resolver.layer("flags", flags)
    }

    pub fn layer(mut self, label: &'static str, layer: ConfigLayer) -> Self {
        self.sources.push(ConfigSource::Layer { label, layer });
        self
    }

    pub fn file<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.sources.push(ConfigSource::File(path.into()));
        self
    }

    pub fn sources(&self) -> &[ConfigSource] {
        &self.sources
    }

    /// Load every source and merge them. Never fails.
    pub fn merge(&self) -> ConfigLayer {
        let layers: Vec<ConfigLayer> = self.sources.iter().filter_map(ConfigSource::load).collect();
        merge_layers(layers)
    }

    /// Merge and validate
    pub fn resolve(&self) -> Result<ServerConfig> {
        ServerConfig::try_from(self.merge())
    }
}

/// `$HOME/.config/cyrkensia/config.json`, if a home directory is known
pub fn user_config_path() -> Option<PathBuf> {
    std::env::var_os("HOME")
        .filter(|home| !home.is_empty())
        .map(|home| PathBuf::from(home).join(USER_CONFIG_PATH))
}
