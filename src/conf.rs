//! Hadoop configuration.
//!
//! The configuration is a flat `key -> value` mapping assembled from the
//! usual Hadoop XML files:
//!
//! ```xml
//! <configuration>
//!   <property>
//!     <name>fs.defaultFS</name>
//!     <value>viewfs://nsX</value>
//!   </property>
//! </configuration>
//! ```
//!
//! It is loaded once at startup and passed by reference to everything that
//! needs it. Nothing mutates it afterwards.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::errors::{HdfsError, HdfsResult};
use crate::uri;

// ---------------------------------------------------------------------------
// Keys
// ---------------------------------------------------------------------------

pub const DEFAULT_FS: &str = "fs.defaultFS";
const MOUNT_TABLE_PREFIX: &str = "fs.viewfs.mounttable.";
const HA_NAMENODES_PREFIX: &str = "dfs.ha.namenodes.";
const RPC_ADDRESS_PREFIX: &str = "dfs.namenode.rpc-address.";
const HTTP_ADDRESS_PREFIX: &str = "dfs.namenode.http-address.";

/// Files read from a configuration directory, in override order.
const SITE_FILES: &[&str] = &["core-site.xml", "hdfs-site.xml"];

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// The shape of `fs.defaultFS`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DefaultFs {
    /// `viewfs://<table>`: paths go through the named mount table.
    Federated { table: String },
    /// `hdfs://<authority>`: a cluster id (HA group) or a `host:port`.
    Cluster { authority: String },
}

/// A resolved `fs.viewfs.mounttable.<table>.link.<mount>` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountLink {
    /// The mount point in the federated namespace, e.g. `/logs`.
    pub mount: String,
    /// Authority of the link target: a cluster id or `host:port`.
    pub cluster: String,
    /// The directory on `cluster` that `mount` maps to.
    pub root: String,
}

#[derive(Debug, Deserialize)]
struct XmlConfiguration {
    #[serde(rename = "property", default)]
    properties: Vec<XmlProperty>,
}

#[derive(Debug, Deserialize)]
struct XmlProperty {
    name: String,
    #[serde(default)]
    value: String,
}

/// Immutable Hadoop configuration mapping.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Configuration {
    values: BTreeMap<String, String>,
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

impl Configuration {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from the directory named by `$HADOOP_CONF_DIR`, or failing
    /// that `$HADOOP_HOME/conf` or `$HADOOP_HOME/etc/hadoop`.
    ///
    /// An environment with none of these yields an empty configuration.
    pub fn load_from_environment() -> HdfsResult<Self> {
        match discover_conf_dir() {
            Some(dir) => Self::load_from_dir(&dir),
            None => {
                log::debug!("no hadoop configuration directory found");
                Ok(Self::new())
            }
        }
    }

    /// Load `core-site.xml` and `hdfs-site.xml` from `dir`. Missing files
    /// are skipped; values in later files override earlier ones.
    pub fn load_from_dir(dir: &Path) -> HdfsResult<Self> {
        let mut values = BTreeMap::new();

        for name in SITE_FILES {
            let file = dir.join(name);
            let text = match fs::read_to_string(&file) {
                Ok(text) => text,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => {
                    return Err(HdfsError::ConfigLoad(format!(
                        "failed to read {}: {e}",
                        file.display()
                    )));
                }
            };

            let parsed: XmlConfiguration = quick_xml::de::from_str(&text).map_err(|e| {
                HdfsError::ConfigLoad(format!("failed to parse {}: {e}", file.display()))
            })?;

            log::debug!(
                "loaded {} properties from {}",
                parsed.properties.len(),
                file.display()
            );
            for property in parsed.properties {
                values.insert(property.name.trim().to_string(), property.value.trim().to_string());
            }
        }

        Ok(Self { values })
    }

    /// Return a copy with `overrides` applied on top (later pairs win).
    pub fn with_overrides<I, K, V>(mut self, overrides: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.values
            .extend(overrides.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Like [`get`](Self::get), but a missing key is a configuration error.
    pub fn require(&self, key: &str) -> HdfsResult<&str> {
        self.get(key)
            .ok_or_else(|| HdfsError::MissingConfig(key.to_string()))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Configuration {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self::new().with_overrides(iter)
    }
}

fn discover_conf_dir() -> Option<PathBuf> {
    let mut candidates = Vec::new();
    if let Some(dir) = std::env::var_os("HADOOP_CONF_DIR") {
        candidates.push(PathBuf::from(dir));
    }
    if let Some(home) = std::env::var_os("HADOOP_HOME") {
        let home = PathBuf::from(home);
        candidates.push(home.join("conf"));
        candidates.push(home.join("etc").join("hadoop"));
    }
    candidates.into_iter().find(|dir| dir.is_dir())
}

// ---------------------------------------------------------------------------
// Typed views
// ---------------------------------------------------------------------------

impl Configuration {
    /// Interpret `fs.defaultFS`.
    pub fn default_fs(&self) -> HdfsResult<DefaultFs> {
        let raw = self.require(DEFAULT_FS)?;
        let invalid = |reason: String| HdfsError::InvalidConfig {
            key: DEFAULT_FS.to_string(),
            reason,
        };

        let url = url::Url::parse(raw).map_err(|e| invalid(e.to_string()))?;
        let authority = match (url.host_str(), url.port()) {
            (Some(host), Some(port)) => format!("{host}:{port}"),
            (Some(host), None) => host.to_string(),
            (None, _) => String::new(),
        };

        match url.scheme() {
            "viewfs" => Ok(DefaultFs::Federated {
                table: if authority.is_empty() {
                    "default".to_string()
                } else {
                    authority
                },
            }),
            "hdfs" if !authority.is_empty() => Ok(DefaultFs::Cluster { authority }),
            "hdfs" => Err(invalid(format!("'{raw}' has no authority"))),
            other => Err(invalid(format!("unsupported scheme '{other}'"))),
        }
    }

    /// Look up the mount link for `mount` in `table`.
    ///
    /// Returns `Ok(None)` if there is no such link and an error if the link
    /// exists but its target is not a URL with an authority.
    pub fn mount_link(&self, table: &str, mount: &str) -> HdfsResult<Option<MountLink>> {
        let key = format!("{MOUNT_TABLE_PREFIX}{table}.link.{mount}");
        let Some(target) = self.get(&key) else {
            return Ok(None);
        };

        let invalid = |reason: String| HdfsError::InvalidConfig {
            key: key.clone(),
            reason,
        };
        let url = url::Url::parse(target).map_err(|e| invalid(e.to_string()))?;
        let cluster = match (url.host_str(), url.port()) {
            (Some(host), Some(port)) if !host.is_empty() => format!("{host}:{port}"),
            (Some(host), None) if !host.is_empty() => host.to_string(),
            _ => return Err(invalid(format!("link target '{target}' has no authority"))),
        };
        let root = if url.path().is_empty() {
            "/".to_string()
        } else {
            uri::clean(url.path())
        };

        Ok(Some(MountLink {
            mount: mount.to_string(),
            cluster,
            root,
        }))
    }

    /// The HA member ids of `cluster`, or `None` if the cluster has no
    /// `dfs.ha.namenodes.<cluster>` entry.
    pub fn ha_namenodes(&self, cluster: &str) -> Option<Vec<String>> {
        self.get(&format!("{HA_NAMENODES_PREFIX}{cluster}"))
            .map(|members| {
                members
                    .split(',')
                    .map(str::trim)
                    .filter(|m| !m.is_empty())
                    .map(str::to_string)
                    .collect()
            })
    }

    /// RPC address of HA member `namenode` of `cluster`.
    pub fn rpc_address(&self, cluster: &str, namenode: &str) -> HdfsResult<&str> {
        self.require(&format!("{RPC_ADDRESS_PREFIX}{cluster}.{namenode}"))
    }

    /// The HTTP address declared for the same HA member as the RPC address
    /// `rpc_endpoint`, if any.
    pub fn http_address_for(&self, rpc_endpoint: &str) -> Option<&str> {
        self.values
            .iter()
            .filter(|(_, v)| v.as_str() == rpc_endpoint)
            .find_map(|(k, _)| {
                let member = k.strip_prefix(RPC_ADDRESS_PREFIX)?;
                self.get(&format!("{HTTP_ADDRESS_PREFIX}{member}"))
            })
    }

    /// Top-level directories of all mount points in `table`, sorted.
    pub fn mount_points(&self, table: &str) -> Vec<String> {
        let prefix = format!("{MOUNT_TABLE_PREFIX}{table}.link.");
        let tops: BTreeSet<String> = self
            .values
            .keys()
            .filter_map(|k| k.strip_prefix(&prefix))
            .filter_map(|mount| uri::segments(mount).next())
            .map(|top| format!("/{top}"))
            .collect();
        tops.into_iter().collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
