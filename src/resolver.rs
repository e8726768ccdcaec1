//! Namenode resolution.
//!
//! The resolver sits between the commands and the backends. Given the raw
//! path arguments of one command it:
//!
//! - Parses every argument and checks that they do not name two different
//!   clusters.
//! - Works out which cluster serves the paths: the URL authority if there
//!   is one, otherwise `fs.defaultFS`, going through the ViewFS mount table
//!   when the default filesystem is federated.
//! - Expands the cluster into its HA candidate endpoints.
//! - Tries the candidates in declared order and returns a client for the
//!   first one that answers a `stat` successfully.
//!
//! Nothing is cached: every command invocation resolves from scratch.

use std::sync::Arc;

use crate::backend::{Backend, Connector};
use crate::conf::{Configuration, DefaultFs, MountLink};
use crate::errors::{HdfsError, HdfsResult};
use crate::glob;
use crate::uri::{self, RawPath};

/// Mount point consulted for relative paths, which live under the user's
/// home directory once expanded.
const HOME_ROOT: &str = "/user";

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Which directory a candidate must `stat` to count as active.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckAt {
    /// The directory holding the first path, or the mount root when
    /// federated.
    Parent,
    /// The cluster root, or the mount root when federated. For paths that
    /// are about to be created along with their parents.
    Root,
}

/// Where a set of paths lives, worked out from configuration alone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    /// HA candidates in declared order.
    pub candidates: Vec<String>,
    /// Directory that must `stat` successfully on the active candidate.
    pub check_dir: String,
    /// Root of the target namespace: `/` or the mount link root.
    pub root: String,
    /// The cleaned paths, rebased onto the target cluster where a mount
    /// link maps them to a different root.
    pub paths: Vec<String>,
    /// Mount links the paths went through. Empty without federation.
    pub links: Vec<MountLink>,
}

/// The outcome of a successful resolution.
pub struct Resolution {
    pub paths: Vec<String>,
    /// The active endpoint.
    pub endpoint: String,
    pub backend: Arc<dyn Backend>,
    pub links: Vec<MountLink>,
}

impl Resolution {
    /// Map a path on the target cluster back to the federated namespace
    /// the user typed it in. Paths outside every link are returned as is.
    pub fn logical_path(&self, path: &str) -> String {
        self.links
            .iter()
            .filter_map(|link| {
                uri::rebase(path, &link.root, &link.mount).map(|p| (link.root.len(), p))
            })
            .max_by_key(|(len, _)| *len)
            .map(|(_, p)| p)
            .unwrap_or_else(|| path.to_string())
    }
}

pub struct Resolver<'a> {
    conf: &'a Configuration,
    connector: &'a dyn Connector,
}

// ---------------------------------------------------------------------------
// Resolver
// ---------------------------------------------------------------------------

impl<'a> Resolver<'a> {
    pub fn new(conf: &'a Configuration, connector: &'a dyn Connector) -> Self {
        Self { conf, connector }
    }

    /// Resolve `raw_paths` to cleaned paths and a client for the active
    /// namenode. Relative paths stay relative.
    pub async fn resolve<S: AsRef<str>>(&self, raw_paths: &[S]) -> HdfsResult<Resolution> {
        self.resolve_at(raw_paths, CheckAt::Parent).await
    }

    /// [`resolve`](Self::resolve) with an explicit choice of the directory
    /// used to pick the active namenode.
    pub async fn resolve_at<S: AsRef<str>>(
        &self,
        raw_paths: &[S],
        at: CheckAt,
    ) -> HdfsResult<Resolution> {
        let target = self.target(raw_paths)?;
        let check_dir = match at {
            CheckAt::Parent => &target.check_dir,
            CheckAt::Root => &target.root,
        };
        let (endpoint, backend) = self.select_active(&target.candidates, check_dir).await?;
        Ok(Resolution {
            paths: target.paths,
            endpoint,
            backend,
            links: target.links,
        })
    }

    /// [`resolve`](Self::resolve), then expand home directories and globs
    /// against the active namenode.
    pub async fn resolve_expanded<S: AsRef<str>>(&self, raw_paths: &[S]) -> HdfsResult<Resolution> {
        let resolution = self.resolve(raw_paths).await?;
        let paths = glob::expand(resolution.backend.as_ref(), &resolution.paths).await?;
        Ok(Resolution {
            paths,
            ..resolution
        })
    }

    /// Work out candidates, the directory to check and cleaned paths
    /// without touching the network.
    pub fn target<S: AsRef<str>>(&self, raw_paths: &[S]) -> HdfsResult<Target> {
        if raw_paths.is_empty() {
            return Err(HdfsError::NoPaths);
        }

        let parsed = raw_paths
            .iter()
            .map(|raw| RawPath::parse(raw.as_ref()))
            .collect::<HdfsResult<Vec<_>>>()?;

        let authority = explicit_authority(&parsed)?;
        let paths: Vec<String> = parsed.into_iter().map(|p| p.path).collect();

        if let Some(authority) = authority {
            return Ok(Target {
                candidates: self.endpoints(&authority, true)?,
                check_dir: containing_dir(&paths[0]),
                root: "/".to_string(),
                paths,
                links: Vec::new(),
            });
        }

        match self.conf.default_fs()? {
            DefaultFs::Cluster { authority } => Ok(Target {
                candidates: self.endpoints(&authority, false)?,
                check_dir: containing_dir(&paths[0]),
                root: "/".to_string(),
                paths,
                links: Vec::new(),
            }),
            DefaultFs::Federated { table } => self.federated_target(&table, paths),
        }
    }

    fn federated_target(&self, table: &str, paths: Vec<String>) -> HdfsResult<Target> {
        let mut first: Option<MountLink> = None;
        let mut links: Vec<MountLink> = Vec::new();
        let mut rebased = Vec::with_capacity(paths.len());

        for path in paths {
            let absolute = uri::is_absolute(&path);
            let link = self.mount_for(table, if absolute { &path } else { HOME_ROOT })?;

            if let Some(ref first) = first {
                if first.cluster != link.cluster {
                    return Err(HdfsError::MultipleTargets {
                        first: first.cluster.clone(),
                        second: link.cluster,
                    });
                }
            }

            rebased.push(if absolute {
                uri::rebase(&path, &link.mount, &link.root).unwrap_or(path)
            } else {
                path
            });
            if !links.contains(&link) {
                links.push(link.clone());
            }
            first.get_or_insert(link);
        }

        let link = first.ok_or(HdfsError::NoPaths)?;
        Ok(Target {
            candidates: self.endpoints(&link.cluster, false)?,
            check_dir: link.root.clone(),
            root: link.root,
            paths: rebased,
            links,
        })
    }

    /// Find the mount link covering `path`, trying the two-segment prefix
    /// before the one-segment prefix.
    fn mount_for(&self, table: &str, path: &str) -> HdfsResult<MountLink> {
        let segments: Vec<&str> = uri::segments(path).collect();
        let mut keys = Vec::with_capacity(2);
        if segments.len() >= 2 {
            keys.push(format!("/{}/{}", segments[0], segments[1]));
        }
        if let Some(top) = segments.first() {
            keys.push(format!("/{top}"));
        }

        for key in keys {
            if let Some(link) = self.conf.mount_link(table, &key)? {
                log::debug!(
                    "{path}: mount {} -> {}{}",
                    link.mount,
                    link.cluster,
                    link.root
                );
                return Ok(link);
            }
        }
        Err(HdfsError::NoMountPoint(path.to_string()))
    }

    /// Turn an authority into candidate endpoints.
    ///
    /// `host:port` is a single literal endpoint. Anything else is a cluster
    /// id and must have an HA group, unless `literal_fallback` allows it to
    /// be used as an endpoint as-is.
    fn endpoints(&self, authority: &str, literal_fallback: bool) -> HdfsResult<Vec<String>> {
        let has_port = authority
            .rsplit_once(':')
            .is_some_and(|(_, port)| port.parse::<u16>().is_ok());
        if has_port {
            return Ok(vec![authority.to_string()]);
        }

        match self.conf.ha_namenodes(authority) {
            Some(members) if members.is_empty() => Err(HdfsError::InvalidConfig {
                key: format!("dfs.ha.namenodes.{authority}"),
                reason: "no namenodes listed".to_string(),
            }),
            Some(members) => members
                .iter()
                .map(|nn| self.conf.rpc_address(authority, nn).map(str::to_string))
                .collect(),
            None if literal_fallback => Ok(vec![authority.to_string()]),
            None => Err(HdfsError::MissingConfig(format!(
                "dfs.ha.namenodes.{authority}"
            ))),
        }
    }

    /// Return the first candidate that accepts a connection and answers a
    /// stat of `check_dir` successfully. Any error, not-found included,
    /// moves on to the next one. Candidates after the winner are never
    /// contacted.
    async fn select_active(
        &self,
        candidates: &[String],
        check_dir: &str,
    ) -> HdfsResult<(String, Arc<dyn Backend>)> {
        let mut last = None;

        for endpoint in candidates {
            log::debug!("trying namenode {endpoint} with {check_dir}");
            let attempt = async {
                let backend = self.connector.connect(endpoint).await?;
                backend.stat(check_dir).await?;
                Ok::<_, HdfsError>(backend)
            }
            .await;

            match attempt {
                Ok(backend) => {
                    log::info!("active namenode: {endpoint}");
                    return Ok((endpoint.clone(), backend));
                }
                Err(e) => {
                    log::warn!("namenode {endpoint} unavailable: {e}");
                    last = Some(e);
                }
            }
        }

        Err(HdfsError::NoActiveNamenode {
            candidates: candidates.join(","),
            last: Box::new(
                last.unwrap_or_else(|| HdfsError::Internal("no namenode candidates".into())),
            ),
        })
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// The single authority named by the arguments, if any.
fn explicit_authority(parsed: &[RawPath]) -> HdfsResult<Option<String>> {
    let mut found: Option<&str> = None;
    for authority in parsed.iter().filter_map(|p| p.authority.as_deref()) {
        match found {
            Some(first) if first != authority => {
                return Err(HdfsError::MultipleTargets {
                    first: first.to_string(),
                    second: authority.to_string(),
                });
            }
            _ => found = Some(authority),
        }
    }
    Ok(found.map(str::to_string))
}

/// The directory containing `path`, cut off before its first wildcard
/// segment. Relative paths are checked at the root.
fn containing_dir(path: &str) -> String {
    if !uri::is_absolute(path) {
        return "/".to_string();
    }
    let parent = uri::parent(path);
    let literal: Vec<&str> = uri::segments(&parent)
        .take_while(|s| !glob::has_glob(s))
        .collect();
    glob::unescape(&format!("/{}", literal.join("/")))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
