//! In-memory backend used by the unit tests.
//!
//! [`MemoryBackend`] keeps a flat `path -> node` map and records every call
//! it receives, so tests can assert both on results and on which remote
//! operations were issued. [`MemoryConnector`] hands out backends by
//! endpoint and fails to connect to anything it does not know.

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

use super::{Backend, Connector, DirectoryPage, EntryKind, FileStatus};
use crate::errors::{HdfsError, HdfsResult};
use crate::uri;

#[derive(Debug, Clone)]
struct Node {
    status: FileStatus,
    data: Bytes,
}

impl Node {
    fn dir() -> Self {
        Self {
            status: FileStatus {
                kind: EntryKind::Dir,
                permission: 0o755,
                owner: "hdfs".into(),
                group: "supergroup".into(),
                ..Default::default()
            },
            data: Bytes::new(),
        }
    }

    fn file(data: Bytes) -> Self {
        Self {
            status: FileStatus {
                kind: EntryKind::File,
                length: data.len() as u64,
                permission: 0o644,
                owner: "hdfs".into(),
                group: "supergroup".into(),
                replication: 3,
                ..Default::default()
            },
            data,
        }
    }
}

// ---------------------------------------------------------------------------
// Backend
// ---------------------------------------------------------------------------

pub struct MemoryBackend {
    endpoint: String,
    user: String,
    nodes: Mutex<BTreeMap<String, Node>>,
    page_size: usize,
    standby: bool,
    failing: BTreeSet<String>,
    calls: Mutex<Vec<String>>,
}

impl MemoryBackend {
    pub fn new(endpoint: &str, user: &str) -> Self {
        let mut nodes = BTreeMap::new();
        nodes.insert("/".to_string(), Node::dir());
        Self {
            endpoint: endpoint.to_string(),
            user: user.to_string(),
            nodes: Mutex::new(nodes),
            page_size: 1000,
            standby: false,
            failing: BTreeSet::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Add a directory, creating missing ancestors.
    pub fn with_dir(self, path: &str) -> Self {
        self.insert_parents(path);
        self.nodes
            .lock()
            .unwrap()
            .insert(uri::clean(path), Node::dir());
        self
    }

    /// Add a file, creating missing ancestors.
    pub fn with_file(self, path: &str, contents: &str) -> Self {
        self.insert_parents(path);
        self.nodes.lock().unwrap().insert(
            uri::clean(path),
            Node::file(Bytes::copy_from_slice(contents.as_bytes())),
        );
        self
    }

    /// Add a symbolic link, creating missing ancestors.
    pub fn with_symlink(self, path: &str) -> Self {
        self.insert_parents(path);
        let mut node = Node::file(Bytes::new());
        node.status.kind = EntryKind::Symlink;
        node.status.permission = 0o777;
        self.nodes.lock().unwrap().insert(uri::clean(path), node);
        self
    }

    /// Serve directory listings in pages of `size` entries.
    pub fn with_page_size(mut self, size: usize) -> Self {
        self.page_size = size;
        self
    }

    /// Behave like a standby namenode: every operation fails.
    pub fn standby(mut self) -> Self {
        self.standby = true;
        self
    }

    /// Fail every operation on `path` with a non-not-found error.
    pub fn failing_on(mut self, path: &str) -> Self {
        self.failing.insert(path.to_string());
        self
    }

    /// Every operation received so far, e.g. `"stat /a"`.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn exists(&self, path: &str) -> bool {
        self.nodes.lock().unwrap().contains_key(&uri::clean(path))
    }

    pub fn status(&self, path: &str) -> Option<FileStatus> {
        self.nodes
            .lock()
            .unwrap()
            .get(&uri::clean(path))
            .map(|n| n.status.clone())
    }

    fn insert_parents(&self, path: &str) {
        let mut nodes = self.nodes.lock().unwrap();
        let mut current = uri::parent(path);
        while current != "/" {
            nodes.entry(current.clone()).or_insert_with(Node::dir);
            current = uri::parent(&current);
        }
    }

    fn record(&self, op: &str, path: &str) -> HdfsResult<()> {
        self.calls.lock().unwrap().push(format!("{op} {path}"));
        if self.standby {
            return Err(HdfsError::Remote(
                "StandbyException: Operation category READ is not supported in state standby"
                    .into(),
            ));
        }
        if self.failing.contains(path) {
            return Err(HdfsError::PermissionDenied(path.to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn user(&self) -> &str {
        &self.user
    }

    async fn stat(&self, path: &str) -> HdfsResult<FileStatus> {
        self.record("stat", path)?;
        let nodes = self.nodes.lock().unwrap();
        let node = nodes
            .get(path)
            .ok_or_else(|| HdfsError::NotFound(path.to_string()))?;
        Ok(FileStatus {
            name: String::new(),
            ..node.status.clone()
        })
    }

    async fn list_partial(
        &self,
        path: &str,
        start_after: Option<&str>,
    ) -> HdfsResult<DirectoryPage> {
        self.record("list", path)?;
        let nodes = self.nodes.lock().unwrap();
        match nodes.get(path) {
            None => return Err(HdfsError::NotFound(path.to_string())),
            Some(node) if !node.status.is_dir() => {
                return Err(HdfsError::Remote(format!("{path} is not a directory")));
            }
            Some(_) => {}
        }

        let mut children: Vec<FileStatus> = nodes
            .iter()
            .filter(|(p, _)| p.as_str() != "/" && uri::parent(p) == path)
            .map(|(p, n)| FileStatus {
                name: uri::base_name(p).to_string(),
                ..n.status.clone()
            })
            .collect();
        children.sort_by(|a, b| a.name.cmp(&b.name));

        let remaining: Vec<FileStatus> = children
            .into_iter()
            .filter(|c| start_after.is_none_or(|after| c.name.as_str() > after))
            .collect();
        let has_more = remaining.len() > self.page_size;
        let entries = remaining.into_iter().take(self.page_size).collect();

        Ok(DirectoryPage { entries, has_more })
    }

    async fn mkdir(&self, path: &str, parents: bool) -> HdfsResult<()> {
        self.record("mkdir", path)?;
        let mut nodes = self.nodes.lock().unwrap();
        if let Some(existing) = nodes.get(path) {
            return if parents && existing.status.is_dir() {
                Ok(())
            } else {
                Err(HdfsError::AlreadyExists(path.to_string()))
            };
        }

        let parent = uri::parent(path);
        if !nodes.contains_key(&parent) {
            if !parents {
                return Err(HdfsError::NotFound(parent));
            }
            let mut current = parent;
            while !nodes.contains_key(&current) {
                nodes.insert(current.clone(), Node::dir());
                current = uri::parent(&current);
            }
        }
        nodes.insert(path.to_string(), Node::dir());
        Ok(())
    }

    async fn create_empty(&self, path: &str) -> HdfsResult<()> {
        self.record("create", path)?;
        let mut nodes = self.nodes.lock().unwrap();
        if nodes.contains_key(path) {
            return Err(HdfsError::AlreadyExists(path.to_string()));
        }
        let parent = uri::parent(path);
        if !nodes.contains_key(&parent) {
            return Err(HdfsError::NotFound(parent));
        }
        nodes.insert(path.to_string(), Node::file(Bytes::new()));
        Ok(())
    }

    async fn set_times(
        &self,
        path: &str,
        modified: SystemTime,
        accessed: SystemTime,
    ) -> HdfsResult<()> {
        self.record("settimes", path)?;
        let mut nodes = self.nodes.lock().unwrap();
        let node = nodes
            .get_mut(path)
            .ok_or_else(|| HdfsError::NotFound(path.to_string()))?;
        node.status.modified = Some(modified);
        node.status.accessed = Some(accessed);
        Ok(())
    }

    async fn read(&self, path: &str) -> HdfsResult<Bytes> {
        self.record("read", path)?;
        let nodes = self.nodes.lock().unwrap();
        match nodes.get(path) {
            None => Err(HdfsError::NotFound(path.to_string())),
            Some(node) if node.status.is_dir() => {
                Err(HdfsError::Remote(format!("{path} is a directory")))
            }
            Some(node) => Ok(node.data.clone()),
        }
    }
}

// ---------------------------------------------------------------------------
// Connector
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemoryConnector {
    backends: HashMap<String, Arc<MemoryBackend>>,
    attempts: Mutex<Vec<String>>,
}

impl MemoryConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `backend` reachable under its endpoint.
    pub fn with(mut self, backend: MemoryBackend) -> Self {
        self.backends
            .insert(backend.endpoint.clone(), Arc::new(backend));
        self
    }

    pub fn backend(&self, endpoint: &str) -> Arc<MemoryBackend> {
        Arc::clone(&self.backends[endpoint])
    }

    /// Endpoints `connect` was called with, in order.
    pub fn attempts(&self) -> Vec<String> {
        self.attempts.lock().unwrap().clone()
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    async fn connect(&self, endpoint: &str) -> HdfsResult<Arc<dyn Backend>> {
        self.attempts.lock().unwrap().push(endpoint.to_string());
        match self.backends.get(endpoint) {
            Some(backend) => Ok(Arc::clone(backend) as Arc<dyn Backend>),
            None => Err(HdfsError::ConnectionFailed {
                endpoint: endpoint.to_string(),
                reason: "connection refused".into(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn list_pages_are_stitched_together() {
        let fs = MemoryBackend::new("nn:1", "alice")
            .with_file("/d/a", "")
            .with_file("/d/b", "")
            .with_file("/d/c", "")
            .with_dir("/d/e")
            .with_page_size(2);

        let names: Vec<String> = fs.list("/d").await.unwrap().into_iter().map(|e| e.name).collect();
        assert_eq!(names, vec!["a", "b", "c", "e"]);
        assert_eq!(
            fs.calls().iter().filter(|c| c.as_str() == "list /d").count(),
            2
        );
    }

    #[tokio::test]
    async fn unknown_endpoint_fails_to_connect() {
        let connector = MemoryConnector::new();
        let err = connector.connect("nowhere:1").await.err().unwrap();
        assert!(matches!(err, HdfsError::ConnectionFailed { .. }));
    }
}
