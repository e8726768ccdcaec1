//! Filesystem client traits.
//!
//! A [`Connector`] turns an endpoint string (`host:port`) into a
//! [`Backend`], a client bound to that one namenode. The resolver and the
//! glob expander only ever talk to these traits; the transport behind them
//! is WebHDFS in production and an in-memory tree in tests.

use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;
use std::time::SystemTime;

use crate::errors::HdfsResult;

#[cfg(test)]
pub mod memory;
pub mod webhdfs;

// ---------------------------------------------------------------------------
// Types returned by backend operations
// ---------------------------------------------------------------------------

/// The kind of a filesystem entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EntryKind {
    #[default]
    File,
    Dir,
    Symlink,
}

/// Metadata for a remote path, returned by [`Backend::stat`] and, per
/// child, by [`Backend::list`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileStatus {
    /// Entry name. Empty for the result of a `stat` call.
    pub name: String,
    pub kind: EntryKind,
    pub length: u64,
    pub owner: String,
    pub group: String,
    /// Permission bits, e.g. `0o755`.
    pub permission: u32,
    pub modified: Option<SystemTime>,
    pub accessed: Option<SystemTime>,
    pub replication: u16,
}

impl FileStatus {
    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Dir
    }
}

/// One page of a directory listing.
#[derive(Debug, Clone, Default)]
pub struct DirectoryPage {
    pub entries: Vec<FileStatus>,
    /// `true` if another page follows the last entry of this one.
    pub has_more: bool,
}

// ---------------------------------------------------------------------------
// Backend trait
// ---------------------------------------------------------------------------

/// A client connected to a single namenode.
#[async_trait]
pub trait Backend: Send + Sync {
    /// The `host:port` this client talks to.
    fn endpoint(&self) -> &str;

    /// The user name requests are issued as.
    fn user(&self) -> &str;

    /// Get metadata for a remote path.
    async fn stat(&self, path: &str) -> HdfsResult<FileStatus>;

    /// Fetch one page of the listing of `path`, starting after the entry
    /// named `start_after` (or at the beginning).
    async fn list_partial(&self, path: &str, start_after: Option<&str>)
    -> HdfsResult<DirectoryPage>;

    /// List every entry of a remote directory, fetching pages until the
    /// listing is exhausted.
    async fn list(&self, path: &str) -> HdfsResult<Vec<FileStatus>> {
        let mut entries: Vec<FileStatus> = Vec::new();
        loop {
            let start_after = entries.last().map(|e| e.name.clone());
            let page = self.list_partial(path, start_after.as_deref()).await?;
            let progressed = !page.entries.is_empty();
            entries.extend(page.entries);
            if !page.has_more || !progressed {
                return Ok(entries);
            }
        }
    }

    /// Create a directory. With `parents`, missing ancestors are created
    /// too and an existing directory is not an error.
    async fn mkdir(&self, path: &str, parents: bool) -> HdfsResult<()>;

    /// Create an empty file. Fails if `path` already exists.
    async fn create_empty(&self, path: &str) -> HdfsResult<()>;

    /// Set modification and access times.
    async fn set_times(&self, path: &str, modified: SystemTime, accessed: SystemTime)
    -> HdfsResult<()>;

    /// Read the entire contents of a remote file.
    async fn read(&self, path: &str) -> HdfsResult<Bytes>;
}

/// Opens [`Backend`] clients for endpoints.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, endpoint: &str) -> HdfsResult<Arc<dyn Backend>>;
}
