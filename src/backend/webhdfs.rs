//! WebHDFS backend implementation.
//!
//! Talks to a namenode's HTTP listener using the WebHDFS REST API:
//!
//! ```text
//! http://<host>:<http-port>/webhdfs/v1/<path>?op=<OP>&user.name=<user>
//! ```
//!
//! Namenodes are addressed in configuration by their RPC address. The
//! connector maps an RPC address to the HTTP address declared for the same
//! HA member (`dfs.namenode.http-address.<cluster>.<nn>`); an endpoint with
//! no such entry is used as the HTTP address directly.
//!
//! Operations that touch file data (`CREATE`, `OPEN`) are redirected by the
//! namenode to a datanode; reqwest follows those redirects.

use async_trait::async_trait;
use bytes::Bytes;
use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use super::{Backend, Connector, DirectoryPage, EntryKind, FileStatus};
use crate::conf::Configuration;
use crate::errors::{HdfsError, HdfsResult};
use crate::uri;

/// Characters escaped inside a single path segment of the request URL.
const SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'[')
    .add(b']')
    .add(b'`')
    .add(b'{')
    .add(b'}');

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireFileStatus {
    #[serde(default)]
    path_suffix: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    length: u64,
    #[serde(default)]
    owner: String,
    #[serde(default)]
    group: String,
    #[serde(default)]
    permission: String,
    #[serde(default)]
    modification_time: u64,
    #[serde(default)]
    access_time: u64,
    #[serde(default)]
    replication: u16,
}

#[derive(Debug, Deserialize)]
struct FileStatusResponse {
    #[serde(rename = "FileStatus")]
    file_status: WireFileStatus,
}

#[derive(Debug, Deserialize)]
struct ListingResponse {
    #[serde(rename = "DirectoryListing")]
    directory_listing: DirectoryListing,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DirectoryListing {
    partial_listing: PartialListing,
    #[serde(default)]
    remaining_entries: u64,
}

#[derive(Debug, Deserialize)]
struct PartialListing {
    #[serde(rename = "FileStatuses")]
    file_statuses: FileStatuses,
}

#[derive(Debug, Deserialize)]
struct FileStatuses {
    #[serde(rename = "FileStatus", default)]
    file_status: Vec<WireFileStatus>,
}

#[derive(Debug, Deserialize)]
struct BooleanResponse {
    boolean: bool,
}

#[derive(Debug, Deserialize)]
struct RemoteExceptionResponse {
    #[serde(rename = "RemoteException")]
    remote_exception: RemoteException,
}

#[derive(Debug, Deserialize)]
struct RemoteException {
    exception: String,
    #[serde(default)]
    message: String,
}

impl From<WireFileStatus> for FileStatus {
    fn from(wire: WireFileStatus) -> Self {
        let kind = match wire.kind.as_str() {
            "DIRECTORY" => EntryKind::Dir,
            "SYMLINK" => EntryKind::Symlink,
            _ => EntryKind::File,
        };
        Self {
            name: wire.path_suffix,
            kind,
            length: wire.length,
            owner: wire.owner,
            group: wire.group,
            permission: u32::from_str_radix(&wire.permission, 8).unwrap_or(0),
            modified: from_millis(wire.modification_time),
            accessed: from_millis(wire.access_time),
            replication: wire.replication,
        }
    }
}

fn from_millis(ms: u64) -> Option<SystemTime> {
    (ms > 0).then(|| UNIX_EPOCH + Duration::from_millis(ms))
}

fn to_millis(time: SystemTime) -> u128 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0)
}

// ---------------------------------------------------------------------------
// WebHDFS backend
// ---------------------------------------------------------------------------

/// A WebHDFS client bound to one namenode.
pub struct WebHdfsBackend {
    client: Client,
    endpoint: String,
    base_url: String,
    user: String,
}

impl WebHdfsBackend {
    /// Build a client for the namenode whose RPC address is `endpoint` and
    /// whose HTTP listener is at `http_address`. No request is made.
    pub fn new(client: Client, endpoint: &str, http_address: &str, user: &str) -> Self {
        Self {
            client,
            endpoint: endpoint.to_string(),
            base_url: format!("http://{http_address}/webhdfs/v1"),
            user: user.to_string(),
        }
    }

    /// The request URL for `path`, without query string.
    fn url(&self, path: &str) -> String {
        let encoded: Vec<String> = uri::segments(path)
            .map(|s| utf8_percent_encode(s, SEGMENT).to_string())
            .collect();
        format!("{}/{}", self.base_url, encoded.join("/"))
    }

    fn request(&self, method: reqwest::Method, path: &str, op: &str) -> RequestBuilder {
        self.client
            .request(method, self.url(path))
            .query(&[("op", op), ("user.name", self.user.as_str())])
    }

    /// Send a request and turn WebHDFS error responses into [`HdfsError`]s.
    async fn send(&self, request: RequestBuilder, path: &str) -> HdfsResult<Response> {
        let response = request
            .send()
            .await
            .map_err(|e| HdfsError::ConnectionFailed {
                endpoint: self.endpoint.clone(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        match serde_json::from_str::<RemoteExceptionResponse>(&body) {
            Ok(err) => Err(HdfsError::from_remote(
                &err.remote_exception.exception,
                &err.remote_exception.message,
                path,
            )),
            Err(_) if status == StatusCode::NOT_FOUND => Err(HdfsError::NotFound(path.to_string())),
            Err(_) => Err(HdfsError::Remote(format!(
                "{} returned {status}: {}",
                self.endpoint,
                body.trim()
            ))),
        }
    }

    async fn json<T: serde::de::DeserializeOwned>(
        &self,
        request: RequestBuilder,
        path: &str,
    ) -> HdfsResult<T> {
        let response = self.send(request, path).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| HdfsError::Remote(format!("malformed response from {}: {e}", self.endpoint)))
    }

    async fn expect_true(&self, request: RequestBuilder, path: &str, op: &str) -> HdfsResult<()> {
        let result: BooleanResponse = self.json(request, path).await?;
        if result.boolean {
            Ok(())
        } else {
            Err(HdfsError::Remote(format!("{op} {path} failed")))
        }
    }
}

// ---------------------------------------------------------------------------
// Backend trait implementation
// ---------------------------------------------------------------------------

#[async_trait]
impl Backend for WebHdfsBackend {
    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn user(&self) -> &str {
        &self.user
    }

    async fn stat(&self, path: &str) -> HdfsResult<FileStatus> {
        let request = self.request(reqwest::Method::GET, path, "GETFILESTATUS");
        let response: FileStatusResponse = self.json(request, path).await?;
        Ok(response.file_status.into())
    }

    async fn list_partial(
        &self,
        path: &str,
        start_after: Option<&str>,
    ) -> HdfsResult<DirectoryPage> {
        let mut request = self.request(reqwest::Method::GET, path, "LISTSTATUS_BATCH");
        if let Some(after) = start_after {
            request = request.query(&[("startAfter", after)]);
        }
        log::trace!("{}: list {path} after {start_after:?}", self.endpoint);

        let response: ListingResponse = self.json(request, path).await?;
        let listing = response.directory_listing;
        Ok(DirectoryPage {
            entries: listing
                .partial_listing
                .file_statuses
                .file_status
                .into_iter()
                .map(FileStatus::from)
                .collect(),
            has_more: listing.remaining_entries > 0,
        })
    }

    async fn mkdir(&self, path: &str, parents: bool) -> HdfsResult<()> {
        if !parents {
            // MKDIRS behaves like `mkdir -p`.
            let parent = uri::parent(path);
            if !self.stat(&parent).await?.is_dir() {
                return Err(HdfsError::Remote(format!("{parent} is not a directory")));
            }
            match self.stat(path).await {
                Ok(_) => return Err(HdfsError::AlreadyExists(path.to_string())),
                Err(e) if e.is_not_found() => {}
                Err(e) => return Err(e),
            }
        }

        let request = self
            .request(reqwest::Method::PUT, path, "MKDIRS")
            .query(&[("permission", "755")]);
        self.expect_true(request, path, "mkdir").await
    }

    async fn create_empty(&self, path: &str) -> HdfsResult<()> {
        let request = self
            .request(reqwest::Method::PUT, path, "CREATE")
            .query(&[("overwrite", "false")])
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(Bytes::new());
        self.send(request, path).await?;
        Ok(())
    }

    async fn set_times(
        &self,
        path: &str,
        modified: SystemTime,
        accessed: SystemTime,
    ) -> HdfsResult<()> {
        let request = self.request(reqwest::Method::PUT, path, "SETTIMES").query(&[
            ("modificationtime", to_millis(modified).to_string()),
            ("accesstime", to_millis(accessed).to_string()),
        ]);
        self.send(request, path).await?;
        Ok(())
    }

    async fn read(&self, path: &str) -> HdfsResult<Bytes> {
        let request = self.request(reqwest::Method::GET, path, "OPEN");
        let response = self.send(request, path).await?;
        response.bytes().await.map_err(|e| HdfsError::ConnectionFailed {
            endpoint: self.endpoint.clone(),
            reason: e.to_string(),
        })
    }
}

// ---------------------------------------------------------------------------
// Connector
// ---------------------------------------------------------------------------

/// Opens [`WebHdfsBackend`]s, sharing one HTTP client between them.
pub struct WebHdfsConnector {
    client: Client,
    conf: Configuration,
    user: String,
}

impl WebHdfsConnector {
    /// `timeout` bounds every request, including the resolver's active checks.
    pub fn new(conf: &Configuration, user: &str, timeout: Duration) -> HdfsResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .map_err(|e| HdfsError::Internal(format!("failed to build http client: {e}")))?;
        Ok(Self {
            client,
            conf: conf.clone(),
            user: user.to_string(),
        })
    }

    fn http_address<'a>(&'a self, endpoint: &'a str) -> &'a str {
        self.conf.http_address_for(endpoint).unwrap_or(endpoint)
    }
}

#[async_trait]
impl Connector for WebHdfsConnector {
    async fn connect(&self, endpoint: &str) -> HdfsResult<Arc<dyn Backend>> {
        let http = self.http_address(endpoint);
        log::debug!("webhdfs: {endpoint} served at http://{http}");
        Ok(Arc::new(WebHdfsBackend::new(
            self.client.clone(),
            endpoint,
            http,
            &self.user,
        )))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
