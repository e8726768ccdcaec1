//! Path and URL handling.
//!
//! Command-line arguments are either bare paths or URLs whose authority
//! names the target cluster or namenode:
//!
//! ```text
//! /data/logs/2024
//! reports/latest
//! hdfs://mycluster/data/logs
//! hdfs://nn1.example.com:8020/data/logs
//! ```
//!
//! Paths are kept as `/`-separated strings rather than [`std::path::Path`]
//! because they describe the remote namespace, not the local one.

use percent_encoding::percent_decode_str;

use crate::errors::{HdfsError, HdfsResult};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// A command-line argument split into its target authority and its cleaned
/// path component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPath {
    /// `host`, `host:port` or cluster id, if the argument was a URL with an
    /// authority.
    pub authority: Option<String>,
    /// The cleaned path. Absolute unless the argument was a relative path.
    pub path: String,
}

impl RawPath {
    /// Parse a single argument.
    ///
    /// Anything that starts with `<scheme>:/` is parsed as a URL; everything
    /// else is taken verbatim as a path. In both cases the path is cleaned
    /// but not made absolute.
    pub fn parse(raw: &str) -> HdfsResult<Self> {
        if !has_scheme(raw) {
            return Ok(Self {
                authority: None,
                path: clean(raw),
            });
        }

        let url = url::Url::parse(raw).map_err(|e| HdfsError::InvalidUrl {
            url: raw.to_string(),
            reason: e.to_string(),
        })?;

        let authority = match (url.host_str(), url.port()) {
            (Some(host), _) if host.is_empty() => None,
            (Some(host), Some(port)) => Some(format!("{host}:{port}")),
            (Some(host), None) => Some(host.to_string()),
            (None, _) => None,
        };

        let decoded = percent_decode_str(url.path())
            .decode_utf8()
            .map_err(|e| HdfsError::InvalidUrl {
                url: raw.to_string(),
                reason: e.to_string(),
            })?;

        let path = if decoded.is_empty() {
            "/".to_string()
        } else {
            clean(&decoded)
        };

        Ok(Self { authority, path })
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Returns `true` if `raw` starts with `<scheme>:/`.
fn has_scheme(raw: &str) -> bool {
    let Some(colon) = raw.find(':') else {
        return false;
    };
    let scheme = &raw[..colon];
    let mut chars = scheme.chars();
    let valid = match chars.next() {
        Some(first) if first.is_ascii_alphabetic() => {
            chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        }
        _ => false,
    };
    valid && raw[colon + 1..].starts_with('/')
}

/// Returns `true` for paths rooted at `/`.
pub fn is_absolute(path: &str) -> bool {
    path.starts_with('/')
}

/// Lexically clean a path: collapse repeated slashes, drop `.` segments and
/// resolve `..` against the preceding segment.
///
/// `..` at the root of an absolute path is dropped; leading `..` segments of
/// a relative path are kept. The empty path cleans to `.`.
pub fn clean(path: &str) -> String {
    let rooted = is_absolute(path);
    let mut out: Vec<&str> = Vec::new();

    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => match out.last() {
                Some(&last) if last != ".." => {
                    out.pop();
                }
                _ if rooted => {}
                _ => out.push(".."),
            },
            other => out.push(other),
        }
    }

    let joined = out.join("/");
    match (rooted, joined.is_empty()) {
        (true, _) => format!("/{joined}"),
        (false, true) => ".".to_string(),
        (false, false) => joined,
    }
}

/// Join path fragments with `/` and clean the result. Empty fragments are
/// ignored.
pub fn join<S: AsRef<str>>(parts: &[S]) -> String {
    let joined = parts
        .iter()
        .map(AsRef::as_ref)
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join("/");
    if joined.is_empty() {
        return String::new();
    }
    clean(&joined)
}

/// The directory containing `path`. The parent of `/` is `/`.
pub fn parent(path: &str) -> String {
    let cleaned = clean(path);
    match cleaned.rfind('/') {
        Some(0) => "/".to_string(),
        Some(idx) => cleaned[..idx].to_string(),
        None => ".".to_string(),
    }
}

/// The last segment of `path`.
pub fn base_name(path: &str) -> &str {
    path.rsplit('/').find(|s| !s.is_empty()).unwrap_or("/")
}

/// The non-empty `/`-separated segments of `path`.
pub fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

/// Move `path` from under `mount` to under `root`.
///
/// Returns `None` if `path` is not `mount` itself or below it.
pub fn rebase(path: &str, mount: &str, root: &str) -> Option<String> {
    let rest = path.strip_prefix(mount)?;
    if !(rest.is_empty() || rest.starts_with('/') || mount == "/") {
        return None;
    }
    Some(join(&[root, rest]))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
