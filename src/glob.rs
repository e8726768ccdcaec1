//! Remote glob expansion.
//!
//! A path is a glob if one of its segments contains an unescaped `*`, `?`
//! or `[`. A backslash directly in front of one of those makes it literal,
//! so `/logs/\*raw` names the file `*raw` and is never expanded. Any other
//! backslash is part of the name.
//!
//! Expansion walks the remote tree with an explicit worklist. Each step
//! splits a glob path at its first wildcard segment:
//!
//! ```text
//! /data/2024-*/part-?/_SUCCESS
//! └─base─┘└pattern┘└─remainder─┘
//! ```
//!
//! lists `base`, and splices every matching child back in front of the
//! remainder. Splices that still contain a wildcard go back on the worklist
//! (directories only); the rest are checked with a `stat`.
//!
//! Inside the worklist, paths are kept in escaped form: real child names
//! are escaped before being spliced so that a file called `a*b` never
//! turns into a wildcard. Paths are unescaped only when they are sent to
//! the backend or returned.

use crate::backend::{Backend, EntryKind};
use crate::errors::{HdfsError, HdfsResult};
use crate::uri;

/// Wildcard metacharacters. A backslash directly in front of one of them
/// makes it literal; a backslash anywhere else is an ordinary character.
const META: &[char] = &['*', '?', '['];

// ---------------------------------------------------------------------------
// Lexical helpers
// ---------------------------------------------------------------------------

/// Returns `true` if any segment of `path` contains an unescaped wildcard.
///
/// Purely lexical: nothing is looked up remotely. Commands that cannot
/// take wildcards (`mkdir`, `touch`) call this directly and refuse.
pub fn has_glob(path: &str) -> bool {
    let mut prev = None;
    for c in path.chars() {
        if META.contains(&c) && prev != Some('\\') {
            return true;
        }
        prev = Some(c);
    }
    false
}

/// Escape `name` so that it matches only itself.
pub fn escape(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        if META.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Drop the backslashes that escape a metacharacter: `\*a\b` becomes
/// `*a\b`. Other backslashes are kept.
pub fn unescape(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    let mut chars = path.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\' && chars.peek().is_some_and(|next| META.contains(next)) {
            continue;
        }
        out.push(c);
    }
    out
}

/// The home directory of `user`.
pub fn home_dir(user: &str) -> String {
    uri::join(&["/user", user])
}

/// Make `path` absolute by resolving it against the home directory of
/// `user`. Absolute paths are returned unchanged.
pub fn absolutize(path: &str, user: &str) -> String {
    if uri::is_absolute(path) {
        path.to_string()
    } else {
        uri::join(&[home_dir(user).as_str(), path])
    }
}

/// Rewrite a pattern segment into `glob-match` syntax. Only `*`, `?` and
/// `[...]` keep their meaning: braces, commas and stray backslashes are
/// matched literally.
fn matcher_pattern(segment: &str) -> String {
    let mut out = String::with_capacity(segment.len() + 4);
    let mut chars = segment.chars().peekable();
    let mut in_class = false;
    let mut class_len = 0;

    while let Some(c) = chars.next() {
        if in_class {
            if c == ']' && class_len > 0 {
                in_class = false;
            }
            class_len += 1;
            out.push(c);
            continue;
        }
        match c {
            '\\' => match chars.peek() {
                Some(next) if META.contains(next) => {
                    out.push('\\');
                    out.push(*next);
                    chars.next();
                }
                _ => out.push_str("\\\\"),
            },
            '{' | '}' | ',' | ']' => {
                out.push('\\');
                out.push(c);
            }
            '[' => {
                in_class = true;
                class_len = 0;
                out.push(c);
            }
            _ => out.push(c),
        }
    }
    out
}

/// Match a single path segment (a child name) against a pattern segment.
fn segment_matches(pattern: &str, name: &str) -> bool {
    glob_match::glob_match(&matcher_pattern(pattern), name)
}

/// A glob path split at its first wildcard segment.
#[derive(Debug, PartialEq, Eq)]
struct GlobSplit {
    /// Literal directory to list, escaped form.
    base: String,
    /// The first wildcard segment.
    pattern: String,
    /// Everything after `pattern`, possibly with more wildcards.
    remainder: String,
}

impl GlobSplit {
    fn new(path: &str) -> Option<Self> {
        let segments: Vec<&str> = uri::segments(path).collect();
        let at = segments.iter().position(|s| has_glob(s))?;
        Some(Self {
            base: format!("/{}", segments[..at].join("/")),
            pattern: segments[at].to_string(),
            remainder: segments[at + 1..].join("/"),
        })
    }
}

// ---------------------------------------------------------------------------
// Expansion
// ---------------------------------------------------------------------------

/// Expand `paths` into concrete paths on `backend`.
///
/// Relative paths are first made absolute under the user's home
/// directory. Paths without wildcards pass through without any remote
/// call. A glob that matches nothing is a [`HdfsError::NotFound`] for that
/// glob. Any error other than "not found" met while walking aborts the
/// whole expansion.
pub async fn expand(backend: &dyn Backend, paths: &[String]) -> HdfsResult<Vec<String>> {
    let mut expanded = Vec::with_capacity(paths.len());

    for path in paths {
        let absolute = absolutize(path, backend.user());
        if !has_glob(&absolute) {
            expanded.push(unescape(&absolute));
            continue;
        }

        let matches = expand_glob(backend, &absolute).await?;
        if matches.is_empty() {
            return Err(HdfsError::NotFound(absolute));
        }
        log::debug!("glob: {absolute} matched {} path(s)", matches.len());
        expanded.extend(matches);
    }

    Ok(expanded)
}

/// Expand one absolute glob path. Returns the matches sorted.
async fn expand_glob(backend: &dyn Backend, glob: &str) -> HdfsResult<Vec<String>> {
    let mut matches = Vec::new();
    let mut pending = vec![glob.to_string()];

    while let Some(current) = pending.pop() {
        let Some(split) = GlobSplit::new(&current) else {
            continue;
        };

        let base = unescape(&split.base);
        log::debug!("glob: listing {base} for '{}'", split.pattern);
        let children = backend.list(&base).await?;

        for child in children {
            if !segment_matches(&split.pattern, &child.name) {
                continue;
            }
            // Only directories can have anything below them.
            if !split.remainder.is_empty() && child.kind != EntryKind::Dir {
                continue;
            }

            let candidate = uri::join(&[
                split.base.as_str(),
                escape(&child.name).as_str(),
                split.remainder.as_str(),
            ]);

            if has_glob(&candidate) {
                pending.push(candidate);
                continue;
            }

            let concrete = unescape(&candidate);
            match backend.stat(&concrete).await {
                Ok(_) => matches.push(concrete),
                Err(e) if e.is_not_found() => {
                    log::trace!("glob: {concrete} does not exist");
                }
                Err(e) => return Err(e),
            }
        }
    }

    matches.sort();
    matches.dedup();
    Ok(matches)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
