//! The `hdfs` subcommands.
//!
//! Every command resolves its arguments through [`Resolver`] and then works
//! against the returned backend. Output goes to the writer passed in so the
//! commands can be tested without a terminal.

use std::io::Write;

use crate::backend::{Connector, FileStatus};
use crate::conf::Configuration;
use crate::errors::HdfsError;
use crate::glob;
use crate::resolver::{CheckAt, Resolution, Resolver};

pub mod get;
pub mod ls;
pub mod mkdir;
pub mod touch;

/// What every command needs: the loaded configuration and a way to reach
/// namenodes.
#[derive(Clone, Copy)]
pub struct Context<'a> {
    pub conf: &'a Configuration,
    pub connector: &'a dyn Connector,
}

impl<'a> Context<'a> {
    pub fn new(conf: &'a Configuration, connector: &'a dyn Connector) -> Self {
        Self { conf, connector }
    }

    pub fn resolver(&self) -> Resolver<'a> {
        Resolver::new(self.conf, self.connector)
    }

    /// Resolve paths that will be created, so they must be concrete. The
    /// active namenode is picked by checking the root, since the paths and
    /// their parents may not exist yet. The returned paths are absolute.
    pub async fn resolve_concrete<S: AsRef<str>>(
        &self,
        raw_paths: &[S],
    ) -> anyhow::Result<Resolution> {
        let mut raw = raw_paths.iter().map(|p| p.as_ref());
        if let Some(p) = raw.find(|p| glob::has_glob(p)) {
            return Err(HdfsError::GlobNotAllowed(p.to_string()).into());
        }
        let resolution = self.resolver().resolve_at(raw_paths, CheckAt::Root).await?;
        let user = resolution.backend.user().to_string();
        let paths = resolution
            .paths
            .iter()
            .map(|p| glob::unescape(&glob::absolutize(p, &user)))
            .collect();
        Ok(Resolution {
            paths,
            ..resolution
        })
    }
}

// ---------------------------------------------------------------------------
// Shared formatting
// ---------------------------------------------------------------------------

/// Render `ls -l` style permission bits, e.g. `drwxr-xr-x`.
pub fn mode_string(status: &FileStatus) -> String {
    use crate::backend::EntryKind;

    let mut mode = String::with_capacity(10);
    mode.push(match status.kind {
        EntryKind::Dir => 'd',
        EntryKind::Symlink => 'l',
        EntryKind::File => '-',
    });
    for shift in [6u32, 3, 0] {
        let bits = (status.permission >> shift) & 0o7;
        mode.push(if bits & 0o4 != 0 { 'r' } else { '-' });
        mode.push(if bits & 0o2 != 0 { 'w' } else { '-' });
        mode.push(if bits & 0o1 != 0 { 'x' } else { '-' });
    }
    mode
}

/// Rows of cells printed with every column padded to its widest cell.
pub struct Table {
    rows: Vec<Vec<String>>,
    /// Columns aligned to the right, by index.
    right: Vec<usize>,
}

impl Table {
    pub fn new(right: &[usize]) -> Self {
        Self {
            rows: Vec::new(),
            right: right.to_vec(),
        }
    }

    pub fn push(&mut self, row: Vec<String>) {
        self.rows.push(row);
    }

    /// Write all rows and empty the table. The last column is never padded.
    pub fn flush(&mut self, out: &mut dyn Write) -> std::io::Result<()> {
        let columns = self.rows.iter().map(Vec::len).max().unwrap_or(0);
        let mut widths = vec![0; columns];
        for row in &self.rows {
            for (i, cell) in row.iter().enumerate() {
                widths[i] = widths[i].max(cell.chars().count());
            }
        }

        for row in self.rows.drain(..) {
            let last = row.len().saturating_sub(1);
            let mut line = String::new();
            for (i, cell) in row.iter().enumerate() {
                if i > 0 {
                    line.push(' ');
                }
                if i == last {
                    line.push_str(cell);
                } else if self.right.contains(&i) {
                    line.push_str(&format!("{cell:>width$}", width = widths[i]));
                } else {
                    line.push_str(&format!("{cell:<width$}", width = widths[i]));
                }
            }
            writeln!(out, "{line}")?;
        }
        Ok(())
    }
}
