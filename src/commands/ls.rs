//! `hdfs ls`: list files and directories.

use std::io::Write;
use std::time::UNIX_EPOCH;

use anyhow::Context as _;
use bytesize::ByteSize;
use chrono::{DateTime, Datelike, Local};

use super::{Context, Table, mode_string};
use crate::backend::{Backend, FileStatus};
use crate::conf::DefaultFs;
use crate::errors::HdfsError;
use crate::uri;

#[derive(Debug, Clone, Copy, Default)]
pub struct LsOptions {
    /// `-l`: one entry per line with mode, replication, owner, group, size
    /// and date.
    pub long: bool,
    /// `-a`: include dot files, `.` and `..`.
    pub all: bool,
    /// `-h`: human readable sizes in long mode.
    pub human: bool,
}

pub async fn run(
    ctx: &Context<'_>,
    paths: &[String],
    opts: LsOptions,
    out: &mut dyn Write,
) -> anyhow::Result<()> {
    if paths.is_empty() {
        return Err(HdfsError::NoPaths.into());
    }

    for raw in paths {
        if raw == "/" {
            if let Ok(DefaultFs::Federated { table }) = ctx.conf.default_fs() {
                for mount in ctx.conf.mount_points(&table) {
                    writeln!(out, "{mount}")?;
                }
                continue;
            }
        }
        list_one(ctx, raw, opts, out)
            .await
            .with_context(|| format!("ls {raw}"))?;
    }
    Ok(())
}

async fn list_one(
    ctx: &Context<'_>,
    raw: &str,
    opts: LsOptions,
    out: &mut dyn Write,
) -> anyhow::Result<()> {
    let resolution = ctx.resolver().resolve_expanded(&[raw]).await?;
    let backend = resolution.backend.as_ref();
    let now = Local::now();

    let mut files = Table::new(LONG_RIGHT);
    let mut dirs = Vec::new();
    for path in &resolution.paths {
        let status = backend.stat(path).await?;
        // Names are printed in the namespace the user typed them in.
        let shown = resolution.logical_path(path);
        if status.is_dir() {
            dirs.push((path.clone(), shown));
        } else if opts.long {
            files.push(long_row(&shown, &status, opts.human, now));
        } else {
            writeln!(out, "{shown}")?;
        }
    }
    files.flush(out)?;

    for (i, (dir, shown)) in dirs.iter().enumerate() {
        if i > 0 {
            writeln!(out)?;
        }
        writeln!(out, "{shown}/:")?;
        print_dir(backend, dir, opts, now, out).await?;
    }
    Ok(())
}

async fn print_dir(
    backend: &dyn Backend,
    dir: &str,
    opts: LsOptions,
    now: DateTime<Local>,
    out: &mut dyn Write,
) -> anyhow::Result<()> {
    let mut table = Table::new(LONG_RIGHT);

    if opts.all {
        if opts.long {
            let this = backend.stat(dir).await?;
            let parent = backend.stat(&uri::parent(dir)).await?;
            table.push(long_row(".", &this, opts.human, now));
            table.push(long_row("..", &parent, opts.human, now));
        } else {
            writeln!(out, ".")?;
            writeln!(out, "..")?;
        }
    }

    for entry in backend.list(dir).await? {
        if !opts.all && entry.name.starts_with('.') {
            continue;
        }
        if opts.long {
            table.push(long_row(&entry.name, &entry, opts.human, now));
        } else {
            writeln!(out, "{}", entry.name)?;
        }
    }

    table.flush(out)?;
    Ok(())
}

/// Right-aligned columns of a long row: replication and size.
const LONG_RIGHT: &[usize] = &[1, 4];

/// mode, replication, owner, group, size, date, time-or-year, name
fn long_row(name: &str, status: &FileStatus, human: bool, now: DateTime<Local>) -> Vec<String> {
    let size = if human {
        ByteSize(status.length).to_string()
    } else {
        status.length.to_string()
    };

    let modified: DateTime<Local> = status.modified.unwrap_or(UNIX_EPOCH).into();
    let time_or_year = if modified.year() == now.year() {
        modified.format("%H:%M").to_string()
    } else {
        modified.format("%Y").to_string()
    };

    let replication = if status.is_dir() {
        "-".to_string()
    } else {
        status.replication.to_string()
    };

    vec![
        mode_string(status),
        replication,
        status.owner.clone(),
        status.group.clone(),
        size,
        modified.format("%b %e").to_string(),
        time_or_year,
        name.to_string(),
    ]
}
