//! `hdfs get` and `hdfs getmerge`: copy remote files to the local disk.

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use super::Context;
use crate::backend::{Backend, FileStatus};
use crate::errors::HdfsError;
use crate::uri;

/// Copy `src` (a file or a whole tree) to `dest`. Without `dest` the copy
/// lands in the current directory under the source's base name.
pub async fn get(ctx: &Context<'_>, src: &str, dest: Option<&Path>) -> anyhow::Result<()> {
    let resolution = ctx.resolver().resolve_expanded(&[src]).await?;
    let source = single_source(src, &resolution.paths)?;
    log::info!("copying {source} from {}", resolution.endpoint);

    let dest = match dest {
        Some(dest) => dest.to_path_buf(),
        None => std::env::current_dir()
            .context("current directory")?
            .join(uri::base_name(&source)),
    };

    copy_tree(resolution.backend.as_ref(), &source, &dest)
        .await
        .with_context(|| format!("get {source} -> {}", dest.display()))
}

/// Concatenate the files directly under `src` into the local file `dest`,
/// optionally following each one with a newline. Subdirectories are skipped.
pub async fn getmerge(
    ctx: &Context<'_>,
    src: &str,
    dest: &Path,
    newlines: bool,
) -> anyhow::Result<()> {
    let resolution = ctx.resolver().resolve_expanded(&[src]).await?;
    let backend = resolution.backend.as_ref();
    let source = single_source(src, &resolution.paths)?;

    let mut local = fs::File::create(dest)
        .await
        .with_context(|| format!("creating {}", dest.display()))?;

    for child in backend.list(&source).await? {
        if child.is_dir() {
            continue;
        }
        let path = uri::join(&[source.as_str(), child.name.as_str()]);
        let data = backend.read(&path).await?;
        log::debug!("merging {path} ({} bytes)", data.len());
        local.write_all(&data).await?;
        if newlines {
            local.write_all(b"\n").await?;
        }
    }

    local.flush().await?;
    Ok(())
}

fn single_source(raw: &str, paths: &[String]) -> anyhow::Result<String> {
    match paths {
        [] => Err(HdfsError::NotFound(raw.to_string()).into()),
        [only] => Ok(only.clone()),
        [first, ..] => {
            log::warn!("{raw} matches {} paths, using {first}", paths.len());
            Ok(first.clone())
        }
    }
}

async fn copy_tree(backend: &dyn Backend, source: &str, dest: &Path) -> anyhow::Result<()> {
    let root = backend.stat(source).await?;
    let mut pending: Vec<(String, PathBuf, FileStatus)> =
        vec![(source.to_string(), dest.to_path_buf(), root)];

    while let Some((remote, local, status)) = pending.pop() {
        if status.is_dir() {
            fs::create_dir(&local)
                .await
                .with_context(|| format!("creating {}", local.display()))?;
            for child in backend.list(&remote).await? {
                let child_remote = uri::join(&[remote.as_str(), child.name.as_str()]);
                let child_local = local.join(&child.name);
                pending.push((child_remote, child_local, child));
            }
        } else {
            let data = backend.read(&remote).await?;
            fs::write(&local, &data)
                .await
                .with_context(|| format!("writing {}", local.display()))?;
            log::debug!("copied {remote} -> {}", local.display());
        }
    }
    Ok(())
}
