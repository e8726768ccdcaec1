//! `hdfs mkdir`: create directories.

use anyhow::Context as _;

use super::Context;
use crate::errors::HdfsError;

/// Create every path. With `parents`, missing ancestors are created too and
/// paths that already exist are not an error.
pub async fn run(ctx: &Context<'_>, paths: &[String], parents: bool) -> anyhow::Result<()> {
    if paths.is_empty() {
        return Err(HdfsError::NoPaths.into());
    }

    // Each path is resolved on its own, so one invocation may span clusters.
    for raw in paths {
        let resolution = ctx.resolve_concrete(&[raw]).await?;
        for path in &resolution.paths {
            match resolution.backend.mkdir(path, parents).await {
                Ok(()) => log::debug!("created {path}"),
                Err(HdfsError::AlreadyExists(_)) if parents => {}
                Err(e) => return Err(e).with_context(|| format!("mkdir {raw}")),
            }
        }
    }
    Ok(())
}
