//! `hdfs touch`: update timestamps or create empty files.

use std::time::SystemTime;

use anyhow::Context as _;

use super::Context;
use crate::errors::HdfsError;

/// Set the modification and access time of existing paths to now. Missing
/// paths are created empty, unless `no_create` is set, in which case they
/// are an error.
pub async fn run(ctx: &Context<'_>, paths: &[String], no_create: bool) -> anyhow::Result<()> {
    if paths.is_empty() {
        return Err(HdfsError::NoPaths.into());
    }

    let resolution = ctx.resolve_concrete(paths).await?;
    let backend = resolution.backend.as_ref();

    for path in &resolution.paths {
        let result = match backend.stat(path).await {
            Ok(_) => {
                let now = SystemTime::now();
                backend.set_times(path, now, now).await
            }
            Err(e) if e.is_not_found() && !no_create => backend.create_empty(path).await,
            Err(e) => Err(e),
        };
        result.with_context(|| format!("touch {path}"))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testing;

    fn args(paths: &[&str]) -> Vec<String> {
        paths.iter().map(|p| p.to_string()).collect()
    }

    #[tokio::test]
    async fn creates_missing_files() {
        let conf = testing::conf();
        let connector = testing::connector(testing::backend().with_dir("/d"));
        let ctx = Context::new(&conf, &connector);

        run(&ctx, &args(&["/d/new", "mine"]), false).await.unwrap();

        let fs = connector.backend(testing::ENDPOINT);
        let status = fs.status("/d/new").unwrap();
        assert!(!status.is_dir());
        assert_eq!(status.length, 0);
        assert!(fs.exists("/user/alice/mine"));
    }

    #[tokio::test]
    async fn existing_files_get_new_times() {
        let conf = testing::conf();
        let connector = testing::connector(testing::backend().with_file("/d/old", "data"));
        let ctx = Context::new(&conf, &connector);

        let before = SystemTime::now();
        run(&ctx, &args(&["/d/old"]), false).await.unwrap();

        let fs = connector.backend(testing::ENDPOINT);
        let status = fs.status("/d/old").unwrap();
        assert!(status.modified.unwrap() >= before);
        assert!(status.accessed.unwrap() >= before);
        assert_eq!(status.length, 4);
        assert!(!fs.calls().iter().any(|c| c.starts_with("create")));
    }

    #[tokio::test]
    async fn no_create_reports_missing_files() {
        let conf = testing::conf();
        let connector = testing::connector(testing::backend().with_dir("/d"));
        let ctx = Context::new(&conf, &connector);

        let err = run(&ctx, &args(&["/d/missing"]), true).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<HdfsError>(),
            Some(HdfsError::NotFound(_))
        ));
        assert!(!connector.backend(testing::ENDPOINT).exists("/d/missing"));
    }

    #[tokio::test]
    async fn other_stat_errors_abort() {
        let conf = testing::conf();
        let connector =
            testing::connector(testing::backend().with_dir("/d").failing_on("/d/locked"));
        let ctx = Context::new(&conf, &connector);

        let err = run(&ctx, &args(&["/d/locked"]), false).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<HdfsError>(),
            Some(HdfsError::PermissionDenied(_))
        ));
    }

    #[tokio::test]
    async fn wildcards_are_rejected() {
        let conf = testing::conf();
        let connector = testing::connector(testing::backend());
        let ctx = Context::new(&conf, &connector);

        let err = run(&ctx, &args(&["/d/?"]), false).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<HdfsError>(),
            Some(HdfsError::GlobNotAllowed(_))
        ));
    }
}
