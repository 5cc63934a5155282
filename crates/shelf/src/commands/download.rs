//! Fetch phase only, optionally committing the refreshed cache.

use std::path::Path;
use std::process::Command;
use std::sync::Arc;

use shelf_book::{SiteContext, caching_sources, download_books};
use shelf_config::{BookConfig, Config};

use super::open_cache;
use crate::error::CliError;
use crate::output::Output;

const COMMIT_MESSAGE: &str = "update cache";

pub(crate) async fn run(
    config: &Config,
    books: Vec<BookConfig>,
    commit: bool,
    version: &str,
) -> Result<(), CliError> {
    let output = Output::new();

    let cache = open_cache(config, version);
    let ctx = Arc::new(SiteContext::from_config(config, cache.as_ref(), false)?);
    let sources = caching_sources(config, cache);

    let names: Vec<String> = books.iter().map(|b| b.short.clone()).collect();
    let results = download_books(books, &ctx, &sources, config.build.concurrency()).await;

    let mut failed = 0;
    for (name, result) in names.iter().zip(results) {
        match result {
            Ok(download) => output.info(&format!(
                "{name}: {} pages, downloaded: {}, from cache: {}, images: {}",
                download.pages.len(),
                download.downloaded,
                download.from_cache,
                download.images
            )),
            Err(e) => {
                failed += 1;
                output.error(&format!("{name}: {e}"));
            }
        }
    }
    if failed > 0 {
        return Err(CliError::Validation(format!(
            "{failed} of {} book(s) failed to download",
            names.len()
        )));
    }
    output.success(&format!("Downloaded {} book(s)", names.len()));

    if commit {
        commit_cache(&config.cache_resolved.dir, &output)?;
    }
    Ok(())
}

/// `git add` + `git commit` the cache directory. Nothing staged is not an
/// error.
fn commit_cache(dir: &Path, output: &Output) -> Result<(), CliError> {
    git(dir, &["add", "--all", "."])?;

    let staged = Command::new("git")
        .current_dir(dir)
        .args(["diff", "--cached", "--quiet", "--", "."])
        .status()?;
    if staged.success() {
        output.warning("Cache unchanged, nothing to commit");
        return Ok(());
    }

    git(dir, &["commit", "--message", COMMIT_MESSAGE, "--", "."])?;
    output.success(&format!("Committed {}", dir.display()));
    Ok(())
}

fn git(dir: &Path, args: &[&str]) -> Result<(), CliError> {
    tracing::info!(dir = %dir.display(), ?args, "Running git");
    let out = Command::new("git").current_dir(dir).args(args).output()?;
    if out.status.success() {
        Ok(())
    } else {
        Err(CliError::Git {
            command: args.join(" "),
            stderr: String::from_utf8_lossy(&out.stderr).trim().to_owned(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn git_available() -> bool {
        Command::new("git").arg("--version").output().is_ok()
    }

    fn init_repo(dir: &Path) {
        for args in [
            &["init", "--quiet"][..],
            &["config", "user.email", "shelf@example.com"],
            &["config", "user.name", "shelf"],
        ] {
            git(dir, args).unwrap();
        }
    }

    #[test]
    fn test_commit_cache() {
        if !git_available() {
            return;
        }
        let tmp = TempDir::new().unwrap();
        init_repo(tmp.path());
        let cache = tmp.path().join("cache");
        std::fs::create_dir_all(&cache).unwrap();
        std::fs::write(cache.join("page.json"), "{}").unwrap();

        let output = Output::new();
        commit_cache(&cache, &output).unwrap();
        // Second run has nothing to commit.
        commit_cache(&cache, &output).unwrap();

        let log = Command::new("git")
            .current_dir(tmp.path())
            .args(["log", "--oneline"])
            .output()
            .unwrap();
        let log = String::from_utf8(log.stdout).unwrap();
        assert_eq!(log.lines().count(), 1);
        assert!(log.contains(COMMIT_MESSAGE));
    }

    #[test]
    fn test_git_failure_is_reported() {
        if !git_available() {
            return;
        }
        let tmp = TempDir::new().unwrap();
        let err = git(tmp.path(), &["commit", "--message", "x"]).unwrap_err();
        assert!(matches!(err, CliError::Git { ref command, .. } if command == "commit --message x"));
    }
}
