//! Code snippet evaluation.
//!
//! Fenced code blocks whose language has a configured interpreter are
//! written to a temporary file and run as `<interpreter> <file>`. Output is
//! cached by a hash of language and code, so unchanged snippets never run
//! twice across builds.

use std::collections::{BTreeMap, HashMap};
use std::io::Write;
use std::process::Command;

use sha2::{Digest, Sha256};
use shelf_cache::{CacheBucket, CacheBucketExt};

use crate::markdown;

/// Runs snippets through configured interpreters.
pub struct SnippetRunner {
    interpreters: BTreeMap<String, String>,
    cache: Box<dyn CacheBucket>,
}

impl SnippetRunner {
    /// `interpreters` maps a code block language to a command line,
    /// e.g. `python` to `python3` or `go` to `go run`.
    pub fn new(interpreters: BTreeMap<String, String>, cache: Box<dyn CacheBucket>) -> Self {
        Self {
            interpreters,
            cache,
        }
    }

    /// Output of every runnable code block of a page, by code block index.
    pub fn eval_page(&self, page_markdown: &str) -> BTreeMap<usize, String> {
        markdown::code_blocks(page_markdown)
            .into_iter()
            .filter_map(|block| {
                let output = self.eval(&block.lang, &block.code)?;
                Some((block.index, output))
            })
            .collect()
    }

    /// Run one snippet. `None` if the language has no interpreter or the
    /// interpreter could not be started.
    pub fn eval(&self, lang: &str, code: &str) -> Option<String> {
        let command = self.interpreters.get(lang)?;
        let key = snippet_key(lang, code);
        if let Some(output) = self.cache.get_string(&key, &key) {
            return Some(output);
        }

        let output = run(command, lang, code)?;
        self.cache.set_string(&key, &key, &output);
        Some(output)
    }
}

/// Cache key: hex SHA-256 of language and code.
fn snippet_key(lang: &str, code: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(lang.as_bytes());
    hasher.update([0]);
    hasher.update(code.as_bytes());
    hex::encode(hasher.finalize())
}

fn file_extension(lang: &str) -> &str {
    const KNOWN: &[(&str, &str)] = &[
        ("python", "py"),
        ("javascript", "js"),
        ("typescript", "ts"),
        ("ruby", "rb"),
        ("rust", "rs"),
        ("shell", "sh"),
        ("bash", "sh"),
    ];
    KNOWN
        .iter()
        .find(|(l, _)| *l == lang)
        .map_or(lang, |(_, ext)| ext)
}

fn run(command: &str, lang: &str, code: &str) -> Option<String> {
    let mut parts = command.split_whitespace();
    let program = parts.next()?;

    let mut file = match tempfile::Builder::new()
        .prefix("shelf-snippet-")
        .suffix(&format!(".{}", file_extension(lang)))
        .tempfile()
    {
        Ok(file) => file,
        Err(e) => {
            tracing::warn!(lang, "failed to create snippet file: {e}");
            return None;
        }
    };
    if let Err(e) = file.write_all(code.as_bytes()).and_then(|()| file.flush()) {
        tracing::warn!(lang, "failed to write snippet file: {e}");
        return None;
    }

    let output = match Command::new(program)
        .args(parts)
        .arg(file.path())
        .env_clear()
        .envs(passthrough_env())
        .output()
    {
        Ok(output) => output,
        Err(e) => {
            tracing::warn!(lang, program, "failed to run snippet: {e}");
            return None;
        }
    };

    let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
    if !output.status.success() {
        tracing::debug!(lang, status = %output.status, "snippet exited with failure");
        text.push_str(&String::from_utf8_lossy(&output.stderr));
    }
    Some(text)
}

/// Environment handed to interpreters: enough to find toolchains, nothing else.
fn passthrough_env() -> HashMap<String, String> {
    ["PATH", "HOME", "TMPDIR", "GOPATH", "GOCACHE", "LANG"]
        .iter()
        .filter_map(|k| std::env::var(k).ok().map(|v| ((*k).to_owned(), v)))
        .collect()
}
