//! Remote backends serving page trees.
//!
//! A remote is anything that can answer three questions about a page id:
//! what version it is at, what it contains, and what its images are. Both
//! backends here are blocking; callers run walks on a blocking thread.

use std::path::{Component, Path, PathBuf};
use std::time::{Duration, UNIX_EPOCH};

use ureq::Agent;

use crate::{FetchError, FetchErrorKind, RemotePage};

/// Default HTTP timeout in seconds.
const DEFAULT_TIMEOUT: u64 = 30;

/// Source of pages and images.
pub trait Remote: Send + Sync {
    /// Short backend name used in errors and logs.
    fn name(&self) -> &'static str;

    /// Current version of a page.
    ///
    /// An empty string means the remote cannot tell, which forces a download.
    fn version(&self, id: &str) -> Result<String, FetchError>;

    /// Download a page.
    fn download(&self, id: &str) -> Result<RemotePage, FetchError>;

    /// Download an image referenced by a page.
    fn download_image(&self, name: &str) -> Result<Vec<u8>, FetchError>;
}

/// Reject ids and image names that are not a single plain path segment.
fn check_segment(name: &str) -> Result<(), FetchError> {
    let mut components = Path::new(name).components();
    let single = matches!(components.next(), Some(Component::Normal(_)))
        && components.next().is_none();
    if single {
        Ok(())
    } else {
        Err(FetchError::new(FetchErrorKind::NotFound).with_item(name))
    }
}

/// Remote backed by a local directory.
///
/// ```text
/// {root}/
/// +-- a1.json
/// +-- b2.json
/// +-- img/
///     +-- diagram.png
/// ```
///
/// Page versions are file modification times.
pub struct DirRemote {
    root: PathBuf,
}

impl DirRemote {
    #[must_use]
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    fn page_path(&self, id: &str) -> Result<PathBuf, FetchError> {
        check_segment(id).map_err(|e| e.with_remote("Dir"))?;
        Ok(self.root.join(format!("{id}.json")))
    }
}

impl Remote for DirRemote {
    fn name(&self) -> &'static str {
        "Dir"
    }

    fn version(&self, id: &str) -> Result<String, FetchError> {
        let path = self.page_path(id)?;
        let modified = std::fs::metadata(&path)
            .and_then(|m| m.modified())
            .map_err(|e| FetchError::io(e, id).with_remote("Dir"))?;
        let nanos = modified
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        Ok(nanos.to_string())
    }

    fn download(&self, id: &str) -> Result<RemotePage, FetchError> {
        let path = self.page_path(id)?;
        let bytes = std::fs::read(&path).map_err(|e| FetchError::io(e, id).with_remote("Dir"))?;
        parse_page(&bytes, id).map_err(|e| e.with_remote("Dir"))
    }

    fn download_image(&self, name: &str) -> Result<Vec<u8>, FetchError> {
        check_segment(name).map_err(|e| e.with_remote("Dir"))?;
        let path = self.root.join("img").join(name);
        std::fs::read(&path).map_err(|e| FetchError::io(e, name).with_remote("Dir"))
    }
}

/// Remote backed by an HTTP server with the same layout as [`DirRemote`]:
/// `GET {url}/pages/{id}.json` and `GET {url}/img/{name}`.
///
/// Page versions come from a `HEAD` request (`ETag`, then `Last-Modified`).
pub struct HttpRemote {
    agent: Agent,
    base_url: String,
}

impl HttpRemote {
    #[must_use]
    pub fn new(base_url: &str) -> Self {
        let agent = Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(DEFAULT_TIMEOUT)))
            .http_status_as_error(false)
            .build()
            .into();
        Self {
            agent,
            base_url: base_url.trim_end_matches('/').to_owned(),
        }
    }

    fn page_url(&self, id: &str) -> Result<String, FetchError> {
        check_segment(id).map_err(|e| e.with_remote("Http"))?;
        Ok(format!("{}/pages/{id}.json", self.base_url))
    }
}

fn map_ureq_error(err: ureq::Error, item: &str) -> FetchError {
    let error = match err {
        ureq::Error::Timeout(_) => FetchError::new(FetchErrorKind::Timeout)
            .with_status(crate::ErrorStatus::Temporary)
            .with_source(err),
        ureq::Error::Io(io) => FetchError::io(io, item),
        other => FetchError::new(FetchErrorKind::Other)
            .with_status(crate::ErrorStatus::Temporary)
            .with_source(other),
    };
    error.with_item(item).with_remote("Http")
}

impl Remote for HttpRemote {
    fn name(&self) -> &'static str {
        "Http"
    }

    fn version(&self, id: &str) -> Result<String, FetchError> {
        let url = self.page_url(id)?;
        let response = self
            .agent
            .head(&url)
            .call()
            .map_err(|e| map_ureq_error(e, id))?;

        let status = response.status().as_u16();
        if status >= 400 {
            return Err(FetchError::http_status(status, id).with_remote("Http"));
        }

        let headers = response.headers();
        let version = headers
            .get("etag")
            .or_else(|| headers.get("last-modified"))
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        Ok(version.to_owned())
    }

    fn download(&self, id: &str) -> Result<RemotePage, FetchError> {
        let url = self.page_url(id)?;
        tracing::debug!(%url, "downloading page");
        let response = self
            .agent
            .get(&url)
            .header("Accept", "application/json")
            .call()
            .map_err(|e| map_ureq_error(e, id))?;

        let status = response.status().as_u16();
        if status >= 400 {
            return Err(FetchError::http_status(status, id).with_remote("Http"));
        }

        let bytes = response
            .into_body()
            .read_to_vec()
            .map_err(|e| map_ureq_error(e, id))?;
        parse_page(&bytes, id).map_err(|e| e.with_remote("Http"))
    }

    fn download_image(&self, name: &str) -> Result<Vec<u8>, FetchError> {
        check_segment(name).map_err(|e| e.with_remote("Http"))?;
        let url = format!("{}/img/{name}", self.base_url);
        tracing::debug!(%url, "downloading image");
        let response = self
            .agent
            .get(&url)
            .call()
            .map_err(|e| map_ureq_error(e, name))?;

        let status = response.status().as_u16();
        if status >= 400 {
            return Err(FetchError::http_status(status, name).with_remote("Http"));
        }
        response
            .into_body()
            .read_to_vec()
            .map_err(|e| map_ureq_error(e, name))
    }
}

/// Decode a page and check that it is the page that was asked for.
pub(crate) fn parse_page(bytes: &[u8], id: &str) -> Result<RemotePage, FetchError> {
    let page: RemotePage = serde_json::from_slice(bytes).map_err(|e| {
        FetchError::new(FetchErrorKind::InvalidPage)
            .with_item(id)
            .with_source(e)
    })?;
    if page.id != id {
        return Err(FetchError::new(FetchErrorKind::InvalidPage).with_item(id));
    }
    Ok(page)
}
