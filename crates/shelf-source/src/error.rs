//! Fetch error type.

/// Semantic error categories.
#[derive(Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum FetchErrorKind {
    /// Page or image does not exist on the remote.
    NotFound,
    /// Policy is cache-only and the item was never cached.
    NotCached,
    /// Remote answered with something that is not a page.
    InvalidPage,
    /// Remote is temporarily unavailable.
    Unavailable,
    /// Request timed out.
    Timeout,
    /// Other/unknown error category.
    Other,
}

/// Retry guidance.
#[derive(Debug, PartialEq, Eq, Default)]
pub enum ErrorStatus {
    /// Don't retry (missing page, malformed page, cache miss).
    #[default]
    Permanent,
    /// Retry immediately (timeout, connection reset).
    Temporary,
    /// Retry with backoff (rate limited, service unavailable).
    Persistent,
}

/// Error fetching one page or image.
#[derive(Debug)]
pub struct FetchError {
    pub kind: FetchErrorKind,
    pub status: ErrorStatus,
    /// Page id or image name the error is about.
    pub item: Option<String>,
    /// Remote identifier (e.g., "Dir", "Http", "Mock").
    pub remote: Option<&'static str>,
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl FetchError {
    #[must_use]
    pub fn new(kind: FetchErrorKind) -> Self {
        Self {
            kind,
            status: ErrorStatus::Permanent,
            item: None,
            remote: None,
            source: None,
        }
    }

    #[must_use]
    pub fn with_item(mut self, item: impl Into<String>) -> Self {
        self.item = Some(item.into());
        self
    }

    #[must_use]
    pub fn with_remote(mut self, remote: &'static str) -> Self {
        self.remote = Some(remote);
        self
    }

    #[must_use]
    pub fn with_status(mut self, status: ErrorStatus) -> Self {
        self.status = status;
        self
    }

    #[must_use]
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    #[must_use]
    pub fn not_found(item: impl Into<String>) -> Self {
        Self::new(FetchErrorKind::NotFound).with_item(item)
    }

    #[must_use]
    pub fn not_cached(item: impl Into<String>) -> Self {
        Self::new(FetchErrorKind::NotCached).with_item(item)
    }

    /// Create a fetch error from an I/O error.
    #[must_use]
    pub fn io(err: std::io::Error, item: &str) -> Self {
        let (kind, status) = match err.kind() {
            std::io::ErrorKind::NotFound => (FetchErrorKind::NotFound, ErrorStatus::Permanent),
            std::io::ErrorKind::TimedOut => (FetchErrorKind::Timeout, ErrorStatus::Temporary),
            _ => (FetchErrorKind::Other, ErrorStatus::Permanent),
        };
        Self::new(kind)
            .with_status(status)
            .with_item(item)
            .with_source(err)
    }

    /// Map an HTTP status code to a fetch error.
    #[must_use]
    pub fn http_status(code: u16, item: &str) -> Self {
        let (kind, status) = match code {
            404 | 410 => (FetchErrorKind::NotFound, ErrorStatus::Permanent),
            408 | 504 => (FetchErrorKind::Timeout, ErrorStatus::Temporary),
            429 | 502 | 503 => (FetchErrorKind::Unavailable, ErrorStatus::Persistent),
            _ => (FetchErrorKind::Other, ErrorStatus::Permanent),
        };
        Self::new(kind)
            .with_status(status)
            .with_item(item)
            .with_source(HttpStatus(code))
    }

    /// Whether retrying the same request could succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.status != ErrorStatus::Permanent
    }
}

#[derive(Debug)]
struct HttpStatus(u16);

impl std::fmt::Display for HttpStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "HTTP {}", self.0)
    }
}

impl std::error::Error for HttpStatus {}

impl std::fmt::Display for FetchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Format: "[Remote] Kind: source (item: abc123)"
        if let Some(remote) = self.remote {
            write!(f, "[{remote}] ")?;
        }

        let kind_str = match self.kind {
            FetchErrorKind::NotFound => "Not found",
            FetchErrorKind::NotCached => "Not cached",
            FetchErrorKind::InvalidPage => "Invalid page",
            FetchErrorKind::Unavailable => "Unavailable",
            FetchErrorKind::Timeout => "Timeout",
            FetchErrorKind::Other => "Error",
        };
        write!(f, "{kind_str}")?;

        if let Some(source) = &self.source {
            write!(f, ": {source}")?;
        }
        if let Some(item) = &self.item {
            write!(f, " (item: {item})")?;
        }
        Ok(())
    }
}

impl std::error::Error for FetchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|s| s.as_ref() as &(dyn std::error::Error + 'static))
    }
}
