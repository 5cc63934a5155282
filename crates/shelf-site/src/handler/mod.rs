//! Content handlers.
//!
//! Every piece of the site is owned by exactly one handler. A handler answers
//! two questions: "what do you produce for this URI" and "which URIs do you
//! own". The same pair drives live serving (resolve per request) and export
//! (enumerate, then resolve each).
//!
//! URIs are absolute paths with a leading `/`, e.g. `/go/index.html`.

mod dir;
mod dynamic;
mod files;
mod static_content;

pub use dir::{DirHandler, PathFilter};
pub use dynamic::DynamicHandler;
pub use files::FilesHandler;
pub use static_content::StaticContent;

use crate::Producer;

/// URI-addressed content source.
pub trait ContentHandler: Send + Sync {
    /// Producer for `uri`, or `None` if this handler does not own it.
    fn resolve(&self, uri: &str) -> Option<Producer>;

    /// Every URI this handler currently owns.
    ///
    /// The set may grow while background builds run; it is final once the
    /// build barriers are released.
    fn uris(&self) -> Vec<String>;
}

/// Give `uri` exactly one leading `/`.
pub fn normalize_uri(uri: &str) -> String {
    format!("/{}", uri.trim_start_matches('/'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_uri() {
        assert_eq!(normalize_uri("go/index.html"), "/go/index.html");
        assert_eq!(normalize_uri("/go/index.html"), "/go/index.html");
        assert_eq!(normalize_uri("//sitemap.txt"), "/sitemap.txt");
        assert_eq!(normalize_uri(""), "/");
    }
}
