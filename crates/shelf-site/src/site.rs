//! First-match router over content handlers.

use std::sync::{Arc, PoisonError, RwLock};

use crate::{ContentHandler, Producer};

/// Ordered collection of [`ContentHandler`]s.
///
/// Handlers are only ever appended. Lookups try them in registration
/// order and the first handler that claims a URI wins, so specific handlers
/// (static assets, top-level pages) go in before book handlers.
///
/// Handler URI sets are expected to be disjoint; nothing enforces it here.
#[derive(Default)]
pub struct Site {
    handlers: RwLock<Vec<Arc<dyn ContentHandler>>>,
}

impl Site {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a handler.
    pub fn push(&self, handler: Arc<dyn ContentHandler>) {
        self.handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(handler);
    }

    /// Number of registered handlers.
    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot().is_empty()
    }

    /// Resolve `uri` against the first handler that owns it.
    pub fn resolve(&self, uri: &str) -> Option<Producer> {
        self.snapshot().iter().find_map(|h| h.resolve(uri))
    }

    /// Every handler's URIs concatenated in registration order.
    ///
    /// Duplicates are kept; disjoint handlers do not produce any.
    pub fn all_uris(&self) -> Vec<String> {
        self.snapshot().iter().flat_map(|h| h.uris()).collect()
    }

    /// URI sets per handler, in registration order.
    pub fn uris_by_handler(&self) -> Vec<Vec<String>> {
        self.snapshot().iter().map(|h| h.uris()).collect()
    }

    // Handler closures may take book locks; never hold the list lock across them.
    fn snapshot(&self) -> Vec<Arc<dyn ContentHandler>> {
        self.handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
