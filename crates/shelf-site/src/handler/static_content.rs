use std::collections::BTreeMap;
use std::sync::Arc;

use super::{ContentHandler, normalize_uri};
use crate::Producer;
use crate::mime::content_type_for;

/// Fixed in-memory content.
#[derive(Default)]
pub struct StaticContent {
    entries: BTreeMap<String, (String, Arc<[u8]>)>,
}

impl StaticContent {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `bytes` at `uri`, typed by the URI's extension.
    #[must_use]
    pub fn with(mut self, uri: &str, bytes: impl Into<Arc<[u8]>>) -> Self {
        let uri = normalize_uri(uri);
        let content_type = content_type_for(&uri);
        self.entries.insert(uri, (content_type, bytes.into()));
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl ContentHandler for StaticContent {
    fn resolve(&self, uri: &str) -> Option<Producer> {
        let (content_type, bytes) = self.entries.get(uri)?;
        Some(Producer::from_bytes(content_type.clone(), Arc::clone(bytes)))
    }

    fn uris(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }
}
