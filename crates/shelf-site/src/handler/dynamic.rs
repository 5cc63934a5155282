use std::sync::Arc;

use super::ContentHandler;
use crate::Producer;

type ResolveFn = dyn Fn(&str) -> Option<Producer> + Send + Sync;
type UrisFn = dyn Fn() -> Vec<String> + Send + Sync;

/// Handler whose behavior is supplied as closures.
///
/// The closures usually capture state that a background task keeps filling
/// in, so the answers change as the build progresses. Synchronizing that
/// state is up to the closures.
pub struct DynamicHandler {
    resolve: Arc<ResolveFn>,
    uris: Arc<UrisFn>,
}

impl DynamicHandler {
    pub fn new<R, U>(resolve: R, uris: U) -> Self
    where
        R: Fn(&str) -> Option<Producer> + Send + Sync + 'static,
        U: Fn() -> Vec<String> + Send + Sync + 'static,
    {
        Self {
            resolve: Arc::new(resolve),
            uris: Arc::new(uris),
        }
    }
}

impl ContentHandler for DynamicHandler {
    fn resolve(&self, uri: &str) -> Option<Producer> {
        (self.resolve)(uri)
    }

    fn uris(&self) -> Vec<String> {
        (self.uris)()
    }
}
