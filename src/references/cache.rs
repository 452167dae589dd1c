use crate::references::{
    error::ReferenceError,
    fetcher::Fetcher,
    library::{Library, ReferenceSet},
};
use crate::runtime::CancelToken;
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};
use tokio::sync::OnceCell;

/// Loads the configured library images once per process and hands out the
/// resulting [`ReferenceSet`]. A failed load leaves the cache empty, and the
/// next call retries every location.
pub struct ReferenceCache<F> {
    fetcher: F,
    locations: Vec<String>,
    references: OnceCell<ReferenceSet>,
    attempts: AtomicUsize,
}

impl<F: Fetcher> ReferenceCache<F> {
    pub fn new(fetcher: F, locations: Vec<String>) -> Self {
        Self {
            fetcher,
            locations,
            references: OnceCell::new(),
            attempts: AtomicUsize::new(0),
        }
    }

    pub fn locations(&self) -> &[String] {
        &self.locations
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    pub fn is_loaded(&self) -> bool {
        self.references.initialized()
    }

    /// Number of load cycles started so far, successful or not.
    pub fn load_attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Returns the cached set, loading it first if needed. Concurrent first
    /// callers share a single load.
    pub async fn ensure_references(&self, cancel: &CancelToken) -> Result<ReferenceSet, ReferenceError> {
        self.references
            .get_or_try_init(|| self.load(cancel))
            .await
            .cloned()
    }

    async fn load(&self, cancel: &CancelToken) -> Result<ReferenceSet, ReferenceError> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::info!(
            target: "references",
            attempt,
            count = self.locations.len(),
            "loading references"
        );

        let mut libraries: Vec<Arc<Library>> = Vec::with_capacity(self.locations.len());
        for location in &self.locations {
            let bytes = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(ReferenceError::Cancelled),
                result = self.fetcher.fetch(location) => result,
            }
            .map_err(|source| {
                tracing::warn!(target: "references", %location, error = %source, "fetch failed");
                ReferenceError::Fetch {
                    location: location.clone(),
                    source,
                }
            })?;

            let library = Library::from_bytes(location, &bytes)?;
            if let Some(existing) = libraries
                .iter()
                .find(|existing| existing.namespace() == library.namespace())
            {
                return Err(ReferenceError::DuplicateNamespace {
                    namespace: library.namespace().to_string(),
                    first: existing.location().to_string(),
                    second: location.clone(),
                });
            }
            tracing::debug!(
                target: "references",
                %location,
                namespace = library.namespace(),
                exports = library.exports().len(),
                bytes = bytes.len(),
                "library loaded"
            );
            libraries.push(Arc::new(library));
        }

        tracing::info!(target: "references", libraries = libraries.len(), "references cached");
        Ok(ReferenceSet::new(libraries))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::references::fetcher::{MemoryFetcher, StdlibFetcher};

    #[tokio::test]
    async fn caches_after_first_success() {
        let cache = ReferenceCache::new(StdlibFetcher, StdlibFetcher::locations());
        let cancel = CancelToken::new();
        let first = cache.ensure_references(&cancel).await.expect("loads");
        let second = cache.ensure_references(&cancel).await.expect("cached");
        assert!(first.same_as(&second));
        assert_eq!(first.len(), 3);
        assert_eq!(cache.load_attempts(), 1);
    }

    #[tokio::test]
    async fn duplicate_namespaces_are_rejected() {
        let math = StdlibFetcher::source("math").expect("bundled");
        let bytes = crate::compilation::compile_library("math", math).expect("builds");
        let fetcher = MemoryFetcher::new()
            .with("a.plib", bytes.clone())
            .with("b.plib", bytes);
        let cache = ReferenceCache::new(fetcher, vec!["a.plib".into(), "b.plib".into()]);
        let err = cache
            .ensure_references(&CancelToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ReferenceError::DuplicateNamespace { namespace, .. } if namespace == "math"));
        assert!(!cache.is_loaded());
    }

    #[tokio::test]
    async fn cancelled_load_is_not_cached() {
        let cache = ReferenceCache::new(StdlibFetcher, StdlibFetcher::locations());
        let cancel = CancelToken::new();
        cancel.cancel();
        let err = cache.ensure_references(&cancel).await.unwrap_err();
        assert!(matches!(err, ReferenceError::Cancelled));
        assert!(!cache.is_loaded());
        cancel.reset();
        cache.ensure_references(&cancel).await.expect("retried");
        assert!(cache.is_loaded());
    }
}
