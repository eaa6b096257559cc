//! Keyed loading of auxiliary text resources such as shader sources.
//!
//! A [`ResourceLoader`] is created by the host and passed to whatever needs
//! the resources. Keys are registered up front, fetched once each through a
//! [`ResourceSource`], and the outcome of every key is kept.

use std::{collections::BTreeMap, future::Future, pin::Pin};

use crate::error::{Error, Result};

/// Future type for resource fetches.
pub type FetchFuture<'a> = Pin<Box<dyn Future<Output = Result<String>> + Send + 'a>>;

/// Where resources come from.
pub trait ResourceSource: Send + Sync {
    /// Fetch the text stored under `key`.
    fn fetch(&self, key: &str) -> FetchFuture<'_>;
}

/// A source backed by an in-memory map.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    entries: BTreeMap<String, String>,
}

impl MemorySource {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace an entry.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, text: impl Into<String>) -> Self {
        self.entries.insert(key.into(), text.into());
        self
    }
}

impl ResourceSource for MemorySource {
    fn fetch(&self, key: &str) -> FetchFuture<'_> {
        let result = self.entries.get(key).cloned().ok_or_else(|| Error::Resource {
            key: key.to_string(),
            message: "not found".to_string(),
        });
        Box::pin(async move { result })
    }
}

/// Counts from one [`ResourceLoader::load_all`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadSummary {
    pub loaded: usize,
    pub errors: usize,
}

impl LoadSummary {
    /// Whether every key loaded.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.errors == 0
    }
}

/// Outcome of one registered key.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Entry {
    Pending,
    Loaded(String),
    Failed,
}

/// Registered resource keys and what loading them produced.
#[derive(Debug, Clone, Default)]
pub struct ResourceLoader {
    entries: BTreeMap<String, Entry>,
}

impl ResourceLoader {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a key to load. Registering twice has no effect.
    pub fn register(&mut self, key: impl Into<String>) {
        self.entries.entry(key.into()).or_insert(Entry::Pending);
    }

    /// Fetch every registered key not fetched yet.
    ///
    /// Failures are logged, counted and remembered as missing.
    pub async fn load_all(&mut self, source: &dyn ResourceSource) -> LoadSummary {
        let mut summary = LoadSummary::default();
        for (key, entry) in &mut self.entries {
            if *entry != Entry::Pending {
                continue;
            }
            match source.fetch(key).await {
                Ok(text) => {
                    summary.loaded += 1;
                    *entry = Entry::Loaded(text);
                }
                Err(e) => {
                    summary.errors += 1;
                    *entry = Entry::Failed;
                    tracing::warn!(key = %key, error = %e, "failed to load resource");
                }
            }
        }
        tracing::debug!(
            loaded = summary.loaded,
            errors = summary.errors,
            "loaded resources"
        );
        summary
    }

    /// The loaded text for `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        match self.entries.get(key) {
            Some(Entry::Loaded(text)) => Some(text),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_registered(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block_on<F: Future>(f: F) -> F::Output {
        // Simple polling executor for tests.
        use std::task::{Context, Poll, RawWaker, RawWakerVTable, Waker};

        fn dummy_raw_waker() -> RawWaker {
            fn no_op(_: *const ()) {}
            fn clone(_: *const ()) -> RawWaker {
                dummy_raw_waker()
            }
            static VTABLE: RawWakerVTable = RawWakerVTable::new(clone, no_op, no_op, no_op);
            RawWaker::new(std::ptr::null(), &VTABLE)
        }

        #[allow(unsafe_code)]
        let waker = unsafe { Waker::from_raw(dummy_raw_waker()) };
        let mut cx = Context::from_waker(&waker);
        let mut f = std::pin::pin!(f);

        match f.as_mut().poll(&mut cx) {
            Poll::Ready(result) => result,
            Poll::Pending => panic!("Future unexpectedly pending"),
        }
    }

    #[test]
    fn test_load_all_counts_results() {
        let source = MemorySource::new()
            .with("pca.vert", "void main() {}")
            .with("pca.frag", "void main() { }");
        let mut loader = ResourceLoader::new();
        loader.register("pca.vert");
        loader.register("pca.frag");
        loader.register("missing.frag");
        loader.register("pca.vert");

        let summary = block_on(loader.load_all(&source));
        assert_eq!(
            summary,
            LoadSummary {
                loaded: 2,
                errors: 1
            }
        );
        assert!(!summary.is_complete());
        assert_eq!(loader.get("pca.vert"), Some("void main() {}"));
        assert_eq!(loader.get("missing.frag"), None);
        assert!(loader.is_registered("missing.frag"));
        assert!(!loader.is_registered("other"));
    }

    #[test]
    fn test_load_all_fetches_each_key_once() {
        let source = MemorySource::new().with("a", "1").with("b", "2");
        let mut loader = ResourceLoader::new();
        loader.register("a");
        assert_eq!(block_on(loader.load_all(&source)).loaded, 1);

        loader.register("b");
        let summary = block_on(loader.load_all(&source));
        assert_eq!(summary.loaded, 1);
        assert!(summary.is_complete());
        assert_eq!(loader.get("a"), Some("1"));
        assert_eq!(loader.get("b"), Some("2"));
    }
}
