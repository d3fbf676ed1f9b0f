//! Resolves storage paths to viewable URLs for one consumer.
//!
//! Each `resolve` bumps a generation counter. A lookup whose generation is no
//! longer current when it finishes is dropped without touching state, so a
//! consumer that closed or moved on never sees a late result.

use std::sync::Arc;

use tokio::sync::watch;

use super::cache::SignedUrlCache;
use super::path::StoragePath;

/// What the consumer should display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreviewStatus {
    /// Nothing presented.
    Idle,
    /// Waiting for a URL.
    Loading {
        /// Path being resolved.
        path: StoragePath,
    },
    /// URL ready to display.
    Ready {
        /// Resolved path.
        path: StoragePath,
        /// Signed URL.
        url: String,
    },
    /// Resolution failed.
    Errored {
        /// Path that failed.
        path: StoragePath,
        /// Display message.
        message: String,
    },
}

/// State published on the mediator's watch channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewSnapshot {
    /// Bumped on every `resolve` and `close`.
    pub generation: u64,
    /// Current status.
    pub status: PreviewStatus,
}

/// Result of one `resolve` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreviewOutcome {
    /// URL for the path.
    Ready(String),
    /// Display message.
    Errored(String),
    /// The consumer closed or re-targeted before the lookup finished.
    Discarded,
}

/// Per-consumer preview state over the shared cache.
#[derive(Debug)]
pub struct PreviewMediator {
    cache: Arc<SignedUrlCache>,
    state: watch::Sender<PreviewSnapshot>,
}

impl PreviewMediator {
    /// Create an idle mediator.
    #[must_use]
    pub fn new(cache: Arc<SignedUrlCache>) -> Self {
        let (state, _) = watch::channel(PreviewSnapshot {
            generation: 0,
            status: PreviewStatus::Idle,
        });
        Self { cache, state }
    }

    /// Receive every state change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<PreviewSnapshot> {
        self.state.subscribe()
    }

    /// Current state.
    #[must_use]
    pub fn snapshot(&self) -> PreviewSnapshot {
        self.state.borrow().clone()
    }

    /// Present `path` and look up its URL.
    pub async fn resolve(&self, path: StoragePath) -> PreviewOutcome {
        let mut generation = 0;
        self.state.send_modify(|s| {
            s.generation += 1;
            s.status = PreviewStatus::Loading { path: path.clone() };
            generation = s.generation;
        });

        let (status, outcome) = match self.cache.get(&path).await {
            Ok(entry) => (
                PreviewStatus::Ready {
                    path: path.clone(),
                    url: entry.url.clone(),
                },
                PreviewOutcome::Ready(entry.url),
            ),
            Err(e) => {
                let message = e.to_string();
                tracing::warn!(storage_path = %path, error = %message, "Preview lookup failed");
                (
                    PreviewStatus::Errored {
                        path: path.clone(),
                        message: message.clone(),
                    },
                    PreviewOutcome::Errored(message),
                )
            }
        };

        let applied = self.state.send_if_modified(|s| {
            if s.generation != generation {
                return false;
            }
            s.status = status;
            true
        });

        if applied {
            outcome
        } else {
            tracing::debug!(storage_path = %path, generation, "Stale preview result discarded");
            PreviewOutcome::Discarded
        }
    }

    /// Stop presenting. Any lookup still running is discarded when it ends.
    pub fn close(&self) {
        self.state.send_modify(|s| {
            s.generation += 1;
            s.status = PreviewStatus::Idle;
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::documents::cache::CachePolicy;
    use crate::documents::{AssetId, DocumentFolder};
    use crate::storage::MemoryBlobStore;
    use bytes::Bytes;
    use std::time::Duration;

    fn setup() -> (Arc<MemoryBlobStore>, Arc<PreviewMediator>) {
        let store = Arc::new(MemoryBlobStore::new("docs"));
        let cache = Arc::new(SignedUrlCache::new(store.clone(), CachePolicy::default()));
        (store, Arc::new(PreviewMediator::new(cache)))
    }

    fn stored(store: &MemoryBlobStore, asset: &str) -> StoragePath {
        let path = StoragePath::generate(
            DocumentFolder::Insurance,
            &AssetId::parse(asset).expect("valid asset id"),
        );
        store.insert(&path, Bytes::from_static(b"%PDF"));
        path
    }

    #[tokio::test]
    async fn test_resolve_ready() {
        let (store, mediator) = setup();
        let path = stored(&store, "A1");

        let outcome = mediator.resolve(path.clone()).await;

        let PreviewOutcome::Ready(url) = outcome else {
            panic!("expected ready, got {outcome:?}");
        };
        assert_eq!(
            mediator.snapshot().status,
            PreviewStatus::Ready { path, url }
        );
    }

    #[tokio::test]
    async fn test_resolve_errored() {
        let (_store, mediator) = setup();
        let missing = StoragePath::generate(
            DocumentFolder::Documents,
            &AssetId::parse("A9").expect("valid asset id"),
        );

        let outcome = mediator.resolve(missing).await;

        assert!(matches!(outcome, PreviewOutcome::Errored(ref m) if m.contains("not found")));
        assert!(matches!(
            mediator.snapshot().status,
            PreviewStatus::Errored { .. }
        ));
    }

    #[tokio::test]
    async fn test_close_discards_late_result() {
        let (store, mediator) = setup();
        let path = stored(&store, "A1");
        store.set_sign_delay(Some(Duration::from_millis(50)));

        let task = {
            let mediator = mediator.clone();
            tokio::spawn(async move { mediator.resolve(path).await })
        };
        let mut rx = mediator.subscribe();
        rx.wait_for(|s| matches!(s.status, PreviewStatus::Loading { .. }))
            .await
            .expect("mediator alive");
        mediator.close();

        assert_eq!(task.await.expect("task joins"), PreviewOutcome::Discarded);
        assert_eq!(mediator.snapshot().status, PreviewStatus::Idle);
    }

    #[tokio::test]
    async fn test_retarget_keeps_newest_result() {
        let (store, mediator) = setup();
        let slow = stored(&store, "A1");
        let fast = stored(&store, "A2");
        store.set_sign_delay(Some(Duration::from_millis(50)));

        let task = {
            let mediator = mediator.clone();
            tokio::spawn(async move { mediator.resolve(slow).await })
        };
        let mut rx = mediator.subscribe();
        rx.wait_for(|s| matches!(s.status, PreviewStatus::Loading { .. }))
            .await
            .expect("mediator alive");

        store.set_sign_delay(None);
        let newest = mediator.resolve(fast.clone()).await;
        assert!(matches!(newest, PreviewOutcome::Ready(_)));

        assert_eq!(task.await.expect("task joins"), PreviewOutcome::Discarded);
        assert!(matches!(
            mediator.snapshot().status,
            PreviewStatus::Ready { ref path, .. } if *path == fast
        ));
    }
}
