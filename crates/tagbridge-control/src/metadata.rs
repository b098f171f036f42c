//! Memoized entity metadata.
//!
//! Each entity type is described at most once per resolver. Concurrent
//! requests for the same type share the one in-flight describe call; a
//! failed describe is not cached, so a later request asks the host again.

use crate::error::ControlError;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tagbridge_model::{EntityMetadata, MetadataProvider};
use tokio::sync::OnceCell;

pub struct MetadataResolver {
    provider: Arc<dyn MetadataProvider>,
    cache: Mutex<HashMap<String, Arc<OnceCell<EntityMetadata>>>>,
}

impl MetadataResolver {
    pub fn new(provider: Arc<dyn MetadataProvider>) -> Self {
        Self {
            provider,
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub async fn resolve(&self, entity_type: &str) -> Result<EntityMetadata, ControlError> {
        let cell = {
            let mut cache = self.cache.lock();
            Arc::clone(cache.entry(entity_type.to_string()).or_default())
        };

        cell.get_or_try_init(|| async {
            tracing::debug!(entity_type, "describing entity type");
            self.provider
                .describe(entity_type)
                .await
                .map_err(|source| ControlError::MetadataUnavailable {
                    entity_type: entity_type.to_string(),
                    source,
                })
        })
        .await
        .cloned()
    }

    /// Resolve the host and related entity types concurrently.
    pub async fn resolve_pair(
        &self,
        host_entity: &str,
        related_entity: &str,
    ) -> Result<(EntityMetadata, EntityMetadata), ControlError> {
        futures::future::try_join(self.resolve(host_entity), self.resolve(related_entity)).await
    }

    /// Previously resolved metadata, without asking the host.
    pub fn cached(&self, entity_type: &str) -> Option<EntityMetadata> {
        self.cache
            .lock()
            .get(entity_type)
            .and_then(|cell| cell.get().cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tagbridge_store::sample::{self, HOST_ENTITY, RELATED_ENTITY};
    use tagbridge_store::{MemoryStore, StoreConfig};

    fn store() -> Arc<MemoryStore> {
        Arc::new(MemoryStore::new(
            sample::colours_fixture(),
            StoreConfig::default(),
        ))
    }

    #[tokio::test]
    async fn test_second_resolution_is_memoized() {
        let store = store();
        let resolver = MetadataResolver::new(store.clone());

        let first = resolver.resolve(RELATED_ENTITY).await.unwrap();
        let second = resolver.resolve(RELATED_ENTITY).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(store.describe_calls(RELATED_ENTITY), 1);
    }

    #[tokio::test]
    async fn test_concurrent_resolutions_share_one_call() {
        let store = store();
        let resolver = MetadataResolver::new(store.clone());

        let (a, b) = resolver.resolve_pair(HOST_ENTITY, HOST_ENTITY).await.unwrap();
        assert_eq!(a, b);
        assert_eq!(store.describe_calls(HOST_ENTITY), 1);
    }

    #[tokio::test]
    async fn test_failure_is_not_cached() {
        let store = store();
        let resolver = MetadataResolver::new(store.clone());
        store.fail_describe(RELATED_ENTITY);

        let err = resolver.resolve(RELATED_ENTITY).await.unwrap_err();
        assert!(matches!(err, ControlError::MetadataUnavailable { .. }));
        assert!(resolver.cached(RELATED_ENTITY).is_none());

        store.clear_faults();
        resolver.resolve(RELATED_ENTITY).await.unwrap();
        assert_eq!(store.describe_calls(RELATED_ENTITY), 2);
    }
}
