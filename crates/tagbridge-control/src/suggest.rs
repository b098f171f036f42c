//! Suggestion lists for the picker.

use crate::error::ControlError;
use std::sync::Arc;
use tagbridge_model::{EntityMetadata, EntityStore, FilterExpr, OrderBy, RecordQuery, Tag};

/// Turns an optional filter text into candidate tags, ordered by name.
///
/// Substring matching (and its case policy) is left to the store.
pub struct SuggestionResolver {
    store: Arc<dyn EntityStore>,
    related_entity: String,
    metadata: EntityMetadata,
    limit: Option<usize>,
}

impl SuggestionResolver {
    pub fn new(
        store: Arc<dyn EntityStore>,
        related_entity: impl Into<String>,
        metadata: EntityMetadata,
    ) -> Self {
        Self {
            store,
            related_entity: related_entity.into(),
            metadata,
            limit: None,
        }
    }

    pub fn with_limit(mut self, limit: Option<usize>) -> Self {
        self.limit = limit;
        self
    }

    /// The query issued for `filter`; an empty filter means "everything".
    pub fn query(&self, filter: Option<&str>) -> RecordQuery {
        let mut query = RecordQuery::new()
            .select(self.metadata.tag_fields())
            .order_by(OrderBy::asc(self.metadata.name_attribute.clone()));
        if let Some(text) = filter.filter(|t| !t.is_empty()) {
            query = query.filter(FilterExpr::contains(
                self.metadata.name_attribute.clone(),
                text,
            ));
        }
        query.top = self.limit;
        query
    }

    /// Never fails: a failed query yields no suggestions.
    pub async fn suggest(&self, filter: Option<&str>) -> Vec<Tag> {
        let query = self.query(filter);
        let records = match self.store.fetch_many(&self.related_entity, &query).await {
            Ok(records) => records,
            Err(source) => {
                let err = ControlError::QueryFailure {
                    entity: self.related_entity.clone(),
                    source,
                };
                tracing::warn!(error = %err, "suggestion query failed");
                return Vec::new();
            }
        };

        records
            .iter()
            .filter_map(|record| match Tag::from_record(record, &self.metadata) {
                Ok(tag) => Some(tag),
                Err(err) => {
                    tracing::warn!(entity = %self.related_entity, error = %err, "skipping suggestion");
                    None
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tagbridge_store::sample::{self, RELATED_ENTITY};
    use tagbridge_store::{MatchCase, MemoryStore, StoreConfig};

    fn resolver(match_case: MatchCase) -> (Arc<MemoryStore>, SuggestionResolver) {
        let store = Arc::new(MemoryStore::new(
            sample::colours_fixture(),
            StoreConfig {
                match_case,
                latency_ms: 0,
            },
        ));
        let meta = EntityMetadata::new("new_tagid", "new_name", "new_tags");
        let resolver = SuggestionResolver::new(store.clone(), RELATED_ENTITY, meta);
        (store, resolver)
    }

    fn names(tags: &[Tag]) -> Vec<&str> {
        tags.iter().map(|t| t.name.as_str()).collect()
    }

    #[test]
    fn test_query_shape() {
        let (_, resolver) = resolver(MatchCase::Insensitive);
        assert_eq!(
            resolver.query(None).to_query_options(),
            "?$select=new_tagid,new_name&$orderby=new_name asc"
        );
        assert_eq!(resolver.query(Some("")), resolver.query(None));
        assert_eq!(
            resolver.query(Some("bl")).to_query_options(),
            "?$select=new_tagid,new_name&$orderby=new_name asc&$filter=contains(new_name,'bl')"
        );
    }

    #[tokio::test]
    async fn test_unfiltered_suggestions_are_sorted() {
        let (_, resolver) = resolver(MatchCase::Insensitive);
        let tags = resolver.suggest(None).await;
        let mut expected: Vec<&str> = sample::COLOURS.to_vec();
        expected.sort();
        assert_eq!(names(&tags), expected);
    }

    #[tokio::test]
    async fn test_filtered_suggestions() {
        let (_, resolver) = resolver(MatchCase::Insensitive);
        assert_eq!(names(&resolver.suggest(Some("bl")).await), vec!["black", "blue"]);
        assert!(resolver.suggest(Some("zzz")).await.is_empty());
    }

    #[tokio::test]
    async fn test_limit_caps_results() {
        let (_, resolver) = resolver(MatchCase::Insensitive);
        let resolver = resolver.with_limit(Some(2));
        assert_eq!(names(&resolver.suggest(None).await), vec!["black", "blue"]);
    }

    #[tokio::test]
    async fn test_query_failure_yields_empty_list() {
        let (store, resolver) = resolver(MatchCase::Insensitive);
        store.fail_fetch(RELATED_ENTITY);
        assert!(resolver.suggest(Some("bl")).await.is_empty());
    }
}
