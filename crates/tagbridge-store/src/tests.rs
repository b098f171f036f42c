//! Tests for the in-memory store

use super::*;
use crate::sample::{self, ACCOUNT_ID, EMPTY_ACCOUNT_ID, RELATED_ENTITY, RELATIONSHIP};
use tagbridge_model::{FilterExpr, OrderBy, RecordRef};
use tempfile::tempdir;

fn test_store(match_case: MatchCase) -> MemoryStore {
    MemoryStore::new(
        sample::colours_fixture(),
        StoreConfig {
            match_case,
            latency_ms: 0,
        },
    )
}

fn association(host_id: &str, colour: &str) -> Association {
    Association {
        relationship_name: RELATIONSHIP.to_string(),
        host: RecordRef::new("accounts", host_id),
        related: RecordRef::new("new_tags", sample::tag_id(colour).unwrap()),
    }
}

fn names(records: &[Record]) -> Vec<String> {
    records
        .iter()
        .filter_map(|r| record_str(r, "new_name"))
        .collect()
}

#[tokio::test]
async fn test_describe_known_and_unknown() {
    let store = test_store(MatchCase::Insensitive);
    let meta = store.describe(RELATED_ENTITY).await.unwrap();
    assert_eq!(meta.collection_name, "new_tags");

    let err = store.describe("contact").await.unwrap_err();
    assert_eq!(err, StoreError::UnknownEntity("contact".to_string()));
    assert_eq!(store.describe_calls(RELATED_ENTITY), 1);
}

#[tokio::test]
async fn test_fetch_many_orders_and_filters() {
    let store = test_store(MatchCase::Insensitive);
    let query = RecordQuery::new()
        .select(["new_tagid", "new_name"])
        .order_by(OrderBy::asc("new_name"))
        .filter(FilterExpr::contains("new_name", "BL"));

    let rows = store.fetch_many(RELATED_ENTITY, &query).await.unwrap();
    assert_eq!(names(&rows), vec!["black", "blue"]);
    assert!(rows.iter().all(|r| r.len() == 2));
}

#[tokio::test]
async fn test_case_sensitive_contains() {
    let store = test_store(MatchCase::Sensitive);
    let query = RecordQuery::new().filter(FilterExpr::contains("new_name", "BL"));
    let rows = store.fetch_many(RELATED_ENTITY, &query).await.unwrap();
    assert!(rows.is_empty());
}

#[tokio::test]
async fn test_top_caps_rows() {
    let store = test_store(MatchCase::Insensitive);
    let query = RecordQuery::new().order_by(OrderBy::asc("new_name")).top(3);
    let rows = store.fetch_many(RELATED_ENTITY, &query).await.unwrap();
    assert_eq!(names(&rows), vec!["black", "blue", "brown"]);
}

#[tokio::test]
async fn test_fetch_one_projects_fields() {
    let store = test_store(MatchCase::Insensitive);
    let id = sample::tag_id("cyan").unwrap();
    let row = store
        .fetch_one(RELATED_ENTITY, &id, &["new_name".to_string()])
        .await
        .unwrap();
    assert_eq!(record_str(&row, "new_name").as_deref(), Some("cyan"));
    assert!(!row.contains_key("new_tagid"));

    let missing = store.fetch_one(RELATED_ENTITY, "nope", &[]).await;
    assert!(matches!(missing, Err(StoreError::NotFound { .. })));
}

#[tokio::test]
async fn test_link_and_unlink_round_trip() {
    let store = test_store(MatchCase::Insensitive);
    assert!(store.linked_ids(RELATIONSHIP, EMPTY_ACCOUNT_ID).is_empty());

    store.link(&association(EMPTY_ACCOUNT_ID, "green")).await.unwrap();
    assert_eq!(
        store.linked_ids(RELATIONSHIP, EMPTY_ACCOUNT_ID),
        vec![sample::tag_id("green").unwrap()]
    );

    let again = store.link(&association(EMPTY_ACCOUNT_ID, "green")).await;
    assert!(matches!(again, Err(StoreError::AlreadyLinked { .. })));

    store.unlink(&association(EMPTY_ACCOUNT_ID, "green")).await.unwrap();
    assert!(store.linked_ids(RELATIONSHIP, EMPTY_ACCOUNT_ID).is_empty());

    let gone = store.unlink(&association(EMPTY_ACCOUNT_ID, "green")).await;
    assert!(matches!(gone, Err(StoreError::NotLinked { .. })));
}

#[tokio::test]
async fn test_link_rejects_wrong_collection() {
    let store = test_store(MatchCase::Insensitive);
    let mut assoc = association(ACCOUNT_ID, "pink");
    assoc.host.collection = "contacts".to_string();
    let err = store.link(&assoc).await.unwrap_err();
    assert!(matches!(err, StoreError::Rejected(_)));
}

#[tokio::test]
async fn test_injected_faults() {
    let store = test_store(MatchCase::Insensitive);
    store.fail_link(&sample::tag_id("pink").unwrap());
    store.fail_describe(RELATED_ENTITY);

    assert!(store.link(&association(ACCOUNT_ID, "pink")).await.is_err());
    assert!(store.describe(RELATED_ENTITY).await.is_err());
    // Failed attempts are still logged.
    assert_eq!(store.calls().links.len(), 1);

    store.clear_faults();
    store.link(&association(ACCOUNT_ID, "pink")).await.unwrap();
}

#[test]
fn test_fixture_persists_to_disk() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("store.json");

    sample::colours_fixture().save(&path).unwrap();
    let store = MemoryStore::load(&path, StoreConfig::default()).unwrap();
    assert_eq!(store.snapshot(), sample::colours_fixture());
    assert_eq!(store.linked_ids(RELATIONSHIP, ACCOUNT_ID).len(), 2);
}

#[test]
fn test_load_reports_path_on_error() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("missing.json");
    let err = MemoryStore::load(&path, StoreConfig::default()).err().unwrap();
    assert!(err.to_string().contains("missing.json"), "err={err}");
}
