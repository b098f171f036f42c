//! Integration tests for the complete Tagbridge pipeline
//!
//! These tests verify end-to-end functionality across crates:
//! - Fixture file → MemoryStore → TagControl → fixture file
//! - Unsaved record → encoded output → save-time linking → reload
//! - Store case policy → suggestions
//!
//! Run with: cargo test --test integration_tests

use std::sync::Arc;
use tagbridge_control::{ControlConfig, ControlState, OutputFormat, TagControl, TagData};
use tagbridge_model::{
    Association, EntityStore, FilterExpr, HostContext, RecordQuery, RecordRef, Tag,
};
use tagbridge_store::sample::{
    self, ACCOUNT_ID, EMPTY_ACCOUNT_ID, HOST_ENTITY, JUNCTION_ENTITY, RELATED_ENTITY,
    RELATIONSHIP,
};
use tagbridge_store::{MatchCase, MemoryStore, StoreConfig, StoreFixture};
use tempfile::tempdir;

fn config() -> ControlConfig {
    ControlConfig::new(RELATED_ENTITY, JUNCTION_ENTITY, RELATIONSHIP)
}

fn open(store: &Arc<MemoryStore>, host: HostContext) -> TagControl {
    TagControl::new(config(), host, store.clone(), store.clone())
}

fn tag(colour: &str) -> Tag {
    Tag::new(sample::tag_id(colour).unwrap(), colour)
}

fn names(tags: &[Tag]) -> Vec<String> {
    tags.iter().map(|t| t.name.clone()).collect()
}

// ============================================================================
// Fixture Persistence
// ============================================================================

#[tokio::test]
async fn test_changes_survive_a_store_reload() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("store.json");
    sample::colours_fixture().save(&path).unwrap();

    let store = Arc::new(MemoryStore::load(&path, StoreConfig::default()).unwrap());
    let control = open(&store, HostContext::new(HOST_ENTITY, ACCOUNT_ID));
    control.initialize().await.unwrap();
    let report = control
        .on_change(Some(vec![tag("red"), tag("yellow"), tag("violet")]))
        .await
        .unwrap();
    assert!(report.is_clean());
    store.save(&path).unwrap();

    let reloaded = Arc::new(MemoryStore::load(&path, StoreConfig::default()).unwrap());
    let control = open(&reloaded, HostContext::new(HOST_ENTITY, ACCOUNT_ID));
    control.initialize().await.unwrap();

    let mut loaded = names(&control.selected_tags());
    loaded.sort();
    assert_eq!(loaded, vec!["red", "violet", "yellow"]);
}

#[test]
fn test_fixture_file_is_camel_case_json() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("store.json");
    sample::colours_fixture().save(&path).unwrap();

    let raw: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    let tags = &raw["entities"][RELATED_ENTITY]["metadata"];
    assert_eq!(tags["idAttribute"], "new_tagid");
    assert_eq!(tags["collectionName"], "new_tags");
    assert_eq!(
        raw["relationships"][RELATIONSHIP]["junctionEntity"],
        JUNCTION_ENTITY
    );

    assert_eq!(StoreFixture::load(&path).unwrap(), sample::colours_fixture());
}

// ============================================================================
// Unsaved Record Lifecycle
// ============================================================================

/// Links every key of an encoded output value once the record exists.
async fn link_from_output(store: &MemoryStore, value: &str, host_id: &str) -> usize {
    let data = TagData::parse(value).unwrap();
    for key in &data.tags {
        let association = Association {
            relationship_name: data.relationship_name.clone(),
            host: RecordRef::new("accounts", host_id),
            related: RecordRef::new("new_tags", key.clone()),
        };
        store.link(&association).await.unwrap();
    }
    data.tags.len()
}

#[tokio::test]
async fn test_unsaved_selection_is_linked_at_save() {
    let store = Arc::new(MemoryStore::new(
        sample::colours_fixture(),
        StoreConfig::default(),
    ));
    let control = open(&store, HostContext::unsaved(HOST_ENTITY));
    control.initialize().await.unwrap();

    control
        .on_change(Some(vec![tag("pink"), tag("cyan")]))
        .await
        .unwrap();
    assert!(store.calls().links.is_empty());

    // The host saves the record and hands the output value to its save step
    let output = control.get_outputs();
    assert_eq!(link_from_output(&store, &output, EMPTY_ACCOUNT_ID).await, 2);
    control.notify_new_data(HostContext::new(HOST_ENTITY, EMPTY_ACCOUNT_ID));
    control.dispose();

    let reopened = open(&store, HostContext::new(HOST_ENTITY, EMPTY_ACCOUNT_ID));
    reopened.initialize().await.unwrap();
    assert_eq!(names(&reopened.selected_tags()), vec!["pink", "cyan"]);
    assert_eq!(reopened.get_outputs(), output);
}

#[tokio::test]
async fn test_disposed_control_stops_serving() {
    let store = Arc::new(MemoryStore::new(
        sample::colours_fixture(),
        StoreConfig::default(),
    ));
    let control = open(&store, HostContext::new(HOST_ENTITY, ACCOUNT_ID));
    control.initialize().await.unwrap();
    control.dispose();

    assert_eq!(control.state(), ControlState::Disposed);
    assert!(control.on_resolve_suggestions("", &[]).await.is_empty());
    assert!(control.on_change(None).await.is_err());
    assert_eq!(store.linked_ids(RELATIONSHIP, ACCOUNT_ID).len(), 2);
}

// ============================================================================
// Store Policies
// ============================================================================

#[tokio::test]
async fn test_suggestion_case_follows_store_policy() {
    for (match_case, expected) in [
        (MatchCase::Insensitive, vec!["black", "blue"]),
        (MatchCase::Sensitive, vec![]),
    ] {
        let store = Arc::new(MemoryStore::new(
            sample::colours_fixture(),
            StoreConfig {
                match_case,
                latency_ms: 0,
            },
        ));
        let control = open(&store, HostContext::new(HOST_ENTITY, ACCOUNT_ID));
        control.initialize().await.unwrap();

        let suggestions = control.on_resolve_suggestions("BL", &[]).await;
        assert_eq!(names(&suggestions), expected, "{match_case:?}");
    }
}

#[tokio::test]
async fn test_filter_text_round_trips_through_grammar() {
    let store = MemoryStore::new(sample::colours_fixture(), StoreConfig::default());
    let query = RecordQuery::new()
        .select(["new_name"])
        .filter(FilterExpr::contains("new_name", "o'"));
    let rendered = query.filter.as_ref().unwrap().to_string();
    assert_eq!(rendered, "contains(new_name,'o''')");

    let parsed = tagbridge_model::query::parse_filter(&rendered).unwrap();
    assert_eq!(Some(&parsed), query.filter.as_ref());
    assert!(store.fetch_many(RELATED_ENTITY, &query).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_config_from_host_json() {
    let config: ControlConfig = serde_json::from_str(&format!(
        r#"{{"relatedEntity":"{RELATED_ENTITY}","relationshipEntity":"{JUNCTION_ENTITY}","relationshipName":"{RELATIONSHIP}","outputFormat":"keyList","maxSuggestions":1}}"#
    ))
    .unwrap();
    assert_eq!(config.output_format, OutputFormat::KeyList);

    let store = Arc::new(MemoryStore::new(
        sample::colours_fixture(),
        StoreConfig::default(),
    ));
    let control = TagControl::new(
        config,
        HostContext::new(HOST_ENTITY, ACCOUNT_ID),
        store.clone(),
        store.clone(),
    );
    control.initialize().await.unwrap();
    assert_eq!(
        control.get_outputs(),
        format!("{},{}", tag("blue").key, tag("red").key)
    );
    assert_eq!(control.on_empty_input_focus(&[]).await.len(), 1);
}
