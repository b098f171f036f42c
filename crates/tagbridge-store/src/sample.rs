//! A small ready-made store: accounts tagged with colours.
//!
//! Used by `tagbridge init` and as the common fixture in tests.

use crate::fixture::{RelationshipDef, StoreFixture};
use serde_json::json;
use tagbridge_model::{EntityMetadata, Record};

pub const HOST_ENTITY: &str = "account";
pub const RELATED_ENTITY: &str = "new_tag";
pub const JUNCTION_ENTITY: &str = "new_account_new_tag";
pub const RELATIONSHIP: &str = "new_account_new_tag";

/// The saved account the sample links tags to.
pub const ACCOUNT_ID: &str = "3b1f5a9e-6c2d-4e8f-a1b0-9d7c6e5f4a31";
/// A second account with no tags.
pub const EMPTY_ACCOUNT_ID: &str = "8e2d4c6b-1a3f-4b5d-9e7c-2f4a6b8d0c13";

pub const COLOURS: [&str; 15] = [
    "black", "blue", "brown", "cyan", "green", "magenta", "mauve", "orange", "pink", "purple",
    "red", "rose", "violet", "white", "yellow",
];

/// Deterministic id of a sample colour tag.
pub fn tag_id(colour: &str) -> Option<String> {
    COLOURS
        .iter()
        .position(|c| *c == colour)
        .map(|idx| format!("7a9c0000-0000-4000-8000-{:012x}", idx + 1))
}

fn record(value: serde_json::Value) -> Record {
    value.as_object().cloned().unwrap_or_default()
}

/// Accounts, colour tags (stored out of name order) and a junction linking
/// `ACCOUNT_ID` to `blue` and `red`.
pub fn colours_fixture() -> StoreFixture {
    let accounts = vec![
        record(json!({ "accountid": ACCOUNT_ID, "name": "Contoso" })),
        record(json!({ "accountid": EMPTY_ACCOUNT_ID, "name": "Fabrikam" })),
    ];

    let tags = COLOURS
        .iter()
        .rev()
        .filter_map(|colour| {
            tag_id(colour).map(|id| record(json!({ "new_tagid": id, "new_name": colour })))
        })
        .collect();

    let links = ["blue", "red"]
        .iter()
        .filter_map(|colour| tag_id(colour))
        .map(|id| record(json!({ "accountid": ACCOUNT_ID, "new_tagid": id })))
        .collect();

    StoreFixture::new()
        .with_entity(
            HOST_ENTITY,
            EntityMetadata::new("accountid", "name", "accounts"),
            accounts,
        )
        .with_entity(
            RELATED_ENTITY,
            EntityMetadata::new("new_tagid", "new_name", "new_tags"),
            tags,
        )
        .with_entity(
            JUNCTION_ENTITY,
            EntityMetadata::new("new_account_new_tagid", "new_name", "new_account_new_tags"),
            links,
        )
        .with_relationship(
            RELATIONSHIP,
            RelationshipDef {
                junction_entity: JUNCTION_ENTITY.to_string(),
                host_entity: HOST_ENTITY.to_string(),
                related_entity: RELATED_ENTITY.to_string(),
            },
        )
}
