//! Filter evaluation, ordering and projection over in-memory records.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use tagbridge_model::{record_str, FilterExpr, OrderBy, Record, SortDirection};
use uuid::Uuid;

/// Case policy for `contains` predicates and name ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MatchCase {
    Sensitive,
    #[default]
    Insensitive,
}

/// Compare two ids; GUIDs compare by value so casing and braces don't matter.
pub fn id_eq(a: &str, b: &str) -> bool {
    match (Uuid::parse_str(a), Uuid::parse_str(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

pub fn matches(filter: &FilterExpr, record: &Record, match_case: MatchCase) -> bool {
    match filter {
        FilterExpr::Eq { attribute, value } => record_str(record, attribute)
            .map(|actual| id_eq(&actual, value.value()))
            .unwrap_or(false),
        FilterExpr::Contains { attribute, text } => {
            let Some(actual) = record_str(record, attribute) else {
                return false;
            };
            match match_case {
                MatchCase::Sensitive => actual.contains(text.as_str()),
                MatchCase::Insensitive => actual.to_lowercase().contains(&text.to_lowercase()),
            }
        }
    }
}

/// Records missing the attribute sort last in either direction.
pub fn compare(a: &Record, b: &Record, order_by: &OrderBy, match_case: MatchCase) -> Ordering {
    let left = record_str(a, &order_by.attribute);
    let right = record_str(b, &order_by.attribute);
    let ordering = match (left, right) {
        (Some(l), Some(r)) => {
            let primary = match match_case {
                MatchCase::Sensitive => Ordering::Equal,
                MatchCase::Insensitive => l.to_lowercase().cmp(&r.to_lowercase()),
            };
            primary.then_with(|| l.cmp(&r))
        }
        (Some(_), None) => return Ordering::Less,
        (None, Some(_)) => return Ordering::Greater,
        (None, None) => return Ordering::Equal,
    };
    match order_by.direction {
        SortDirection::Asc => ordering,
        SortDirection::Desc => ordering.reverse(),
    }
}

/// Keep only `fields`; an empty list keeps everything.
pub fn project(record: &Record, fields: &[String]) -> Record {
    if fields.is_empty() {
        return record.clone();
    }
    fields
        .iter()
        .filter_map(|field| record.get(field).map(|v| (field.clone(), v.clone())))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rec(value: serde_json::Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_contains_respects_case_policy() {
        let record = rec(json!({ "name": "Blue" }));
        let filter = FilterExpr::contains("name", "bl");
        assert!(matches(&filter, &record, MatchCase::Insensitive));
        assert!(!matches(&filter, &record, MatchCase::Sensitive));
    }

    #[test]
    fn test_guid_equality_ignores_case() {
        let record = rec(json!({ "accountid": "5F0C1C0E-2B1E-4C21-9D51-2F1A3C4B5D6E" }));
        let filter = FilterExpr::eq("accountid", "5f0c1c0e-2b1e-4c21-9d51-2f1a3c4b5d6e");
        assert!(matches(&filter, &record, MatchCase::Sensitive));
    }

    #[test]
    fn test_missing_attribute_sorts_last() {
        let named = rec(json!({ "name": "a" }));
        let unnamed = rec(json!({}));
        let order = OrderBy::desc("name");
        assert_eq!(compare(&named, &unnamed, &order, MatchCase::Insensitive), Ordering::Less);
    }

    #[test]
    fn test_projection() {
        let record = rec(json!({ "id": "1", "name": "a", "extra": true }));
        let projected = project(&record, &["id".to_string(), "name".to_string()]);
        assert_eq!(projected.len(), 2);
        assert!(!projected.contains_key("extra"));
    }
}
