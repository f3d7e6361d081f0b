#![allow(clippy::unwrap_used, clippy::expect_used)]

use authz_security::{FilterExpr, Record};
use proptest::prelude::*;
use serde_json::{Value, json};

fn record_with_owner(owner: &str) -> Record {
    json!({ "owner": owner }).as_object().cloned().unwrap()
}

#[test]
fn owner_filter_keeps_only_own_rows() {
    let filter = FilterExpr::eq("owner", "u1");
    assert!(filter.matches(&record_with_owner("u1")));
    assert!(!filter.matches(&record_with_owner("u2")));
}

#[test]
fn caller_filter_merges_under_and() {
    let auth = FilterExpr::contains("groups", "eng");
    let caller = FilterExpr::from_input(&json!({ "title": { "eq": "x" } }))
        .unwrap()
        .unwrap();
    let merged = FilterExpr::and_all(vec![auth, caller]).unwrap();

    let visible = json!({ "groups": ["eng"], "title": "x" });
    let wrong_title = json!({ "groups": ["eng"], "title": "y" });
    let wrong_group = json!({ "groups": ["ops"], "title": "x" });
    assert!(merged.matches(visible.as_object().unwrap()));
    assert!(!merged.matches(wrong_title.as_object().unwrap()));
    assert!(!merged.matches(wrong_group.as_object().unwrap()));
}

proptest! {
    #[test]
    fn or_of_owner_clauses_matches_any_listed_owner(
        owners in proptest::collection::vec("[a-z]{1,8}", 1..5),
        probe in "[a-z]{1,8}",
    ) {
        let filter = FilterExpr::or_all(
            owners.iter().map(|o| FilterExpr::eq("owner", o.as_str())).collect(),
        )
        .unwrap();
        let expected = owners.contains(&probe);
        prop_assert_eq!(filter.matches(&record_with_owner(&probe)), expected);
    }

    #[test]
    fn rendered_input_parses_to_equivalent_predicate(
        owners in proptest::collection::vec("[a-z]{1,8}", 1..4),
        probe in "[a-z]{1,8}",
    ) {
        let filter = FilterExpr::or_all(
            owners.iter().map(|o| FilterExpr::contains("owners", o.as_str())).collect(),
        )
        .unwrap();
        let reparsed = FilterExpr::from_input(&filter.to_input()).unwrap().unwrap();

        let record = json!({ "owners": [probe.clone(), Value::Null] });
        let record = record.as_object().unwrap();
        prop_assert_eq!(filter.matches(record), reparsed.matches(record));
    }
}
