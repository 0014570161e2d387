//! Set Compiler scenarios evaluated on both backends

mod common;

use chrono::{TimeZone, Utc};
use common::{entity, fixed_now, owners_corpus};
use kindstore_query::infrastructure::matches_document;
use kindstore_query::{sets, DateFields, FilterExpr, Matcher, NativeTranslator, Set};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

fn ids(records: &[&Value]) -> Vec<String> {
    records
        .iter()
        .filter_map(|r| r["_id"].as_str().map(str::to_string))
        .collect()
}

#[test]
fn test_empty_set_matches_every_record() {
    let expr = sets::compile(&Set::from_query_string("filter[limit]=3").unwrap(), fixed_now());
    assert_eq!(expr, FilterExpr::Empty);

    let records = owners_corpus();
    assert_eq!(Matcher::default().filter(&expr, &records).len(), records.len());
    assert_eq!(NativeTranslator::default().translate(&expr), json!({}));
}

#[test]
fn test_owners_scenario() {
    let set = Set::from_query_string(
        "set[owners][userIds]=user1,user2&set[owners][groupIds]=group1,group2",
    )
    .unwrap();
    let expr = sets::compile(&set, fixed_now());
    let records = owners_corpus();

    let matched = Matcher::default().filter(&expr, &records);
    assert_eq!(ids(&matched), vec!["mine", "group"]);

    let query = NativeTranslator::default().translate(&expr);
    let native: Vec<&Value> = records
        .iter()
        .filter(|r| matches_document(&query, r).unwrap())
        .collect();
    assert_eq!(ids(&native), vec!["mine", "group"]);
}

#[test]
fn test_owners_group_branch_excludes_private() {
    let set = Set::from_query_string("set[owners][groupIds]=group1").unwrap();
    let expr = sets::compile(&set, fixed_now());
    let record = json!({ "_ownerGroups": ["group1"], "_visibility": "private" });
    assert!(!Matcher::default().matches(&expr, &record));
}

fn created_window(set: &str, now: chrono::DateTime<Utc>) -> FilterExpr {
    sets::compile(&Set::from_query_string(set).unwrap(), now)
}

#[test]
fn test_createds_one_day_window() {
    let now = Utc.with_ymd_and_hms(2024, 1, 14, 21, 0, 0).unwrap();
    assert_eq!(
        created_window("set[createds-1d]=true", now),
        FilterExpr::between(
            "_createdDateTime",
            Some(json!("2024-01-13T21:00:00.000Z")),
            Some(json!("2024-01-14T21:00:00.000Z")),
        )
    );
}

#[test]
fn test_createds_month_is_calendar_month() {
    let now = Utc.with_ymd_and_hms(2024, 3, 15, 21, 0, 0).unwrap();
    assert_eq!(
        created_window("set[createds-1mo]=true", now),
        FilterExpr::between(
            "_createdDateTime",
            Some(json!("2024-02-15T21:00:00.000Z")),
            Some(json!("2024-03-15T21:00:00.000Z")),
        )
    );
}

#[test]
fn test_oversized_window_reaches_back_to_year_zero() {
    let expr = created_window("set[createds-99999999d]=true", fixed_now());
    assert_eq!(
        expr,
        FilterExpr::between(
            "_createdDateTime",
            Some(json!("0000-01-01T00:00:00.000Z")),
            Some(json!("2024-01-14T21:00:00.000Z")),
        )
    );

    let records = vec![entity("old", "book", "public"), entity("new", "book", "public")];
    assert_eq!(Matcher::default().filter(&expr, &records).len(), 2);

    let date_fields = DateFields::default();
    let query = NativeTranslator::default().translate(&expr);
    assert!(records
        .iter()
        .all(|r| matches_document(&query, &date_fields.coerce_record(r)).unwrap()));
}

#[test]
fn test_expireds_ten_minutes() {
    let now = Utc.with_ymd_and_hms(2024, 1, 15, 10, 0, 0).unwrap();
    let expr = sets::compile(&Set::from_query_string("set[expireds-10m]=true").unwrap(), now);
    assert_eq!(
        expr,
        FilterExpr::And(vec![
            FilterExpr::neq("_validUntilDateTime", Value::Null),
            FilterExpr::between(
                "_validUntilDateTime",
                Some(json!("2024-01-15T09:50:00.000Z")),
                Some(json!("2024-01-15T10:00:00.000Z")),
            ),
        ])
    );

    let matcher = Matcher::new(DateFields::default());
    assert!(matcher.matches(&expr, &json!({ "_validUntilDateTime": "2024-01-15T09:55:00Z" })));
    assert!(!matcher.matches(&expr, &json!({ "_validUntilDateTime": "2024-01-15T09:45:00Z" })));
    assert!(!matcher.matches(&expr, &json!({})));
}

#[test]
fn test_actives_on_both_backends() {
    let expr = sets::compile(&Set::from_query_string("set[actives]=true").unwrap(), fixed_now());
    let records = vec![
        json!({ "_id": "open", "_validFromDateTime": "2024-01-01T00:00:00Z" }),
        json!({ "_id": "bounded", "_validFromDateTime": "2024-01-01T00:00:00Z", "_validUntilDateTime": "2024-02-01T00:00:00Z" }),
        json!({ "_id": "ended", "_validFromDateTime": "2024-01-01T00:00:00Z", "_validUntilDateTime": "2024-01-02T00:00:00Z" }),
        json!({ "_id": "future", "_validFromDateTime": "2024-03-01T00:00:00Z" }),
        json!({ "_id": "unset" }),
    ];

    let matched = Matcher::default().filter(&expr, &records);
    assert_eq!(ids(&matched), vec!["open", "bounded"]);

    let date_fields = DateFields::default();
    let query = NativeTranslator::default().translate(&expr);
    let native: Vec<&Value> = records
        .iter()
        .filter(|r| matches_document(&query, &date_fields.coerce_record(r)).unwrap())
        .collect();
    assert_eq!(ids(&native), vec!["open", "bounded"]);
}

#[test]
fn test_nested_or_of_sets() {
    let set = Set::from_query_string("set[or][0][publics]=true&set[or][1][owners][userIds]=user9")
        .unwrap();
    let expr = sets::compile(&set, fixed_now());
    let records = owners_corpus();

    // only the record owned by user9 qualifies; none of the corpus is public
    assert_eq!(ids(&Matcher::default().filter(&expr, &records)), vec!["other"]);
}
