//! Translator/matcher equivalence
//!
//! For generated expressions and records, the translated query document run
//! by the in-memory store must select exactly the records the In-Memory
//! Matcher accepts.

use kindstore_query::infrastructure::matches_document;
use kindstore_query::{DateFields, DocumentStore, FilterExpr, InMemoryDocumentStore, Matcher, NativeTranslator};
use proptest::prelude::*;
use proptest::option;
use serde_json::{json, Map, Value};

const FIELDS: [&str; 7] = ["a", "b", "tags", "meta", "meta.size", "_createdDateTime", "missing"];

/// Letters, regex metacharacters and Unicode case pairs (Σ σ ς, İ i)
const TEXT: &str = r"[a-cA-C.*(\\σΣςİi]{0,3}";
const LIKE_PATTERN: &str = r"[a-cA-C%.*(\\σΣςİi]{0,4}";

const INSTANTS: [&str; 4] = [
    "2024-01-01T00:00:00Z",
    "2024-01-10T08:00:00.000Z",
    "2024-01-10T10:00:00+02:00",
    "2024-02-01T12:30:00Z",
];

fn scalar() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        (-3i64..4).prop_map(|n| json!(n)),
        (-2.0f64..2.0).prop_map(|f| json!((f * 2.0).round() / 2.0)),
        TEXT.prop_map(Value::String),
        prop::sample::select(INSTANTS.to_vec()).prop_map(|s| json!(s)),
    ]
}

fn record() -> impl Strategy<Value = Value> {
    (
        option::of(scalar()),
        option::of(scalar()),
        option::of(prop::collection::vec(scalar(), 0..3)),
        option::of(scalar()),
        option::of(prop_oneof![
            prop::sample::select(INSTANTS.to_vec()).prop_map(|s| json!(s)),
            Just(json!("not a date")),
        ]),
    )
        .prop_map(|(a, b, tags, size, created)| {
            let mut doc = Map::new();
            if let Some(a) = a {
                doc.insert("a".into(), a);
            }
            if let Some(b) = b {
                doc.insert("b".into(), b);
            }
            if let Some(tags) = tags {
                doc.insert("tags".into(), Value::Array(tags));
            }
            if let Some(size) = size {
                doc.insert("meta".into(), json!({ "size": size }));
            }
            if let Some(created) = created {
                doc.insert("_createdDateTime".into(), created);
            }
            Value::Object(doc)
        })
}

fn leaf() -> impl Strategy<Value = FilterExpr> {
    (
        prop::sample::select(FIELDS.to_vec()),
        scalar(),
        prop::collection::vec(scalar(), 0..3),
        option::of(scalar()),
        option::of(scalar()),
        any::<bool>(),
        LIKE_PATTERN,
        0u8..16,
    )
        .prop_map(|(field, value, list, low, high, flag, pattern, op)| match op {
            0 => FilterExpr::eq(field, value),
            1 => FilterExpr::neq(field, value),
            2 => FilterExpr::gt(field, value),
            3 => FilterExpr::gte(field, value),
            4 => FilterExpr::lt(field, value),
            5 => FilterExpr::lte(field, value),
            6 => FilterExpr::inq(field, list),
            7 => FilterExpr::nin(field, list),
            8 => FilterExpr::between(field, low, high),
            9 => FilterExpr::exists(field, flag),
            10 => FilterExpr::like(field, pattern),
            11 => FilterExpr::ilike(field, pattern),
            12 => FilterExpr::eq(field, Value::Array(list)),
            // object operands flatten to dotted paths, operator maps included
            13 => FilterExpr::eq("meta", json!({ "size": value })),
            14 => {
                let op = if flag { "gt" } else { "lte" };
                FilterExpr::eq("meta", json!({ "size": { op: value } }))
            }
            _ => FilterExpr::Empty,
        })
}

fn expression() -> impl Strategy<Value = FilterExpr> {
    leaf().prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(FilterExpr::And),
            prop::collection::vec(inner, 0..4).prop_map(FilterExpr::Or),
        ]
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(512))]

    #[test]
    fn prop_translator_agrees_with_matcher(
        expr in expression(),
        records in prop::collection::vec(record(), 1..6),
    ) {
        let date_fields = DateFields::default();
        let matcher = Matcher::new(date_fields.clone());
        let query = NativeTranslator::new(date_fields.clone()).translate(&expr);

        for record in &records {
            // the store holds date-coerced documents
            let stored = date_fields.coerce_record(record);
            let native = matches_document(&query, &stored).unwrap();
            prop_assert_eq!(
                native,
                matcher.matches(&expr, record),
                "query {} on record {}",
                query,
                record
            );
        }
    }
}

#[tokio::test]
async fn test_store_count_matches_matcher_filter() {
    let records = vec![
        json!({ "_id": 1, "tags": ["x", "y"], "_createdDateTime": "2024-01-05T00:00:00Z" }),
        json!({ "_id": 2, "tags": "x", "_createdDateTime": "2024-01-20T00:00:00Z" }),
        json!({ "_id": 3, "_createdDateTime": "2024-01-06T00:00:00Z" }),
        json!({ "_id": 4, "tags": ["z"] }),
    ];
    let store = InMemoryDocumentStore::new(DateFields::default());
    store.insert_many("GenericEntity", records.clone());

    let expr = FilterExpr::or(vec![
        FilterExpr::inq("tags", ["x"]),
        FilterExpr::between(
            "_createdDateTime",
            Some(json!("2024-01-06T00:00:00Z")),
            Some(json!("2024-01-31T00:00:00Z")),
        ),
    ]);
    let query = NativeTranslator::default().translate(&expr);

    let expected = Matcher::default().filter(&expr, &records).len() as u64;
    assert_eq!(expected, 3);
    assert_eq!(store.count("GenericEntity", &query).await.unwrap(), expected);
}
