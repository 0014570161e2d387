//! Pipeline Builder
//!
//! Relation queries run on the relation collection and join both sides:
//!
//! ```text
//! $match(relation) → $lookup(far) → $match(far.*) → $unwind(far)
//!                  → $lookup(near) → $match(near.*) → $unwind(near)
//!                  → $addFields(summaries) → $project → $sort → $skip → $limit
//! ```
//!
//! Single-collection queries reuse the tail (`$project` onwards).

use serde_json::{json, Map, Value};

use super::stage::Stage;
use super::translator::{NativeTranslator, AND, NOR, OR};
use crate::domain::filter::FilterExpr;
use crate::domain::query::{FieldSelection, Filter, SortKey};
use crate::domain::record::fields;

/// Fields copied into each side's summary sub-object by default
pub const DEFAULT_SUMMARY_FIELDS: [&str; 5] = [
    fields::ID,
    fields::KIND,
    fields::NAME,
    fields::SLUG,
    fields::VISIBILITY,
];

/// `min(requested, maximum)`; a maximum of zero or none means uncapped
pub fn effective_limit(requested: Option<u64>, maximum: Option<u64>) -> Option<u64> {
    match (requested, maximum.filter(|m| *m > 0)) {
        (Some(r), Some(m)) => Some(r.min(m)),
        (Some(r), None) => Some(r),
        (None, m) => m,
    }
}

/// Prefix every leaf field reference of a query document with `alias.`,
/// recursing through `$and`/`$or`/`$nor` and leaving operator keys alone.
pub fn prefix_fields(query: &Value, alias: &str) -> Value {
    let Value::Object(map) = query else {
        return query.clone();
    };
    map.iter()
        .map(|(key, value)| {
            if key == AND || key == OR || key == NOR {
                let branches = match value {
                    Value::Array(items) => {
                        Value::Array(items.iter().map(|i| prefix_fields(i, alias)).collect())
                    }
                    other => other.clone(),
                };
                (key.clone(), branches)
            } else if key.starts_with('$') {
                (key.clone(), value.clone())
            } else {
                (format!("{}.{}", alias, key), value.clone())
            }
        })
        .collect::<Map<String, Value>>()
        .into()
}

/// One joined side of a relation query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinSpec {
    pub from: String,
    pub local_field: String,
    pub foreign_field: String,
    pub alias: String,
    /// Read-only summary sub-object derived from the joined document
    pub summary_field: String,
    pub summary_fields: Vec<String>,
}

impl JoinSpec {
    pub fn new(
        from: impl Into<String>,
        local_field: impl Into<String>,
        alias: impl Into<String>,
    ) -> Self {
        let alias = alias.into();
        Self {
            from: from.into(),
            local_field: local_field.into(),
            foreign_field: fields::ID.to_string(),
            summary_field: format!("{}Summary", alias),
            summary_fields: DEFAULT_SUMMARY_FIELDS.iter().map(|f| f.to_string()).collect(),
            alias,
        }
    }

    pub fn with_foreign_field(mut self, field: impl Into<String>) -> Self {
        self.foreign_field = field.into();
        self
    }

    pub fn with_summary<S: Into<String>>(
        mut self,
        field: impl Into<String>,
        summary_fields: impl IntoIterator<Item = S>,
    ) -> Self {
        self.summary_field = field.into();
        self.summary_fields = summary_fields.into_iter().map(Into::into).collect();
        self
    }

    fn lookup(&self) -> Stage {
        Stage::Lookup {
            from: self.from.clone(),
            local_field: self.local_field.clone(),
            foreign_field: self.foreign_field.clone(),
            alias: self.alias.clone(),
        }
    }

    /// Match on the joined side; the guard drops rows whose join came back
    /// empty instead of letting them match as null.
    fn match_joined(&self, translator: &NativeTranslator, filter: &FilterExpr) -> Option<Stage> {
        if filter.is_empty() {
            return None;
        }
        let guard = json!({ format!("{}.0", self.alias): { "$exists": true } });
        let prefixed = prefix_fields(&translator.translate(filter), &self.alias);
        Some(Stage::Match(json!({ AND: [guard, prefixed] })))
    }

    fn summary(&self) -> Value {
        Value::Object(
            self.summary_fields
                .iter()
                .map(|f| (f.clone(), Value::String(format!("${}.{}", self.alias, f))))
                .collect(),
        )
    }
}

/// Projection document for a field selection. Inclusion keeps the
/// identifier and `preserved` unless they are listed as exceptions.
fn projection(selection: &FieldSelection, preserved: &[String]) -> Option<Map<String, Value>> {
    let mut doc = Map::new();
    match selection {
        FieldSelection::Include { fields: included, except } => {
            let excepted = |f: &str| except.iter().any(|e| e == f);
            for field in included {
                if !excepted(field.as_str()) {
                    doc.insert(field.clone(), json!(1));
                }
            }
            for field in preserved {
                if !excepted(field.as_str()) && !doc.contains_key(field) {
                    doc.insert(field.clone(), json!(1));
                }
            }
            doc.insert(
                fields::ID.to_string(),
                json!(if excepted(fields::ID) { 0 } else { 1 }),
            );
        }
        FieldSelection::Exclude(excluded) => {
            for field in excluded {
                doc.insert(field.clone(), json!(0));
            }
        }
    }
    (!doc.is_empty()).then_some(doc)
}

/// Projection, sort, skip and capped limit
fn tail_stages(
    fields: Option<&FieldSelection>,
    preserved: &[String],
    order: &[SortKey],
    skip: Option<u64>,
    limit: Option<u64>,
) -> Vec<Stage> {
    let mut stages = Vec::new();
    if let Some(doc) = fields.and_then(|f| projection(f, preserved)) {
        stages.push(Stage::Project(doc));
    }
    if !order.is_empty() {
        stages.push(Stage::Sort(
            order.iter().map(|k| (k.field.clone(), k.direction)).collect(),
        ));
    }
    if let Some(skip) = skip.filter(|s| *s > 0) {
        stages.push(Stage::Skip(skip));
    }
    if let Some(limit) = limit {
        stages.push(Stage::Limit(limit));
    }
    stages
}

/// Query across a relation collection and the two collections it links
#[derive(Debug, Clone)]
pub struct RelationQuery {
    pub near: JoinSpec,
    pub far: JoinSpec,
    pub relation_filter: FilterExpr,
    pub near_filter: FilterExpr,
    pub far_filter: FilterExpr,
    pub fields: Option<FieldSelection>,
    pub order: Vec<SortKey>,
    pub skip: Option<u64>,
    pub limit: Option<u64>,
    pub max_limit: Option<u64>,
}

impl RelationQuery {
    pub fn new(near: JoinSpec, far: JoinSpec) -> Self {
        Self {
            near,
            far,
            relation_filter: FilterExpr::Empty,
            near_filter: FilterExpr::Empty,
            far_filter: FilterExpr::Empty,
            fields: None,
            order: Vec::new(),
            skip: None,
            limit: None,
            max_limit: None,
        }
    }

    /// Take `where` (as the relation filter), fields, order, skip and limit
    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.relation_filter = filter.where_clause;
        self.fields = filter.fields;
        self.order = filter.order;
        self.skip = filter.skip;
        self.limit = filter.limit;
        self
    }

    pub fn with_relation_filter(mut self, filter: FilterExpr) -> Self {
        self.relation_filter = filter;
        self
    }

    pub fn with_near_filter(mut self, filter: FilterExpr) -> Self {
        self.near_filter = filter;
        self
    }

    pub fn with_far_filter(mut self, filter: FilterExpr) -> Self {
        self.far_filter = filter;
        self
    }

    pub fn with_max_limit(mut self, max_limit: Option<u64>) -> Self {
        self.max_limit = max_limit;
        self
    }

    pub fn build(&self, translator: &NativeTranslator) -> Vec<Stage> {
        let mut stages = Vec::new();

        if !self.relation_filter.is_empty() {
            stages.push(Stage::Match(translator.translate(&self.relation_filter)));
        }
        for (side, filter) in [(&self.far, &self.far_filter), (&self.near, &self.near_filter)] {
            stages.push(side.lookup());
            stages.extend(side.match_joined(translator, filter));
            stages.push(Stage::Unwind {
                path: side.alias.clone(),
            });
        }

        let mut summaries = Map::new();
        for side in [&self.far, &self.near] {
            summaries.insert(side.summary_field.clone(), side.summary());
        }
        stages.push(Stage::AddFields(summaries));

        let preserved = [self.far.summary_field.clone(), self.near.summary_field.clone()];
        stages.extend(tail_stages(
            self.fields.as_ref(),
            &preserved,
            &self.order,
            self.skip,
            effective_limit(self.limit, self.max_limit),
        ));
        stages
    }
}

/// Find on a single collection: `$match` of Set ∧ where, then the tail stages
#[derive(Debug, Clone, Default)]
pub struct CollectionQuery {
    pub filter: FilterExpr,
    pub fields: Option<FieldSelection>,
    pub order: Vec<SortKey>,
    pub skip: Option<u64>,
    pub limit: Option<u64>,
    pub max_limit: Option<u64>,
}

impl CollectionQuery {
    /// `set_expr` is the compiled Set, ANDed with the filter's `where`
    pub fn new(filter: Filter, set_expr: FilterExpr) -> Self {
        Self {
            filter: set_expr.and_with(filter.where_clause),
            fields: filter.fields,
            order: filter.order,
            skip: filter.skip,
            limit: filter.limit,
            max_limit: None,
        }
    }

    pub fn with_max_limit(mut self, max_limit: Option<u64>) -> Self {
        self.max_limit = max_limit;
        self
    }

    pub fn build(&self, translator: &NativeTranslator) -> Vec<Stage> {
        let mut stages = Vec::new();
        if !self.filter.is_empty() {
            stages.push(Stage::Match(translator.translate(&self.filter)));
        }
        stages.extend(tail_stages(
            self.fields.as_ref(),
            &[],
            &self.order,
            self.skip,
            effective_limit(self.limit, self.max_limit),
        ));
        stages
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn relation_query() -> RelationQuery {
        RelationQuery::new(
            JoinSpec::new("List", "_listId", "_list"),
            JoinSpec::new("GenericEntity", "_entityId", "_entity"),
        )
    }

    #[test]
    fn test_effective_limit() {
        assert_eq!(effective_limit(Some(50), Some(20)), Some(20));
        assert_eq!(effective_limit(Some(5), Some(20)), Some(5));
        assert_eq!(effective_limit(Some(5), Some(0)), Some(5));
        assert_eq!(effective_limit(Some(5), None), Some(5));
        assert_eq!(effective_limit(None, Some(20)), Some(20));
        assert_eq!(effective_limit(None, None), None);
    }

    #[test]
    fn test_prefix_fields_skips_combinators() {
        let query = json!({
            "$or": [
                { "_kind": { "$eq": "book" } },
                { "$and": [{ "_name": { "$regex": "^D", "$options": "s" } }] }
            ],
            "_visibility": { "$ne": "private" }
        });
        assert_eq!(
            prefix_fields(&query, "_entity"),
            json!({
                "$or": [
                    { "_entity._kind": { "$eq": "book" } },
                    { "$and": [{ "_entity._name": { "$regex": "^D", "$options": "s" } }] }
                ],
                "_entity._visibility": { "$ne": "private" }
            })
        );
    }

    #[test]
    fn test_minimal_relation_pipeline_shape() {
        let stages = relation_query().build(&NativeTranslator::default());
        let names: Vec<&str> = stages.iter().map(Stage::name).collect();
        assert_eq!(
            names,
            vec!["$lookup", "$unwind", "$lookup", "$unwind", "$addFields"]
        );
    }

    #[test]
    fn test_full_relation_pipeline_order() {
        let stages = relation_query()
            .with_relation_filter(FilterExpr::eq("_kind", "pinned"))
            .with_far_filter(FilterExpr::eq("_kind", "book"))
            .with_near_filter(FilterExpr::eq("_visibility", "public"))
            .with_filter(Filter {
                where_clause: FilterExpr::eq("_kind", "pinned"),
                fields: Some(FieldSelection::include(["_entity"])),
                order: vec![SortKey::desc("_entity._name")],
                skip: Some(10),
                limit: Some(500),
            })
            .with_max_limit(Some(100))
            .build(&NativeTranslator::default());

        let names: Vec<&str> = stages.iter().map(Stage::name).collect();
        assert_eq!(
            names,
            vec![
                "$match", "$lookup", "$match", "$unwind", "$lookup", "$match", "$unwind",
                "$addFields", "$project", "$sort", "$skip", "$limit"
            ]
        );
        assert_eq!(stages[1].to_document()["$lookup"]["from"], json!("GenericEntity"));
        assert_eq!(
            stages[2],
            Stage::Match(json!({ "$and": [
                { "_entity.0": { "$exists": true } },
                { "_entity._kind": { "$eq": "book" } }
            ]}))
        );
        assert_eq!(stages[11], Stage::Limit(100));
    }

    #[test]
    fn test_inclusion_projection_preserves_id_and_summaries() {
        let stages = relation_query()
            .with_filter(Filter {
                fields: Some(FieldSelection::include(["_entity"])),
                ..Default::default()
            })
            .build(&NativeTranslator::default());

        let Some(Stage::Project(doc)) = stages.iter().find(|s| s.name() == "$project") else {
            panic!("expected a projection stage");
        };
        assert_eq!(
            Value::Object(doc.clone()),
            json!({ "_entity": 1, "_entitySummary": 1, "_listSummary": 1, "_id": 1 })
        );
    }

    #[test]
    fn test_inclusion_projection_honours_exceptions() {
        let selection = FieldSelection::Include {
            fields: vec!["_name".into()],
            except: vec!["_id".into(), "_listSummary".into()],
        };
        let doc = projection(&selection, &["_listSummary".to_string()]).unwrap();
        assert_eq!(Value::Object(doc), json!({ "_name": 1, "_id": 0 }));
    }

    #[test]
    fn test_exclusion_projection_only_removes_named() {
        let doc = projection(&FieldSelection::exclude(["_ownerUsers"]), &[]).unwrap();
        assert_eq!(Value::Object(doc), json!({ "_ownerUsers": 0 }));
        assert!(projection(&FieldSelection::exclude(Vec::<String>::new()), &[]).is_none());
    }

    #[test]
    fn test_summary_stage() {
        let stages = relation_query().build(&NativeTranslator::default());
        let Stage::AddFields(fields) = &stages[4] else {
            panic!("expected $addFields");
        };
        assert_eq!(fields["_entitySummary"]["_name"], json!("$_entity._name"));
        assert_eq!(fields["_listSummary"]["_id"], json!("$_list._id"));
    }

    #[test]
    fn test_collection_query() {
        let filter = Filter::from_query_string("filter[where][_kind]=book&filter[limit]=500").unwrap();
        let stages = CollectionQuery::new(filter, FilterExpr::eq("_visibility", "public"))
            .with_max_limit(Some(50))
            .build(&NativeTranslator::default());

        assert_eq!(
            stages,
            vec![
                Stage::Match(json!({ "$and": [
                    { "_visibility": { "$eq": "public" } },
                    { "_kind": { "$eq": "book" } }
                ]})),
                Stage::Limit(50),
            ]
        );
    }
}
