//! Set Compiler: Set + instant → Filter Expression
//!
//! Time-dependent predicates are resolved against the `now` passed in, and
//! instants are emitted in their wire form so both backends coerce them the
//! same way.

use chrono::{DateTime, Utc};
use serde_json::Value;

use super::model::{Principals, Set, SetPredicate};
use crate::domain::duration::DurationSpec;
use crate::domain::filter::FilterExpr;
use crate::domain::record::{fields, Visibility};
use crate::domain::value::format_instant;

/// Compile a Set. An empty Set yields `FilterExpr::Empty`.
pub fn compile(set: &Set, now: DateTime<Utc>) -> FilterExpr {
    let clauses: Vec<FilterExpr> = set
        .predicates
        .iter()
        .map(|predicate| compile_predicate(predicate, now))
        .collect();
    unwrap_single(FilterExpr::and(clauses))
}

/// Compile a Set and AND it with a caller-supplied expression
pub fn compile_with(set: &Set, other: FilterExpr, now: DateTime<Utc>) -> FilterExpr {
    compile(set, now).and_with(other)
}

fn compile_predicate(predicate: &SetPredicate, now: DateTime<Utc>) -> FilterExpr {
    match predicate {
        SetPredicate::Visibility(visibility) => visibility_is(*visibility),
        SetPredicate::Actives => actives(now),
        SetPredicate::Expireds(duration) => expireds(duration, now),
        SetPredicate::Createds(duration) => createds(duration, now),
        SetPredicate::Owners(principals) => owners(principals),
        SetPredicate::Audience(principals) => audience(principals, now),
        SetPredicate::And(sets) => {
            FilterExpr::and(sets.iter().map(|s| compile(s, now)).collect())
        }
        SetPredicate::Or(sets) => FilterExpr::or(sets.iter().map(|s| compile(s, now)).collect()),
    }
}

fn instant(at: DateTime<Utc>) -> Value {
    Value::String(format_instant(at))
}

fn visibility_is(visibility: Visibility) -> FilterExpr {
    FilterExpr::eq(fields::VISIBILITY, visibility.as_str())
}

/// validUntil unset or in the future, validFrom set and in the past
fn actives(now: DateTime<Utc>) -> FilterExpr {
    FilterExpr::And(vec![
        FilterExpr::Or(vec![
            FilterExpr::eq(fields::VALID_UNTIL_DATE_TIME, Value::Null),
            FilterExpr::gt(fields::VALID_UNTIL_DATE_TIME, instant(now)),
        ]),
        FilterExpr::neq(fields::VALID_FROM_DATE_TIME, Value::Null),
        FilterExpr::lt(fields::VALID_FROM_DATE_TIME, instant(now)),
    ])
}

fn expireds(duration: &DurationSpec, now: DateTime<Utc>) -> FilterExpr {
    let window = duration.window(now);
    FilterExpr::And(vec![
        FilterExpr::neq(fields::VALID_UNTIL_DATE_TIME, Value::Null),
        FilterExpr::between(
            fields::VALID_UNTIL_DATE_TIME,
            Some(instant(window.start)),
            Some(instant(window.end)),
        ),
    ])
}

fn createds(duration: &DurationSpec, now: DateTime<Utc>) -> FilterExpr {
    let window = duration.window(now);
    FilterExpr::between(
        fields::CREATED_DATE_TIME,
        Some(instant(window.start)),
        Some(instant(window.end)),
    )
}

/// Owned directly by one of the users, or through one of the groups on a
/// non-private record
fn owners(principals: &Principals) -> FilterExpr {
    let mut branches = Vec::with_capacity(2);
    if let Some(users) = &principals.user_ids {
        branches.push(FilterExpr::inq(fields::OWNER_USERS, users.iter().cloned()));
    }
    if let Some(groups) = &principals.group_ids {
        branches.push(FilterExpr::And(vec![
            FilterExpr::inq(fields::OWNER_GROUPS, groups.iter().cloned()),
            FilterExpr::neq(fields::VISIBILITY, Visibility::Private.as_str()),
        ]));
    }
    any_of(branches)
}

fn viewers(principals: &Principals) -> FilterExpr {
    let mut branches = Vec::with_capacity(2);
    if let Some(users) = &principals.user_ids {
        branches.push(FilterExpr::inq(fields::VIEWER_USERS, users.iter().cloned()));
    }
    if let Some(groups) = &principals.group_ids {
        branches.push(FilterExpr::inq(fields::VIEWER_GROUPS, groups.iter().cloned()));
    }
    any_of(branches)
}

/// Public, or owned and active, or viewable and active
fn audience(principals: &Principals, now: DateTime<Utc>) -> FilterExpr {
    let mut branches = vec![visibility_is(Visibility::Public)];
    if !principals.is_empty() {
        branches.push(FilterExpr::And(vec![owners(principals), actives(now)]));
        branches.push(FilterExpr::And(vec![viewers(principals), actives(now)]));
    }
    any_of(branches)
}

/// No branches means no constraint; a single branch needs no wrapper
fn any_of(mut branches: Vec<FilterExpr>) -> FilterExpr {
    match branches.len() {
        0 => FilterExpr::Empty,
        1 => branches.remove(0),
        _ => FilterExpr::Or(branches),
    }
}

/// `And([x])` → `x`
fn unwrap_single(expr: FilterExpr) -> FilterExpr {
    match expr {
        FilterExpr::And(mut children) if children.len() == 1 => children.remove(0),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::duration::DurationUnit;
    use chrono::TimeZone;
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 14, 21, 0, 0).unwrap()
    }

    #[test]
    fn test_empty_set_is_unconstrained() {
        assert_eq!(compile(&Set::default(), now()), FilterExpr::Empty);
    }

    #[test]
    fn test_single_flag_is_unwrapped() {
        let set = Set::new(vec![SetPredicate::Visibility(Visibility::Protected)]);
        assert_eq!(compile(&set, now()), FilterExpr::eq("_visibility", "protected"));
    }

    #[test]
    fn test_createds_window() {
        let set = Set::new(vec![SetPredicate::Createds(DurationSpec::new(1, DurationUnit::Days))]);
        assert_eq!(
            compile(&set, now()),
            FilterExpr::between(
                "_createdDateTime",
                Some(json!("2024-01-13T21:00:00.000Z")),
                Some(json!("2024-01-14T21:00:00.000Z"))
            )
        );
    }

    #[test]
    fn test_actives_shape() {
        let set = Set::new(vec![SetPredicate::Actives]);
        let FilterExpr::And(children) = compile(&set, now()) else {
            panic!("actives should compile to a conjunction");
        };
        assert_eq!(children.len(), 3);
        assert_eq!(children[2], FilterExpr::lt("_validFromDateTime", "2024-01-14T21:00:00.000Z"));
    }

    #[test]
    fn test_owners_omits_absent_half() {
        let set = Set::new(vec![SetPredicate::Owners(Principals::users(["u1"]))]);
        assert_eq!(compile(&set, now()), FilterExpr::inq("_ownerUsers", ["u1"]));

        let set = Set::new(vec![SetPredicate::Owners(Principals::default())]);
        assert_eq!(compile(&set, now()), FilterExpr::Empty);
    }

    #[test]
    fn test_audience_without_principals_is_publics() {
        let set = Set::new(vec![SetPredicate::Audience(Principals::default())]);
        assert_eq!(compile(&set, now()), FilterExpr::eq("_visibility", "public"));
    }

    #[test]
    fn test_or_of_empty_set_is_unconstrained() {
        let set = Set::new(vec![SetPredicate::Or(vec![
            Set::default(),
            Set::new(vec![SetPredicate::Actives]),
        ])]);
        assert_eq!(compile(&set, now()), FilterExpr::Empty);
    }

    #[test]
    fn test_compile_with_where() {
        let set = Set::new(vec![SetPredicate::Visibility(Visibility::Public)]);
        let expr = compile_with(&set, FilterExpr::eq("_kind", "book"), now());
        assert_eq!(
            expr,
            FilterExpr::And(vec![
                FilterExpr::eq("_visibility", "public"),
                FilterExpr::eq("_kind", "book")
            ])
        );
    }
}
