//! Limit Engine
//!
//! Per applicable rule:
//! 1. interpolate the scope template against the incoming record
//! 2. on update, exclude the record itself (`_id != existingId`)
//! 3. with a duration, skip the rule when the record's own creation time is
//!    outside `[now - duration, now]`, else restrict the count to that window
//! 4. count all remaining rules concurrently
//! 5. report the first rule (in configuration order) whose count reached its limit

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, warn};

use super::counter::RecordCounter;
use crate::config::{EngineConfig, RuleKind, ScopeRule};
use crate::domain::filter::FilterExpr;
use crate::domain::record::{fields, RecordFamily};
use crate::domain::value::{as_native_date, format_instant, parse_instant};
use crate::error::{QueryError, Result};

pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Incoming write being validated
#[derive(Debug, Clone, Copy)]
pub struct WriteContext<'a> {
    pub family: RecordFamily,
    pub kind: &'a str,
    pub record: &'a Value,
    pub is_update: bool,
    pub existing_id: Option<&'a str>,
}

impl<'a> WriteContext<'a> {
    pub fn create(family: RecordFamily, kind: &'a str, record: &'a Value) -> Self {
        Self {
            family,
            kind,
            record,
            is_update: false,
            existing_id: None,
        }
    }

    pub fn update(family: RecordFamily, kind: &'a str, record: &'a Value, existing_id: &'a str) -> Self {
        Self {
            family,
            kind,
            record,
            is_update: true,
            existing_id: Some(existing_id),
        }
    }

    fn excluded_id(&self) -> Option<&'a str> {
        self.existing_id.filter(|_| self.is_update)
    }
}

pub struct LimitEngine {
    config: Arc<EngineConfig>,
    counter: Arc<dyn RecordCounter>,
    clock: Clock,
}

impl LimitEngine {
    pub fn new(config: Arc<EngineConfig>, counter: Arc<dyn RecordCounter>) -> Self {
        Self {
            config,
            counter,
            clock: Arc::new(Utc::now),
        }
    }

    pub fn with_clock(mut self, clock: impl Fn() -> DateTime<Utc> + Send + Sync + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Fails with `<FAMILY>-LIMIT-EXCEEDED` when a record-limit rule is full
    pub async fn check_limits(
        &self,
        family: RecordFamily,
        kind: &str,
        record: &Value,
        is_update: bool,
        existing_id: Option<&str>,
    ) -> Result<()> {
        let ctx = WriteContext {
            family,
            kind,
            record,
            is_update,
            existing_id,
        };
        self.check(RuleKind::RecordLimit, &ctx).await
    }

    /// Fails with `<FAMILY>-UNIQUENESS-VIOLATION` when another record already
    /// matches a uniqueness rule
    pub async fn check_uniqueness(
        &self,
        family: RecordFamily,
        kind: &str,
        record: &Value,
        is_update: bool,
        existing_id: Option<&str>,
    ) -> Result<()> {
        let ctx = WriteContext {
            family,
            kind,
            record,
            is_update,
            existing_id,
        };
        self.check(RuleKind::Uniqueness, &ctx).await
    }

    /// Both checks, uniqueness first
    pub async fn validate(&self, ctx: &WriteContext<'_>) -> Result<()> {
        self.check(RuleKind::Uniqueness, ctx).await?;
        self.check(RuleKind::RecordLimit, ctx).await
    }

    /// Expression counted for one rule, or `None` when the rule is skipped
    pub fn scope_expression(
        &self,
        check: RuleKind,
        rule: &ScopeRule,
        ctx: &WriteContext<'_>,
        now: DateTime<Utc>,
    ) -> Result<Option<FilterExpr>> {
        let scope = rule.template.interpolate(ctx.record, now)?;
        if check == RuleKind::Uniqueness && scope.is_empty() {
            // every field of the scope was missing: nothing to compare against
            warn!(scope = rule.scope(), kind = ctx.kind, "Uniqueness scope resolved to nothing, skipping");
            return Ok(None);
        }

        let mut expr = scope;
        if let Some(id) = ctx.excluded_id() {
            expr = expr.and_with(FilterExpr::neq(fields::ID, id));
        }

        if let Some(duration) = rule.duration {
            let window = duration.window(now);
            let created = created_at(ctx.record, now);
            if !window.contains(created) {
                debug!(
                    scope = rule.scope(),
                    duration = %duration,
                    created = %format_instant(created),
                    "Record outside rule window, skipping count"
                );
                return Ok(None);
            }
            expr = expr.and_with(FilterExpr::between(
                fields::CREATED_DATE_TIME,
                Some(Value::String(format_instant(window.start))),
                Some(Value::String(format_instant(window.end))),
            ));
        }
        Ok(Some(expr))
    }

    async fn check(&self, check: RuleKind, ctx: &WriteContext<'_>) -> Result<()> {
        let family_config = self.config.family(ctx.family);
        let rules = match check {
            RuleKind::RecordLimit => family_config.record_limits_for(ctx.kind),
            RuleKind::Uniqueness => family_config.uniqueness_for(ctx.kind),
        };
        if rules.is_empty() {
            return Ok(());
        }

        let now = (self.clock)();
        let mut planned: Vec<(&ScopeRule, FilterExpr)> = Vec::with_capacity(rules.len());
        for rule in rules {
            if let Some(expr) = self.scope_expression(check, rule, ctx, now)? {
                planned.push((rule, expr));
            }
        }

        let counts = join_all(
            planned
                .iter()
                .map(|(_, expr)| self.counter.count(ctx.family, expr)),
        )
        .await;

        for ((rule, _), count) in planned.iter().zip(counts) {
            let count = count?;
            debug!(
                family = %ctx.family,
                kind = ctx.kind,
                scope = rule.scope(),
                count,
                limit = rule.limit,
                "Counted scope"
            );
            if count >= rule.limit {
                return Err(violation(check, rule, ctx, count));
            }
        }
        Ok(())
    }
}

/// Creation time of the incoming record; a record without one is new
fn created_at(record: &Value, now: DateTime<Utc>) -> DateTime<Utc> {
    match record.get(fields::CREATED_DATE_TIME) {
        Some(Value::String(s)) => parse_instant(s).unwrap_or(now),
        Some(other) => as_native_date(other).unwrap_or(now),
        None => now,
    }
}

fn violation(check: RuleKind, rule: &ScopeRule, ctx: &WriteContext<'_>, count: u64) -> QueryError {
    let details = json!({
        "limit": rule.limit,
        "count": count,
        "scope": rule.scope(),
        "kind": ctx.kind,
        "family": ctx.family.as_str(),
    });
    let err = match check {
        RuleKind::RecordLimit => QueryError::limit_exceeded(
            ctx.family,
            format!(
                "{} limit of {} reached for kind '{}' (scope '{}')",
                ctx.family,
                rule.limit,
                ctx.kind,
                rule.scope()
            ),
        ),
        RuleKind::Uniqueness => QueryError::uniqueness_violation(
            ctx.family,
            format!(
                "A {} of kind '{}' matching '{}' already exists",
                ctx.family,
                ctx.kind,
                rule.scope()
            ),
        ),
    };
    err.with_details(details)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FamilyConfig, RuleList};
    use crate::domain::duration::DurationSpec;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use parking_lot::Mutex;

    /// Returns a fixed count and records every expression it was asked about
    struct FixedCounter {
        count: u64,
        calls: Mutex<Vec<FilterExpr>>,
    }

    impl FixedCounter {
        fn new(count: u64) -> Arc<Self> {
            Arc::new(Self {
                count,
                calls: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl RecordCounter for FixedCounter {
        async fn count(&self, _family: RecordFamily, expr: &FilterExpr) -> Result<u64> {
            self.calls.lock().push(expr.clone());
            Ok(self.count)
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 14, 21, 0, 0).unwrap()
    }

    fn engine(rules: Vec<ScopeRule>, counter: Arc<FixedCounter>) -> LimitEngine {
        let config = EngineConfig::new().with_family(
            RecordFamily::Entity,
            FamilyConfig::new(RecordFamily::Entity).with_record_limits(RuleList::new(rules)),
        );
        LimitEngine::new(Arc::new(config), counter).with_clock(now)
    }

    #[tokio::test]
    async fn test_count_equal_to_limit_fails() {
        let rule = ScopeRule::new("where[_kind]=book", 10).unwrap();
        let record = json!({ "_kind": "book" });

        let err = engine(vec![rule.clone()], FixedCounter::new(10))
            .check_limits(RecordFamily::Entity, "book", &record, false, None)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "ENTITY-LIMIT-EXCEEDED");
        assert_eq!(err.details["limit"], json!(10));
        assert!(err.is_violation());

        engine(vec![rule], FixedCounter::new(9))
            .check_limits(RecordFamily::Entity, "book", &record, false, None)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_window_skip_never_counts() {
        let rule = ScopeRule::new("where[_kind]=book", 1)
            .unwrap()
            .with_duration("30d".parse::<DurationSpec>().unwrap());
        let counter = FixedCounter::new(100);
        let record = json!({ "_kind": "book", "_createdDateTime": "2023-12-05T21:00:00Z" });

        engine(vec![rule], counter.clone())
            .check_limits(RecordFamily::Entity, "book", &record, false, None)
            .await
            .unwrap();
        assert!(counter.calls.lock().is_empty());
    }

    #[tokio::test]
    async fn test_window_clause_appended_in_window() {
        let rule = ScopeRule::new("where[_kind]=book", 5)
            .unwrap()
            .with_duration("1d".parse::<DurationSpec>().unwrap());
        let counter = FixedCounter::new(0);

        engine(vec![rule], counter.clone())
            .check_limits(RecordFamily::Entity, "book", &json!({ "_kind": "book" }), false, None)
            .await
            .unwrap();

        let calls = counter.calls.lock();
        assert_eq!(
            calls[0],
            FilterExpr::eq("_kind", "book").and_with(FilterExpr::between(
                "_createdDateTime",
                Some(json!("2024-01-13T21:00:00.000Z")),
                Some(json!("2024-01-14T21:00:00.000Z")),
            ))
        );
    }

    #[tokio::test]
    async fn test_self_exclusion_only_on_update() {
        let rule = ScopeRule::new("where[_kind]=book", 5).unwrap();
        let record = json!({ "_kind": "book" });

        let counter = FixedCounter::new(0);
        let limits = engine(vec![rule], counter.clone());
        limits
            .check_limits(RecordFamily::Entity, "book", &record, true, Some("X"))
            .await
            .unwrap();
        limits
            .check_limits(RecordFamily::Entity, "book", &record, false, None)
            .await
            .unwrap();

        let exclusion = FilterExpr::neq("_id", "X");
        let calls = counter.calls.lock();
        assert!(calls[0].comparisons().contains(&exclusion.comparisons()[0]));
        assert!(calls[1].comparisons().iter().all(|c| c.field != "_id"));
    }

    #[tokio::test]
    async fn test_counter_failure_propagates() {
        struct Failing;

        #[async_trait]
        impl RecordCounter for Failing {
            async fn count(&self, _family: RecordFamily, _expr: &FilterExpr) -> Result<u64> {
                Err(QueryError::storage("connection reset"))
            }
        }

        let config = EngineConfig::new().with_family(
            RecordFamily::List,
            FamilyConfig::new(RecordFamily::List)
                .with_record_limits(RuleList::new(vec![ScopeRule::new("where[_kind]=a", 1).unwrap()])),
        );
        let err = LimitEngine::new(Arc::new(config), Arc::new(Failing))
            .check_limits(RecordFamily::List, "a", &json!({}), false, None)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "storage");
        assert_eq!(err.message, "connection reset");
    }

    #[tokio::test]
    async fn test_uniqueness_violation() {
        let rule = ScopeRule::unique("where[_slug]=${_slug}").unwrap();
        let config = EngineConfig::new().with_family(
            RecordFamily::Entity,
            FamilyConfig::new(RecordFamily::Entity).with_uniqueness(RuleList::new(vec![rule])),
        );
        let counter = FixedCounter::new(1);
        let limits = LimitEngine::new(Arc::new(config), counter.clone()).with_clock(now);

        let err = limits
            .check_uniqueness(RecordFamily::Entity, "book", &json!({ "_slug": "dune" }), false, None)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "ENTITY-UNIQUENESS-VIOLATION");

        // no slug: the scope is empty and the rule does not apply
        limits
            .check_uniqueness(RecordFamily::Entity, "book", &json!({}), false, None)
            .await
            .unwrap();
        assert_eq!(counter.calls.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_first_failing_rule_in_order_is_reported() {
        let counter = FixedCounter::new(3);
        let rules = vec![
            ScopeRule::new("where[_kind]=book", 10).unwrap(),
            ScopeRule::new("where[_name]=${_name}", 3).unwrap(),
            ScopeRule::new("where[_slug]=${_slug}", 2).unwrap(),
        ];
        let record = json!({ "_kind": "book", "_name": "n", "_slug": "s" });
        let err = engine(rules, counter.clone())
            .check_limits(RecordFamily::Entity, "book", &record, false, None)
            .await
            .unwrap_err();

        assert_eq!(err.details["scope"], json!("where[_name]=${_name}"));
        assert_eq!(counter.calls.lock().len(), 3);
    }
}
