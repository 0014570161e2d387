//! kindstore-explain: show what a query or scope rule compiles to
//!
//! # Usage
//!
//! ```bash
//! # Set + filter → Filter Expression and native pipeline
//! kindstore-explain 'set[publics]=true&set[createds-30d]=true&filter[where][_kind]=book&filter[limit]=5'
//!
//! # Family defaults and response ceiling from a config file
//! kindstore-explain --config kindstore.yaml --family list --kind reading 'set[actives]=true'
//!
//! # Interpolate a scope rule against a record
//! kindstore-explain --scope 'where[_kind]=${_kind}&where[_ownerUsers]=${_ownerUsers}' \
//!     --record '{"_kind": "book", "_ownerUsers": ["u1"]}'
//! ```

use chrono::{DateTime, Utc};
use clap::Parser;
use kindstore_query::domain::value::parse_instant;
use kindstore_query::features::native::pipeline_document;
use kindstore_query::{sets, CollectionQuery, EngineConfig, Filter, RecordFamily, ScopeTemplate, Set};
use serde_json::{json, Value};
use std::path::PathBuf;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "kindstore-explain")]
#[command(about = "Explain Set/filter compilation and scope interpolation", long_about = None)]
struct Cli {
    /// Query string with set[...] and filter[...] parameters
    query: Option<String>,

    /// Evaluation instant (RFC 3339); defaults to now
    #[arg(long)]
    now: Option<String>,

    /// Engine configuration (YAML, version 1)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Record family: entity, list or relation
    #[arg(short, long, default_value = "entity", value_parser = parse_family)]
    family: RecordFamily,

    /// Kind whose query defaults apply
    #[arg(short, long)]
    kind: Option<String>,

    /// Scope template to interpolate
    #[arg(long, requires = "record")]
    scope: Option<String>,

    /// Record (JSON) the scope is interpolated against
    #[arg(long)]
    record: Option<String>,
}

fn parse_family(s: &str) -> Result<RecordFamily, String> {
    serde_json::from_value(Value::String(s.to_lowercase()))
        .map_err(|_| format!("unknown family '{}' (expected entity, list or relation)", s))
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let now: DateTime<Utc> = match &cli.now {
        Some(raw) => parse_instant(raw).ok_or_else(|| format!("invalid --now instant '{}'", raw))?,
        None => Utc::now(),
    };
    let config = match &cli.config {
        Some(path) => EngineConfig::from_yaml_file(path)?,
        None => EngineConfig::default(),
    };
    debug!(family = %cli.family, now = %now, "Explaining");

    let mut output = serde_json::Map::new();

    if let Some(query) = &cli.query {
        output.insert("query".into(), explain_query(&config, &cli, query, now)?);
    }
    if let (Some(scope), Some(record)) = (&cli.scope, &cli.record) {
        output.insert("scope".into(), explain_scope(&config, scope, record, now)?);
    }
    if output.is_empty() {
        return Err("nothing to explain: pass a query string or --scope with --record".into());
    }

    println!("{}", serde_json::to_string_pretty(&Value::Object(output))?);
    Ok(())
}

fn explain_query(
    config: &EngineConfig,
    cli: &Cli,
    query: &str,
    now: DateTime<Utc>,
) -> Result<Value, Box<dyn std::error::Error>> {
    let family = config.family(cli.family);
    let set_expr = sets::compile(&Set::from_query_string(query)?, now);
    let filter = Filter::from_query_string(query)?.with_defaults(&family.defaults_for(cli.kind.as_deref()));

    let collection_query = CollectionQuery::new(filter, set_expr).with_max_limit(family.response_limit);
    let stages = collection_query.build(&config.translator());

    Ok(json!({
        "collection": family.collection,
        "expression": serde_json::to_value(&collection_query.filter)?,
        "pipeline": pipeline_document(&stages),
    }))
}

fn explain_scope(
    config: &EngineConfig,
    scope: &str,
    record: &str,
    now: DateTime<Utc>,
) -> Result<Value, Box<dyn std::error::Error>> {
    let template = ScopeTemplate::parse(scope)?;
    let record: Value = serde_json::from_str(record)?;
    let expr = template.interpolate(&record, now)?;

    Ok(json!({
        "template": template.source(),
        "pinnedKind": template.pinned_kind(),
        "expression": serde_json::to_value(&expr)?,
        "native": config.translator().translate(&expr),
    }))
}
