//! Immutable engine configuration
//!
//! Built once (from YAML or programmatically), then shared by reference or
//! `Arc` with every compiler, translator and engine instance.

use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

use super::error::{ConfigError, ConfigResult};
use super::io::{ConfigFileV1, FamilySection, KindSection};
use super::rules::{RuleKind, RuleList, ScopeRule};
use crate::domain::query::QueryDefaults;
use crate::domain::record::RecordFamily;
use crate::domain::value::DateFields;
use crate::features::matcher::Matcher;
use crate::features::native::NativeTranslator;

const SUPPORTED_VERSIONS: [u32; 1] = [1];

/// Rules and defaults specific to one kind
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KindConfig {
    pub defaults: Option<QueryDefaults>,
    pub record_limits: RuleList,
    pub uniqueness: RuleList,
}

/// Settings of one record family
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FamilyConfig {
    pub collection: String,
    /// Ceiling for requested limits; `None` or `Some(0)` is uncapped
    pub response_limit: Option<u64>,
    pub defaults: QueryDefaults,
    pub record_limits: RuleList,
    pub uniqueness: RuleList,
    pub kinds: HashMap<String, KindConfig>,
}

impl FamilyConfig {
    pub fn new(family: RecordFamily) -> Self {
        Self {
            collection: family.default_collection().to_string(),
            response_limit: None,
            defaults: QueryDefaults::default(),
            record_limits: RuleList::default(),
            uniqueness: RuleList::default(),
            kinds: HashMap::new(),
        }
    }

    pub fn with_record_limits(mut self, rules: RuleList) -> Self {
        self.record_limits = rules;
        self
    }

    pub fn with_uniqueness(mut self, rules: RuleList) -> Self {
        self.uniqueness = rules;
        self
    }

    pub fn with_kind(mut self, kind: impl Into<String>, config: KindConfig) -> Self {
        self.kinds.insert(kind.into(), config);
        self
    }

    pub fn with_response_limit(mut self, limit: u64) -> Self {
        self.response_limit = Some(limit);
        self
    }

    /// Record-limit rules that apply to `kind`
    pub fn record_limits_for(&self, kind: &str) -> Vec<&ScopeRule> {
        applicable(
            &self.record_limits,
            self.kinds.get(kind).map(|k| &k.record_limits),
            kind,
        )
    }

    /// Uniqueness rules that apply to `kind`
    pub fn uniqueness_for(&self, kind: &str) -> Vec<&ScopeRule> {
        applicable(
            &self.uniqueness,
            self.kinds.get(kind).map(|k| &k.uniqueness),
            kind,
        )
    }

    /// Family defaults with the kind's own defaults merged over them
    pub fn defaults_for(&self, kind: Option<&str>) -> QueryDefaults {
        let overrides = kind
            .and_then(|k| self.kinds.get(k))
            .and_then(|k| k.defaults.clone())
            .unwrap_or_default();
        self.defaults.clone().merge(overrides)
    }

    fn from_section(family: RecordFamily, section: FamilySection) -> ConfigResult<Self> {
        let location = family.as_str();
        let mut kinds = HashMap::with_capacity(section.kinds.len());
        for (kind, kind_section) in section.kinds {
            let config = KindConfig::from_section(&format!("{}.kinds.{}", location, kind), kind_section)?;
            kinds.insert(kind, config);
        }

        Ok(Self {
            collection: section
                .collection
                .unwrap_or_else(|| family.default_collection().to_string()),
            response_limit: section.response_limit,
            defaults: section.defaults,
            record_limits: RuleList::from_values(
                &section.record_limits,
                RuleKind::RecordLimit,
                &format!("{}.record_limits", location),
            )?,
            uniqueness: RuleList::from_values(
                &section.uniqueness,
                RuleKind::Uniqueness,
                &format!("{}.uniqueness", location),
            )?,
            kinds,
        })
    }
}

impl KindConfig {
    fn from_section(location: &str, section: KindSection) -> ConfigResult<Self> {
        Ok(Self {
            defaults: section.defaults,
            record_limits: RuleList::from_values(
                &section.record_limits,
                RuleKind::RecordLimit,
                &format!("{}.record_limits", location),
            )?,
            uniqueness: RuleList::from_values(
                &section.uniqueness,
                RuleKind::Uniqueness,
                &format!("{}.uniqueness", location),
            )?,
        })
    }
}

/// A non-empty kind-specific list replaces the general list. Otherwise the
/// general rules apply, except those pinned to another kind by a literal
/// `where[_kind]=...`.
fn applicable<'a>(general: &'a RuleList, specific: Option<&'a RuleList>, kind: &str) -> Vec<&'a ScopeRule> {
    if let Some(specific) = specific.filter(|rules| !rules.is_empty()) {
        return specific.iter().collect();
    }
    general
        .iter()
        .filter(|rule| match rule.template.pinned_kind() {
            Some(pinned) if pinned != kind => {
                debug!(scope = rule.scope(), kind, "Rule pinned to another kind, skipping");
                false
            }
            _ => true,
        })
        .collect()
}

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    date_fields: DateFields,
    families: HashMap<RecordFamily, FamilyConfig>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            date_fields: DateFields::default(),
            families: RecordFamily::ALL
                .iter()
                .map(|f| (*f, FamilyConfig::new(*f)))
                .collect(),
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_date_fields(mut self, date_fields: DateFields) -> Self {
        self.date_fields = date_fields;
        self
    }

    pub fn with_family(mut self, family: RecordFamily, config: FamilyConfig) -> Self {
        self.families.insert(family, config);
        self
    }

    pub fn date_fields(&self) -> &DateFields {
        &self.date_fields
    }

    pub fn family(&self, family: RecordFamily) -> &FamilyConfig {
        // every family is populated at construction
        &self.families[&family]
    }

    pub fn translator(&self) -> NativeTranslator {
        NativeTranslator::new(self.date_fields.clone())
    }

    pub fn matcher(&self) -> Matcher {
        Matcher::new(self.date_fields.clone())
    }

    /// Load from YAML text (v1 schema)
    pub fn from_yaml_str(content: &str) -> ConfigResult<Self> {
        let file: ConfigFileV1 = serde_yaml::from_str(content)?;

        // Version check
        match file.version {
            None => return Err(ConfigError::MissingVersion),
            Some(found) if !SUPPORTED_VERSIONS.contains(&found) => {
                return Err(ConfigError::UnsupportedVersion {
                    found,
                    supported: SUPPORTED_VERSIONS.to_vec(),
                })
            }
            Some(_) => {}
        }

        let mut config = Self::default();
        if let Some(names) = file.date_fields {
            config.date_fields = DateFields::new(names);
        }
        for (family, section) in file.families {
            config
                .families
                .insert(family, FamilyConfig::from_section(family, section)?);
        }
        Ok(config)
    }

    /// Load from a YAML file (v1 schema)
    pub fn from_yaml_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }
}
