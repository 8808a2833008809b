//! Resource Registry - Load resource descriptors from JSON
//!
//! Every per-resource fact the sync layer needs (paths, key fields, field
//! rules, cache relationships) lives in embedded JSON. Behavior is written
//! once and parameterized by these descriptors.

use crate::api::endpoint::Operation;
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

/// Embedded resource JSON files (compiled into the binary)
const RESOURCE_FILES: &[&str] = &[
    include_str!("../resources/ledger.json"),
    include_str!("../resources/reference.json"),
];

/// Entity kinds handled by the layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Account,
    Category,
    Description,
    Parameter,
    Transaction,
    Totals,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 6] = [
        Self::Account,
        Self::Category,
        Self::Description,
        Self::Parameter,
        Self::Transaction,
        Self::Totals,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Account => "account",
            Self::Category => "category",
            Self::Description => "description",
            Self::Parameter => "parameter",
            Self::Transaction => "transaction",
            Self::Totals => "totals",
        }
    }
}

impl FromStr for ResourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_lowercase();
        Self::ALL
            .into_iter()
            .find(|k| k.as_str() == lower || format!("{}s", k.as_str()) == lower)
            .ok_or_else(|| format!("unknown resource: {}", s))
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the modern generation addresses an entity in its URL
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyStyle {
    #[default]
    Name,
    Id,
}

/// Where a newly created entity lands in the cached list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InsertPosition {
    /// Newest first
    Prepend,
    #[default]
    Append,
}

/// Value shape enforced by the validator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    /// Natural-key style name: letters, digits, `-`, `_`
    Name,
    /// Free text, trimmed
    Text,
    /// Finite decimal amount, numeric or numeric string
    Amount,
    Bool,
    /// Calendar date, `YYYY-MM-DD`
    Date,
    Integer,
    /// One of `values`, case-insensitive, stored lower-cased
    Enum,
}

/// Validation rule for one payload field
#[derive(Debug, Clone, Deserialize)]
pub struct FieldRule {
    pub name: String,
    pub kind: FieldKind,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub values: Vec<String>,
}

/// A list of this resource can be cached per parent entity, keyed by the
/// parent natural key held in `field`
#[derive(Debug, Clone, Deserialize)]
pub struct ChildScope {
    pub parent: ResourceKind,
    pub field: String,
}

/// Read-only summary computed by the server over another resource
#[derive(Debug, Clone, Deserialize)]
pub struct AggregateDef {
    /// Resource summarized
    pub of: ResourceKind,
    /// Resource whose natural key keys this aggregate
    pub parent: ResourceKind,
    /// Field of `of` entities holding the parent key
    pub parent_field: String,
    /// Canonicalize the parent key under the modern generation
    #[serde(default)]
    pub canonical_key: bool,
}

/// Resource descriptor from JSON
#[derive(Debug, Clone, Deserialize)]
pub struct ResourceDescriptor {
    pub display_name: String,
    /// Path segment after `/api/`
    pub path: String,
    pub natural_key: String,
    #[serde(default)]
    pub id_field: Option<String>,
    #[serde(default)]
    pub modern_key: KeyStyle,
    #[serde(default)]
    pub insert_position: InsertPosition,
    /// Field filled with a client-minted identifier on insert
    #[serde(default)]
    pub minted_field: Option<String>,
    pub operations: Vec<Operation>,
    /// Legacy generation exposes a get-one endpoint
    #[serde(default)]
    pub legacy_get: bool,
    #[serde(default)]
    pub fields: Vec<FieldRule>,
    #[serde(default)]
    pub scopes: Vec<ChildScope>,
    #[serde(default)]
    pub aggregate: Option<AggregateDef>,
}

impl ResourceDescriptor {
    pub fn field(&self, name: &str) -> Option<&FieldRule> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn scope_for(&self, parent: ResourceKind) -> Option<&ChildScope> {
        self.scopes.iter().find(|s| s.parent == parent)
    }
}

/// Root structure of resources/*.json
#[derive(Debug, Clone, Deserialize)]
pub struct ResourceConfig {
    #[serde(default)]
    pub resources: HashMap<String, ResourceDescriptor>,
}

/// Global registry loaded from JSON
static REGISTRY: OnceLock<ResourceConfig> = OnceLock::new();

/// Get the resource registry (loads from embedded JSON on first access)
pub fn get_registry() -> &'static ResourceConfig {
    REGISTRY.get_or_init(|| {
        let mut final_config = ResourceConfig {
            resources: HashMap::new(),
        };

        for content in RESOURCE_FILES {
            let partial: ResourceConfig = serde_json::from_str(content)
                .unwrap_or_else(|e| panic!("Failed to parse embedded resource JSON: {}", e));
            final_config.resources.extend(partial.resources);
        }

        final_config
    })
}

/// Descriptor for a resource kind.
///
/// Every kind has an embedded descriptor; a missing one is a build defect
/// caught by the registry tests.
pub fn descriptor(kind: ResourceKind) -> &'static ResourceDescriptor {
    get_registry()
        .resources
        .get(kind.as_str())
        .unwrap_or_else(|| panic!("No embedded descriptor for resource {}", kind))
}

/// Child resources whose cached lists are scoped by entities of `parent`
pub fn children_of(parent: ResourceKind) -> Vec<(ResourceKind, &'static ChildScope)> {
    ResourceKind::ALL
        .into_iter()
        .filter_map(|kind| descriptor(kind).scope_for(parent).map(|scope| (kind, scope)))
        .collect()
}

/// Aggregates keyed by entities of `parent`
pub fn aggregates_keyed_by(parent: ResourceKind) -> Vec<(ResourceKind, &'static AggregateDef)> {
    ResourceKind::ALL
        .into_iter()
        .filter_map(|kind| {
            descriptor(kind)
                .aggregate
                .as_ref()
                .filter(|agg| agg.parent == parent)
                .map(|agg| (kind, agg))
        })
        .collect()
}

/// Aggregates summarizing entities of `of`
pub fn aggregates_over(of: ResourceKind) -> Vec<(ResourceKind, &'static AggregateDef)> {
    ResourceKind::ALL
        .into_iter()
        .filter_map(|kind| {
            descriptor(kind)
                .aggregate
                .as_ref()
                .filter(|agg| agg.of == of)
                .map(|agg| (kind, agg))
        })
        .collect()
}
