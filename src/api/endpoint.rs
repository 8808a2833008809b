//! Endpoint resolution for both backend generations
//!
//! The resolver is a pure function of its inputs: no I/O, no state. Which
//! field addresses an entity under the modern generation is a per-resource
//! fact read from the descriptor, never inferred from the HTTP verb.

use super::error::{ApiResult, CanonicalError};
use crate::resource::{descriptor, KeyStyle, ResourceKind};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Backend API convention
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Generation {
    /// Action verbs in the path, `{response}` error bodies, 404 for empty lists
    #[default]
    Legacy,
    /// REST verbs, `{error}`/`{errors}` error bodies, 200 with `[]` for empty lists
    Modern,
}

impl Generation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Legacy => "legacy",
            Self::Modern => "modern",
        }
    }
}

impl FromStr for Generation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "legacy" => Ok(Self::Legacy),
            "modern" => Ok(Self::Modern),
            other => Err(format!("unknown API generation: {}", other)),
        }
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Operation against one resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    List,
    Get,
    Create,
    Update,
    Delete,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::List => "list",
            Self::Get => "get",
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }

    fn is_keyed(&self) -> bool {
        matches!(self, Self::Get | Self::Update | Self::Delete)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A resolved call: verb, path, and how the key segment addresses the entity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub method: Method,
    pub path: String,
    /// `None` for unkeyed operations (list, create)
    pub key_style: Option<KeyStyle>,
}

/// Style used to address `kind` under `generation`.
///
/// Legacy always addresses by natural key; modern follows the descriptor.
pub fn key_style(kind: ResourceKind, generation: Generation) -> KeyStyle {
    match generation {
        Generation::Legacy => KeyStyle::Name,
        Generation::Modern => descriptor(kind).modern_key,
    }
}

/// Payload field holding the address value of `kind` under `generation`
pub fn address_field(kind: ResourceKind, generation: Generation) -> &'static str {
    let desc = descriptor(kind);
    match key_style(kind, generation) {
        KeyStyle::Id => desc.id_field.as_deref().unwrap_or(desc.natural_key.as_str()),
        KeyStyle::Name => desc.natural_key.as_str(),
    }
}

/// Resolve `operation` on `kind` for `generation`.
///
/// `key` is the pre-mutation address value for update/delete, even when the
/// mutation renames the entity.
pub fn resolve(
    kind: ResourceKind,
    operation: Operation,
    generation: Generation,
    key: Option<&str>,
) -> ApiResult<Endpoint> {
    let desc = descriptor(kind);

    if !desc.operations.contains(&operation) {
        return Err(CanonicalError::unknown(format!(
            "operation {} is not supported for {}",
            operation, kind
        )));
    }

    let segment = if operation.is_keyed() {
        match key.map(str::trim).filter(|k| !k.is_empty()) {
            Some(k) => Some(urlencoding::encode(k).into_owned()),
            None => {
                return Err(CanonicalError::validation(format!(
                    "{} is required",
                    address_field(kind, generation)
                )))
            }
        }
    } else {
        None
    };
    let segment = segment.unwrap_or_default();
    let base = &desc.path;

    let (method, path) = match (generation, operation) {
        (Generation::Legacy, Operation::List) => (Method::GET, format!("/api/{}/select/active", base)),
        (Generation::Legacy, Operation::Get) => {
            if !desc.legacy_get {
                return Err(CanonicalError::unknown(format!(
                    "operation get is not supported by the legacy {} API",
                    kind
                )));
            }
            (Method::GET, format!("/api/{}/{}", base, segment))
        },
        (Generation::Legacy, Operation::Create) => (Method::POST, format!("/api/{}/insert", base)),
        (Generation::Legacy, Operation::Update) => {
            (Method::PUT, format!("/api/{}/update/{}", base, segment))
        },
        (Generation::Legacy, Operation::Delete) => {
            (Method::DELETE, format!("/api/{}/delete/{}", base, segment))
        },
        (Generation::Modern, Operation::List) => (Method::GET, format!("/api/{}/active", base)),
        (Generation::Modern, Operation::Get) => (Method::GET, format!("/api/{}/{}", base, segment)),
        (Generation::Modern, Operation::Create) => (Method::POST, format!("/api/{}", base)),
        (Generation::Modern, Operation::Update) => (Method::PUT, format!("/api/{}/{}", base, segment)),
        (Generation::Modern, Operation::Delete) => {
            (Method::DELETE, format!("/api/{}/{}", base, segment))
        },
    };

    Ok(Endpoint {
        method,
        path,
        key_style: operation.is_keyed().then(|| key_style(kind, generation)),
    })
}

/// Resolve the child list of `kind` scoped to one parent entity, e.g. the
/// transactions of a single account
pub fn resolve_scoped(
    kind: ResourceKind,
    parent: ResourceKind,
    generation: Generation,
    parent_key: &str,
) -> ApiResult<Endpoint> {
    let desc = descriptor(kind);
    let Some(scope) = desc.scope_for(parent) else {
        return Err(CanonicalError::unknown(format!(
            "{} cannot be listed by {}",
            kind, parent
        )));
    };

    let key = parent_key.trim();
    if key.is_empty() {
        return Err(CanonicalError::validation(format!("{} is required", scope.field)));
    }
    let key = urlencoding::encode(key);
    let parent_path = &descriptor(parent).path;

    let path = match generation {
        Generation::Legacy => format!("/api/{}/{}/select/{}", desc.path, parent_path, key),
        Generation::Modern => format!("/api/{}/{}/{}", desc.path, parent_path, key),
    };

    Ok(Endpoint {
        method: Method::GET,
        path,
        key_style: Some(KeyStyle::Name),
    })
}
