//! Core types for catalog entities and the paginated response envelope.

use crate::error::CatalogError;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

pub const DEFAULT_NAMESPACE: &str = "default";

/// Annotation set by the catalog on entities whose location no longer emits them.
pub const ORPHAN_ANNOTATION: &str = "backstage.io/orphan";

/// Reads `null` the same way as an absent field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Free-form section of an entity (`metadata.annotations`, `spec`).
///
/// Values can be any JSON; callers go through the typed accessors instead of
/// matching on `Value` themselves.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldMap(Map<String, Value>);

impl FieldMap {
    /// The value under `key`, only when it is present and a string.
    pub fn get_string(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for FieldMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        FieldMap(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// Entity metadata block.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub namespace: String,
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "String::is_empty"
    )]
    pub description: String,
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "FieldMap::is_empty"
    )]
    pub annotations: FieldMap,
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub links: Vec<Value>,
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub tags: Vec<String>,
}

/// A directed edge from the owning entity to `target_ref`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Relation {
    #[serde(rename = "type")]
    pub relation_type: String,
    pub target_ref: String,
}

/// A catalog record.
///
/// The batch-resolve endpoint reports refs that do not exist as an entity with
/// an empty `kind`, see [`Entity::is_placeholder`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entity {
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "String::is_empty"
    )]
    pub api_version: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub kind: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub metadata: Metadata,
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub relations: Vec<Relation>,
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "FieldMap::is_empty"
    )]
    pub spec: FieldMap,
}

impl Entity {
    /// True for the zero-value record standing in for an unresolved ref.
    pub fn is_placeholder(&self) -> bool {
        self.kind.is_empty()
    }

    /// Namespace with the catalog default applied.
    pub fn namespace(&self) -> &str {
        if self.metadata.namespace.is_empty() {
            DEFAULT_NAMESPACE
        } else {
            &self.metadata.namespace
        }
    }

    /// Declared owner, if `spec.owner` is a string.
    pub fn owner(&self) -> Option<&str> {
        self.spec.get_string("owner")
    }
}

/// Continuation info of one page. An absent or empty cursor marks the last page.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    #[serde(default)]
    pub next_cursor: Option<String>,
}

impl PageInfo {
    pub fn next(&self) -> Option<&str> {
        self.next_cursor.as_deref().filter(|c| !c.is_empty())
    }
}

/// Response envelope shared by the by-query and by-refs endpoints.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntitiesResponse {
    #[serde(default, deserialize_with = "nullable_items")]
    pub items: Vec<Entity>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub page_info: PageInfo,
    #[serde(default)]
    pub total_items: Option<u64>,
}

/// by-refs returns `null` in the slot of a ref that does not exist.
fn nullable_items<'de, D>(deserializer: D) -> Result<Vec<Entity>, D::Error>
where
    D: Deserializer<'de>,
{
    let items: Option<Vec<Option<Entity>>> = Option::deserialize(deserializer)?;
    Ok(items
        .unwrap_or_default()
        .into_iter()
        .map(Option::unwrap_or_default)
        .collect())
}

/// Relation types the reconciliation engine knows how to follow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelationType {
    DependsOn,
    PartOf,
    OwnedBy,
}

impl RelationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationType::DependsOn => "dependsOn",
            RelationType::PartOf => "partOf",
            RelationType::OwnedBy => "ownedBy",
        }
    }

    /// The set checked when the caller does not pick one.
    pub fn default_set() -> Vec<RelationType> {
        vec![RelationType::DependsOn, RelationType::PartOf]
    }
}

impl fmt::Display for RelationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RelationType {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "dependson" => Ok(RelationType::DependsOn),
            "partof" => Ok(RelationType::PartOf),
            "ownedby" => Ok(RelationType::OwnedBy),
            _ => Err(CatalogError::UnknownRelationType(s.to_string())),
        }
    }
}
