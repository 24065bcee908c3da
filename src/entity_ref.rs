//! Entity reference grammar: `{kind}:{namespace}/{name}`.
//!
//! References are kept fully qualified internally. The short `kind:name` form is
//! only produced for display, when the namespace is `default`.

use crate::error::{CatalogError, Result};
use crate::types::{DEFAULT_NAMESPACE, Entity};
use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Kinds accepted in command selectors.
pub const ALLOWED_KINDS: [&str; 7] = [
    "resource",
    "component",
    "system",
    "domain",
    "user",
    "group",
    "location",
];

/// Selector kind meaning "every kind".
pub const WILDCARD_KIND: &str = "*";

/// A fully qualified entity reference.
///
/// `kind` is lower-cased but not checked against [`ALLOWED_KINDS`]: relation
/// targets can point at kinds a selector cannot name (`api`, `template`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityRef {
    pub kind: String,
    pub namespace: String,
    pub name: String,
}

impl EntityRef {
    pub fn new(kind: &str, namespace: &str, name: &str) -> Self {
        let namespace = if namespace.is_empty() {
            DEFAULT_NAMESPACE
        } else {
            namespace
        };
        EntityRef {
            kind: kind.to_lowercase(),
            namespace: namespace.to_string(),
            name: name.to_string(),
        }
    }

    /// Parse a reference, defaulting the namespace.
    pub fn parse(input: &str) -> Result<Self> {
        let (kind, namespace, name) = parse_ref(input)?;
        Ok(EntityRef::new(&kind, &namespace, &name))
    }

    pub fn from_entity(entity: &Entity) -> Self {
        EntityRef::new(&entity.kind, entity.namespace(), &entity.metadata.name)
    }

    pub fn is_default_namespace(&self) -> bool {
        self.namespace == DEFAULT_NAMESPACE
    }

    /// Display form: `kind:name` in the default namespace, `kind:namespace/name` otherwise.
    pub fn to_short_string(&self) -> String {
        if self.is_default_namespace() {
            format!("{}:{}", self.kind, self.name)
        } else {
            self.to_string()
        }
    }

    /// Web UI location: `{base}/catalog/{namespace}/{kind}/{name}`.
    pub fn view_url(&self, base_url: &str) -> String {
        format!(
            "{}/catalog/{}/{}/{}",
            base_url.trim_end_matches('/'),
            self.namespace,
            self.kind,
            self.name.to_lowercase()
        )
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}/{}", self.kind, self.namespace, self.name)
    }
}

/// Serialized as the canonical `kind:namespace/name` string.
impl Serialize for EntityRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl FromStr for EntityRef {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self> {
        EntityRef::parse(s)
    }
}

/// True when `input` should be read as a reference rather than a bare kind.
pub fn looks_like_ref(input: &str) -> bool {
    input.contains(':')
}

/// Split a reference into `(kind, namespace, name)`.
///
/// Accepts `kind:namespace/name` and `kind:name`; the latter gets the `default`
/// namespace. Kind is returned as written, see [`normalize_kind`].
pub fn parse_ref(input: &str) -> Result<(String, String, String)> {
    let invalid = || CatalogError::InvalidReferenceFormat(input.to_string());

    let (kind, rest) = input.split_once(':').ok_or_else(invalid)?;
    if kind.is_empty() || rest.is_empty() {
        return Err(invalid());
    }

    match rest.split_once('/') {
        Some((namespace, name)) => {
            if namespace.is_empty() || name.is_empty() || name.contains('/') {
                return Err(invalid());
            }
            Ok((kind.to_string(), namespace.to_string(), name.to_string()))
        }
        None => Ok((
            kind.to_string(),
            DEFAULT_NAMESPACE.to_string(),
            rest.to_string(),
        )),
    }
}

/// Lower-case a kind token and drop one trailing `s`, then check it is allowed.
pub fn normalize_kind(kind: &str) -> Result<String> {
    let lowered = kind.trim().to_lowercase();
    let singular = lowered.strip_suffix('s').unwrap_or(&lowered);

    if singular == WILDCARD_KIND || ALLOWED_KINDS.contains(&singular) {
        Ok(singular.to_string())
    } else {
        Err(CatalogError::UnknownKind {
            kind: singular.to_string(),
            allowed: format!("{}, {}", WILDCARD_KIND, ALLOWED_KINDS.join(", ")),
        })
    }
}

/// Display reference of an entity (`kind:name` or `kind:namespace/name`).
pub fn format_entity(entity: &Entity) -> String {
    EntityRef::from_entity(entity).to_short_string()
}

/// `kind:name` becomes `kind:default/name`; anything else is returned unchanged.
pub fn add_namespace_default(entity_ref: &str) -> String {
    match entity_ref.split_once(':') {
        Some((kind, name))
            if !kind.is_empty() && !name.is_empty() && !name.contains('/') =>
        {
            format!("{}:{}/{}", kind, DEFAULT_NAMESPACE, name)
        }
        _ => entity_ref.to_string(),
    }
}

/// `kind:default/name` becomes `kind:name`; anything else is returned unchanged.
pub fn strip_namespace_default(entity_ref: &str) -> String {
    let stripped = entity_ref.split_once(':').and_then(|(kind, rest)| {
        let name = rest.strip_prefix(DEFAULT_NAMESPACE)?.strip_prefix('/')?;
        if kind.is_empty() || name.is_empty() || name.contains('/') {
            None
        } else {
            Some(format!("{}:{}", kind, name))
        }
    });
    stripped.unwrap_or_else(|| entity_ref.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ref_with_and_without_namespace() {
        let expected = (
            "component".to_string(),
            "default".to_string(),
            "foo".to_string(),
        );
        assert_eq!(parse_ref("component:default/foo").unwrap(), expected);
        assert_eq!(parse_ref("component:foo").unwrap(), expected);
    }

    #[test]
    fn test_parse_ref_custom_namespace() {
        let r = EntityRef::parse("Group:platform/sre").unwrap();
        assert_eq!(r.kind, "group");
        assert_eq!(r.namespace, "platform");
        assert_eq!(r.name, "sre");
        assert_eq!(r.to_string(), "group:platform/sre");
        assert_eq!(r.to_short_string(), "group:platform/sre");
    }

    #[test]
    fn test_parse_ref_rejects_malformed() {
        for input in ["component:", ":foo", "component:ns/", "component:/foo", "a:b/c/d", "foo"] {
            assert!(
                matches!(parse_ref(input), Err(CatalogError::InvalidReferenceFormat(_))),
                "expected '{}' to be rejected",
                input
            );
        }
    }

    #[test]
    fn test_normalize_kind_singularizes() {
        assert_eq!(normalize_kind("components").unwrap(), "component");
        assert_eq!(normalize_kind("component").unwrap(), "component");
        assert_eq!(normalize_kind("Groups").unwrap(), "group");
        assert_eq!(normalize_kind("*").unwrap(), "*");
    }

    #[test]
    fn test_normalize_kind_rejects_unknown() {
        match normalize_kind("widgets") {
            Err(CatalogError::UnknownKind { kind, allowed }) => {
                assert_eq!(kind, "widget");
                assert!(allowed.contains("component"));
            }
            other => panic!("Expected UnknownKind, got: {:?}", other),
        }
    }

    #[test]
    fn test_format_entity() {
        let mut entity = Entity {
            kind: "Component".to_string(),
            ..Default::default()
        };
        entity.metadata.name = "api".to_string();
        entity.metadata.namespace = "default".to_string();
        assert_eq!(format_entity(&entity), "component:api");

        entity.metadata.namespace = "payments".to_string();
        assert_eq!(format_entity(&entity), "component:payments/api");
    }

    #[test]
    fn test_view_url() {
        let r = EntityRef::new("Component", "billing", "Payments-API");
        assert_eq!(
            r.view_url("https://backstage.example.com/"),
            "https://backstage.example.com/catalog/billing/component/payments-api"
        );
    }

    #[test]
    fn test_serializes_as_qualified_string() {
        let r = EntityRef::parse("Component:db").unwrap();
        assert_eq!(
            serde_json::to_value(&r).unwrap(),
            serde_json::json!("component:default/db")
        );
    }

    #[test]
    fn test_namespace_default_round_trip() {
        let short = "component:foo";
        let long = "component:default/foo";
        assert_eq!(add_namespace_default(short), long);
        assert_eq!(strip_namespace_default(long), short);
        assert_eq!(strip_namespace_default(&add_namespace_default(short)), short);
        assert_eq!(add_namespace_default(&strip_namespace_default(long)), long);
    }

    #[test]
    fn test_namespace_default_identity_elsewhere() {
        let other = "component:payments/foo";
        assert_eq!(add_namespace_default(other), other);
        assert_eq!(strip_namespace_default(other), other);
        assert_eq!(add_namespace_default(""), "");
        assert_eq!(strip_namespace_default("db"), "db");
    }
}
