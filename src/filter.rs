//! Translation of command selectors into the catalog's filter-query language.
//!
//! Wire format: fields inside one `filter=` clause are joined with `,` and must
//! all match; repeated `filter=` parameters are alternatives. Within a clause,
//! repeating a key (`kind=user,kind=group`) lists alternative values.

use crate::entity_ref::{self, WILDCARD_KIND};
use crate::error::{CatalogError, Result};
use tracing::warn;

/// Positional selector tokens a command accepts: `[KIND|REF] [NAME]`.
pub const MAX_SELECTOR_ARGS: usize = 2;

/// One `key=value` term, or a bare `key` existence test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterField {
    pub key: String,
    pub value: Option<String>,
}

/// A single `filter=` clause.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterClause {
    fields: Vec<FilterField>,
}

impl FilterClause {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, key: &str, value: &str) -> Self {
        self.fields.push(FilterField {
            key: key.to_string(),
            value: Some(value.to_string()),
        });
        self
    }

    pub fn exists(mut self, key: &str) -> Self {
        self.fields.push(FilterField {
            key: key.to_string(),
            value: None,
        });
        self
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// `filter=k1=v1,k2=v2`, or an empty string for an empty clause.
    pub fn render(&self) -> String {
        if self.fields.is_empty() {
            return String::new();
        }
        let terms: Vec<String> = self
            .fields
            .iter()
            .map(|f| match &f.value {
                Some(v) => format!("{}={}", f.key, v),
                None => f.key.clone(),
            })
            .collect();
        format!("filter={}", terms.join(","))
    }
}

/// Query-string parameters for the by-query endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogQuery {
    clauses: Vec<FilterClause>,
    fields: Vec<String>,
}

impl CatalogQuery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an alternative clause. Empty clauses are dropped.
    pub fn clause(mut self, clause: FilterClause) -> Self {
        if !clause.is_empty() {
            self.clauses.push(clause);
        }
        self
    }

    /// Restrict the returned entity fields.
    pub fn fields(mut self, fields: &[&str]) -> Self {
        self.fields = fields.iter().map(|f| f.to_string()).collect();
        self
    }

    /// Filter part only, e.g. `filter=kind=group&filter=kind=user`.
    pub fn filter_expr(&self) -> String {
        self.clauses
            .iter()
            .map(FilterClause::render)
            .collect::<Vec<_>>()
            .join("&")
    }

    /// Full query string, `fields=` first.
    pub fn to_query_string(&self) -> String {
        let mut parts = Vec::new();
        if !self.fields.is_empty() {
            parts.push(format!("fields={}", self.fields.join(",")));
        }
        let filter = self.filter_expr();
        if !filter.is_empty() {
            parts.push(filter);
        }
        parts.join("&")
    }
}

/// Parsed command input: which entities a command operates on.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selector {
    /// Normalized kinds; empty means every kind.
    pub kinds: Vec<String>,
    pub namespace: Option<String>,
    pub name: Option<String>,
    /// Only entities carrying this annotation key.
    pub annotation: Option<String>,
}

impl Selector {
    /// `[KIND|REF] [NAME]` where KIND is a single kind.
    pub fn from_args(args: &[String]) -> Result<Self> {
        Self::parse(args, false)
    }

    /// `[KINDS|REF] [NAME]` where KINDS may be a comma-separated list.
    pub fn from_kind_list(args: &[String]) -> Result<Self> {
        Self::parse(args, true)
    }

    /// Like [`Selector::from_args`], but at least one token is required.
    pub fn from_required_args(args: &[String], missing: &str) -> Result<Self> {
        if args.is_empty() {
            return Err(CatalogError::MissingRequiredSelector(missing.to_string()));
        }
        Self::from_args(args)
    }

    pub fn with_annotation(mut self, annotation: Option<String>) -> Self {
        self.annotation = annotation.filter(|a| !a.is_empty());
        self
    }

    fn parse(args: &[String], multi_kind: bool) -> Result<Self> {
        if args.len() > MAX_SELECTOR_ARGS {
            return Err(CatalogError::TooManyArguments {
                max: MAX_SELECTOR_ARGS,
                got: args.len(),
            });
        }

        let mut selector = Selector::default();
        let Some(first) = args.first() else {
            return Ok(selector);
        };

        if entity_ref::looks_like_ref(first) {
            let (kind, namespace, name) = entity_ref::parse_ref(first)?;
            selector.kinds.push(entity_ref::normalize_kind(&kind)?);
            selector.namespace = Some(namespace);
            selector.name = Some(name);
        } else if multi_kind {
            for kind in first.split(',').filter(|k| !k.trim().is_empty()) {
                selector.kinds.push(entity_ref::normalize_kind(kind)?);
            }
        } else {
            selector.kinds.push(entity_ref::normalize_kind(first)?);
        }

        if selector.kinds.iter().any(|k| k == WILDCARD_KIND) {
            selector.kinds.clear();
        }

        if let Some(second) = args.get(1) {
            if selector.name.is_none() {
                selector.name = Some(second.clone());
            } else {
                warn!(
                    "ignoring '{}': the entity reference '{}' already names the entity",
                    second, first
                );
            }
        }

        Ok(selector)
    }

    /// The single clause this selector stands for.
    pub fn to_clause(&self) -> FilterClause {
        let mut clause = FilterClause::new();
        for kind in &self.kinds {
            clause = clause.field("kind", kind);
        }
        if let Some(namespace) = &self.namespace {
            clause = clause.field("metadata.namespace", namespace);
        }
        if let Some(name) = &self.name {
            clause = clause.field("metadata.name", name);
        }
        if let Some(annotation) = &self.annotation {
            clause = clause.exists(&format!("metadata.annotations.{}", annotation));
        }
        clause
    }

    /// Filter expression for this selector alone.
    pub fn to_filter(&self) -> String {
        self.to_clause().render()
    }
}
