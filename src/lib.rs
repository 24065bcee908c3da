//! backstagectl - a read-only client for the Backstage software catalog.
//!
//! This library resolves entity references, translates selectors into the
//! catalog's filter language, pages through the catalog API and reconciles
//! declared relations and owners against the entities that actually exist.

pub mod client;
pub mod config;
pub mod entity_ref;
pub mod error;
pub mod filter;
pub mod output;
pub mod reconcile;
pub mod types;

#[cfg(test)]
mod testing;

pub use client::{CatalogClient, HttpTransport, RawResponse, Session, Transport};
pub use config::{AuthConfig, Credentials, default_config_path};
pub use entity_ref::{
    EntityRef, add_namespace_default, format_entity, normalize_kind, parse_ref,
    strip_namespace_default,
};
pub use error::{CatalogError, Result};
pub use filter::{CatalogQuery, FilterClause, Selector};
pub use output::{OutputFormat, Table, render_entities};
pub use reconcile::{
    AnnotationIssue, DanglingRelation, OwnerIssue, RelationCheckOptions, RelationIndex,
    RelationReport, find_dangling_relations, find_missing_annotations, find_missing_owners,
    find_orphans,
};
pub use types::{Entity, Metadata, Relation, RelationType};
