//! Referential-integrity checks over catalog entities.
//!
//! Relation targets are diffed against what the catalog can actually resolve;
//! declared owners are diffed against the user/group directory.

use crate::client::{CatalogClient, Transport};
use crate::entity_ref::{EntityRef, add_namespace_default};
use crate::error::{CatalogError, Result};
use crate::filter::{CatalogQuery, FilterClause, Selector};
use crate::types::{Entity, ORPHAN_ANNOTATION, RelationType};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

pub const RELATION_FIELDS: [&str; 4] = [
    "kind",
    "metadata.namespace",
    "metadata.name",
    "relations",
];
pub const OWNER_FIELDS: [&str; 5] = [
    "kind",
    "metadata.namespace",
    "metadata.name",
    "metadata.annotations",
    "spec.owner",
];
pub const ANNOTATION_FIELDS: [&str; 4] = [
    "kind",
    "metadata.namespace",
    "metadata.name",
    "metadata.annotations",
];
pub const DIRECTORY_FIELDS: [&str; 3] = ["kind", "metadata.namespace", "metadata.name"];
pub const RESOLVE_FIELDS: [&str; 2] = ["kind", "metadata.name"];

/// Owners without an explicit kind are groups.
const DEFAULT_OWNER_KIND: &str = "group";

/// Relation target -> entities that declare it, in the order they were seen.
#[derive(Debug, Clone, Default)]
pub struct RelationIndex {
    targets: Vec<EntityRef>,
    referrers: HashMap<EntityRef, Vec<EntityRef>>,
}

impl RelationIndex {
    /// Index every relation of `entities` whose type is in `types`.
    ///
    /// Repeated relations to the same target keep one referrer entry each.
    pub fn build(entities: &[Entity], types: &[RelationType]) -> Result<Self> {
        let tracked: HashSet<&str> = types.iter().map(RelationType::as_str).collect();
        let mut index = RelationIndex::default();

        for entity in entities {
            let source = EntityRef::from_entity(entity);
            for relation in &entity.relations {
                if !tracked.contains(relation.relation_type.as_str()) {
                    continue;
                }
                let target = EntityRef::parse(&relation.target_ref).map_err(|_| {
                    CatalogError::MalformedResponse(format!(
                        "{} has a relation to '{}', which is not an entity reference",
                        source, relation.target_ref
                    ))
                })?;
                index.insert(target, source.clone());
            }
        }
        Ok(index)
    }

    fn insert(&mut self, target: EntityRef, referrer: EntityRef) {
        if !self.referrers.contains_key(&target) {
            self.targets.push(target.clone());
        }
        self.referrers.entry(target).or_default().push(referrer);
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    /// Distinct targets in first-seen order.
    pub fn targets(&self) -> &[EntityRef] {
        &self.targets
    }

    pub fn referrers(&self, target: &EntityRef) -> &[EntityRef] {
        self.referrers.get(target).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Targets whose qualified form contains `substring` (after defaulting its namespace).
    pub fn scoped_targets(&self, substring: Option<&str>) -> Vec<EntityRef> {
        let needle = substring
            .filter(|s| !s.is_empty())
            .map(add_namespace_default);
        self.targets
            .iter()
            .filter(|t| match &needle {
                Some(n) => t.to_string().contains(n.as_str()),
                None => true,
            })
            .cloned()
            .collect()
    }
}

/// A relation target that does not exist, with everything pointing at it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DanglingRelation {
    pub target: EntityRef,
    pub referrers: Vec<EntityRef>,
}

#[derive(Debug, Clone, Default)]
pub struct RelationReport {
    /// How many distinct targets were sent for resolution.
    pub checked: usize,
    pub dangling: Vec<DanglingRelation>,
}

/// Which relations to follow and which targets to report on.
#[derive(Debug, Clone)]
pub struct RelationCheckOptions {
    pub relation_types: Vec<RelationType>,
    pub target_filter: Option<String>,
}

impl Default for RelationCheckOptions {
    fn default() -> Self {
        Self {
            relation_types: RelationType::default_set(),
            target_filter: None,
        }
    }
}

/// Pair each requested target with its batch-resolve answer by position.
///
/// `resolved[i]` answers `targets[i]`; a placeholder entity means the target
/// does not exist.
pub fn classify(
    index: &RelationIndex,
    targets: &[EntityRef],
    resolved: &[Entity],
) -> Vec<DanglingRelation> {
    targets
        .iter()
        .zip(resolved)
        .filter(|(_, entity)| entity.is_placeholder())
        .map(|(target, _)| DanglingRelation {
            target: target.clone(),
            referrers: index.referrers(target).to_vec(),
        })
        .collect()
}

/// Relation targets of the selected entities that the catalog cannot resolve.
pub async fn find_dangling_relations<T: Transport>(
    client: &CatalogClient<T>,
    selector: &Selector,
    options: &RelationCheckOptions,
) -> Result<RelationReport> {
    let query = CatalogQuery::new()
        .fields(&RELATION_FIELDS)
        .clause(selector.to_clause());
    let entities = client.fetch_by_query(&query).await?;

    let index = RelationIndex::build(&entities, &options.relation_types)?;
    debug!(
        entities = entities.len(),
        targets = index.len(),
        "built relation index"
    );
    if index.is_empty() {
        let names: Vec<&str> = options
            .relation_types
            .iter()
            .map(RelationType::as_str)
            .collect();
        return Err(CatalogError::NoQualifyingRelations(names.join(" or ")));
    }

    let targets = index.scoped_targets(options.target_filter.as_deref());
    if targets.is_empty() {
        return Ok(RelationReport::default());
    }

    let resolved = client.fetch_by_refs(&targets, &RESOLVE_FIELDS).await?;
    let dangling = classify(&index, &targets, &resolved);
    debug!(
        checked = targets.len(),
        dangling = dangling.len(),
        "resolved relation targets"
    );

    Ok(RelationReport {
        checked: targets.len(),
        dangling,
    })
}

/// An entity whose declared owner is not a known user or group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OwnerIssue {
    pub entity: EntityRef,
    pub owner: String,
}

/// Qualify an owner string the way the catalog does: kind defaults to `group`,
/// namespace to the owning entity's.
pub fn qualify_owner(owner: &str, namespace: &str) -> Option<EntityRef> {
    let (kind, rest) = owner.split_once(':').unwrap_or((DEFAULT_OWNER_KIND, owner));
    let (owner_namespace, name) = rest.split_once('/').unwrap_or((namespace, rest));
    if kind.is_empty() || owner_namespace.is_empty() || name.is_empty() || name.contains('/') {
        return None;
    }
    Some(EntityRef::new(kind, owner_namespace, name))
}

fn owner_key(entity_ref: &EntityRef) -> String {
    entity_ref.to_string().to_lowercase()
}

/// Entities with a non-empty `spec.owner` that is absent from `directory`.
///
/// Entities that declare no owner are not reported.
pub fn check_owners(entities: &[Entity], directory: &[Entity]) -> Vec<OwnerIssue> {
    let valid: HashSet<String> = directory
        .iter()
        .map(|owner| owner_key(&EntityRef::from_entity(owner)))
        .collect();

    entities
        .iter()
        .filter_map(|entity| {
            let owner = entity.owner().filter(|o| !o.is_empty())?;
            let known = qualify_owner(owner, entity.namespace())
                .is_some_and(|r| valid.contains(&owner_key(&r)));
            if known {
                None
            } else {
                Some(OwnerIssue {
                    entity: EntityRef::from_entity(entity),
                    owner: owner.to_string(),
                })
            }
        })
        .collect()
}

/// Selected entities whose owner does not resolve to a user or group.
pub async fn find_missing_owners<T: Transport>(
    client: &CatalogClient<T>,
    selector: &Selector,
) -> Result<Vec<OwnerIssue>> {
    let query = CatalogQuery::new()
        .fields(&OWNER_FIELDS)
        .clause(selector.to_clause());
    let entities = client.fetch_by_query(&query).await?;

    let directory_query = CatalogQuery::new()
        .fields(&DIRECTORY_FIELDS)
        .clause(FilterClause::new().field("kind", "group"))
        .clause(FilterClause::new().field("kind", "user"));
    let directory = client.fetch_by_query(&directory_query).await?;
    debug!(
        entities = entities.len(),
        owners = directory.len(),
        "checking owners"
    );

    Ok(check_owners(&entities, &directory))
}

/// An entity lacking a string value for an annotation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnnotationIssue {
    pub entity: EntityRef,
    pub annotation: String,
}

pub fn check_annotation(entities: &[Entity], key: &str) -> Vec<AnnotationIssue> {
    entities
        .iter()
        .filter(|entity| entity.metadata.annotations.get_string(key).is_none())
        .map(|entity| {
            if entity.metadata.annotations.contains_key(key) {
                warn!(
                    "{}: annotation '{}' is not a string",
                    EntityRef::from_entity(entity),
                    key
                );
            }
            AnnotationIssue {
                entity: EntityRef::from_entity(entity),
                annotation: key.to_string(),
            }
        })
        .collect()
}

/// Selected entities missing the annotation `key`.
pub async fn find_missing_annotations<T: Transport>(
    client: &CatalogClient<T>,
    selector: &Selector,
    key: &str,
) -> Result<Vec<AnnotationIssue>> {
    if key.is_empty() {
        return Err(CatalogError::MissingRequiredSelector(
            "no annotation key provided".to_string(),
        ));
    }
    let query = CatalogQuery::new()
        .fields(&ANNOTATION_FIELDS)
        .clause(selector.to_clause());
    let entities = client.fetch_by_query(&query).await?;
    Ok(check_annotation(&entities, key))
}

/// Entities the catalog itself has flagged as orphaned.
pub async fn find_orphans<T: Transport>(client: &CatalogClient<T>) -> Result<Vec<Entity>> {
    let query = CatalogQuery::new().clause(
        FilterClause::new().field(&format!("metadata.annotations.{}", ORPHAN_ANNOTATION), "true"),
    );
    client.fetch_by_query(&query).await
}
