//! Rendering of command results as text tables, JSON or YAML.

use crate::entity_ref::{EntityRef, strip_namespace_default};
use crate::error::{CatalogError, Result};
use crate::reconcile::{AnnotationIssue, OwnerIssue, RelationReport};
use crate::types::{DEFAULT_NAMESPACE, Entity};
use comfy_table::{Table as TextTable, presets::NOTHING};
use serde::Serialize;
use serde_json::{Map, Value};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
    Yaml,
}

impl FromStr for OutputFormat {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "table" | "text" => Ok(OutputFormat::Table),
            "json" => Ok(OutputFormat::Json),
            "yaml" | "yml" => Ok(OutputFormat::Yaml),
            _ => Err(CatalogError::UnknownOutputFormat(s.to_string())),
        }
    }
}

/// Header plus string rows, the shape every list/check command prints.
#[derive(Debug, Clone, Default)]
pub struct Table {
    header: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(header: &[&str]) -> Self {
        Self {
            header: header.iter().map(|h| h.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    pub fn push(&mut self, row: Vec<String>) {
        self.rows.push(row);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Process status for a check report: [`FINDINGS_EXIT_CODE`] when `strict`
    /// and there is at least one row, 0 otherwise.
    pub fn exit_code(&self, strict: bool) -> i32 {
        if strict && !self.is_empty() {
            FINDINGS_EXIT_CODE
        } else {
            0
        }
    }

    fn sorted_rows(&self) -> Vec<Vec<String>> {
        let mut rows = self.rows.clone();
        rows.sort_by_cached_key(|row| row.join("\t"));
        rows
    }

    pub fn render(&self, format: OutputFormat) -> Result<String> {
        match format {
            OutputFormat::Table => Ok(self.render_text()),
            OutputFormat::Json => serde_json::to_string_pretty(&self.records())
                .map_err(|e| CatalogError::Render(e.to_string())),
            OutputFormat::Yaml => serde_yaml::to_string(&self.records())
                .map_err(|e| CatalogError::Render(e.to_string())),
        }
    }

    fn render_text(&self) -> String {
        let (header, rows) = collapse_default_namespace(&self.header, self.sorted_rows());
        let mut table = TextTable::new();
        table.load_preset(NOTHING);
        table.set_header(header);
        for row in rows {
            table.add_row(row);
        }
        table
            .lines()
            .map(|line| line.trim().to_string())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Rows as objects keyed by the lower-cased header.
    fn records(&self) -> Vec<Map<String, Value>> {
        self.sorted_rows()
            .into_iter()
            .map(|row| {
                self.header
                    .iter()
                    .zip(row)
                    .map(|(col, value)| (col.to_lowercase(), Value::String(value)))
                    .collect()
            })
            .collect()
    }
}

/// Drop the leading NAMESPACE column when every row is in the default namespace.
///
/// An empty row set keeps the full header.
pub fn collapse_default_namespace(
    header: &[String],
    rows: Vec<Vec<String>>,
) -> (Vec<String>, Vec<Vec<String>>) {
    let collapsible = header.first().is_some_and(|h| h == "NAMESPACE")
        && !rows.is_empty()
        && rows
            .iter()
            .all(|row| row.first().is_some_and(|ns| ns == DEFAULT_NAMESPACE));

    if !collapsible {
        return (header.to_vec(), rows);
    }
    (
        header[1..].to_vec(),
        rows.into_iter().map(|row| row[1..].to_vec()).collect(),
    )
}

pub const ENTITY_HEADER: [&str; 4] = ["NAMESPACE", "KIND", "NAME", "URL"];

/// Exit status of a `--strict` check that found something.
pub const FINDINGS_EXIT_CODE: i32 = 2;

fn entity_row(entity: &EntityRef, base_url: &str) -> Vec<String> {
    vec![
        entity.namespace.clone(),
        entity.kind.clone(),
        entity.name.clone(),
        entity.view_url(base_url),
    ]
}

/// `NAMESPACE KIND NAME <detail> URL`.
fn issue_row(entity: &EntityRef, detail: String, base_url: &str) -> Vec<String> {
    let mut row = entity_row(entity, base_url);
    row.insert(3, detail);
    row
}

/// The `NAMESPACE KIND NAME URL` listing of `entities`.
pub fn entity_table(entities: &[Entity], base_url: &str) -> Table {
    let mut table = Table::new(&ENTITY_HEADER);
    for entity in entities {
        table.push(entity_row(&EntityRef::from_entity(entity), base_url));
    }
    table
}

pub fn annotation_table(issues: &[AnnotationIssue], base_url: &str) -> Table {
    let mut table = Table::new(&["NAMESPACE", "KIND", "NAME", "MISSINGANNOTATION", "URL"]);
    for issue in issues {
        table.push(issue_row(&issue.entity, issue.annotation.clone(), base_url));
    }
    table
}

pub fn owner_table(issues: &[OwnerIssue], base_url: &str) -> Table {
    let mut table = Table::new(&["NAMESPACE", "KIND", "NAME", "OWNERNOTFOUND", "URL"]);
    for issue in issues {
        table.push(issue_row(&issue.entity, issue.owner.clone(), base_url));
    }
    table
}

/// One row per (missing target, referrer). The row describes the referrer; the
/// missing target is shown without a `default` namespace.
pub fn dangling_table(report: &RelationReport, base_url: &str) -> Table {
    let mut table = Table::new(&["NAMESPACE", "KIND", "NAME", "ENTITYNOTFOUND", "URL"]);
    for dangling in &report.dangling {
        let target = strip_namespace_default(&dangling.target.to_string());
        for referrer in &dangling.referrers {
            table.push(issue_row(referrer, target.clone(), base_url));
        }
    }
    table
}

/// Full record dump of one value.
pub fn render_record<T: Serialize>(record: &T, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => serde_json::to_string_pretty(record)
            .map_err(|e| CatalogError::Render(e.to_string())),
        OutputFormat::Table | OutputFormat::Yaml => serde_yaml::to_string(record)
            .map(|s| s.trim_end().to_string())
            .map_err(|e| CatalogError::Render(e.to_string())),
    }
}

/// A lone entity is dumped in full; anything else becomes a table.
pub fn render_entities(entities: &[Entity], base_url: &str, format: OutputFormat) -> Result<String> {
    match entities {
        [single] => render_record(single, format),
        _ => entity_table(entities, base_url).render(format),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconcile::DanglingRelation;
    use crate::testing::entity;
    use std::collections::HashMap;

    const BASE: &str = "https://backstage.test";

    fn row(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_output_format_parse() {
        assert_eq!("JSON".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert_eq!("yml".parse::<OutputFormat>().unwrap(), OutputFormat::Yaml);
        assert!(matches!(
            "xml".parse::<OutputFormat>(),
            Err(CatalogError::UnknownOutputFormat(_))
        ));
    }

    #[test]
    fn test_default_namespace_column_collapsed() {
        let header = row(&["NAMESPACE", "KIND", "NAME"]);
        let (h, rows) = collapse_default_namespace(
            &header,
            vec![row(&["default", "Component", "a"]), row(&["default", "Component", "b"])],
        );
        assert_eq!(h, row(&["KIND", "NAME"]));
        assert_eq!(rows[1], row(&["Component", "b"]));
    }

    #[test]
    fn test_mixed_namespaces_keep_column() {
        let header = row(&["NAMESPACE", "KIND", "NAME"]);
        let (h, rows) = collapse_default_namespace(
            &header,
            vec![row(&["default", "Component", "a"]), row(&["payments", "Component", "b"])],
        );
        assert_eq!(h.len(), 3);
        assert_eq!(rows[1][0], "payments");

        let (h, _) = collapse_default_namespace(&header, Vec::new());
        assert_eq!(h.len(), 3);
    }

    #[test]
    fn test_text_rows_sorted() {
        let mut table = Table::new(&["NAMESPACE", "KIND", "NAME"]);
        table.push(row(&["default", "System", "zeta"]));
        table.push(row(&["default", "Component", "beta"]));
        table.push(row(&["default", "Component", "alpha"]));

        let text = table.render(OutputFormat::Table).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert!(lines[0].starts_with("KIND"));
        assert!(lines[1].ends_with("alpha"));
        assert!(lines[2].ends_with("beta"));
        assert!(lines[3].starts_with("System"));
    }

    #[test]
    fn test_empty_table() {
        let table = Table::new(&ENTITY_HEADER);
        let text = table.render(OutputFormat::Table).unwrap();
        assert!(text.starts_with("NAMESPACE"));
        assert_eq!(text.lines().count(), 1);
        assert_eq!(table.render(OutputFormat::Json).unwrap(), "[]");
    }

    #[test]
    fn test_json_keys_are_lowercased_headers() {
        let table = entity_table(
            &[entity("Component", "default", "API"), entity("Group", "default", "sre")],
            BASE,
        );
        let json: Value = serde_json::from_str(&table.render(OutputFormat::Json).unwrap()).unwrap();
        assert_eq!(json[0]["namespace"], "default");
        assert_eq!(json[0]["kind"], "component");
        assert_eq!(json[0]["url"], "https://backstage.test/catalog/default/component/api");
        assert_eq!(json[1]["name"], "sre");
    }

    fn r(s: &str) -> EntityRef {
        EntityRef::parse(s).unwrap()
    }

    #[test]
    fn test_dangling_table_one_row_per_referrer() {
        let report = RelationReport {
            checked: 2,
            dangling: vec![
                DanglingRelation {
                    target: r("component:default/db"),
                    referrers: vec![
                        r("component:default/api"),
                        r("component:default/api"),
                        r("component:default/web"),
                    ],
                },
                DanglingRelation {
                    target: r("system:billing/ledger"),
                    referrers: vec![r("component:payments/api")],
                },
            ],
        };

        let table = dangling_table(&report, BASE);
        assert_eq!(table.len(), 4);

        let json: Value = serde_json::from_str(&table.render(OutputFormat::Json).unwrap()).unwrap();
        let rows = json.as_array().unwrap();
        let db_rows: Vec<_> = rows
            .iter()
            .filter(|row| row["entitynotfound"] == "component:db")
            .collect();
        assert_eq!(db_rows.len(), 3);
        assert_eq!(db_rows[0]["name"], "api");
        assert_eq!(db_rows[1]["name"], "api");
        assert_eq!(db_rows[2]["name"], "web");
        assert_eq!(
            db_rows[2]["url"],
            "https://backstage.test/catalog/default/component/web"
        );
        assert!(rows.iter().any(|row| row["entitynotfound"] == "system:billing/ledger"
            && row["namespace"] == "payments"));
    }

    #[test]
    fn test_owner_and_annotation_tables() {
        let owners = owner_table(
            &[OwnerIssue {
                entity: r("component:default/api"),
                owner: "group:default/ghost".to_string(),
            }],
            BASE,
        );
        let text = owners.render(OutputFormat::Table).unwrap();
        assert!(text.starts_with("KIND"));
        assert!(text.contains("OWNERNOTFOUND"));
        assert!(text.contains("group:default/ghost"));

        let annotations = annotation_table(
            &[AnnotationIssue {
                entity: r("component:payments/api"),
                annotation: "github.com/project-slug".to_string(),
            }],
            BASE,
        );
        let text = annotations.render(OutputFormat::Table).unwrap();
        assert!(text.starts_with("NAMESPACE"));
        assert!(text.contains("MISSINGANNOTATION"));
    }

    #[test]
    fn test_strict_exit_code_only_with_findings() {
        let empty = Table::new(&ENTITY_HEADER);
        assert_eq!(empty.exit_code(true), 0);

        let found = entity_table(&[entity("Component", "default", "old")], BASE);
        assert_eq!(found.exit_code(false), 0);
        assert_eq!(found.exit_code(true), FINDINGS_EXIT_CODE);
    }

    #[test]
    fn test_kind_casing_matches_across_tables() {
        let listing = entity_table(&[entity("Component", "default", "api")], BASE);
        let owners = owner_table(
            &[OwnerIssue {
                entity: EntityRef::from_entity(&entity("Component", "default", "api")),
                owner: "team".to_string(),
            }],
            BASE,
        );
        let listed: Value = serde_json::from_str(&listing.render(OutputFormat::Json).unwrap()).unwrap();
        let checked: Value = serde_json::from_str(&owners.render(OutputFormat::Json).unwrap()).unwrap();
        assert_eq!(listed[0]["kind"], checked[0]["kind"]);
    }

    #[test]
    fn test_unserializable_record_is_render_error() {
        let mut record = HashMap::new();
        record.insert((1, 2), "tuple keys are not valid JSON object keys");
        assert!(matches!(
            render_record(&record, OutputFormat::Json),
            Err(CatalogError::Render(_))
        ));
    }

    #[test]
    fn test_single_entity_dumped_in_full() {
        let mut e = entity("Component", "default", "api");
        e.spec.insert("owner", "group:default/team");

        let yaml = render_entities(std::slice::from_ref(&e), BASE, OutputFormat::Table).unwrap();
        assert!(yaml.contains("kind: Component"));
        assert!(yaml.contains("group:default/team"));

        let json = render_entities(&[e], BASE, OutputFormat::Json).unwrap();
        let value: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["metadata"]["name"], "api");
    }

    #[test]
    fn test_several_entities_tabulated() {
        let text = render_entities(
            &[entity("Component", "default", "a"), entity("Component", "payments", "b")],
            BASE,
            OutputFormat::Table,
        )
        .unwrap();
        assert!(text.starts_with("NAMESPACE"));
        assert!(text.contains("https://backstage.test/catalog/payments/component/b"));
    }
}
