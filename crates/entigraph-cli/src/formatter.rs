//! Output formatters for command results.

use clap::ValueEnum;
use comfy_table::{Cell, Table};
use entigraph_core::{DependencyError, Identity};

/// Output format for results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// ASCII table format
    Table,
    /// JSON format
    Json,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Table => write!(f, "table"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

/// One entity of the schema summary.
#[derive(Debug, Clone)]
pub struct EntitySummary {
    pub name: String,
    pub exposed_keys: Vec<String>,
    pub check_delete: bool,
    pub copy_strategy: String,
    /// `Entity.relationship` pairs pointing here without inverse.
    pub dangling_from: Vec<String>,
}

/// Trait for formatting output.
pub trait Formatter: Send + Sync {
    /// Format the schema summary.
    fn format_schema(&self, entities: &[EntitySummary]) -> String;

    /// Format the stored identities of an entity.
    fn format_identities(&self, entity: &str, identities: &[Identity]) -> String;

    /// Format the outcome of a delete check.
    fn format_dependencies(&self, object: &Identity, dependencies: &[DependencyError]) -> String;

    /// Format the outcome of a copy.
    fn format_copy(&self, original: &Identity, copy: &Identity, copied: usize) -> String;
}

/// Create a formatter for the given output format.
pub fn create_formatter(format: OutputFormat) -> Box<dyn Formatter> {
    match format {
        OutputFormat::Table => Box::new(TableFormatter),
        OutputFormat::Json => Box::new(JsonFormatter),
    }
}

/// Table formatter using comfy-table.
pub struct TableFormatter;

impl Formatter for TableFormatter {
    fn format_schema(&self, entities: &[EntitySummary]) -> String {
        let mut table = Table::new();
        table.set_header(vec![
            "Entity",
            "Exposed keys",
            "Check delete",
            "Copy strategy",
            "Referenced by (no inverse)",
        ]);

        for entity in entities {
            table.add_row(vec![
                Cell::new(&entity.name),
                Cell::new(entity.exposed_keys.join(", ")),
                Cell::new(if entity.check_delete { "yes" } else { "no" }),
                Cell::new(&entity.copy_strategy),
                Cell::new(entity.dangling_from.join(", ")),
            ]);
        }

        format!("{}\n{} entit(ies)", table, entities.len())
    }

    fn format_identities(&self, entity: &str, identities: &[Identity]) -> String {
        let mut table = Table::new();
        table.set_header(vec![entity]);
        for identity in identities {
            table.add_row(vec![identity.to_string()]);
        }
        format!("{}\n{} row(s)", table, identities.len())
    }

    fn format_dependencies(&self, object: &Identity, dependencies: &[DependencyError]) -> String {
        if dependencies.is_empty() {
            return format!("OK: {} can be deleted", object);
        }

        let mut table = Table::new();
        table.set_header(vec!["Referencing entity", "Relationship"]);
        for dependency in dependencies {
            table.add_row(vec![&dependency.referencing_entity, &dependency.relationship]);
        }
        format!("{}\n{}", dependencies[0], table)
    }

    fn format_copy(&self, original: &Identity, copy: &Identity, copied: usize) -> String {
        format!("{} -> {} ({} instance(s) reached)", original, copy, copied)
    }
}

/// JSON formatter.
pub struct JsonFormatter;

impl Formatter for JsonFormatter {
    fn format_schema(&self, entities: &[EntitySummary]) -> String {
        let rows: Vec<serde_json::Value> = entities
            .iter()
            .map(|entity| {
                serde_json::json!({
                    "entity": entity.name,
                    "exposed_keys": entity.exposed_keys,
                    "check_delete": entity.check_delete,
                    "copy_strategy": entity.copy_strategy,
                    "dangling_from": entity.dangling_from,
                })
            })
            .collect();
        pretty(serde_json::Value::Array(rows))
    }

    fn format_identities(&self, entity: &str, identities: &[Identity]) -> String {
        let ids: Vec<String> = identities.iter().map(ToString::to_string).collect();
        pretty(serde_json::json!({ "entity": entity, "identities": ids }))
    }

    fn format_dependencies(&self, object: &Identity, dependencies: &[DependencyError]) -> String {
        let blocking: Vec<serde_json::Value> = dependencies
            .iter()
            .map(|d| {
                serde_json::json!({
                    "referencing_entity": d.referencing_entity,
                    "relationship": d.relationship,
                })
            })
            .collect();
        pretty(serde_json::json!({
            "object": object.to_string(),
            "deletable": dependencies.is_empty(),
            "dependencies": blocking,
        }))
    }

    fn format_copy(&self, original: &Identity, copy: &Identity, copied: usize) -> String {
        pretty(serde_json::json!({
            "original": original.to_string(),
            "copy": copy.to_string(),
            "copied": copied,
        }))
    }
}

fn pretty(value: serde_json::Value) -> String {
    serde_json::to_string_pretty(&value).unwrap_or_else(|_| value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity() -> Identity {
        Identity::new("Parameter", [7; 16])
    }

    #[test]
    fn test_table_dependencies() {
        let formatter = TableFormatter;
        assert!(formatter
            .format_dependencies(&identity(), &[])
            .starts_with("OK:"));

        let output = formatter.format_dependencies(
            &identity(),
            &[DependencyError::new("Parameter", "Order", "parameter")],
        );
        assert!(output.contains("unable to delete Parameter"));
        assert!(output.contains("Order"));
    }

    #[test]
    fn test_json_copy() {
        let output = JsonFormatter.format_copy(&identity(), &Identity::new("Parameter", [8; 16]), 3);
        let parsed: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(parsed["copied"], 3);
        assert_eq!(parsed["original"], identity().to_string());
    }

    #[test]
    fn test_schema_row_count() {
        let summary = EntitySummary {
            name: "Order".to_string(),
            exposed_keys: vec!["id".to_string()],
            check_delete: false,
            copy_strategy: "shallow".to_string(),
            dangling_from: Vec::new(),
        };
        let output = TableFormatter.format_schema(&[summary]);
        assert!(output.contains("Order"));
        assert!(output.ends_with("1 entit(ies)"));
    }
}
