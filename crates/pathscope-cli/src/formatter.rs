//! Output formatters for command results.

use clap::ValueEnum;
use comfy_table::{Cell, Table};
use pathscope_core::{EntityGraph, Sql};
use pathscope_proto::Value;

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

/// Trait for formatting output.
pub trait Formatter: Send + Sync {
    /// Format resolved field paths.
    fn format_paths(&self, paths: &[Vec<String>]) -> String;

    /// Format a rendered query.
    fn format_sql(&self, sql: &Sql) -> String;

    /// Format the vertices and edges of an entity graph.
    fn format_graph(&self, graph: &EntityGraph) -> String;

    /// Format an evaluated value.
    fn format_value(&self, value: &Value) -> String;
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
    fn format_paths(&self, paths: &[Vec<String>]) -> String {
        if paths.is_empty() {
            return "No path".to_string();
        }

        let mut table = Table::new();
        table.set_header(vec!["#", "Path", "Hops"]);
        for (i, path) in paths.iter().enumerate() {
            let shown = if path.is_empty() {
                "(self)".to_string()
            } else {
                path.join(".")
            };
            table.add_row(vec![
                Cell::new(i + 1),
                Cell::new(shown),
                Cell::new(path.len()),
            ]);
        }
        table.to_string()
    }

    fn format_sql(&self, sql: &Sql) -> String {
        if sql.params.is_empty() {
            return sql.text.clone();
        }

        let mut table = Table::new();
        table.set_header(vec!["Param", "Value"]);
        for (i, param) in sql.params.iter().enumerate() {
            table.add_row(vec![Cell::new(i + 1), Cell::new(param)]);
        }
        format!("{}\n\n{}", sql.text, table)
    }

    fn format_graph(&self, graph: &EntityGraph) -> String {
        let mut table = Table::new();
        table.set_header(vec!["From", "To", "Weight"]);
        for (id, vertex) in graph.vertices().iter().enumerate() {
            for edge in graph.edges_from(id) {
                let to = graph
                    .vertex(edge.to)
                    .map(ToString::to_string)
                    .unwrap_or_default();
                table.add_row(vec![
                    Cell::new(vertex),
                    Cell::new(to),
                    Cell::new(edge.weight),
                ]);
            }
        }
        format!(
            "{}\n{} vertices, {} edges",
            table,
            graph.vertex_count(),
            graph.edge_count()
        )
    }

    fn format_value(&self, value: &Value) -> String {
        match value {
            Value::List(items) => {
                let mut table = Table::new();
                table.set_header(vec!["Value"]);
                for item in items {
                    table.add_row(vec![Cell::new(item)]);
                }
                table.to_string()
            }
            other => other.to_string(),
        }
    }
}

/// JSON formatter.
pub struct JsonFormatter;

impl Formatter for JsonFormatter {
    fn format_paths(&self, paths: &[Vec<String>]) -> String {
        serde_json::to_string_pretty(paths).unwrap_or_else(|_| "[]".to_string())
    }

    fn format_sql(&self, sql: &Sql) -> String {
        let params: Vec<serde_json::Value> = sql.params.iter().cloned().map(Into::into).collect();
        serde_json::to_string_pretty(&serde_json::json!({
            "sql": sql.text,
            "params": params,
        }))
        .unwrap_or_else(|_| "{}".to_string())
    }

    fn format_graph(&self, graph: &EntityGraph) -> String {
        let edges: Vec<serde_json::Value> = graph
            .vertices()
            .iter()
            .enumerate()
            .flat_map(|(id, vertex)| {
                graph.edges_from(id).iter().map(move |edge| {
                    serde_json::json!({
                        "from": vertex.to_string(),
                        "to": graph.vertex(edge.to).map(ToString::to_string),
                        "weight": edge.weight,
                    })
                })
            })
            .collect();
        serde_json::to_string_pretty(&serde_json::json!({
            "vertices": graph.vertex_count(),
            "edges": edges,
        }))
        .unwrap_or_else(|_| "{}".to_string())
    }

    fn format_value(&self, value: &Value) -> String {
        serde_json::to_string_pretty(&serde_json::Value::from(value.clone()))
            .unwrap_or_else(|_| "null".to_string())
    }
}
