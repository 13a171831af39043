//! Output formatters for page results.

use clap::ValueEnum;
use comfy_table::{Cell, Table};
use quarry_core::model::{PageResult, Record, Value};
use serde_json::json;

/// Output format for results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// ASCII table format
    Table,
    /// JSON format
    Json,
    /// CSV format
    Csv,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Table => write!(f, "table"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Csv => write!(f, "csv"),
        }
    }
}

/// Render one page of records.
pub fn format_page(page: &PageResult<Record>, format: OutputFormat) -> String {
    match format {
        OutputFormat::Table => format_table(page),
        OutputFormat::Json => format_json(page),
        OutputFormat::Csv => format_csv(page),
    }
}

/// Column names in order of first appearance across the page.
fn columns(records: &[Record]) -> Vec<&str> {
    let mut names: Vec<&str> = Vec::new();
    for record in records {
        for (name, _) in record.fields() {
            if !names.contains(&name) {
                names.push(name);
            }
        }
    }
    names
}

fn format_table(page: &PageResult<Record>) -> String {
    if page.is_empty() {
        return format!("No results\n{}", footer(page));
    }

    let columns = columns(page.items());
    let mut table = Table::new();
    table.set_header(columns.iter().map(Cell::new).collect::<Vec<_>>());

    for record in page.items() {
        let cells: Vec<Cell> = columns
            .iter()
            .map(|name| Cell::new(record.get(name).map_or_else(String::new, format_value)))
            .collect();
        table.add_row(cells);
    }

    format!("{}\n{}", table, footer(page))
}

fn footer(page: &PageResult<Record>) -> String {
    format!(
        "page {} of {} ({} row(s), {} total)",
        page.page(),
        page.total_pages(),
        page.items().len(),
        page.total_items()
    )
}

fn format_json(page: &PageResult<Record>) -> String {
    let items: Vec<serde_json::Value> = page.items().iter().map(Record::to_json).collect();
    let out = json!({
        "page": page.page(),
        "size": page.size(),
        "total_items": page.total_items(),
        "total_pages": page.total_pages(),
        "items": items,
    });
    serde_json::to_string_pretty(&out).unwrap_or_else(|_| "{}".to_string())
}

fn format_csv(page: &PageResult<Record>) -> String {
    let columns = columns(page.items());
    let mut output = columns.join(",");
    output.push('\n');

    for record in page.items() {
        let cells: Vec<String> = columns
            .iter()
            .map(|name| record.get(name).map_or_else(String::new, format_value_csv))
            .collect();
        output.push_str(&cells.join(","));
        output.push('\n');
    }

    output
}

/// Format a value for display.
fn format_value(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::String(s) => s.clone(),
        Value::Record(record) => record.to_json().to_string(),
        other => other.to_string(),
    }
}

fn format_value_csv(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => format!("\"{}\"", escape_csv(s)),
        Value::Record(record) => format!("\"{}\"", escape_csv(&record.to_json().to_string())),
        other => format_value(other),
    }
}

fn escape_csv(s: &str) -> String {
    s.replace('"', "\"\"")
}
