pub mod csv_out;
pub mod minimal;
pub mod table;

use crate::OutputFormat;
use serde_json::Value;

/// Dispatch output to the appropriate formatter.
pub fn format_output(format: &OutputFormat, value: &Value) {
    match format {
        OutputFormat::Json => match serde_json::to_string_pretty(value) {
            Ok(s) => println!("{}", s),
            Err(e) => eprintln!("JSON serialization error: {}", e),
        },
        OutputFormat::Table => table::print_table(value),
        OutputFormat::Csv => csv_out::print_csv(value),
        OutputFormat::Minimal => minimal::print_minimal(value),
    }
}

/// A result object split into scalar fields (dotted paths) and row sections
/// (arrays of objects such as the schedule or the operation history).
#[derive(Debug, Default, PartialEq)]
pub struct Flattened {
    pub fields: Vec<(String, String)>,
    pub sections: Vec<(String, Vec<Value>)>,
}

pub fn flatten(value: &Value) -> Flattened {
    let mut out = Flattened::default();
    collect("", value, &mut out);
    out
}

fn collect(prefix: &str, value: &Value, out: &mut Flattened) {
    match value {
        Value::Object(map) => {
            for (key, val) in map {
                collect(&join(prefix, key), val, out);
            }
        }
        Value::Array(arr) if !arr.is_empty() && arr.iter().all(Value::is_object) => {
            out.sections.push((prefix.to_string(), arr.clone()));
        }
        _ => out.fields.push((prefix.to_string(), format_value(value))),
    }
}

/// Headers and cells for a section: nested objects become dotted columns,
/// columns are the union over all rows in first-seen order.
pub fn section_rows(rows: &[Value]) -> (Vec<String>, Vec<Vec<String>>) {
    let flat: Vec<Vec<(String, String)>> = rows
        .iter()
        .map(|row| {
            let mut cells = Vec::new();
            flatten_row("", row, &mut cells);
            cells
        })
        .collect();

    let mut headers: Vec<String> = Vec::new();
    for cells in &flat {
        for (key, _) in cells {
            if !headers.contains(key) {
                headers.push(key.clone());
            }
        }
    }

    let body = flat
        .iter()
        .map(|cells| {
            headers
                .iter()
                .map(|h| {
                    cells
                        .iter()
                        .find(|(k, _)| k == h)
                        .map(|(_, v)| v.clone())
                        .unwrap_or_default()
                })
                .collect()
        })
        .collect();

    (headers, body)
}

fn flatten_row(prefix: &str, value: &Value, cells: &mut Vec<(String, String)>) {
    match value {
        Value::Object(map) => {
            for (key, val) in map {
                flatten_row(&join(prefix, key), val, cells);
            }
        }
        _ => cells.push((prefix.to_string(), format_value(value))),
    }
}

fn join(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", prefix, key)
    }
}

pub fn format_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        Value::Array(arr) if arr.iter().all(|v| !v.is_object() && !v.is_array()) => arr
            .iter()
            .map(format_value)
            .collect::<Vec<_>>()
            .join(", "),
        _ => serde_json::to_string(value).unwrap_or_default(),
    }
}
