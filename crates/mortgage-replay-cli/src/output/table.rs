use serde_json::Value;
use tabled::{builder::Builder, Table};

use super::{flatten, section_rows};

/// Render the result envelope as tables: one Field/Value table for scalar
/// figures, then one table per row section (schedule, history, timeline).
pub fn print_table(value: &Value) {
    let envelope = value.as_object();
    let result = envelope.and_then(|m| m.get("result")).unwrap_or(value);
    let flat = flatten(result);

    if !flat.fields.is_empty() {
        let mut builder = Builder::default();
        builder.push_record(["Field", "Value"]);
        for (key, val) in &flat.fields {
            builder.push_record([key.as_str(), val.as_str()]);
        }
        println!("{}", Table::from(builder));
    }

    for (name, rows) in &flat.sections {
        let (headers, body) = section_rows(rows);
        let mut builder = Builder::default();
        builder.push_record(headers);
        for row in body {
            builder.push_record(row);
        }
        println!("\n{} ({} rows)", name, rows.len());
        println!("{}", Table::from(builder));
    }

    if flat.fields.is_empty() && flat.sections.is_empty() {
        println!("(empty)");
    }

    let Some(envelope) = envelope else {
        return;
    };

    if let Some(Value::Array(warnings)) = envelope.get("warnings") {
        if !warnings.is_empty() {
            println!("\nWarnings:");
            for w in warnings {
                if let Value::String(s) = w {
                    println!("  - {}", s);
                }
            }
        }
    }

    if let Some(Value::String(meth)) = envelope.get("methodology") {
        println!("\nMethodology: {}", meth);
    }
}
