use serde_json::Value;
use std::io;

use super::{flatten, section_rows};

/// Write the result as CSV to stdout.
///
/// When the result carries row sections, the first one (the schedule, or the
/// history) is written as a table; otherwise scalar figures are written as
/// two-column `field,value` pairs.
pub fn print_csv(value: &Value) {
    let result = value
        .as_object()
        .and_then(|m| m.get("result"))
        .unwrap_or(value);
    let flat = flatten(result);

    let stdout = io::stdout();
    let mut wtr = csv::Writer::from_writer(stdout.lock());

    if let Some((_, rows)) = flat.sections.first() {
        let (headers, body) = section_rows(rows);
        let _ = wtr.write_record(&headers);
        for row in body {
            let _ = wtr.write_record(&row);
        }
    } else {
        let _ = wtr.write_record(["field", "value"]);
        for (key, val) in &flat.fields {
            let _ = wtr.write_record([key.as_str(), val.as_str()]);
        }
    }

    let _ = wtr.flush();
}
