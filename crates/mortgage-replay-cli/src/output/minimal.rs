use serde_json::Value;

use super::format_value;

/// Headline figures in order of preference. Equal-payment plans answer with
/// the monthly payment, equal-principal plans with the first instalment.
const PRIORITY_KEYS: [&str; 5] = [
    "valid",
    "monthly_payment",
    "first_payment",
    "total_payment",
    "total_interest",
];

/// Print just the headline figure of the output.
///
/// Looks in the result first, then in its nested `summary`, and falls back
/// to the first field of the result.
pub fn print_minimal(value: &Value) {
    println!("{}", headline(value));
}

fn headline(value: &Value) -> String {
    let result = value
        .as_object()
        .and_then(|m| m.get("result"))
        .unwrap_or(value);

    let Value::Object(map) = result else {
        return format_value(result);
    };

    let nested = map.get("summary").and_then(Value::as_object);
    for key in PRIORITY_KEYS {
        let found = map
            .get(key)
            .or_else(|| nested.and_then(|s| s.get(key)))
            .filter(|v| !v.is_null());
        if let Some(val) = found {
            return format_value(val);
        }
    }

    match map.iter().next() {
        Some((key, Value::Array(rows))) => format!("{}: {} entries", key, rows.len()),
        Some((key, val)) => format!("{}: {}", key, format_value(val)),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_prefers_monthly_payment_from_nested_summary() {
        let out = json!({
            "result": {
                "schedule": [],
                "summary": {"total_payment": "1824067.40", "monthly_payment": "5066.85"}
            }
        });
        assert_eq!(headline(&out), "5066.85");
    }

    #[test]
    fn test_validation_answers_with_flag() {
        let out = json!({"result": {"valid": false, "errors": []}});
        assert_eq!(headline(&out), "false");
    }

    #[test]
    fn test_falls_back_to_first_field() {
        let out = json!({"result": {"history": [{"sequence": 1}], "timeline": []}});
        assert_eq!(headline(&out), "history: 1 entries");
    }
}
