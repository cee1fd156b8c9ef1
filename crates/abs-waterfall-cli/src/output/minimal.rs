use serde_json::Value;

/// Headline fields, most specific first.
const PRIORITY_KEYS: [&str; 5] = [
    "breakeven_cdr",
    "min_rated_irr",
    "final_cnl",
    "final_oc",
    "irr",
];

/// Print just the key answer from the output.
///
/// Objects print their first non-null priority field. Row-shaped results
/// print one `name: value` line per row, keyed by tranche or template.
pub fn print_minimal(value: &Value) {
    let result = value
        .as_object()
        .and_then(|m| m.get("result"))
        .unwrap_or(value);

    match result {
        Value::Array(rows) => {
            for row in rows {
                println!("{}", minimal_row(row));
            }
        }
        Value::Object(_) => println!("{}", headline(result)),
        other => println!("{}", format_minimal(other)),
    }
}

fn headline(value: &Value) -> String {
    if let Value::Object(map) = value {
        for key in PRIORITY_KEYS {
            if let Some(val) = map.get(key) {
                if !val.is_null() {
                    return format_minimal(val);
                }
            }
        }
        if let Some((key, val)) = map.iter().next() {
            return format!("{}: {}", key, format_minimal(val));
        }
    }
    format_minimal(value)
}

fn minimal_row(row: &Value) -> String {
    let label = ["tranche_name", "id", "cdr_multiple", "period"]
        .iter()
        .find_map(|k| row.get(*k))
        .map(format_minimal);
    match label {
        Some(label) => format!("{}: {}", label, headline_or_null(row)),
        None => headline(row),
    }
}

/// Like `headline`, but a row whose priority field is null says so.
fn headline_or_null(row: &Value) -> String {
    for key in PRIORITY_KEYS {
        if let Some(val) = row.get(key) {
            return format_minimal(val);
        }
    }
    match row.get("name") {
        Some(name) => format_minimal(name),
        None => headline(row),
    }
}

fn format_minimal(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "none".to_string(),
        _ => serde_json::to_string(value).unwrap_or_default(),
    }
}
