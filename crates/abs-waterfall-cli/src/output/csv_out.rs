use serde_json::Value;
use std::io;

/// Write output as CSV to stdout.
///
/// Row-shaped results (the period ledger, breakeven and stress tables, the
/// template listing) become one CSV row per element. A full waterfall
/// envelope is written as its tranche summary.
pub fn print_csv(value: &Value) {
    let stdout = io::stdout();
    let mut wtr = csv::Writer::from_writer(stdout.lock());

    let rows = match value {
        Value::Object(map) => match map.get("result") {
            Some(Value::Array(rows)) => Some(rows),
            Some(Value::Object(result)) => match result.get("tranche_summary") {
                Some(Value::Array(rows)) => Some(rows),
                _ => {
                    write_field_value(&mut wtr, result);
                    None
                }
            },
            _ => {
                write_field_value(&mut wtr, map);
                None
            }
        },
        Value::Array(rows) => Some(rows),
        _ => {
            let _ = wtr.write_record([&format_csv_value(value)]);
            None
        }
    };

    if let Some(rows) = rows {
        write_array_csv(&mut wtr, rows);
    }
    let _ = wtr.flush();
}

fn write_field_value(
    wtr: &mut csv::Writer<io::StdoutLock<'_>>,
    map: &serde_json::Map<String, Value>,
) {
    let _ = wtr.write_record(["field", "value"]);
    for (key, val) in map {
        let _ = wtr.write_record([key.as_str(), &format_csv_value(val)]);
    }
}

fn write_array_csv(wtr: &mut csv::Writer<io::StdoutLock<'_>>, arr: &[Value]) {
    if let Some(Value::Object(first)) = arr.first() {
        let headers: Vec<&str> = first.keys().map(|k| k.as_str()).collect();
        let _ = wtr.write_record(&headers);

        for item in arr {
            if let Value::Object(map) = item {
                let row: Vec<String> = headers
                    .iter()
                    .map(|h| map.get(*h).map(format_csv_value).unwrap_or_default())
                    .collect();
                let _ = wtr.write_record(&row);
            }
        }
    } else {
        for item in arr {
            let _ = wtr.write_record([&format_csv_value(item)]);
        }
    }
}

fn format_csv_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        _ => serde_json::to_string(value).unwrap_or_default(),
    }
}
