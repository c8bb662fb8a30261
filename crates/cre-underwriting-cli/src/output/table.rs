use serde_json::{Map, Value};
use tabled::{builder::Builder, Table};

use super::{cell_text, ROW_SECTIONS};

/// Format output as tables using the tabled crate.
pub fn print_table(value: &Value) {
    match value {
        Value::Object(map) => {
            if let Some(result) = map.get("result") {
                print_result(result);
                print_envelope_notes(map);
            } else {
                print_object(map);
            }
        }
        Value::Array(arr) => print_rows(arr),
        _ => println!("{}", value),
    }
}

fn print_result(result: &Value) {
    let Value::Object(map) = result else {
        println!("{}", cell_text(result));
        return;
    };

    if map.contains_key("matrix") {
        print_grid(map);
        return;
    }

    // Scalars first, then nested summaries, then row sections
    let mut scalars = Builder::default();
    scalars.push_record(["Field", "Value"]);
    let mut has_scalars = false;
    for (key, val) in map {
        if !val.is_object() && !ROW_SECTIONS.contains(&key.as_str()) && !is_row_array(val) {
            scalars.push_record([key.as_str(), &cell_text(val)]);
            has_scalars = true;
        }
    }
    if has_scalars {
        println!("{}", Table::from(scalars));
    }

    for (key, val) in map {
        if let Value::Object(nested) = val {
            println!("\n{}", heading(key));
            print_object(nested);
        }
    }

    for (key, val) in map {
        if let Value::Array(rows) = val {
            if is_row_array(val) {
                println!("\n{}", heading(key));
                print_rows(rows);
            }
        }
    }
}

/// Sensitivity grid: row labels down the side, column labels across.
fn print_grid(map: &Map<String, Value>) {
    let labels = |key: &str| -> Vec<String> {
        map.get(key)
            .and_then(Value::as_array)
            .map(|a| a.iter().map(cell_text).collect())
            .unwrap_or_default()
    };
    let row_labels = labels("row_labels");
    let col_labels = labels("col_labels");

    let corner = format!(
        "{} \\ {}",
        map.get("row_axis").map(cell_text).unwrap_or_default(),
        map.get("col_axis").map(cell_text).unwrap_or_default()
    );
    let mut builder = Builder::default();
    let mut header = vec![corner];
    header.extend(col_labels);
    builder.push_record(header);

    if let Some(Value::Array(rows)) = map.get("matrix") {
        for (i, row) in rows.iter().enumerate() {
            let mut record = vec![row_labels.get(i).cloned().unwrap_or_default()];
            if let Value::Array(cells) = row {
                record.extend(cells.iter().map(cell_text));
            }
            builder.push_record(record);
        }
    }

    if let Some(metric) = map.get("metric") {
        println!("Metric: {}", cell_text(metric));
    }
    println!("{}", Table::from(builder));
}

fn print_envelope_notes(envelope: &Map<String, Value>) {
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

fn print_object(map: &Map<String, Value>) {
    let mut builder = Builder::default();
    builder.push_record(["Field", "Value"]);
    for (key, val) in map {
        builder.push_record([key.as_str(), &cell_text(val)]);
    }
    println!("{}", Table::from(builder));
}

fn print_rows(arr: &[Value]) {
    if arr.is_empty() {
        println!("(empty)");
        return;
    }

    if let Some(Value::Object(first)) = arr.first() {
        let headers: Vec<String> = first.keys().cloned().collect();
        let mut builder = Builder::default();
        builder.push_record(&headers);
        for item in arr {
            if let Value::Object(map) = item {
                let row: Vec<String> = headers
                    .iter()
                    .map(|h| map.get(h.as_str()).map(cell_text).unwrap_or_default())
                    .collect();
                builder.push_record(row);
            }
        }
        println!("{}", Table::from(builder));
    } else {
        for item in arr {
            println!("{}", cell_text(item));
        }
    }
}

fn is_row_array(value: &Value) -> bool {
    matches!(value, Value::Array(rows) if rows.first().is_some_and(|r| r.is_object() || r.is_array()))
}

fn heading(key: &str) -> String {
    key.split('_')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_heading() {
        assert_eq!(heading("annual_cash_flows"), "Annual Cash Flows");
        assert_eq!(heading("metrics"), "Metrics");
    }

    #[test]
    fn test_row_array_detection() {
        assert!(is_row_array(&json!([{"year": 1}])));
        assert!(is_row_array(&json!([["Purchase Price", "100"]])));
        assert!(!is_row_array(&json!(["-100", "110"])));
        assert!(!is_row_array(&json!([])));
    }
}
