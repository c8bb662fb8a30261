use serde_json::{Map, Value};
use std::io;

use super::ROW_SECTIONS;

type StdoutWriter<'a> = csv::Writer<io::StdoutLock<'a>>;

/// Write output as CSV to stdout. Row-oriented results (cash flows,
/// distributions, scenarios, grids) are written as rows; anything else as
/// field/value pairs.
pub fn print_csv(value: &Value) {
    let stdout = io::stdout();
    let mut wtr = csv::Writer::from_writer(stdout.lock());

    match value {
        Value::Object(map) => match map.get("result") {
            Some(Value::Object(result)) => write_result(&mut wtr, result),
            Some(other) => {
                let _ = wtr.write_record([&csv_value(other)]);
            }
            None => write_fields(&mut wtr, map),
        },
        Value::Array(arr) => write_rows(&mut wtr, arr),
        _ => {
            let _ = wtr.write_record([&csv_value(value)]);
        }
    }

    let _ = wtr.flush();
}

fn write_result(wtr: &mut StdoutWriter<'_>, result: &Map<String, Value>) {
    if let Some(Value::Array(matrix)) = result.get("matrix") {
        write_grid(wtr, result, matrix);
        return;
    }

    for section in ROW_SECTIONS {
        if let Some(Value::Array(rows)) = result.get(section) {
            if rows.first().is_some_and(Value::is_object) {
                write_rows(wtr, rows);
                return;
            }
        }
    }

    write_fields(wtr, result);
}

fn write_grid(wtr: &mut StdoutWriter<'_>, result: &Map<String, Value>, matrix: &[Value]) {
    let labels = |key: &str| -> Vec<String> {
        result
            .get(key)
            .and_then(Value::as_array)
            .map(|a| a.iter().map(csv_value).collect())
            .unwrap_or_default()
    };
    let row_labels = labels("row_values");
    let mut header = vec![result.get("row_axis").map(csv_value).unwrap_or_default()];
    header.extend(labels("col_values"));
    let _ = wtr.write_record(&header);

    for (i, row) in matrix.iter().enumerate() {
        let mut record = vec![row_labels.get(i).cloned().unwrap_or_default()];
        if let Value::Array(cells) = row {
            record.extend(cells.iter().map(csv_value));
        }
        let _ = wtr.write_record(&record);
    }
}

fn write_fields(wtr: &mut StdoutWriter<'_>, map: &Map<String, Value>) {
    let _ = wtr.write_record(["field", "value"]);
    for (key, val) in map {
        let _ = wtr.write_record([key.as_str(), &csv_value(val)]);
    }
}

fn write_rows(wtr: &mut StdoutWriter<'_>, arr: &[Value]) {
    let Some(Value::Object(first)) = arr.first() else {
        for item in arr {
            let _ = wtr.write_record([&csv_value(item)]);
        }
        return;
    };

    let headers: Vec<&str> = first.keys().map(|k| k.as_str()).collect();
    let _ = wtr.write_record(&headers);
    for item in arr {
        if let Value::Object(map) = item {
            let row: Vec<String> = headers
                .iter()
                .map(|h| map.get(*h).map(csv_value).unwrap_or_default())
                .collect();
            let _ = wtr.write_record(&row);
        }
    }
}

fn csv_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        _ => serde_json::to_string(value).unwrap_or_default(),
    }
}
