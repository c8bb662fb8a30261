use serde_json::Value;

use super::cell_text;

/// Headline fields, most specific first. Nested objects (`metrics`,
/// `probability_weighted`) are searched too.
const PRIORITY_KEYS: [&str; 6] = [
    "irr",
    "levered_irr",
    "lp_irr",
    "recommended_loan_amount",
    "base_case_value",
    "equity_multiple",
];

/// Print just the key answer value from the output.
pub fn print_minimal(value: &Value) {
    let result_obj = value
        .as_object()
        .and_then(|m| m.get("result"))
        .unwrap_or(value);

    for key in PRIORITY_KEYS {
        if let Some(val) = find_key(result_obj, key, 2) {
            println!("{}", cell_text(val));
            return;
        }
    }

    if let Value::Object(map) = result_obj {
        if let Some((key, val)) = map.iter().next() {
            println!("{}: {}", key, cell_text(val));
            return;
        }
    }

    println!("{}", cell_text(result_obj));
}

/// Depth-limited search through nested objects for a non-null `key`.
fn find_key<'a>(value: &'a Value, key: &str, depth: usize) -> Option<&'a Value> {
    let Value::Object(map) = value else {
        return None;
    };
    if let Some(val) = map.get(key) {
        if !val.is_null() {
            return Some(val);
        }
    }
    if depth == 0 {
        return None;
    }
    map.values()
        .filter(|v| v.is_object())
        .find_map(|v| find_key(v, key, depth - 1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_finds_nested_metric() {
        let result = json!({ "metrics": { "levered_irr": "0.1432", "unlevered_irr": "0.08" } });
        assert_eq!(find_key(&result, "levered_irr", 2), Some(&json!("0.1432")));
        assert_eq!(find_key(&result, "lp_irr", 2), None);
    }

    #[test]
    fn test_skips_null_values() {
        let result = json!({ "irr": null, "probability_weighted": { "levered_irr": "0.12" } });
        assert_eq!(find_key(&result, "irr", 2), None);
        assert_eq!(find_key(&result, "levered_irr", 2), Some(&json!("0.12")));
    }
}
