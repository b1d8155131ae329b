use serde_json::{Map, Value};

/// One printable block of a command result.
#[derive(Debug, PartialEq)]
pub struct Section {
    /// Dotted path of the nested object or array; `None` for top-level fields.
    pub title: Option<String>,
    pub body: SectionBody,
}

#[derive(Debug, PartialEq)]
pub enum SectionBody {
    /// Field/value pairs of one object.
    Fields(Vec<(String, String)>),
    /// An array of objects, one row per element.
    Rows {
        headers: Vec<String>,
        rows: Vec<Vec<String>>,
    },
}

/// Split a result into sections: scalar fields first, then one section per
/// nested object (depth first) and one row table per array of objects.
pub fn split(result: &Value) -> Vec<Section> {
    let mut sections = Vec::new();
    match result {
        Value::Object(map) => collect_object(None, map, &mut sections),
        Value::Array(items) if is_row_array(items) => sections.push(Section {
            title: None,
            body: rows_body(items),
        }),
        other => sections.push(Section {
            title: None,
            body: SectionBody::Fields(vec![("value".into(), format_cell(other))]),
        }),
    }
    sections
}

/// Render a single cell. Nested objects fall back to compact JSON.
pub fn format_cell(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        Value::Array(items) => items.iter().map(format_cell).collect::<Vec<_>>().join(", "),
        Value::Object(_) => serde_json::to_string(value).unwrap_or_default(),
    }
}

fn collect_object(path: Option<&str>, map: &Map<String, Value>, sections: &mut Vec<Section>) {
    let mut fields = Vec::new();
    let mut nested = Vec::new();

    for (key, val) in map {
        match val {
            Value::Object(inner) => nested.push((key, Nested::Object(inner))),
            Value::Array(items) if is_row_array(items) => nested.push((key, Nested::Rows(items))),
            _ => fields.push((key.clone(), format_cell(val))),
        }
    }

    if !fields.is_empty() || path.is_none() {
        sections.push(Section {
            title: path.map(str::to_string),
            body: SectionBody::Fields(fields),
        });
    }

    for (key, child) in nested {
        let child_path = match path {
            Some(p) => format!("{p}.{key}"),
            None => key.clone(),
        };
        match child {
            Nested::Object(inner) => collect_object(Some(&child_path), inner, sections),
            Nested::Rows(items) => sections.push(Section {
                title: Some(child_path),
                body: rows_body(items),
            }),
        }
    }
}

enum Nested<'a> {
    Object(&'a Map<String, Value>),
    Rows(&'a [Value]),
}

fn is_row_array(items: &[Value]) -> bool {
    !items.is_empty() && items.iter().all(Value::is_object)
}

/// Headers are the union of keys in first-seen order.
fn rows_body(items: &[Value]) -> SectionBody {
    let mut headers: Vec<String> = Vec::new();
    for map in items.iter().filter_map(Value::as_object) {
        for key in map.keys() {
            if !headers.contains(key) {
                headers.push(key.clone());
            }
        }
    }

    let rows = items
        .iter()
        .filter_map(Value::as_object)
        .map(|map| {
            headers
                .iter()
                .map(|h| map.get(h).map(format_cell).unwrap_or_default())
                .collect()
        })
        .collect();

    SectionBody::Rows { headers, rows }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn find<'a>(sections: &'a [Section], title: Option<&str>) -> &'a SectionBody {
        &sections
            .iter()
            .find(|s| s.title.as_deref() == title)
            .unwrap_or_else(|| panic!("no section {title:?}"))
            .body
    }

    #[test]
    fn test_schedule_splits_into_fields_loan_and_rows() {
        let result = json!({
            "loan": { "principal": "12000", "rate_pct": "1.5", "term": 2, "rate_solution": null },
            "rows": [
                { "index": 1, "installment": "6134.07", "remaining_balance": "6044.93" },
                { "index": 2, "installment": "6134.07", "remaining_balance": "0" }
            ],
            "total_paid": "12268.14",
            "total_interest": "268.14",
            "total_principal": "12000.00"
        });
        let sections = split(&result);
        assert_eq!(sections.len(), 3);

        match find(&sections, None) {
            SectionBody::Fields(fields) => {
                assert_eq!(fields.len(), 3);
                assert!(fields.contains(&("total_paid".into(), "12268.14".into())));
            }
            other => panic!("expected fields, got {other:?}"),
        }

        match find(&sections, Some("loan")) {
            SectionBody::Fields(fields) => {
                assert!(fields.contains(&("term".into(), "2".into())));
                assert!(fields.contains(&("rate_solution".into(), String::new())));
            }
            other => panic!("expected fields, got {other:?}"),
        }

        match find(&sections, Some("rows")) {
            SectionBody::Rows { headers, rows } => {
                assert_eq!(headers.len(), 3);
                assert_eq!(rows.len(), 2);
                let balance = headers.iter().position(|h| h == "remaining_balance").unwrap();
                assert_eq!(rows[1][balance], "0");
            }
            other => panic!("expected rows, got {other:?}"),
        }
    }

    #[test]
    fn test_deeply_nested_objects_use_dotted_titles() {
        let result = json!({
            "days_in_arrears": 45,
            "provision": {
                "expected_loss": "3000",
                "diagnostics": { "write_off_reached": false, "guarantees": { "count": 0 } }
            }
        });
        let sections = split(&result);
        let titles: Vec<_> = sections.iter().map(|s| s.title.as_deref()).collect();
        assert_eq!(
            titles,
            vec![
                None,
                Some("provision"),
                Some("provision.diagnostics"),
                Some("provision.diagnostics.guarantees"),
            ]
        );
    }

    #[test]
    fn test_bare_row_array_and_scalars() {
        let rows = json!([{ "index": 1 }, { "index": 2, "note": "last" }]);
        match &split(&rows)[0].body {
            SectionBody::Rows { headers, rows } => {
                assert_eq!(headers, &vec!["index".to_string(), "note".to_string()]);
                assert_eq!(rows[0], vec!["1".to_string(), String::new()]);
            }
            other => panic!("expected rows, got {other:?}"),
        }

        let scalar = split(&json!("1.5131"));
        assert_eq!(
            scalar[0].body,
            SectionBody::Fields(vec![("value".into(), "1.5131".into())])
        );
    }

    #[test]
    fn test_scalar_arrays_stay_inline() {
        let result = json!({ "warnings": ["a", "b"], "guarantees": [] });
        match find(&split(&result), None) {
            SectionBody::Fields(fields) => {
                assert!(fields.contains(&("warnings".into(), "a, b".into())));
                assert!(fields.contains(&("guarantees".into(), String::new())));
            }
            other => panic!("expected fields, got {other:?}"),
        }
    }
}
