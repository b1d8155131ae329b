use serde_json::Value;
use tabled::{builder::Builder, Table};

use super::sections::{self, SectionBody};

/// Print the result as one table per section, then warnings and methodology.
pub fn print_table(value: &Value) {
    let envelope = value.as_object();
    let result = envelope
        .and_then(|m| m.get("result").or_else(|| m.get("results")))
        .unwrap_or(value);

    for (i, section) in sections::split(result).iter().enumerate() {
        if i > 0 {
            println!();
        }
        if let Some(title) = &section.title {
            println!("{title}:");
        }
        println!("{}", render(&section.body));
    }

    let Some(envelope) = envelope else {
        return;
    };

    if let Some(Value::Array(warnings)) = envelope.get("warnings") {
        if !warnings.is_empty() {
            println!("\nWarnings:");
            for w in warnings.iter().filter_map(Value::as_str) {
                println!("  - {w}");
            }
        }
    }

    if let Some(Value::String(meth)) = envelope.get("methodology") {
        println!("\nMethodology: {meth}");
    }
}

fn render(body: &SectionBody) -> Table {
    let mut builder = Builder::default();
    match body {
        SectionBody::Fields(fields) => {
            builder.push_record(["Field", "Value"]);
            for (key, val) in fields {
                builder.push_record([key.as_str(), val.as_str()]);
            }
        }
        SectionBody::Rows { headers, rows } => {
            builder.push_record(headers.iter().map(String::as_str));
            for row in rows {
                builder.push_record(row.iter().map(String::as_str));
            }
        }
    }
    builder.build()
}
