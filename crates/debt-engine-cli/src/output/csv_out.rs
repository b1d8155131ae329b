use serde_json::Value;
use std::io::{self, Write};

use super::sections::{self, Section, SectionBody};

/// Write the result as CSV to stdout.
pub fn print_csv(value: &Value) -> Result<(), Box<dyn std::error::Error>> {
    let result = value
        .as_object()
        .and_then(|m| m.get("result").or_else(|| m.get("results")))
        .unwrap_or(value);

    let stdout = io::stdout();
    write_csv(stdout.lock(), &sections::split(result))
}

/// Fields of every object section go into one `field,value` block with
/// dotted names; each row section follows as its own titled block.
fn write_csv<W: Write>(out: W, sections: &[Section]) -> Result<(), Box<dyn std::error::Error>> {
    let mut wtr = csv::WriterBuilder::new().flexible(true).from_writer(out);

    let fields: Vec<(String, &str)> = sections
        .iter()
        .filter_map(|s| match &s.body {
            SectionBody::Fields(fields) => Some((s.title.as_deref(), fields)),
            SectionBody::Rows { .. } => None,
        })
        .flat_map(|(title, fields)| {
            fields.iter().map(move |(key, val)| {
                let name = match title {
                    Some(t) => format!("{t}.{key}"),
                    None => key.clone(),
                };
                (name, val.as_str())
            })
        })
        .collect();

    let mut blocks = 0;
    if !fields.is_empty() {
        wtr.write_record(["field", "value"])?;
        for (name, val) in &fields {
            wtr.write_record([name.as_str(), *val])?;
        }
        blocks += 1;
    }

    for section in sections {
        if let SectionBody::Rows { headers, rows } = &section.body {
            if blocks > 0 {
                wtr.write_record([""])?;
            }
            if let Some(title) = &section.title {
                wtr.write_record([title.as_str()])?;
            }
            wtr.write_record(headers)?;
            for row in rows {
                wtr.write_record(row)?;
            }
            blocks += 1;
        }
    }

    wtr.flush()?;
    Ok(())
}
