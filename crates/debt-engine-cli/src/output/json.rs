use serde_json::Value;
use std::io::{self, Write};

/// Pretty-print the full envelope (result, warnings, methodology, metadata).
pub fn print_json(value: &Value) -> Result<(), Box<dyn std::error::Error>> {
    let mut out = io::stdout().lock();
    serde_json::to_writer_pretty(&mut out, value)?;
    writeln!(out)?;
    Ok(())
}
