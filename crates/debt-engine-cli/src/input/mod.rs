pub mod file;
pub mod stdin;

use serde::de::DeserializeOwned;

/// Structured input from `--input <file>` or piped stdin, in that order.
/// `None` when neither is present.
pub fn read_structured<T: DeserializeOwned>(
    path: Option<&str>,
) -> Result<Option<T>, Box<dyn std::error::Error>> {
    if let Some(path) = path {
        tracing::debug!(path, "reading input file");
        return Ok(Some(file::read_json(path)?));
    }
    match stdin::read_stdin()? {
        Some(text) => serde_json::from_str(&text)
            .map(Some)
            .map_err(|e| format!("Failed to parse stdin: {e}").into()),
        None => Ok(None),
    }
}
