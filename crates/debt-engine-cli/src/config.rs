use std::path::Path;

use debt_engine_core::RegulatoryTables;

use crate::input;

/// Load regulatory tables from `path`, or the published defaults when no
/// override is given. `.yaml`/`.yml` files are read as YAML, anything else as
/// JSON.
pub fn load_tables(path: Option<&str>) -> Result<RegulatoryTables, Box<dyn std::error::Error>> {
    let Some(path) = path else {
        tracing::debug!("using default regulatory tables");
        return Ok(RegulatoryTables::default());
    };

    let contents = input::file::read_text(path)?;
    let is_yaml = Path::new(path)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml"));

    let tables = if is_yaml {
        let tables: RegulatoryTables = serde_yaml::from_str(&contents)
            .map_err(|e| format!("Failed to parse tables '{}': {}", path, e))?;
        tables.validate()?;
        tables
    } else {
        RegulatoryTables::from_json(&contents)
            .map_err(|e| format!("Failed to load tables '{}': {}", path, e))?
    };

    tracing::info!(
        path,
        profiles = tables.profiles.len(),
        "loaded regulatory tables override"
    );
    Ok(tables)
}
