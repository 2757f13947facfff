//! Parsing of the tab-separated inventory export
//!
//! The export is a header row followed by one row per bottle. A failed login
//! does not produce an error status; the service returns an HTML page
//! instead, which is detected here.

use cellar_core::BottleRecord;
use serde_json::Value;

use crate::error::{ClientError, ClientResult};

/// Parse an export body into records
///
/// Cells are kept as strings; numeric interpretation is left to the
/// aggregator. Rows shorter than the header simply lack the trailing fields.
pub fn parse_inventory(body: &str) -> ClientResult<Vec<BottleRecord>> {
    if body.trim().is_empty() {
        return Ok(Vec::new());
    }

    let first_line = body.lines().next().unwrap_or_default();
    if !first_line.contains('\t') && first_line.trim_start().starts_with('<') {
        return Err(ClientError::Authentication);
    }

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .quoting(false)
        .flexible(true)
        .from_reader(body.as_bytes());

    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').trim().to_string())
        .collect();

    let mut records = Vec::new();
    for row in reader.records() {
        let row = row?;
        let record: BottleRecord = headers
            .iter()
            .zip(row.iter())
            .map(|(header, cell)| (header.clone(), Value::String(cell.to_string())))
            .collect();
        records.push(record);
    }

    Ok(records)
}
