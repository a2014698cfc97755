//! Input metadata: reading items from CSV and extracting source links

use crate::error::{Error, Result};
use crate::types::Item;
use std::collections::HashSet;
use std::io::Write;
use std::path::Path;

/// Read every item from a CSV file with a header row
///
/// The file must contain `artist_username`, `title` and `permalink_url`
/// columns; other columns are ignored. Rows that cannot be parsed are logged
/// and skipped.
///
/// # Errors
///
/// Returns [`Error::InputNotFound`] if the file does not exist and
/// [`Error::Csv`] if it cannot be opened or has no usable header.
pub fn read_items(path: &Path) -> Result<Vec<Item>> {
    if !path.exists() {
        return Err(Error::InputNotFound(path.to_path_buf()));
    }
    let reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)?;
    let items = collect_items(reader)?;
    tracing::info!(path = %path.display(), count = items.len(), "Found items in CSV");
    Ok(items)
}

/// Read items from any CSV source with a header row
pub fn read_items_from_reader<R: std::io::Read>(reader: R) -> Result<Vec<Item>> {
    let reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);
    collect_items(reader)
}

fn collect_items<R: std::io::Read>(mut reader: csv::Reader<R>) -> Result<Vec<Item>> {
    let headers = reader.headers()?.clone();
    for column in ["artist_username", "title", "permalink_url"] {
        if !headers.iter().any(|h| h == column) {
            return Err(Error::config(
                "input",
                format!("input is missing the '{}' column", column),
            ));
        }
    }

    let mut items = Vec::new();
    for (row, record) in reader.deserialize::<Item>().enumerate() {
        match record {
            Ok(item) => items.push(item),
            Err(e) => {
                // Header is line 1
                tracing::warn!(line = row + 2, error = %e, "Skipping malformed input row");
            }
        }
    }
    Ok(items)
}

/// Unique source references that contain `host_filter`, in first-seen order
pub fn extract_links(items: &[Item], host_filter: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    items
        .iter()
        .map(|item| item.permalink_url.trim())
        .filter(|url| !url.is_empty() && url.contains(host_filter))
        .filter(|url| seen.insert(url.to_string()))
        .map(str::to_string)
        .collect()
}

/// Write one link per line
pub fn write_links(path: &Path, links: &[String]) -> Result<()> {
    let mut file = std::io::BufWriter::new(std::fs::File::create(path)?);
    for (i, link) in links.iter().enumerate() {
        if i > 0 {
            file.write_all(b"\n")?;
        }
        file.write_all(link.as_bytes())?;
    }
    file.flush()?;
    Ok(())
}
