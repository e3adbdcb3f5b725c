//! Contact file parsing.
//!
//! The file is CSV with a header row: identifier in the first column, message
//! body in the second. Older exports put `identifier,body` inside one quoted
//! field; such rows are split at the first comma.

use crate::model::ContactRecord;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ContactFileError {
    #[error("cannot read contact file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed contact file: {0}")]
    Csv(#[from] csv::Error),

    #[error("row {row} has no message body")]
    MissingBody { row: usize },
}

pub fn load(path: &Path) -> Result<Vec<ContactRecord>, ContactFileError> {
    let raw = std::fs::read(path).map_err(|source| ContactFileError::Io {
        path: path.display().to_string(),
        source,
    })?;
    parse(&raw)
}

/// Parse contacts in file order. The first non-empty row is the header.
pub fn parse(raw: &[u8]) -> Result<Vec<ContactRecord>, ContactFileError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(raw);

    let mut contacts = Vec::new();
    let mut seen_header = false;
    for (idx, record) in reader.records().enumerate() {
        let record = record?;
        if record.iter().all(|f| f.trim().is_empty()) {
            continue;
        }
        if !seen_header {
            seen_header = true;
            continue;
        }

        let (identifier, body) = match (record.get(0), record.get(1)) {
            (Some(id), Some(body)) => (id.to_string(), body.to_string()),
            (Some(joined), None) => match joined.split_once(',') {
                Some((id, body)) => (id.to_string(), body.to_string()),
                None => return Err(ContactFileError::MissingBody { row: idx + 1 }),
            },
            _ => return Err(ContactFileError::MissingBody { row: idx + 1 }),
        };

        contacts.push(ContactRecord {
            identifier: identifier.trim().to_string(),
            body,
        });
    }
    Ok(contacts)
}
