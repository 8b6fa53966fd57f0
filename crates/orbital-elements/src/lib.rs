//! Orbital Elements Library
//!
//! Ingestion of two-line element sets (TLEs) used to seed satellite state
//! for footprint planning. Covers:
//!
//! - Bulk parsing of pasted/uploaded text in the 3-line `name, line1, line2`
//!   convention (all-or-nothing per batch)
//! - Single-record validation for `line1, line2` update flows
//! - Lenient scanning of element feeds (bad groups are skipped, not fatal)
//!
//! Only the structure of the lines is validated here. Propagation is left to
//! the footprint engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod parser;

pub use parser::{parse_bulk, parse_bulk_at, parse_feed, FeedScan, ParsedBatch};

/// Required prefix of the first element line
pub const LINE1_PREFIX: &str = "1 ";

/// Required prefix of the second element line
pub const LINE2_PREFIX: &str = "2 ";

/// Character offset of the catalog number in line 1 (columns 3-7)
const CATALOG_ID_OFFSET: usize = 2;
const CATALOG_ID_WIDTH: usize = 5;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ElementError {
    #[error("Malformed element block at group {group} (line {line}): expected lines starting with \"1 \" and \"2 \"")]
    MalformedElementBlock { group: usize, line: usize },
    #[error("Could not extract catalog id from element block at group {group} (line {line})")]
    MissingCatalogId { group: usize, line: usize },
    #[error("No element sets found ({discarded_lines} trailing lines discarded)")]
    EmptyBatch { discarded_lines: usize },
    #[error("Invalid element epoch: {0}")]
    InvalidEpoch(String),
}

pub type Result<T> = std::result::Result<T, ElementError>;

/// One captured element set for a satellite
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrbitalElementRecord {
    #[serde(alias = "sat_noard_id")]
    pub catalog_id: String,
    /// Capture (ingestion) time, unix seconds. Not the element epoch.
    #[serde(alias = "time")]
    pub epoch_seconds: i64,
    pub line1: String,
    pub line2: String,
    /// Object name from the 3-line form, if one was supplied
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl OrbitalElementRecord {
    /// Validate a single record supplied as discrete fields.
    ///
    /// Lines are trimmed; the prefix checks are the same as for bulk input.
    pub fn new(
        catalog_id: impl Into<String>,
        epoch_seconds: i64,
        line1: impl Into<String>,
        line2: impl Into<String>,
    ) -> Result<Self> {
        let catalog_id = catalog_id.into().trim().to_string();
        let line1 = line1.into().trim().to_string();
        let line2 = line2.into().trim().to_string();

        if !line1.starts_with(LINE1_PREFIX) {
            return Err(ElementError::MalformedElementBlock { group: 1, line: 1 });
        }
        if !line2.starts_with(LINE2_PREFIX) {
            return Err(ElementError::MalformedElementBlock { group: 1, line: 2 });
        }
        if catalog_id.is_empty() {
            return Err(ElementError::MissingCatalogId { group: 1, line: 1 });
        }

        Ok(Self {
            catalog_id,
            epoch_seconds,
            line1,
            line2,
            name: None,
        })
    }

    /// Capture time as a UTC timestamp
    pub fn captured_at(&self) -> Option<DateTime<Utc>> {
        DateTime::<Utc>::from_timestamp(self.epoch_seconds, 0)
    }

    /// Epoch encoded in the element lines themselves
    pub fn element_epoch(&self) -> Result<DateTime<Utc>> {
        let elements = sgp4::Elements::from_tle(
            self.name.clone(),
            self.line1.as_bytes(),
            self.line2.as_bytes(),
        )
        .map_err(|e| ElementError::InvalidEpoch(format!("{:?}", e)))?;

        Ok(DateTime::<Utc>::from_naive_utc_and_offset(elements.datetime, Utc))
    }

    /// Catalog id with leading zeros stripped from numeric ids
    pub fn normalized_catalog_id(&self) -> String {
        normalize_catalog_id(&self.catalog_id)
    }
}

/// Verbatim catalog id field of line 1 (characters 2..=6), trimmed.
///
/// Returns `None` when the field is blank or the line is too short to hold it.
pub fn extract_catalog_id(line1: &str) -> Option<String> {
    let field: String = line1
        .chars()
        .skip(CATALOG_ID_OFFSET)
        .take(CATALOG_ID_WIDTH)
        .collect();
    let field = field.trim();

    if field.is_empty() {
        None
    } else {
        Some(field.to_string())
    }
}

/// "00042" and "42" name the same object; alpha-5 ids are kept as-is
pub fn normalize_catalog_id(id: &str) -> String {
    let id = id.trim();
    match id.parse::<u32>() {
        Ok(n) => n.to_string(),
        Err(_) => id.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ISS_LINE1: &str = "1 25544U 98067A   08264.51782528 -.00002182  00000-0 -11606-4 0  2927";
    const ISS_LINE2: &str = "2 25544  51.6416 247.4627 0006703 130.5360 325.0288 15.72125391563537";

    #[test]
    fn test_extract_catalog_id() {
        assert_eq!(extract_catalog_id(ISS_LINE1).as_deref(), Some("25544"));
        assert_eq!(extract_catalog_id("1  4242U").as_deref(), Some("4242"));
        assert_eq!(extract_catalog_id("1      U 98067A"), None);
        assert_eq!(extract_catalog_id("1 "), None);
    }

    #[test]
    fn test_short_line_keeps_available_chars() {
        assert_eq!(extract_catalog_id("1 123").as_deref(), Some("123"));
    }

    #[test]
    fn test_normalize_catalog_id() {
        assert_eq!(normalize_catalog_id("00042"), "42");
        assert_eq!(normalize_catalog_id(" 25544 "), "25544");
        assert_eq!(normalize_catalog_id("A1234"), "A1234");
    }

    #[test]
    fn test_single_record_valid() {
        let record = OrbitalElementRecord::new("25544", 1_700_000_000, ISS_LINE1, ISS_LINE2).unwrap();
        assert_eq!(record.catalog_id, "25544");
        assert_eq!(record.epoch_seconds, 1_700_000_000);
        assert!(record.name.is_none());
    }

    #[test]
    fn test_single_record_rejects_swapped_lines() {
        let err = OrbitalElementRecord::new("25544", 0, ISS_LINE2, ISS_LINE1).unwrap_err();
        assert_eq!(err, ElementError::MalformedElementBlock { group: 1, line: 1 });

        let err = OrbitalElementRecord::new("25544", 0, ISS_LINE1, ISS_LINE1).unwrap_err();
        assert_eq!(err, ElementError::MalformedElementBlock { group: 1, line: 2 });
    }

    #[test]
    fn test_single_record_requires_catalog_id() {
        let err = OrbitalElementRecord::new("  ", 0, ISS_LINE1, ISS_LINE2).unwrap_err();
        assert!(matches!(err, ElementError::MissingCatalogId { .. }));
    }

    #[test]
    fn test_element_epoch_differs_from_capture_time() {
        let record = OrbitalElementRecord::new("25544", 1_700_000_000, ISS_LINE1, ISS_LINE2).unwrap();
        let epoch = record.element_epoch().unwrap();
        // Day 264.5178 of 2008
        assert_eq!(epoch.format("%Y-%m-%d").to_string(), "2008-09-20");
        assert_ne!(epoch.timestamp(), record.epoch_seconds);
    }

    #[test]
    fn test_record_accepts_collaborator_field_names() {
        let json = format!(
            r#"{{"sat_noard_id": "25544", "time": 1700000000, "line1": "{}", "line2": "{}"}}"#,
            ISS_LINE1, ISS_LINE2
        );
        let record: OrbitalElementRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(record.catalog_id, "25544");
        assert_eq!(record.epoch_seconds, 1_700_000_000);
    }
}
