//! Text parsing for element sets

use crate::{
    extract_catalog_id, normalize_catalog_id, ElementError, OrbitalElementRecord, Result,
    LINE1_PREFIX, LINE2_PREFIX,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

/// Lines per group in the bulk convention
const GROUP_SIZE: usize = 3;

/// Result of a bulk parse
#[derive(Debug, Clone, Serialize)]
pub struct ParsedBatch {
    pub records: Vec<OrbitalElementRecord>,
    /// Trailing lines that did not form a complete group
    pub discarded_lines: usize,
}

/// Result of a lenient feed scan
#[derive(Debug, Clone, Default, Serialize)]
pub struct FeedScan {
    pub records: Vec<OrbitalElementRecord>,
    /// Lines dropped while resynchronizing on malformed groups
    pub rejected_lines: usize,
}

/// Parse pasted 3-line element text, stamping records with the current time
pub fn parse_bulk(text: &str) -> Result<ParsedBatch> {
    parse_bulk_at(text, Utc::now())
}

/// Parse 3-line element text (`name`, `line1`, `line2` per group).
///
/// The batch is all-or-nothing: the first malformed group fails the whole
/// call and no records are returned.
pub fn parse_bulk_at(text: &str, captured_at: DateTime<Utc>) -> Result<ParsedBatch> {
    let lines: Vec<&str> = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();

    let discarded_lines = lines.len() % GROUP_SIZE;
    let epoch_seconds = captured_at.timestamp();
    let mut records = Vec::with_capacity(lines.len() / GROUP_SIZE);

    for (i, group) in lines.chunks_exact(GROUP_SIZE).enumerate() {
        let (name, line1, line2) = (group[0], group[1], group[2]);
        let first_line = i * GROUP_SIZE + 1;

        if !line1.starts_with(LINE1_PREFIX) {
            return Err(ElementError::MalformedElementBlock {
                group: i + 1,
                line: first_line + 1,
            });
        }
        if !line2.starts_with(LINE2_PREFIX) {
            return Err(ElementError::MalformedElementBlock {
                group: i + 1,
                line: first_line + 2,
            });
        }

        let catalog_id = extract_catalog_id(line1).ok_or(ElementError::MissingCatalogId {
            group: i + 1,
            line: first_line + 1,
        })?;

        debug!("Element set {} for catalog id {}", name, catalog_id);

        records.push(OrbitalElementRecord {
            catalog_id,
            epoch_seconds,
            line1: line1.to_string(),
            line2: line2.to_string(),
            name: Some(name.to_string()),
        });
    }

    if discarded_lines > 0 {
        warn!(
            "Discarded {} trailing line(s) that did not form a complete element set",
            discarded_lines
        );
    }

    if records.is_empty() {
        return Err(ElementError::EmptyBatch { discarded_lines });
    }

    info!(
        "Parsed {} element sets ({} trailing lines discarded)",
        records.len(),
        discarded_lines
    );

    Ok(ParsedBatch {
        records,
        discarded_lines,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    ExpectName,
    ExpectLine1,
    ExpectLine2,
}

/// Scan element text retrieved from a feed.
///
/// Unlike [`parse_bulk_at`] this never fails: a line that breaks the
/// `name, 1 ..., 2 ...` sequence is dropped and scanning restarts at the
/// next line. Catalog ids are normalized (leading zeros stripped).
pub fn parse_feed(text: &str, captured_at: DateTime<Utc>) -> FeedScan {
    let epoch_seconds = captured_at.timestamp();
    let mut scan = FeedScan::default();
    let mut state = ScanState::ExpectName;
    let mut name = "";
    let mut line1 = "";

    for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
        match state {
            ScanState::ExpectName => {
                name = line;
                state = ScanState::ExpectLine1;
            }
            ScanState::ExpectLine1 => {
                if line.starts_with(LINE1_PREFIX) {
                    line1 = line;
                    state = ScanState::ExpectLine2;
                } else {
                    // name line plus this one
                    scan.rejected_lines += 2;
                    state = ScanState::ExpectName;
                }
            }
            ScanState::ExpectLine2 => {
                state = ScanState::ExpectName;
                if !line.starts_with(LINE2_PREFIX) {
                    scan.rejected_lines += 3;
                    continue;
                }
                match extract_catalog_id(line1) {
                    Some(id) => scan.records.push(OrbitalElementRecord {
                        catalog_id: normalize_catalog_id(&id),
                        epoch_seconds,
                        line1: line1.to_string(),
                        line2: line.to_string(),
                        name: Some(name.to_string()),
                    }),
                    None => scan.rejected_lines += 3,
                }
            }
        }
    }

    scan.rejected_lines += match state {
        ScanState::ExpectName => 0,
        ScanState::ExpectLine1 => 1,
        ScanState::ExpectLine2 => 2,
    };

    if scan.rejected_lines > 0 {
        warn!("Feed scan rejected {} line(s)", scan.rejected_lines);
    }
    info!("Scanned {} element sets from feed", scan.records.len());

    scan
}
