use thiserror::Error;

use super::coords::{self, Coordinates};
use super::tables::RowCells;
use crate::model::{SiteRecord, UNKNOWN};

/// Rows need at least code, name and one more column.
pub const MIN_CELLS: usize = 3;

/// Why a row did not become a record. Always row-local.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RowRejection {
    #[error("only {0} cells")]
    TooFewCells(usize),
    #[error("no coordinate span")]
    NoCoordinates,
    #[error("unparseable coordinates {0:?}")]
    Unparseable(String),
    #[error("coordinates out of range ({}, {})", .0.lat, .0.lon)]
    OutOfRange(Coordinates),
}

/// Build a site from one table row.
pub fn assemble(row: &RowCells, state: &str, wiki_url: &str) -> Result<SiteRecord, RowRejection> {
    if row.cells.len() < MIN_CELLS {
        return Err(RowRejection::TooFewCells(row.cells.len()));
    }
    let coord_text = row
        .coordinates
        .as_deref()
        .filter(|t| !t.is_empty())
        .ok_or(RowRejection::NoCoordinates)?;
    let c = coords::parse(coord_text)
        .ok_or_else(|| RowRejection::Unparseable(coord_text.to_string()))?;
    if !c.in_range() {
        return Err(RowRejection::OutOfRange(c));
    }

    Ok(SiteRecord {
        site_code: row.cells[0].clone(),
        name: row.cells[1].clone(),
        state: state.to_string(),
        latitude: c.lat,
        longitude: c.lon,
        description: longest_cell(&row.cells).to_string(),
        site_type: UNKNOWN.to_string(),
        status: UNKNOWN.to_string(),
        wiki_url: wiki_url.to_string(),
    })
}

/// Longest cell text in characters; the first one seen wins a tie.
fn longest_cell(cells: &[String]) -> &str {
    let mut best = "";
    let mut best_len = 0;
    for c in cells {
        let len = c.chars().count();
        if len > best_len {
            best = c;
            best_len = len;
        }
    }
    best
}
