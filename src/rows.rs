use std::path::Path;

use calamine::{Data, Reader, open_workbook_auto};
use tracing::warn;

use crate::{
    config::Config,
    error::{ReelError, ReelResult},
};

/// One spreadsheet row normalized into slide copy. Immutable after creation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SlideRecord {
    pub image_filename: String,
    pub title: String,
    pub bullets: Vec<String>,
    pub dimensions_text: String,
    pub capacity_text: String,
}

impl SlideRecord {
    /// The ribbon is rendered iff at least one of these is non-empty.
    pub fn ribbon_text(&self) -> Option<String> {
        let parts: Vec<&str> = [self.capacity_text.as_str(), self.dimensions_text.as_str()]
            .into_iter()
            .filter(|t| !t.is_empty())
            .collect();
        if parts.is_empty() {
            None
        } else {
            Some(parts.join(" \u{2022} "))
        }
    }
}

/// Filtering options extracted from [`Config`].
#[derive(Clone, Debug)]
pub struct RowFilter {
    pub skip_patterns: Vec<String>,
    pub max_slides: usize,
}

impl RowFilter {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            skip_patterns: cfg.skip_patterns.iter().map(|p| p.to_lowercase()).collect(),
            max_slides: cfg.max_slides,
        }
    }
}

const COL_IMAGE: &str = "image_filename";
const COL_TITLE: &str = "title";
const COL_BULLETS: [&str; 3] = ["bullet1", "bullet2", "bullet3"];
const COL_DIMENSIONS: &str = "dimensions_text";
const COL_CAPACITY: &str = "capacity_text";
const COL_SKIP: &str = "skip";

/// Read the first worksheet of the spreadsheet and produce slide records in
/// row order, already filtered and capped at `max_slides`.
pub fn load_slide_records(path: &Path, filter: &RowFilter) -> ReelResult<Vec<SlideRecord>> {
    let mut workbook = open_workbook_auto(path).map_err(|e| {
        ReelError::validation(format!("open spreadsheet '{}': {e}", path.display()))
    })?;

    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| {
            ReelError::validation(format!(
                "spreadsheet '{}' contains no worksheets",
                path.display()
            ))
        })?
        .map_err(|e| {
            ReelError::validation(format!(
                "read first worksheet of '{}': {e}",
                path.display()
            ))
        })?;

    let mut rows = range.rows().map(|r| {
        r.iter()
            .map(|c| cell_to_string(c))
            .collect::<Vec<String>>()
    });
    let header = rows.next().ok_or_else(|| {
        ReelError::validation(format!("spreadsheet '{}' is empty", path.display()))
    })?;

    records_from_rows(&header, rows, filter)
}

fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        // Excel stores integers as floats; keep "5" rather than "5.0".
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", *f as i64),
        other => other.to_string().trim().to_string(),
    }
}

/// Pure row-to-record transform, separated from file I/O for testability.
///
/// Policy: rows with a truthy `skip` cell are dropped silently; rows whose
/// filename matches a skip pattern (case-insensitive substring) are dropped
/// with a warning; rows without an image filename are dropped with a warning.
/// Row order is slide order; at most `max_slides` records are produced.
pub fn records_from_rows(
    header: &[String],
    rows: impl Iterator<Item = Vec<String>>,
    filter: &RowFilter,
) -> ReelResult<Vec<SlideRecord>> {
    let header: Vec<String> = header.iter().map(|h| h.trim().to_lowercase()).collect();
    let col = |name: &str| header.iter().position(|h| h == name);

    let image_col = col(COL_IMAGE).ok_or_else(|| {
        ReelError::validation(format!("spreadsheet is missing required column '{COL_IMAGE}'"))
    })?;
    let title_col = col(COL_TITLE);
    let bullet_cols: Vec<Option<usize>> = COL_BULLETS.iter().map(|c| col(c)).collect();
    let dimensions_col = col(COL_DIMENSIONS);
    let capacity_col = col(COL_CAPACITY);
    let skip_col = col(COL_SKIP);

    let field = |row: &[String], idx: Option<usize>| -> String {
        idx.and_then(|i| row.get(i))
            .map(|s| s.trim().to_string())
            .unwrap_or_default()
    };

    let mut records = Vec::new();
    for (row_no, row) in rows.enumerate() {
        if records.len() >= filter.max_slides {
            break;
        }

        if is_truthy(&field(&row, skip_col)) {
            continue;
        }

        let image_filename = field(&row, Some(image_col));
        if image_filename.is_empty() {
            warn!(row = row_no + 2, "row has no image_filename, skipping");
            continue;
        }

        let lowered = image_filename.to_lowercase();
        if let Some(pat) = filter.skip_patterns.iter().find(|p| lowered.contains(p.as_str())) {
            warn!(
                row = row_no + 2,
                image = %image_filename,
                pattern = %pat,
                "filename matches exclusion pattern, skipping"
            );
            continue;
        }

        let bullets: Vec<String> = bullet_cols
            .iter()
            .map(|c| field(&row, *c))
            .filter(|b| !b.is_empty())
            .collect();

        records.push(SlideRecord {
            image_filename,
            title: field(&row, title_col),
            bullets,
            dimensions_text: field(&row, dimensions_col),
            capacity_text: field(&row, capacity_col),
        });
    }

    Ok(records)
}

fn is_truthy(s: &str) -> bool {
    matches!(s.to_lowercase().as_str(), "1" | "true" | "yes" | "y")
}
