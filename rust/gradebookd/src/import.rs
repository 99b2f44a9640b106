//! Student roster import from the first sheet of a spreadsheet.
//!
//! The first row that holds a cell is a header and is always skipped.
//! Column A is the student name, column B the optional seat label. Rows
//! with a blank name are skipped silently; a file that cannot be opened as
//! a workbook fails as a whole.

use calamine::{open_workbook_auto, Data, Range, Reader};
use serde::Serialize;
use std::path::Path;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::model::Student;
use crate::store::Store;

const NAME_COL: u32 = 0;
const SEAT_COL: u32 = 1;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSummary {
    pub imported: usize,
    pub skipped_rows: usize,
    pub student_ids: Vec<i64>,
}

/// Text of a cell the way the roster sees it: integral numbers without a
/// fraction, booleans as `true`/`false`, anything that is not text, a
/// number or a boolean as empty.
pub fn cell_text(cell: Option<&Data>) -> String {
    match cell {
        Some(Data::String(s)) => s.clone(),
        Some(Data::Float(f)) => number_text(*f),
        Some(Data::Int(i)) => i.to_string(),
        Some(Data::Bool(b)) => b.to_string(),
        Some(Data::DateTime(dt)) => number_text(dt.as_f64()),
        _ => String::new(),
    }
}

fn number_text(v: f64) -> String {
    if v.fract() == 0.0 && v.abs() < i64::MAX as f64 {
        (v as i64).to_string()
    } else {
        v.to_string()
    }
}

/// Rows of `(name, seat)` below the header, plus the number of rows skipped.
pub fn roster_rows(range: &Range<Data>) -> (Vec<(String, Option<String>)>, usize) {
    let (Some((first_row, _)), Some((last_row, _))) = (range.start(), range.end()) else {
        return (Vec::new(), 0);
    };
    let mut rows = Vec::new();
    let mut skipped = 0;
    // The header is the first row holding any cell; blank rows above it
    // are not part of the sheet.
    for row in first_row + 1..=last_row {
        let name = cell_text(range.get_value((row, NAME_COL)));
        if name.trim().is_empty() {
            skipped += 1;
            continue;
        }
        let seat = cell_text(range.get_value((row, SEAT_COL)));
        let seat = (!seat.trim().is_empty()).then_some(seat);
        rows.push((name, seat));
    }
    (rows, skipped)
}

pub fn parse_students(path: &Path, classroom_id: i64) -> Result<(Vec<Student>, usize)> {
    let mut workbook = open_workbook_auto(path)?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| Error::Format("workbook has no sheets".to_string()))??;
    let (rows, skipped) = roster_rows(&range);
    debug!(
        path = %path.display(),
        rows = rows.len(),
        skipped,
        "parsed roster sheet"
    );
    let students = rows
        .into_iter()
        .map(|(name, seat)| Student::new(classroom_id, name, seat))
        .collect();
    Ok((students, skipped))
}

/// Parses the whole file first, then inserts every student in one
/// transaction.
pub fn import_students(store: &Store, path: &Path, classroom_id: i64) -> Result<ImportSummary> {
    if store.classes().classroom(classroom_id)?.is_none() {
        return Err(Error::not_found("classroom"));
    }
    let (students, skipped_rows) = parse_students(path, classroom_id)?;
    let student_ids = store.classes().upsert_students(&students)?;
    info!(
        classroom_id,
        imported = student_ids.len(),
        skipped_rows,
        "imported students"
    );
    Ok(ImportSummary {
        imported: student_ids.len(),
        skipped_rows,
        student_ids,
    })
}
