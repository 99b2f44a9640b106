//! Report writers. Output is built next to the target as `<name>.partial`
//! and renamed into place only once complete.

pub mod pdf;
pub mod xlsx;

use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::error::Result;
use crate::report::ClassReport;
use crate::store::Store;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Xlsx,
    Pdf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportSummary {
    pub format: ExportFormat,
    pub students: usize,
    pub exam_columns: usize,
    pub pages: Option<usize>,
    pub rows_dropped: usize,
}

fn partial_path(path: &Path) -> PathBuf {
    let mut name: OsString = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| OsString::from("report"));
    name.push(".partial");
    path.with_file_name(name)
}

fn write_then_rename(tmp: &Path, path: &Path, write: impl FnOnce(&mut File) -> Result<()>) -> Result<()> {
    let mut file = File::create(tmp)?;
    write(&mut file)?;
    file.sync_all()?;
    drop(file);
    std::fs::rename(tmp, path)?;
    Ok(())
}

pub(crate) fn write_atomically(path: &Path, write: impl FnOnce(&mut File) -> Result<()>) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let tmp = partial_path(path);
    let result = write_then_rename(&tmp, path, write);
    if let Err(e) = &result {
        warn!("export to {} failed: {e}", path.display());
        let _ = std::fs::remove_file(&tmp);
    }
    result
}

/// Snapshots the classroom and writes the report in `format`.
pub fn export_class_report(
    store: &Store,
    classroom_id: i64,
    path: &Path,
    format: ExportFormat,
) -> Result<ExportSummary> {
    let report = ClassReport::snapshot(store, classroom_id)?;
    let mut summary = ExportSummary {
        format,
        students: report.rows.len(),
        exam_columns: report.exam_columns.len(),
        pages: None,
        rows_dropped: 0,
    };
    match format {
        ExportFormat::Xlsx => xlsx::write_report(&report, path)?,
        ExportFormat::Pdf => {
            let layout = pdf::PdfLayout::with_pagination(store.config().pdf_pagination);
            let pdf = pdf::write_report(&report, path, &layout)?;
            summary.pages = Some(pdf.pages);
            summary.rows_dropped = pdf.rows_dropped;
        }
    }
    info!(
        classroom_id,
        path = %path.display(),
        ?format,
        "exported class report"
    );
    Ok(summary)
}
