//! Class report drawn as text on A4 pages, written as a bare PDF 1.4
//! document with the standard Helvetica fonts.

use std::io::Write;
use std::path::Path;

use crate::config::PdfPagination;
use crate::error::Result;
use crate::report::{score_text, ClassReport};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PdfLayout {
    pub page_width: f32,
    pub page_height: f32,
    pub left: f32,
    pub top: f32,
    pub row_step: f32,
    /// Rows whose baseline would fall below this (measured from the top)
    /// go to the next page, or are dropped when truncating.
    pub bottom_limit: f32,
    pub name_width: f32,
    pub column_width: f32,
    pub pagination: PdfPagination,
}

impl Default for PdfLayout {
    fn default() -> Self {
        Self {
            page_width: 595.0,
            page_height: 842.0,
            left: 50.0,
            top: 50.0,
            row_step: 20.0,
            bottom_limit: 800.0,
            name_width: 150.0,
            column_width: 80.0,
            pagination: PdfPagination::Spill,
        }
    }
}

impl PdfLayout {
    pub fn single_page() -> Self {
        Self {
            pagination: PdfPagination::Truncate,
            ..Self::default()
        }
    }

    pub fn with_pagination(pagination: PdfPagination) -> Self {
        Self {
            pagination,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PdfSummary {
    pub pages: usize,
    pub rows_drawn: usize,
    pub rows_dropped: usize,
}

/// Content stream of one page, in top-down coordinates.
struct Page {
    height: f32,
    ops: Vec<u8>,
}

impl Page {
    fn new(height: f32) -> Self {
        Self {
            height,
            ops: Vec::new(),
        }
    }

    fn text(&mut self, font: &str, size: f32, x: f32, y: f32, text: &str) {
        let _ = write!(
            self.ops,
            "BT /{font} {size} Tf {x:.2} {:.2} Td (",
            self.height - y
        );
        self.ops.extend(pdf_string_bytes(text));
        self.ops.extend_from_slice(b") Tj ET\n");
    }

    fn rule(&mut self, x1: f32, x2: f32, y: f32) {
        let y = self.height - y;
        let _ = writeln!(self.ops, "0.5 w {x1:.2} {y:.2} m {x2:.2} {y:.2} l S");
    }
}

/// WinAnsi bytes for a literal string, with delimiters escaped. Characters
/// outside Latin-1 become `?`.
fn pdf_string_bytes(text: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '(' | ')' | '\\' => {
                out.push(b'\\');
                out.push(ch as u8);
            }
            c if (c as u32) < 0x20 => out.push(b' '),
            c if (c as u32) < 0x7f || (0xa0..=0xff).contains(&(c as u32)) => out.push(c as u32 as u8),
            _ => out.push(b'?'),
        }
    }
    out
}

fn draw_column_header(page: &mut Page, report: &ClassReport, layout: &PdfLayout, y: f32) {
    let mut x = layout.left;
    page.text("F1", 12.0, x, y, "Name");
    x += layout.name_width;
    page.text("F1", 12.0, x, y, "Absences");
    x += layout.column_width;
    for exam in &report.exam_columns {
        page.text("F1", 12.0, x, y, exam);
        x += layout.column_width;
    }
}

/// Lays the report out into page content streams.
fn layout_pages(report: &ClassReport, layout: &PdfLayout) -> (Vec<Page>, PdfSummary) {
    let rule_right = layout.page_width - 45.0;
    let mut pages = Vec::new();
    let mut summary = PdfSummary::default();

    let mut page = Page::new(layout.page_height);
    let mut y = layout.top;
    page.text(
        "F2",
        24.0,
        layout.left,
        y,
        &format!("Class Report: {}", report.class_name),
    );
    y += 40.0;
    draw_column_header(&mut page, report, layout, y);
    y += 20.0;
    page.rule(layout.left - 10.0, rule_right, y);
    y += 30.0;

    for (i, row) in report.rows.iter().enumerate() {
        if y > layout.bottom_limit {
            if layout.pagination == PdfPagination::Truncate {
                summary.rows_dropped = report.rows.len() - i;
                break;
            }
            pages.push(std::mem::replace(&mut page, Page::new(layout.page_height)));
            y = layout.top;
            draw_column_header(&mut page, report, layout, y);
            y += 20.0;
            page.rule(layout.left - 10.0, rule_right, y);
            y += 30.0;
        }
        let mut x = layout.left;
        page.text("F1", 12.0, x, y, &row.name);
        x += layout.name_width;
        page.text("F1", 12.0, x, y, &row.absences.to_string());
        x += layout.column_width;
        for score in &row.scores {
            page.text("F1", 12.0, x, y, &score_text(*score));
            x += layout.column_width;
        }
        summary.rows_drawn += 1;
        y += layout.row_step;
    }
    pages.push(page);
    summary.pages = pages.len();
    (pages, summary)
}

/// Serializes pages into a complete PDF file body.
fn render_document(pages: &[Page], layout: &PdfLayout) -> Vec<u8> {
    // 1 catalog, 2 page tree, 3 regular font, 4 bold font, then a
    // (page, contents) object pair per page.
    let page_obj = |i: usize| 5 + 2 * i;
    let object_count = 4 + 2 * pages.len();

    let mut out: Vec<u8> = Vec::new();
    let mut offsets = vec![0usize; object_count + 1];
    out.extend_from_slice(b"%PDF-1.4\n%\xe2\xe3\xcf\xd3\n");

    let mut begin = |out: &mut Vec<u8>, id: usize| {
        offsets[id] = out.len();
        let _ = write!(out, "{id} 0 obj\n");
    };

    begin(&mut out, 1);
    out.extend_from_slice(b"<< /Type /Catalog /Pages 2 0 R >>\nendobj\n");

    begin(&mut out, 2);
    let kids: Vec<String> = (0..pages.len()).map(|i| format!("{} 0 R", page_obj(i))).collect();
    let _ = write!(
        out,
        "<< /Type /Pages /Kids [{}] /Count {} >>\nendobj\n",
        kids.join(" "),
        pages.len()
    );

    begin(&mut out, 3);
    out.extend_from_slice(
        b"<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica /Encoding /WinAnsiEncoding >>\nendobj\n",
    );
    begin(&mut out, 4);
    out.extend_from_slice(
        b"<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica-Bold /Encoding /WinAnsiEncoding >>\nendobj\n",
    );

    for (i, page) in pages.iter().enumerate() {
        let id = page_obj(i);
        begin(&mut out, id);
        let _ = write!(
            out,
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 {} {}] \
             /Resources << /Font << /F1 3 0 R /F2 4 0 R >> >> /Contents {} 0 R >>\nendobj\n",
            layout.page_width,
            layout.page_height,
            id + 1
        );
        begin(&mut out, id + 1);
        let _ = write!(out, "<< /Length {} >>\nstream\n", page.ops.len());
        out.extend_from_slice(&page.ops);
        out.extend_from_slice(b"\nendstream\nendobj\n");
    }

    let xref_at = out.len();
    let _ = write!(out, "xref\n0 {}\n0000000000 65535 f \n", object_count + 1);
    for offset in &offsets[1..] {
        let _ = write!(out, "{offset:010} 00000 n \n");
    }
    let _ = write!(
        out,
        "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{xref_at}\n%%EOF\n",
        object_count + 1
    );
    out
}

pub fn render_report(report: &ClassReport, layout: &PdfLayout) -> (Vec<u8>, PdfSummary) {
    let (pages, summary) = layout_pages(report, layout);
    (render_document(&pages, layout), summary)
}

pub fn write_report(report: &ClassReport, path: &Path, layout: &PdfLayout) -> Result<PdfSummary> {
    let (bytes, summary) = render_report(report, layout);
    super::write_atomically(path, |file| {
        file.write_all(&bytes)?;
        Ok(())
    })?;
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_delimiters_are_escaped() {
        assert_eq!(pdf_string_bytes("a(b)c\\"), b"a\\(b\\)c\\\\".to_vec());
        assert_eq!(pdf_string_bytes("café"), b"caf\xe9".to_vec());
        assert_eq!(pdf_string_bytes("日"), b"?".to_vec());
    }

    #[test]
    fn xref_offsets_point_at_objects() {
        let report = ClassReport {
            class_name: "7A".to_string(),
            exam_columns: vec![],
            rows: vec![],
        };
        let (bytes, summary) = render_report(&report, &PdfLayout::default());
        assert_eq!(summary.pages, 1);
        let marker = b"startxref\n";
        let at = bytes
            .windows(marker.len())
            .rposition(|w| w == marker)
            .expect("startxref")
            + marker.len();
        let tail = std::str::from_utf8(&bytes[at..]).expect("ascii trailer");
        let xref_at: usize = tail.lines().next().and_then(|l| l.parse().ok()).expect("offset");
        assert!(bytes[xref_at..].starts_with(b"xref"));
        let xref = std::str::from_utf8(&bytes[xref_at..]).expect("ascii xref");
        let first_entry = xref.lines().nth(3).expect("entry for object 1");
        let offset: usize = first_entry[..10].parse().expect("offset");
        assert!(bytes[offset..].starts_with(b"1 0 obj"));
    }
}
