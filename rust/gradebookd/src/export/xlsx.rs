//! Minimal SpreadsheetML (.xlsx) writer: shared strings, one bold header
//! style, numeric and text cells.

use std::collections::HashMap;
use std::io::{Seek, Write};
use std::path::Path;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::Result;
use crate::report::{ClassReport, MISSING_SCORE};

pub const REPORT_SHEET_NAME: &str = "Grades & Attendance";

const NS_MAIN: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";
const NS_REL: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const NS_PKG_REL: &str = "http://schemas.openxmlformats.org/package/2006/relationships";
const XML_DECL: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n";

#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Text(String),
    Number(f64),
}

impl From<&str> for Cell {
    fn from(s: &str) -> Self {
        Cell::Text(s.to_string())
    }
}

impl From<String> for Cell {
    fn from(s: String) -> Self {
        Cell::Text(s)
    }
}

impl From<f64> for Cell {
    fn from(v: f64) -> Self {
        Cell::Number(v)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Sheet {
    pub name: String,
    pub rows: Vec<Vec<Cell>>,
    /// Render the first row in bold.
    pub header: bool,
}

impl Sheet {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rows: Vec::new(),
            header: false,
        }
    }

    pub fn with_header(mut self, cells: Vec<Cell>) -> Self {
        self.rows.insert(0, cells);
        self.header = true;
        self
    }

    pub fn push_row(&mut self, cells: Vec<Cell>) {
        self.rows.push(cells);
    }
}

pub fn report_sheet(report: &ClassReport) -> Sheet {
    let mut header: Vec<Cell> = vec!["Name".into(), "Seat Number".into(), "Total Absences".into()];
    header.extend(report.exam_columns.iter().map(|e| Cell::from(e.as_str())));

    let mut sheet = Sheet::new(REPORT_SHEET_NAME).with_header(header);
    for row in &report.rows {
        let mut cells: Vec<Cell> = vec![
            row.name.as_str().into(),
            row.seat_label.clone().unwrap_or_default().into(),
            (row.absences as f64).into(),
        ];
        cells.extend(row.scores.iter().map(|s| match s {
            Some(v) => Cell::Number(*v),
            None => Cell::from(MISSING_SCORE),
        }));
        sheet.push_row(cells);
    }
    sheet
}

pub fn write_report(report: &ClassReport, path: &Path) -> Result<()> {
    let sheet = report_sheet(report);
    super::write_atomically(path, |file| {
        write_workbook(file, std::slice::from_ref(&sheet))?;
        Ok(())
    })
}

/// Column letters for a zero-based index: 0 → A, 25 → Z, 26 → AA.
pub fn column_name(mut idx: usize) -> String {
    let mut out = Vec::new();
    loop {
        out.push(b'A' + (idx % 26) as u8);
        if idx < 26 {
            break;
        }
        idx = idx / 26 - 1;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}

fn xml_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\t' | '\n' | '\r' => out.push(ch),
            c if (c as u32) < 0x20 => {}
            c => out.push(c),
        }
    }
    out
}

#[derive(Default)]
struct SharedStrings {
    index: HashMap<String, usize>,
    ordered: Vec<String>,
    refs: usize,
}

impl SharedStrings {
    fn intern(&mut self, s: &str) -> usize {
        self.refs += 1;
        if let Some(&i) = self.index.get(s) {
            return i;
        }
        let i = self.ordered.len();
        self.index.insert(s.to_string(), i);
        self.ordered.push(s.to_string());
        i
    }

    fn to_xml(&self) -> String {
        let mut xml = format!(
            "{XML_DECL}<sst xmlns=\"{NS_MAIN}\" count=\"{}\" uniqueCount=\"{}\">",
            self.refs,
            self.ordered.len()
        );
        for s in &self.ordered {
            xml.push_str("<si><t xml:space=\"preserve\">");
            xml.push_str(&xml_escape(s));
            xml.push_str("</t></si>");
        }
        xml.push_str("</sst>");
        xml
    }
}

fn sheet_xml(sheet: &Sheet, strings: &mut SharedStrings) -> String {
    let mut xml = format!("{XML_DECL}<worksheet xmlns=\"{NS_MAIN}\"><sheetData>");
    for (r, row) in sheet.rows.iter().enumerate() {
        let row_num = r + 1;
        let style = if sheet.header && r == 0 { " s=\"1\"" } else { "" };
        xml.push_str(&format!("<row r=\"{row_num}\">"));
        for (c, cell) in row.iter().enumerate() {
            let cell_ref = format!("{}{}", column_name(c), row_num);
            match cell {
                Cell::Empty => {}
                Cell::Text(s) => {
                    let idx = strings.intern(s);
                    xml.push_str(&format!("<c r=\"{cell_ref}\" t=\"s\"{style}><v>{idx}</v></c>"));
                }
                Cell::Number(v) if v.is_finite() => {
                    xml.push_str(&format!("<c r=\"{cell_ref}\"{style}><v>{v}</v></c>"));
                }
                Cell::Number(_) => {}
            }
        }
        xml.push_str("</row>");
    }
    xml.push_str("</sheetData></worksheet>");
    xml
}

const STYLES_XML: &str = concat!(
    "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n",
    "<styleSheet xmlns=\"http://schemas.openxmlformats.org/spreadsheetml/2006/main\">",
    "<fonts count=\"2\">",
    "<font><sz val=\"11\"/><name val=\"Calibri\"/></font>",
    "<font><b/><sz val=\"11\"/><name val=\"Calibri\"/></font>",
    "</fonts>",
    "<fills count=\"2\"><fill><patternFill patternType=\"none\"/></fill>",
    "<fill><patternFill patternType=\"gray125\"/></fill></fills>",
    "<borders count=\"1\"><border><left/><right/><top/><bottom/><diagonal/></border></borders>",
    "<cellStyleXfs count=\"1\"><xf numFmtId=\"0\" fontId=\"0\" fillId=\"0\" borderId=\"0\"/></cellStyleXfs>",
    "<cellXfs count=\"2\">",
    "<xf numFmtId=\"0\" fontId=\"0\" fillId=\"0\" borderId=\"0\" xfId=\"0\"/>",
    "<xf numFmtId=\"0\" fontId=\"1\" fillId=\"0\" borderId=\"0\" xfId=\"0\" applyFont=\"1\"/>",
    "</cellXfs>",
    "</styleSheet>"
);

/// Writes a complete workbook and returns the underlying writer.
pub fn write_workbook<W: Write + Seek>(out: W, sheets: &[Sheet]) -> Result<W> {
    let mut zip = ZipWriter::new(out);
    let opts = FileOptions::default().compression_method(CompressionMethod::Deflated);

    let mut content_types = format!(
        "{XML_DECL}<Types xmlns=\"http://schemas.openxmlformats.org/package/2006/content-types\">\
         <Default Extension=\"rels\" ContentType=\"application/vnd.openxmlformats-package.relationships+xml\"/>\
         <Default Extension=\"xml\" ContentType=\"application/xml\"/>\
         <Override PartName=\"/xl/workbook.xml\" ContentType=\"application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml\"/>\
         <Override PartName=\"/xl/styles.xml\" ContentType=\"application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml\"/>\
         <Override PartName=\"/xl/sharedStrings.xml\" ContentType=\"application/vnd.openxmlformats-officedocument.spreadsheetml.sharedStrings+xml\"/>"
    );
    let mut workbook = format!("{XML_DECL}<workbook xmlns=\"{NS_MAIN}\" xmlns:r=\"{NS_REL}\"><sheets>");
    let mut workbook_rels = format!("{XML_DECL}<Relationships xmlns=\"{NS_PKG_REL}\">");
    let mut strings = SharedStrings::default();
    let mut sheet_parts = Vec::with_capacity(sheets.len());

    for (i, sheet) in sheets.iter().enumerate() {
        let n = i + 1;
        content_types.push_str(&format!(
            "<Override PartName=\"/xl/worksheets/sheet{n}.xml\" ContentType=\"application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml\"/>"
        ));
        workbook.push_str(&format!(
            "<sheet name=\"{}\" sheetId=\"{n}\" r:id=\"rId{n}\"/>",
            xml_escape(&sheet.name)
        ));
        workbook_rels.push_str(&format!(
            "<Relationship Id=\"rId{n}\" Type=\"{NS_REL}/worksheet\" Target=\"worksheets/sheet{n}.xml\"/>"
        ));
        sheet_parts.push((format!("xl/worksheets/sheet{n}.xml"), sheet_xml(sheet, &mut strings)));
    }
    let styles_id = sheets.len() + 1;
    let strings_id = sheets.len() + 2;
    workbook_rels.push_str(&format!(
        "<Relationship Id=\"rId{styles_id}\" Type=\"{NS_REL}/styles\" Target=\"styles.xml\"/>\
         <Relationship Id=\"rId{strings_id}\" Type=\"{NS_REL}/sharedStrings\" Target=\"sharedStrings.xml\"/>\
         </Relationships>"
    ));
    content_types.push_str("</Types>");
    workbook.push_str("</sheets></workbook>");

    let root_rels = format!(
        "{XML_DECL}<Relationships xmlns=\"{NS_PKG_REL}\">\
         <Relationship Id=\"rId1\" Type=\"{NS_REL}/officeDocument\" Target=\"xl/workbook.xml\"/>\
         </Relationships>"
    );

    let mut parts: Vec<(String, String)> = vec![
        ("[Content_Types].xml".to_string(), content_types),
        ("_rels/.rels".to_string(), root_rels),
        ("xl/workbook.xml".to_string(), workbook),
        ("xl/_rels/workbook.xml.rels".to_string(), workbook_rels),
        ("xl/styles.xml".to_string(), STYLES_XML.to_string()),
        ("xl/sharedStrings.xml".to_string(), strings.to_xml()),
    ];
    parts.extend(sheet_parts);

    for (name, body) in parts {
        zip.start_file(name, opts)?;
        zip.write_all(body.as_bytes())?;
    }
    Ok(zip.finish()?)
}
