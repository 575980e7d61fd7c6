// src/export/mod.rs
//
// Minimal Office Open XML workbook writer: one worksheet per source, inline
// string cells, no shared-strings or styles part.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, TimeZone};
use std::{
    collections::HashSet,
    fmt::{Display, Write as _},
    io::{Cursor, Write},
};
use zip::{write::SimpleFileOptions, CompressionMethod, ZipWriter};

use crate::extract::ExtractionResult;

/// Hard limit imposed by spreadsheet applications.
pub const MAX_SHEET_NAME_LEN: usize = 31;

pub const XLSX_MIME: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

const XML_DECL: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#;
const NS_MAIN: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";
const NS_REL: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const NS_PKG_REL: &str = "http://schemas.openxmlformats.org/package/2006/relationships";

/// `SpecialBank_FD_Rates_YYYYmmdd_HHMMSS.xlsx`
pub fn export_filename<Tz: TimeZone>(now: &DateTime<Tz>) -> String
where
    Tz::Offset: Display,
{
    format!("SpecialBank_FD_Rates_{}.xlsx", now.format("%Y%m%d_%H%M%S"))
}

/// Sheet name for `id`: characters spreadsheets reject become `_`, the result
/// is cut to 31 characters and made unique against `taken` (case-insensitively).
pub fn sheet_name(id: &str, taken: &HashSet<String>) -> String {
    let cleaned: String = id
        .chars()
        .map(|c| match c {
            '[' | ']' | ':' | '*' | '?' | '/' | '\\' => '_',
            c => c,
        })
        .collect();
    let cleaned = cleaned.trim_matches('\'');
    let base: String = if cleaned.is_empty() {
        "Sheet".to_string()
    } else {
        cleaned.chars().take(MAX_SHEET_NAME_LEN).collect()
    };

    let mut candidate = base.clone();
    let mut n = 1;
    while taken.contains(&candidate.to_lowercase()) {
        n += 1;
        let suffix = format!("~{}", n);
        let keep = MAX_SHEET_NAME_LEN - suffix.chars().count();
        candidate = base.chars().take(keep).collect::<String>() + &suffix;
    }
    candidate
}

/// Serialize `results` into an `.xlsx` workbook. Results without records are
/// left out; having nothing left to write is an error.
pub fn write_workbook<'a, I>(results: I) -> Result<Vec<u8>>
where
    I: IntoIterator<Item = &'a ExtractionResult>,
{
    let mut taken = HashSet::new();
    let mut sheets = Vec::new();
    for result in results {
        if result.records.is_empty() {
            continue;
        }
        let name = sheet_name(&result.source_id, &taken);
        taken.insert(name.to_lowercase());
        sheets.push((name, worksheet_xml(result)));
    }
    if sheets.is_empty() {
        bail!("no records to export");
    }

    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    let mut put = |path: &str, body: &str| -> Result<()> {
        zip.start_file(path, options)
            .with_context(|| format!("starting {}", path))?;
        zip.write_all(body.as_bytes())
            .with_context(|| format!("writing {}", path))?;
        Ok(())
    };

    put("[Content_Types].xml", &content_types_xml(sheets.len()))?;
    put("_rels/.rels", &root_rels_xml())?;
    put("xl/workbook.xml", &workbook_xml(&sheets))?;
    put("xl/_rels/workbook.xml.rels", &workbook_rels_xml(sheets.len()))?;
    for (i, (_, xml)) in sheets.iter().enumerate() {
        put(&format!("xl/worksheets/sheet{}.xml", i + 1), xml)?;
    }

    let cursor = zip.finish().context("finishing workbook archive")?;
    Ok(cursor.into_inner())
}

fn content_types_xml(sheet_count: usize) -> String {
    let mut xml = format!(
        "{XML_DECL}<Types xmlns=\"http://schemas.openxmlformats.org/package/2006/content-types\">\
         <Default Extension=\"rels\" ContentType=\"application/vnd.openxmlformats-package.relationships+xml\"/>\
         <Default Extension=\"xml\" ContentType=\"application/xml\"/>\
         <Override PartName=\"/xl/workbook.xml\" \
         ContentType=\"application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml\"/>"
    );
    for i in 1..=sheet_count {
        let _ = write!(
            xml,
            "<Override PartName=\"/xl/worksheets/sheet{i}.xml\" \
             ContentType=\"application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml\"/>"
        );
    }
    xml.push_str("</Types>");
    xml
}

fn root_rels_xml() -> String {
    format!(
        "{XML_DECL}<Relationships xmlns=\"{NS_PKG_REL}\">\
         <Relationship Id=\"rId1\" Type=\"{NS_REL}/officeDocument\" Target=\"xl/workbook.xml\"/>\
         </Relationships>"
    )
}

fn workbook_xml(sheets: &[(String, String)]) -> String {
    let mut xml = format!("{XML_DECL}<workbook xmlns=\"{NS_MAIN}\" xmlns:r=\"{NS_REL}\"><sheets>");
    for (i, (name, _)) in sheets.iter().enumerate() {
        let _ = write!(
            xml,
            "<sheet name=\"{}\" sheetId=\"{}\" r:id=\"rId{}\"/>",
            escape(name),
            i + 1,
            i + 1
        );
    }
    xml.push_str("</sheets></workbook>");
    xml
}

fn workbook_rels_xml(sheet_count: usize) -> String {
    let mut xml = format!("{XML_DECL}<Relationships xmlns=\"{NS_PKG_REL}\">");
    for i in 1..=sheet_count {
        let _ = write!(
            xml,
            "<Relationship Id=\"rId{i}\" Type=\"{NS_REL}/worksheet\" Target=\"worksheets/sheet{i}.xml\"/>"
        );
    }
    xml.push_str("</Relationships>");
    xml
}

fn worksheet_xml(result: &ExtractionResult) -> String {
    let mut xml = format!("{XML_DECL}<worksheet xmlns=\"{NS_MAIN}\"><sheetData>");
    push_row(&mut xml, 1, result.columns.iter().map(String::as_str));
    for (i, record) in result.records.iter().enumerate() {
        push_row(&mut xml, i + 2, record.values());
    }
    xml.push_str("</sheetData></worksheet>");
    xml
}

fn push_row<'a>(xml: &mut String, row: usize, cells: impl Iterator<Item = &'a str>) {
    let _ = write!(xml, "<row r=\"{}\">", row);
    for (col, value) in cells.enumerate() {
        if value.is_empty() {
            continue;
        }
        let _ = write!(
            xml,
            "<c r=\"{}{}\" t=\"inlineStr\"><is><t xml:space=\"preserve\">{}</t></is></c>",
            column_letters(col),
            row,
            escape(value)
        );
    }
    xml.push_str("</row>");
}

/// 0 → `A`, 25 → `Z`, 26 → `AA`.
fn column_letters(mut col: usize) -> String {
    let mut letters = Vec::new();
    loop {
        letters.push(b'A' + (col % 26) as u8);
        if col < 26 {
            break;
        }
        col = col / 26 - 1;
    }
    letters.reverse();
    String::from_utf8(letters).unwrap_or_default()
}

fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            // not representable in XML 1.0
            c if (c as u32) < 0x20 && !matches!(c, '\t' | '\n' | '\r') => {}
            c => out.push(c),
        }
    }
    out
}
