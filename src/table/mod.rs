// src/table/mod.rs

pub mod generic;
pub mod structural;

pub use generic::parse_generic;
pub use structural::parse_structural;

use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};

use crate::error::TableError;

pub(crate) static TABLE: Lazy<Selector> =
    Lazy::new(|| Selector::parse("table").expect("table selector should parse"));
pub(crate) static TR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("tr").expect("tr selector should parse"));
pub(crate) static TH: Lazy<Selector> =
    Lazy::new(|| Selector::parse("th").expect("th selector should parse"));
pub(crate) static TD: Lazy<Selector> =
    Lazy::new(|| Selector::parse("td").expect("td selector should parse"));

/// Cell grid read out of one `<table>`, before label flattening and row
/// reconciliation.
///
/// `header_rows` holds one entry per header level; most tables have exactly
/// one. Body rows may be ragged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableMatrix {
    pub header_rows: Vec<Vec<String>>,
    pub body: Vec<Vec<String>>,
}

impl TableMatrix {
    /// Column count the records of this table will have.
    pub fn width(&self) -> usize {
        match self.header_rows.iter().map(Vec::len).max() {
            Some(w) => w,
            None => self.body.iter().map(Vec::len).max().unwrap_or(0),
        }
    }
}

/// Number of `<table>` elements anywhere in the document, nested ones included.
pub fn count_tables(doc: &Html) -> usize {
    doc.select(&TABLE).count()
}

/// Pick the `position`-th table in document order.
pub(crate) fn select_table(doc: &Html, position: usize) -> Result<ElementRef<'_>, TableError> {
    let mut tables = doc.select(&TABLE);
    match tables.nth(position) {
        Some(table) => Ok(table),
        None => Err(TableError::NotFound {
            position,
            found: count_tables(doc),
        }),
    }
}

/// Text content of a cell with line breaks folded to spaces and outer
/// whitespace removed.
pub fn cell_text(cell: ElementRef<'_>) -> String {
    let raw: String = cell.text().collect();
    raw.replace("\r\n", " ")
        .replace(['\n', '\r'], " ")
        .trim()
        .to_string()
}

/// Pad with empty strings or cut so that `row.len() == width`.
pub fn fit_row(mut row: Vec<String>, width: usize) -> Vec<String> {
    row.resize(width, String::new());
    row
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_table_bounds() {
        let doc = Html::parse_document(
            "<table id='a'><tr><td>1</td></tr></table>\
             <table id='b'><tr><td>2</td></tr></table>",
        );
        assert_eq!(count_tables(&doc), 2);
        assert_eq!(select_table(&doc, 1).unwrap().value().attr("id"), Some("b"));
        assert_eq!(
            select_table(&doc, 2).unwrap_err(),
            TableError::NotFound {
                position: 2,
                found: 2
            }
        );
    }

    #[test]
    fn test_no_tables_is_not_found() {
        let doc = Html::parse_document("<p>maintenance</p>");
        assert_eq!(
            select_table(&doc, 0).unwrap_err(),
            TableError::NotFound {
                position: 0,
                found: 0
            }
        );
    }

    #[test]
    fn test_cell_text_folds_line_breaks() {
        let doc = Html::parse_fragment("<table><tr><td>\n  Fixed\nDeposit \r\n</td></tr></table>");
        let td = doc.select(&TD).next().unwrap();
        assert_eq!(cell_text(td), "Fixed Deposit");
    }

    #[test]
    fn test_fit_row() {
        let row = |cells: &[&str]| cells.iter().map(|c| c.to_string()).collect::<Vec<_>>();
        assert_eq!(fit_row(row(&["a", "b"]), 4), row(&["a", "b", "", ""]));
        assert_eq!(
            fit_row(row(&["a", "b", "c", "d", "e", "f"]), 4),
            row(&["a", "b", "c", "d"])
        );
        assert_eq!(fit_row(row(&["a"]), 1), row(&["a"]));
    }
}
