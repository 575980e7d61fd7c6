// src/table/structural.rs

use scraper::Html;

use super::{cell_text, fit_row, select_table, TableMatrix, TD, TH, TR};
use crate::error::TableError;

/// Strict `th`/`td` walk of the `position`-th table.
///
/// Every `<th>` in the table forms the single header row and fixes the
/// column count. Each `<tr>` after the first yields one body row of its
/// `<td>` cells, padded or cut to that count.
pub fn parse_structural(doc: &Html, position: usize) -> Result<TableMatrix, TableError> {
    let table = select_table(doc, position)?;

    let header: Vec<String> = table.select(&TH).map(cell_text).collect();
    let width = header.len();
    if width == 0 {
        return Err(TableError::Parse(format!(
            "table at position {} has no header cells",
            position
        )));
    }

    let body = table
        .select(&TR)
        .skip(1)
        .map(|tr| fit_row(tr.select(&TD).map(cell_text).collect(), width))
        .collect();

    Ok(TableMatrix {
        header_rows: vec![header],
        body,
    })
}
