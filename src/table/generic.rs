// src/table/generic.rs

use scraper::{ElementRef, Html};

use super::{cell_text, select_table, TableMatrix, TR};
use crate::error::TableError;

/// Upper bound on `colspan`/`rowspan` so a typo like `colspan="9999999"`
/// cannot blow up the grid.
const MAX_SPAN: usize = 1000;

struct Cell {
    text: String,
    colspan: usize,
    rowspan: usize,
}

struct Row {
    cells: Vec<Cell>,
    in_thead: bool,
    all_th: bool,
}

/// A vertically spanning cell still owed to the rows below.
struct Carry {
    text: String,
    rows_left: usize,
}

/// Layout-aware parse of the `position`-th table.
///
/// Spans are expanded into a rectangular grid. Header rows are the rows of
/// `<thead>`, or when there is none, the leading run of rows made only of
/// `<th>` cells.
pub fn parse_generic(doc: &Html, position: usize) -> Result<TableMatrix, TableError> {
    let table = select_table(doc, position)?;

    let rows: Vec<Row> = table
        .select(&TR)
        .filter(|tr| owning_table(*tr).map(|t| t.id()) == Some(table.id()))
        .map(read_row)
        .collect();
    if rows.is_empty() {
        return Err(TableError::Parse(format!(
            "table at position {} has no rows",
            position
        )));
    }

    let header_count = if rows.iter().any(|r| r.in_thead) {
        rows.iter().take_while(|r| r.in_thead).count()
    } else {
        rows.iter()
            .take_while(|r| r.all_th && !r.cells.is_empty())
            .count()
    };

    let mut grid = expand_spans(rows);
    let body = grid.split_off(header_count);
    Ok(TableMatrix {
        header_rows: grid,
        body,
    })
}

/// Nearest `<table>` ancestor, so rows of nested tables are skipped.
fn owning_table(tr: ElementRef<'_>) -> Option<ElementRef<'_>> {
    tr.ancestors()
        .filter_map(ElementRef::wrap)
        .find(|el| el.value().name() == "table")
}

fn span_attr(cell: ElementRef<'_>, name: &str) -> usize {
    cell.value()
        .attr(name)
        .and_then(|v| v.trim().parse::<usize>().ok())
        .filter(|&n| n > 0)
        .unwrap_or(1)
        .min(MAX_SPAN)
}

fn read_row(tr: ElementRef<'_>) -> Row {
    let in_thead = tr
        .parent()
        .and_then(ElementRef::wrap)
        .map(|p| p.value().name() == "thead")
        .unwrap_or(false);

    let mut all_th = true;
    let cells = tr
        .children()
        .filter_map(ElementRef::wrap)
        .filter(|c| matches!(c.value().name(), "td" | "th"))
        .map(|c| {
            all_th &= c.value().name() == "th";
            Cell {
                text: cell_text(c),
                colspan: span_attr(c, "colspan"),
                rowspan: span_attr(c, "rowspan"),
            }
        })
        .collect();

    Row {
        cells,
        in_thead,
        all_th,
    }
}

fn expand_spans(rows: Vec<Row>) -> Vec<Vec<String>> {
    let mut carry: Vec<Option<Carry>> = Vec::new();
    let mut grid = Vec::with_capacity(rows.len());

    let mut in_thead = false;

    for row in rows {
        // Head and body are expanded separately; a head rowspan stops at the body.
        if in_thead && !row.in_thead {
            carry.clear();
        }
        in_thead = row.in_thead;

        let mut out: Vec<String> = Vec::new();
        let mut cells = row.cells.into_iter();

        loop {
            let col = out.len();
            if let Some(text) = take_carry(&mut carry, col) {
                out.push(text);
                continue;
            }
            match cells.next() {
                Some(cell) => {
                    for _ in 0..cell.colspan {
                        let col = out.len();
                        // A colspan over a pending rowspan wins the slot and
                        // uses up that row of the span.
                        take_carry(&mut carry, col);
                        if cell.rowspan > 1 {
                            if carry.len() <= col {
                                carry.resize_with(col + 1, || None);
                            }
                            carry[col] = Some(Carry {
                                text: cell.text.clone(),
                                rows_left: cell.rowspan - 1,
                            });
                        }
                        out.push(cell.text.clone());
                    }
                }
                None => {
                    // Cells ran out, but a rowspan further right may still land here.
                    if carry
                        .get(col..)
                        .map_or(false, |rest| rest.iter().any(Option::is_some))
                    {
                        out.push(String::new());
                    } else {
                        break;
                    }
                }
            }
        }

        grid.push(out);
    }

    grid
}

fn take_carry(carry: &mut [Option<Carry>], col: usize) -> Option<String> {
    let slot = carry.get_mut(col)?;
    let c = slot.as_mut()?;
    let text = c.text.clone();
    c.rows_left -= 1;
    if c.rows_left == 0 {
        *slot = None;
    }
    Some(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn test_simple_table() {
        let doc = Html::parse_document(
            r#"<table>
                 <tr><th>Term</th><th>Rate</th></tr>
                 <tr><td>1 Month</td><td>8.00</td></tr>
                 <tr><td>3 Months</td><td>8.50</td></tr>
               </table>"#,
        );
        let m = parse_generic(&doc, 0).unwrap();
        assert_eq!(m.header_rows, vec![strings(&["Term", "Rate"])]);
        assert_eq!(
            m.body,
            vec![strings(&["1 Month", "8.00"]), strings(&["3 Months", "8.50"])]
        );
    }

    #[test]
    fn test_composite_header_spans() {
        let doc = Html::parse_document(
            r#"<table>
                 <thead>
                   <tr><th rowspan="2">Term</th><th colspan="2">Rate</th></tr>
                   <tr><th>1yr</th><th>2yr</th></tr>
                 </thead>
                 <tbody>
                   <tr><td>Monthly</td><td>7.5</td><td>8.0</td></tr>
                 </tbody>
               </table>"#,
        );
        let m = parse_generic(&doc, 0).unwrap();
        assert_eq!(
            m.header_rows,
            vec![
                strings(&["Term", "Rate", "Rate"]),
                strings(&["Term", "1yr", "2yr"])
            ]
        );
        assert_eq!(m.body, vec![strings(&["Monthly", "7.5", "8.0"])]);
    }

    #[test]
    fn test_body_rowspan_fills_following_rows() {
        let doc = Html::parse_document(
            r#"<table>
                 <tr><th>Product</th><th>Term</th><th>Rate</th></tr>
                 <tr><td rowspan="2">Senior</td><td>1yr</td><td>9.0</td></tr>
                 <tr><td>2yr</td><td>9.5</td></tr>
               </table>"#,
        );
        let m = parse_generic(&doc, 0).unwrap();
        assert_eq!(
            m.body,
            vec![
                strings(&["Senior", "1yr", "9.0"]),
                strings(&["Senior", "2yr", "9.5"])
            ]
        );
    }

    #[test]
    fn test_trailing_rowspan_after_short_row() {
        let doc = Html::parse_document(
            r#"<table>
                 <tr><th>A</th><th>B</th><th>C</th></tr>
                 <tr><td>a1</td><td>b1</td><td rowspan="2">c</td></tr>
                 <tr><td>a2</td></tr>
               </table>"#,
        );
        let m = parse_generic(&doc, 0).unwrap();
        assert_eq!(m.body[1], strings(&["a2", "", "c"]));
    }

    #[test]
    fn test_colspan_over_pending_rowspan_keeps_columns_aligned() {
        let doc = Html::parse_document(
            r#"<table>
                 <tr><th>A</th><th>B</th><th>C</th></tr>
                 <tr><td>a1</td><td rowspan="2">b1</td><td>c1</td></tr>
                 <tr><td colspan="2">wide</td><td>c2</td></tr>
                 <tr><td>a3</td><td>b3</td><td>c3</td></tr>
               </table>"#,
        );
        let m = parse_generic(&doc, 0).unwrap();
        assert_eq!(
            m.body,
            vec![
                strings(&["a1", "b1", "c1"]),
                strings(&["wide", "wide", "c2"]),
                strings(&["a3", "b3", "c3"])
            ]
        );

        let records = crate::normalize::normalize(&m);
        assert_eq!(records[2].get("B"), Some("b3"));
        assert_eq!(records[2].get("C"), Some("c3"));
    }

    #[test]
    fn test_overlapped_rowspan_still_fills_remaining_rows() {
        let doc = Html::parse_document(
            r#"<table>
                 <tr><th>A</th><th>B</th></tr>
                 <tr><td>a1</td><td rowspan="3">b</td></tr>
                 <tr><td colspan="2">wide</td></tr>
                 <tr><td>a3</td></tr>
               </table>"#,
        );
        let m = parse_generic(&doc, 0).unwrap();
        assert_eq!(m.body[1], strings(&["wide", "wide"]));
        assert_eq!(m.body[2], strings(&["a3", "b"]));
    }

    #[test]
    fn test_thead_rowspan_stops_at_body() {
        let doc = Html::parse_document(
            r#"<table>
                 <thead><tr><th rowspan="2">Term</th><th>Rate</th></tr></thead>
                 <tbody><tr><td>1yr</td><td>9.0</td></tr></tbody>
               </table>"#,
        );
        let m = parse_generic(&doc, 0).unwrap();
        assert_eq!(m.header_rows, vec![strings(&["Term", "Rate"])]);
        assert_eq!(m.body, vec![strings(&["1yr", "9.0"])]);
    }

    #[test]
    fn test_nested_table_rows_are_not_mixed_in() {
        let doc = Html::parse_document(
            r#"<table>
                 <tr><th>Outer</th></tr>
                 <tr><td><table><tr><td>inner</td></tr></table></td></tr>
               </table>"#,
        );
        let outer = parse_generic(&doc, 0).unwrap();
        assert_eq!(outer.header_rows, vec![strings(&["Outer"])]);
        assert_eq!(outer.body.len(), 1);

        let inner = parse_generic(&doc, 1).unwrap();
        assert!(inner.header_rows.is_empty());
        assert_eq!(inner.body, vec![strings(&["inner"])]);
    }

    #[test]
    fn test_headerless_table() {
        let doc = Html::parse_document(
            "<table><tr><td>x</td><td>y</td></tr><tr><td>z</td></tr></table>",
        );
        let m = parse_generic(&doc, 0).unwrap();
        assert!(m.header_rows.is_empty());
        assert_eq!(m.width(), 2);
    }

    #[test]
    fn test_out_of_range_and_empty_table() {
        let doc = Html::parse_document("<table></table><table><tr><td>1</td></tr></table>");
        assert_eq!(
            parse_generic(&doc, 2).unwrap_err(),
            TableError::NotFound {
                position: 2,
                found: 2
            }
        );
        assert!(matches!(
            parse_generic(&doc, 0).unwrap_err(),
            TableError::Parse(_)
        ));
    }
}
