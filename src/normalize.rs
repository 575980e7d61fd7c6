// src/normalize.rs

use serde::{ser::SerializeMap, Serialize, Serializer};
use std::collections::HashSet;

use crate::table::{fit_row, TableMatrix};

/// One table row as an ordered label → value mapping.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record {
    fields: Vec<(String, String)>,
}

impl Record {
    /// Zip `labels` with `values` by position. Labels are expected to be
    /// unique; a repeated label replaces the earlier value in place.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut record = Record::default();
        for (k, v) in pairs {
            record.insert(k.into(), v.into());
        }
        record
    }

    pub fn insert(&mut self, label: String, value: String) {
        match self.fields.iter_mut().find(|(k, _)| *k == label) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((label, value)),
        }
    }

    pub fn get(&self, label: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == label)
            .map(|(_, v)| v.as_str())
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(k, _)| k.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (k, v) in &self.fields {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

/// Flatten the header levels of `matrix` into one unique label per column.
///
/// Levels are joined with a single space; a level equal to the one above it
/// (a vertically spanning cell) is not repeated. Blank labels become
/// `Unnamed: {i}` and a label already taken gets `_{i}` appended, `i` being
/// the column index. Tables without header rows are labelled `0`, `1`, ...
pub fn column_labels(matrix: &TableMatrix) -> Vec<String> {
    let width = matrix.width();
    if matrix.header_rows.is_empty() {
        return (0..width).map(|i| i.to_string()).collect();
    }

    let mut seen = HashSet::with_capacity(width);
    (0..width)
        .map(|col| {
            let mut levels: Vec<&str> = Vec::with_capacity(matrix.header_rows.len());
            for row in &matrix.header_rows {
                let level = row.get(col).map(|s| s.trim()).unwrap_or("");
                if !level.is_empty() && levels.last() != Some(&level) {
                    levels.push(level);
                }
            }

            let mut label = levels.join(" ").trim().to_string();
            if label.is_empty() {
                label = format!("Unnamed: {}", col);
            }
            while seen.contains(&label) {
                label = format!("{}_{}", label, col);
            }
            seen.insert(label.clone());
            label
        })
        .collect()
}

fn is_blank(row: &[String]) -> bool {
    row.iter().all(|cell| cell.trim().is_empty())
}

/// Turn a parsed table into records: blank rows dropped, every remaining row
/// fitted to the header width and keyed by [`column_labels`].
pub fn normalize(matrix: &TableMatrix) -> Vec<Record> {
    let labels = column_labels(matrix);
    let width = labels.len();

    matrix
        .body
        .iter()
        .filter(|row| !is_blank(row))
        .map(|row| {
            let cells = fit_row(row.clone(), width);
            Record::from_pairs(labels.iter().cloned().zip(cells))
        })
        .collect()
}
