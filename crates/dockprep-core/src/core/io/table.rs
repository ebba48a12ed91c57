//! Tab-separated result tables.

use crate::core::models::pose::HitRow;
use crate::core::models::score::{OutdockRecord, SCORE_COLUMNS};
use std::io::{self, Read, Write};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TableError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("TSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("Table has no '{0}' column")]
    MissingColumn(String),
    #[error("Row {row}: invalid number '{value}' in column '{column}'")]
    InvalidNumber {
        row: usize,
        column: String,
        value: String,
    },
}

/// How a score table is laid out on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreLayout {
    /// No header row and no pose-cluster column; the enrichment tools read this.
    Compact,
    /// Header row and every identifying column.
    Full,
}

fn tsv_writer<W: Write>(writer: W, has_headers: bool) -> csv::Writer<W> {
    csv::WriterBuilder::new()
        .delimiter(b'\t')
        .has_headers(has_headers)
        .flexible(true)
        .from_writer(writer)
}

pub fn write_scores<'a, W: Write>(
    records: impl IntoIterator<Item = &'a OutdockRecord>,
    layout: ScoreLayout,
    writer: W,
) -> Result<(), TableError> {
    let mut out = tsv_writer(writer, false);
    let full = layout == ScoreLayout::Full;
    if full {
        out.write_record(SCORE_COLUMNS)?;
    }
    for record in records {
        out.write_record(record.to_fields(full))?;
    }
    out.flush()?;
    Ok(())
}

pub fn write_hits<'a, W: Write>(
    rows: impl IntoIterator<Item = &'a HitRow>,
    writer: W,
) -> Result<(), TableError> {
    let mut out = tsv_writer(writer, true);
    let mut wrote_any = false;
    for row in rows {
        out.serialize(row)?;
        wrote_any = true;
    }
    if !wrote_any {
        out.write_record(HIT_COLUMNS)?;
    }
    out.flush()?;
    Ok(())
}

/// Column names of the hit coordinate table.
pub const HIT_COLUMNS: [&str; 10] = [
    "sub_idx", "cls_idx", "mol_name", "Total", "rec_x", "rec_y", "rec_z", "lig_x", "lig_y",
    "lig_z",
];

/// A generic table with a header row, kept as text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn read_from<R: Read>(reader: R) -> Result<Self, TableError> {
        let mut rdr = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(true)
            .from_reader(reader);
        let headers = rdr.headers()?.iter().map(str::to_string).collect();
        let rows = rdr
            .records()
            .map(|r| r.map(|rec| rec.iter().map(str::to_string).collect()))
            .collect::<Result<Vec<Vec<String>>, _>>()?;
        Ok(Self { headers, rows })
    }

    pub fn write_to<W: Write>(&self, writer: W) -> Result<(), TableError> {
        let mut out = tsv_writer(writer, false);
        out.write_record(&self.headers)?;
        for row in &self.rows {
            out.write_record(row)?;
        }
        out.flush()?;
        Ok(())
    }

    pub fn column_index(&self, name: &str) -> Result<usize, TableError> {
        self.headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| TableError::MissingColumn(name.to_string()))
    }

    /// Parses every value of a column as a float.
    pub fn numeric_column(&self, name: &str) -> Result<Vec<f64>, TableError> {
        let idx = self.column_index(name)?;
        self.rows
            .iter()
            .enumerate()
            .map(|(row, fields)| {
                let value = fields.get(idx).map(String::as_str).unwrap_or_default();
                value.parse().map_err(|_| TableError::InvalidNumber {
                    row: row + 1,
                    column: name.to_string(),
                    value: value.to_string(),
                })
            })
            .collect()
    }

    /// Removes the named columns; names that are absent are ignored.
    pub fn drop_columns(&mut self, names: &[&str]) {
        let keep: Vec<bool> = self.headers.iter().map(|h| !names.contains(&h.as_str())).collect();
        let filter = |fields: &mut Vec<String>| {
            let mut i = 0;
            fields.retain(|_| {
                let kept = keep.get(i).copied().unwrap_or(true);
                i += 1;
                kept
            });
        };
        filter(&mut self.headers);
        for row in &mut self.rows {
            filter(row);
        }
    }

    /// Appends a column holding the same value on every row.
    pub fn push_constant_column(&mut self, name: &str, value: &str) {
        self.headers.push(name.to_string());
        for row in &mut self.rows {
            row.push(value.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::score::ScoreValue;

    fn record() -> OutdockRecord {
        OutdockRecord {
            shard: 1,
            pose_cluster: 2,
            pose_index: 5,
            name: Some("ZINC5".to_string()),
            terms: vec![ScoreValue::Int(0), ScoreValue::Float(-12.5)],
        }
    }

    fn hit() -> HitRow {
        HitRow {
            sub_idx: 1,
            cls_idx: 2,
            mol_name: "ZINC5".to_string(),
            total: -12.5,
            rec_x: "1.000".to_string(),
            rec_y: "2.5".to_string(),
            rec_z: "-3.0".to_string(),
            lig_x: "4.0".to_string(),
            lig_y: "5.00".to_string(),
            lig_z: "6.25".to_string(),
        }
    }

    #[test]
    fn compact_scores_have_no_header_or_pose_cluster() {
        let mut out = Vec::new();
        write_scores([&record()], ScoreLayout::Compact, &mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "1\t5\tZINC5\t0\t-12.5\n");
    }

    #[test]
    fn full_scores_start_with_header() {
        let mut out = Vec::new();
        write_scores([&record()], ScoreLayout::Full, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next().unwrap(), SCORE_COLUMNS.join("\t"));
        assert_eq!(lines.next().unwrap(), "1\t2\t5\tZINC5\t0\t-12.5");
    }

    #[test]
    fn hits_are_written_with_header() {
        let mut out = Vec::new();
        write_hits([&hit()], &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], HIT_COLUMNS.join("\t"));
        assert_eq!(lines[1], "1\t2\tZINC5\t-12.5\t1.000\t2.5\t-3.0\t4.0\t5.00\t6.25");
    }

    #[test]
    fn empty_hit_table_still_has_header() {
        let mut out = Vec::new();
        write_hits(std::iter::empty(), &mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), HIT_COLUMNS.join("\t") + "\n");
    }

    #[test]
    fn generic_table_edits() {
        let mut out = Vec::new();
        write_hits([&hit()], &mut out).unwrap();
        let mut table = Table::read_from(out.as_slice()).unwrap();
        assert_eq!(table.numeric_column("Total").unwrap(), vec![-12.5]);

        table.drop_columns(&["lig_x", "lig_y", "lig_z"]);
        table.push_constant_column("label", "k4_0");
        assert_eq!(table.headers.len(), 8);
        assert_eq!(table.rows[0].last().unwrap(), "k4_0");
        assert!(matches!(
            table.column_index("lig_x"),
            Err(TableError::MissingColumn(_))
        ));
    }
}
