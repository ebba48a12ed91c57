use crate::core::io::traits::TextFile;
use crate::core::models::sphere::{SphereRecord, SphereSet, rewrite_cluster_header};
use nalgebra::Point3;
use std::io::{self, BufRead, Write};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SphereError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Parse error on line {line}: {kind}")]
    Parse {
        line: usize,
        kind: SphereParseErrorKind,
    },
    #[error("Sphere file has no header lines; the cluster count header is required")]
    MissingHeader,
    #[error("Record index {index} is out of range for a set of {count} spheres")]
    UnknownRecord { index: usize, count: usize },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SphereParseErrorKind {
    #[error("Sphere record needs at least 4 fields (id x y z), found {found}")]
    TooFewFields { found: usize },
    #[error("Invalid sphere id '{value}'")]
    InvalidId { value: String },
    #[error("Invalid {axis} coordinate '{value}'")]
    InvalidCoordinate { axis: char, value: String },
}

/// Returns `true` for lines that belong to the header block of a sphere file.
pub fn is_header_line(line: &str) -> bool {
    line.chars().next().is_some_and(|c| !c.is_whitespace())
}

/// Parses one data line of a sphere file.
pub fn parse_record(line: &str) -> Result<SphereRecord, SphereParseErrorKind> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    if tokens.len() < 4 {
        return Err(SphereParseErrorKind::TooFewFields {
            found: tokens.len(),
        });
    }

    let id = tokens[0]
        .parse::<i64>()
        .map_err(|_| SphereParseErrorKind::InvalidId {
            value: tokens[0].to_string(),
        })?;

    let mut coords = [0.0; 3];
    for (slot, (axis, token)) in coords.iter_mut().zip(['x', 'y', 'z'].into_iter().zip(&tokens[1..4])) {
        *slot = token
            .parse::<f64>()
            .map_err(|_| SphereParseErrorKind::InvalidCoordinate {
                axis,
                value: token.to_string(),
            })?;
    }

    Ok(SphereRecord {
        id,
        position: Point3::new(coords[0], coords[1], coords[2]),
        extra_fields: tokens[4..].iter().map(|t| t.to_string()).collect(),
        raw: line.to_string(),
    })
}

impl TextFile for SphereSet {
    type Error = SphereError;

    fn read_from(reader: &mut impl BufRead) -> Result<Self, Self::Error> {
        let mut headers = Vec::new();
        let mut records = Vec::new();

        for (line_num, line_res) in reader.lines().enumerate() {
            let line = line_res?;
            if line.trim().is_empty() {
                continue;
            }
            if is_header_line(&line) {
                headers.push(line);
                continue;
            }
            let record = parse_record(&line).map_err(|kind| SphereError::Parse {
                line: line_num + 1,
                kind,
            })?;
            records.push(record);
        }

        Ok(SphereSet::new(headers, records))
    }

    fn write_to(&self, writer: &mut impl Write) -> Result<(), Self::Error> {
        for header in self.headers() {
            writeln!(writer, "{}", header)?;
        }
        for record in self.records() {
            writeln!(writer, "{}", record.raw)?;
        }
        Ok(())
    }
}

/// Looks up the records of one subset, failing on an out-of-range index.
fn member_records<'a>(set: &'a SphereSet, members: &[usize]) -> Result<Vec<&'a SphereRecord>, SphereError> {
    members
        .iter()
        .map(|&index| {
            set.records().get(index).ok_or(SphereError::UnknownRecord {
                index,
                count: set.len(),
            })
        })
        .collect()
}

/// Writes a sphere file containing the given subset of records.
///
/// The header prefix is copied verbatim and the last header line is rewritten so
/// its count matches the number of records written beneath it. Nothing is
/// written when a member index is out of range.
pub fn write_subset(
    set: &SphereSet,
    members: &[usize],
    writer: &mut impl Write,
) -> Result<(), SphereError> {
    let last = set.last_header().ok_or(SphereError::MissingHeader)?;
    let records = member_records(set, members)?;
    for header in set.header_prefix() {
        writeln!(writer, "{}", header)?;
    }
    writeln!(writer, "{}", rewrite_cluster_header(last, records.len(), None))?;
    for record in records {
        writeln!(writer, "{}", record.raw)?;
    }
    Ok(())
}

/// Writes several record subsets into one sphere file, one cluster block each.
///
/// The header prefix is written once; every block starts with its own copy of the
/// last header line, renumbered for the block and carrying its member count.
pub fn write_blocks(
    set: &SphereSet,
    blocks: &[Vec<usize>],
    writer: &mut impl Write,
) -> Result<(), SphereError> {
    let last = set.last_header().ok_or(SphereError::MissingHeader)?;
    let blocks = blocks
        .iter()
        .map(|members| member_records(set, members))
        .collect::<Result<Vec<_>, _>>()?;
    for header in set.header_prefix() {
        writeln!(writer, "{}", header)?;
    }
    for (cluster_idx, records) in blocks.iter().enumerate() {
        writeln!(
            writer,
            "{}",
            rewrite_cluster_header(last, records.len(), Some(cluster_idx))
        )?;
        for record in records {
            writeln!(writer, "{}", record.raw)?;
        }
    }
    Ok(())
}
