//! Scanner for the gzip-compressed mol2 pose archives written by each shard.
//!
//! Every docked compound starts with a `###  Name:  <compound>` comment line
//! followed by a fixed-size block of score and anchor comment lines. Only blocks
//! of requested compounds are decoded.

use crate::core::models::pose::{ANCHOR_PAIRS, AnchorCoords, PoseBlock, round_score};
use flate2::read::MultiGzDecoder;
use std::collections::HashSet;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;
use thiserror::Error;

/// Lines that follow the name marker in every compound block.
pub const BLOCK_TRAILING_LINES: usize = 28;

const RECEPTOR_ANCHOR_OFFSET: usize = 10;
const LIGAND_ANCHOR_OFFSET: usize = 14;
const TOTAL_SCORE_OFFSET: usize = 28;

#[derive(Debug, Error)]
pub enum PoseArchiveError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Parse error on line {line}: {kind}")]
    Parse { line: usize, kind: PoseParseErrorKind },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PoseParseErrorKind {
    #[error("Block for '{name}' ends after {found} of {expected} lines")]
    TruncatedBlock {
        name: String,
        found: usize,
        expected: usize,
    },
    #[error("Anchor line needs at least 3 coordinate fields")]
    TooFewCoordinateFields,
    #[error("Invalid coordinate '{value}'")]
    InvalidCoordinate { value: String },
    #[error("Invalid total score '{value}'")]
    InvalidScore { value: String },
}

/// Extracts the compound name from a block marker line, if the line is one.
pub fn marker_name(line: &str) -> Option<&str> {
    let pos = line.find("Name:")?;
    let before = &line[..pos];
    let hashes = before.trim_end_matches(' ');
    if hashes.len() == before.len() || !hashes.ends_with("###") {
        return None;
    }

    let after = &line[pos + "Name:".len()..];
    let name = after.trim_start_matches(' ');
    if name.len() == after.len() {
        return None;
    }
    name.split_whitespace().next()
}

/// Opens a gzip-compressed archive for line-by-line reading.
pub fn open_archive(path: &Path) -> Result<impl BufRead, io::Error> {
    let file = File::open(path)?;
    Ok(BufReader::new(MultiGzDecoder::new(file)))
}

/// Decodes one compound block: the marker line plus its trailing lines.
///
/// `first_line` is the 1-based line number of `lines[0]` and is only used for
/// error messages.
pub fn parse_block(
    lines: &[String],
    first_line: usize,
    shard: u32,
    pose_cluster: u32,
) -> Result<PoseBlock, PoseArchiveError> {
    let expected = BLOCK_TRAILING_LINES + 1;
    let name = lines
        .first()
        .and_then(|l| marker_name(l))
        .unwrap_or_default()
        .to_string();
    if lines.len() < expected {
        return Err(PoseArchiveError::Parse {
            line: first_line,
            kind: PoseParseErrorKind::TruncatedBlock {
                name,
                found: lines.len(),
                expected,
            },
        });
    }

    let anchor = |idx: usize| {
        parse_trailing_coords(&lines[idx]).map_err(|kind| PoseArchiveError::Parse {
            line: first_line + idx,
            kind,
        })
    };
    let anchors = |offset: usize| -> Result<[AnchorCoords; ANCHOR_PAIRS], PoseArchiveError> {
        Ok([
            anchor(offset)?,
            anchor(offset + 1)?,
            anchor(offset + 2)?,
            anchor(offset + 3)?,
        ])
    };

    let receptor_anchors = anchors(RECEPTOR_ANCHOR_OFFSET)?;
    let ligand_anchors = anchors(LIGAND_ANCHOR_OFFSET)?;

    let score_token = lines[TOTAL_SCORE_OFFSET]
        .split_whitespace()
        .last()
        .unwrap_or_default();
    let total = score_token
        .parse::<f64>()
        .map_err(|_| PoseArchiveError::Parse {
            line: first_line + TOTAL_SCORE_OFFSET,
            kind: PoseParseErrorKind::InvalidScore {
                value: score_token.to_string(),
            },
        })?;

    Ok(PoseBlock {
        shard,
        pose_cluster,
        name,
        total: round_score(total),
        receptor_anchors,
        ligand_anchors,
    })
}

/// Takes the last three tokens of `line`, which must all be numbers.
fn parse_trailing_coords(line: &str) -> Result<AnchorCoords, PoseParseErrorKind> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    let &[x, y, z] = &tokens[tokens.len().saturating_sub(3)..] else {
        return Err(PoseParseErrorKind::TooFewCoordinateFields);
    };
    for token in [x, y, z] {
        token
            .parse::<f64>()
            .map_err(|_| PoseParseErrorKind::InvalidCoordinate {
                value: token.to_string(),
            })?;
    }
    Ok([x.to_string(), y.to_string(), z.to_string()])
}

/// Scans an archive and decodes the block of every compound in `targets`.
///
/// A compound appearing several times yields one block per appearance.
pub fn scan_archive(
    reader: impl BufRead,
    targets: &HashSet<String>,
    shard: u32,
    pose_cluster: u32,
) -> Result<Vec<PoseBlock>, PoseArchiveError> {
    let mut blocks = Vec::new();
    let mut lines = reader.lines().enumerate();

    while let Some((line_idx, line_res)) = lines.next() {
        let line = line_res?;
        let is_target = marker_name(&line).is_some_and(|name| targets.contains(name));
        if !is_target {
            continue;
        }

        let mut block = Vec::with_capacity(BLOCK_TRAILING_LINES + 1);
        block.push(line);
        for (_, next) in lines.by_ref().take(BLOCK_TRAILING_LINES) {
            block.push(next?);
        }
        blocks.push(parse_block(&block, line_idx + 1, shard, pose_cluster)?);
    }

    Ok(blocks)
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::BLOCK_TRAILING_LINES;

    /// Renders a synthetic archive block with recognisable anchor coordinates.
    pub fn block_text(name: &str, total: &str, seed: f64) -> String {
        let mut lines = vec![format!("##########                 Name:       {name}")];
        for i in 1..=BLOCK_TRAILING_LINES {
            let line = match i {
                10..=13 => format!(
                    "##########  OXR  {:.3}  {:.3}  {:.3}",
                    seed + i as f64,
                    seed,
                    -seed
                ),
                14..=17 => format!(
                    "##########  OXS  {:.3}  {:.3}  {:.3}",
                    -seed - i as f64,
                    seed,
                    seed
                ),
                BLOCK_TRAILING_LINES => format!("##########        Total Energy:    {total}"),
                _ => format!("##########  Field {i}:    0.00"),
            };
            lines.push(line);
        }
        lines.join("\n") + "\n"
    }
}
