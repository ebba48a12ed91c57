//! Reader for the per-shard docking report (`OUTDOCK`).
//!
//! Report lines are classified by an ordered set of matchers: a pose-cluster
//! header wins over a noise line, which wins over a score line. Everything else
//! (banners, timing summaries, file names) is skipped.

use crate::core::models::score::{OutdockRecord, ScoreValue};
use std::io::{self, BufRead};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Parse error on line {line}: {kind}")]
    Parse { line: usize, kind: ReportParseErrorKind },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReportParseErrorKind {
    #[error("Invalid pose index '{value}'")]
    InvalidPoseIndex { value: String },
    #[error("Invalid numeric score field {column} (value: '{value}')")]
    InvalidNumber { column: usize, value: String },
}

/// Substrings that mark diagnostic lines interleaved with the scores.
const NOISE_KEYWORDS: [&str; 8] = [
    "skip_size", "colors", "poses", "<", ">", "no_match", "bump", "clashes",
];

/// The class of a report line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineKind<'a> {
    /// Column header opening a new pose cluster.
    Header,
    Ignorable,
    Data(Vec<&'a str>),
    Other,
}

/// Classifies one report line.
pub fn classify(line: &str) -> LineKind<'_> {
    let body = line.trim_start_matches(' ');
    let indented = body.len() < line.len();

    if indented && body.starts_with("mol#") {
        LineKind::Header
    } else if is_sentinel_line(line) || NOISE_KEYWORDS.iter().any(|kw| line.contains(kw)) {
        LineKind::Ignorable
    } else if indented && body.starts_with(|c: char| c.is_ascii_digit()) {
        LineKind::Data(line.split_whitespace().collect())
    } else {
        LineKind::Other
    }
}

/// Matches the sentinel clash line: a space, then two `9<digits>` fields.
fn is_sentinel_line(line: &str) -> bool {
    fn nines(s: &str) -> Option<&str> {
        let rest = s.strip_prefix('9')?;
        let digits = rest.len() - rest.trim_start_matches(|c: char| c.is_ascii_digit()).len();
        (digits > 0).then(|| &rest[digits..])
    }

    line.strip_prefix(' ')
        .and_then(nines)
        .and_then(|rest| rest.strip_prefix(' '))
        .and_then(nines)
        .is_some()
}

/// Parses the tokens of a score line into a record.
///
/// The first token is the integer pose index and the second the compound name;
/// every following token is a float if it contains a decimal point and an
/// integer otherwise.
pub fn parse_data_tokens(
    tokens: &[&str],
    shard: u32,
    pose_cluster: u32,
) -> Result<OutdockRecord, ReportParseErrorKind> {
    let first = tokens.first().copied().unwrap_or_default();
    let pose_index = first
        .parse::<i64>()
        .map_err(|_| ReportParseErrorKind::InvalidPoseIndex {
            value: first.to_string(),
        })?;

    let name = tokens.get(1).map(|s| s.to_string());

    let terms = tokens
        .iter()
        .enumerate()
        .skip(2)
        .map(|(column, token)| parse_score_value(token, column))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(OutdockRecord {
        shard,
        pose_cluster,
        pose_index,
        name,
        terms,
    })
}

fn parse_score_value(token: &str, column: usize) -> Result<ScoreValue, ReportParseErrorKind> {
    let invalid = || ReportParseErrorKind::InvalidNumber {
        column,
        value: token.to_string(),
    };
    if token.contains('.') {
        token.parse().map(ScoreValue::Float).map_err(|_| invalid())
    } else {
        token.parse().map(ScoreValue::Int).map_err(|_| invalid())
    }
}

/// Reads every score record of one shard's report.
///
/// Records seen before the first pose-cluster header carry pose-cluster id 0.
pub fn read_report(reader: &mut impl BufRead, shard: u32) -> Result<Vec<OutdockRecord>, ReportError> {
    let mut records = Vec::new();
    let mut pose_cluster = 0;

    for (line_num, line_res) in reader.lines().enumerate() {
        let line = line_res?;
        match classify(&line) {
            LineKind::Header => pose_cluster += 1,
            LineKind::Data(tokens) => {
                let record = parse_data_tokens(&tokens, shard, pose_cluster).map_err(|kind| {
                    ReportError::Parse {
                        line: line_num + 1,
                        kind,
                    }
                })?;
                records.push(record);
            }
            LineKind::Ignorable | LineKind::Other => {}
        }
    }

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const HEADER: &str = "  mol#           id_num     flexiblecode  matched    nscored  time    hac    setnum    matnum   rank cloud    elect +  gist +   vdW + psol +  asol + inter + rec_e + rec_d + r_hyd =    Total";

    fn score_line(idx: u32, name: &str, total: &str) -> String {
        format!(
            "{idx:>6}  {name}  0  1500  26  0.53  24  1   6   1  1  -3.12  0.00  -25.01  5.12  -1.18  0.00  0.00  0.00  0.00  {total}"
        )
    }

    #[test]
    fn classifies_headers_before_noise() {
        assert_eq!(classify(HEADER), LineKind::Header);
    }

    #[test]
    fn classifies_noise_lines() {
        for line in [
            " 9999 9999 clash",
            " 912 90",
            "  5   ZINC01  skip_size exceeded",
            "  7 <mol2 write>",
            "  3 no_match",
            "   1 bump filter",
        ] {
            assert_eq!(classify(line), LineKind::Ignorable, "{line}");
        }
    }

    #[test]
    fn sentinel_needs_digits_after_each_nine() {
        assert!(is_sentinel_line(" 91 92"));
        assert!(!is_sentinel_line(" 9 92"));
        assert!(!is_sentinel_line("91 92"));
    }

    #[test]
    fn classifies_data_lines() {
        let line = score_line(1, "ZINC000001", "-30.25");
        match classify(&line) {
            LineKind::Data(tokens) => assert_eq!(tokens.len(), 21),
            other => panic!("unexpected kind: {other:?}"),
        }
        assert_eq!(classify("elapsed time (sec): 12.0"), LineKind::Other);
        assert_eq!(classify("1 not indented"), LineKind::Other);
    }

    #[test]
    fn parses_mixed_numeric_tokens() {
        let record = parse_data_tokens(&["12", "ZINC7", "0", "1.5", "-20.25"], 4, 2).unwrap();
        assert_eq!(record.pose_index, 12);
        assert_eq!(record.name.as_deref(), Some("ZINC7"));
        assert_eq!(
            record.terms,
            vec![ScoreValue::Int(0), ScoreValue::Float(1.5), ScoreValue::Float(-20.25)]
        );
        assert_eq!(record.total(), Some(-20.25));
        assert_eq!((record.shard, record.pose_cluster), (4, 2));
    }

    #[test]
    fn single_token_line_has_no_name() {
        let record = parse_data_tokens(&["3"], 0, 1).unwrap();
        assert!(record.name.is_none());
        assert!(record.terms.is_empty());
    }

    #[test]
    fn bad_numeric_field_is_reported_with_line() {
        let text = format!("{HEADER}\n  1  ZINC1  0  abc  -1.0\n");
        let err = read_report(&mut Cursor::new(text), 0).unwrap_err();
        match err {
            ReportError::Parse { line, kind } => {
                assert_eq!(line, 2);
                assert_eq!(
                    kind,
                    ReportParseErrorKind::InvalidNumber {
                        column: 3,
                        value: "abc".to_string()
                    }
                );
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn one_header_three_scores_and_noise() {
        let text = [
            "open the file: ligands.db2.gz".to_string(),
            HEADER.to_string(),
            score_line(1, "ZINC1", "-10.00"),
            " 9999 9999 clashes".to_string(),
            score_line(2, "ZINC2", "-12.50"),
            score_line(3, "ZINC3", "-8.75"),
        ]
        .join("\n");
        let records = read_report(&mut Cursor::new(text), 7).unwrap();
        assert_eq!(records.len(), 3);
        assert!(records.iter().all(|r| r.pose_cluster == 1 && r.shard == 7));
        assert_eq!(records[1].total(), Some(-12.5));
    }

    #[test]
    fn each_header_starts_a_new_pose_cluster() {
        let text = [
            HEADER.to_string(),
            score_line(1, "A", "-1.0"),
            HEADER.to_string(),
            HEADER.to_string(),
            score_line(2, "B", "-2.0"),
        ]
        .join("\n");
        let records = read_report(&mut Cursor::new(text), 0).unwrap();
        let clusters: Vec<u32> = records.iter().map(|r| r.pose_cluster).collect();
        assert_eq!(clusters, vec![1, 3]);
    }
}
