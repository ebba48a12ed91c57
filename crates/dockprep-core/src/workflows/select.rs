//! Percentile-based selection of the top hits of a job.

use crate::core::io::table::Table;
use crate::engine::config::SelectConfig;
use crate::engine::error::SelectError;
use crate::engine::progress::{Progress, ProgressReporter};
use rayon::prelude::*;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use tracing::{debug, instrument, warn};

const SCORE_COLUMN: &str = "Total";
const LIGAND_COLUMNS: [&str; 3] = ["lig_x", "lig_y", "lig_z"];
const LABEL_COLUMN: &str = "label";

/// The `p`-th percentile of `values`, interpolating linearly between the two
/// closest ranks. Returns `None` for an empty slice.
pub fn percentile(values: &[f64], p: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let rank = p / 100.0 * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f64;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}

/// Keeps the rows whose score is strictly below the configured percentile.
pub fn select_rows(table: &mut Table, config: &SelectConfig) -> Result<Option<f64>, SelectError> {
    if !(0.0..=100.0).contains(&config.percentile) {
        return Err(SelectError::InvalidPercentile(config.percentile));
    }
    let scores = table
        .numeric_column(SCORE_COLUMN)
        .map_err(|source| SelectError::Table {
            path: PathBuf::from(&config.input_table),
            source,
        })?;
    let cutoff = percentile(&scores, config.percentile);

    if let Some(cutoff) = cutoff {
        let rows = std::mem::take(&mut table.rows);
        table.rows = rows
            .into_iter()
            .zip(&scores)
            .filter(|(_, score)| **score < cutoff)
            .map(|(row, _)| row)
            .collect();
    }

    if !config.include_ligands {
        table.drop_columns(&LIGAND_COLUMNS);
    }
    if let Some(label) = &config.label {
        table.push_constant_column(LABEL_COLUMN, label);
    }
    Ok(cutoff)
}

/// Counts of what one directory's selection produced.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectSummary {
    pub dir: PathBuf,
    pub input_rows: usize,
    pub selected_rows: usize,
    pub cutoff: Option<f64>,
}

/// Reads the hit table of `dir` and writes the selected rows next to it.
#[instrument(skip_all, fields(dir = %dir.display()))]
pub fn select_dir(dir: &Path, config: &SelectConfig) -> Result<SelectSummary, SelectError> {
    let input = dir.join(&config.input_table);
    let file = File::open(&input).map_err(SelectError::io(&input))?;
    let mut table = Table::read_from(BufReader::new(file)).map_err(|source| SelectError::Table {
        path: input.clone(),
        source,
    })?;
    let input_rows = table.rows.len();

    let config = SelectConfig {
        label: config.label_for(dir),
        ..config.clone()
    };
    let cutoff = select_rows(&mut table, &config).map_err(|e| match e {
        SelectError::Table { source, .. } => SelectError::Table {
            path: input.clone(),
            source,
        },
        other => other,
    })?;

    let output = dir.join(&config.output_table);
    let out = File::create(&output).map_err(SelectError::io(&output))?;
    table
        .write_to(BufWriter::new(out))
        .map_err(|source| SelectError::Table {
            path: output.clone(),
            source,
        })?;

    debug!(input_rows, selected = table.rows.len(), ?cutoff, "Selected top hits.");
    Ok(SelectSummary {
        dir: dir.to_path_buf(),
        input_rows,
        selected_rows: table.rows.len(),
        cutoff,
    })
}

/// Runs the selection on every directory in parallel, one result per directory.
#[instrument(skip_all, name = "select_workflow")]
pub fn run(
    dirs: &[PathBuf],
    config: &SelectConfig,
    reporter: &ProgressReporter,
) -> Vec<(PathBuf, Result<SelectSummary, SelectError>)> {
    reporter.report(Progress::PhaseStart { name: "Selecting" });
    reporter.report(Progress::TaskStart {
        total_steps: dirs.len() as u64,
    });

    let results: Vec<_> = dirs
        .par_iter()
        .map(|dir| {
            let result = select_dir(dir, config);
            if let Err(e) = &result {
                warn!(dir = %dir.display(), error = %e, "Selection failed.");
            }
            reporter.unit_finished(dir.display().to_string(), result.is_ok());
            (dir.clone(), result)
        })
        .collect();

    reporter.report(Progress::TaskFinish);
    reporter.report(Progress::PhaseFinish);
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const HITS: &str = "\
sub_idx\tcls_idx\tmol_name\tTotal\trec_x\trec_y\trec_z\tlig_x\tlig_y\tlig_z
0\t1\tA\t-40.0\t1.0\t2.0\t3.0\t4.0\t5.0\t6.0
0\t1\tB\t-30.0\t1.0\t2.0\t3.0\t4.0\t5.0\t6.0
0\t2\tC\t-20.0\t1.0\t2.0\t3.0\t4.0\t5.0\t6.0
1\t1\tD\t-10.0\t1.0\t2.0\t3.0\t4.0\t5.0\t6.0
1\t1\tE\t0.0\t1.0\t2.0\t3.0\t4.0\t5.0\t6.0
";

    #[test]
    fn percentile_interpolates_between_ranks() {
        let values = [-40.0, -30.0, -20.0, -10.0, 0.0];
        assert_eq!(percentile(&values, 0.0), Some(-40.0));
        assert_eq!(percentile(&values, 50.0), Some(-20.0));
        assert_eq!(percentile(&values, 100.0), Some(0.0));
        assert!((percentile(&values, 10.0).unwrap() - -36.0).abs() < 1e-9);
        assert_eq!(percentile(&[], 10.0), None);
    }

    #[test]
    fn keeps_rows_strictly_below_the_cutoff_and_drops_ligands() {
        let mut table = Table::read_from(HITS.as_bytes()).unwrap();
        let config = SelectConfig {
            percentile: 50.0,
            ..SelectConfig::default()
        };

        let cutoff = select_rows(&mut table, &config).unwrap();

        assert_eq!(cutoff, Some(-20.0));
        let names: Vec<&str> = table.rows.iter().map(|r| r[2].as_str()).collect();
        assert_eq!(names, vec!["A", "B"]);
        assert_eq!(table.headers.len(), 7);
        assert!(!table.headers.iter().any(|h| h.starts_with("lig_")));
    }

    #[test]
    fn label_column_is_appended() {
        let mut table = Table::read_from(HITS.as_bytes()).unwrap();
        let config = SelectConfig {
            include_ligands: true,
            label: Some("k8_0".to_string()),
            ..SelectConfig::default()
        };

        select_rows(&mut table, &config).unwrap();

        assert_eq!(table.headers.last().map(String::as_str), Some("label"));
        assert_eq!(table.headers.len(), 11);
        assert!(table.rows.iter().all(|r| r.last().map(String::as_str) == Some("k8_0")));
    }

    #[test]
    fn rejects_out_of_range_percentiles() {
        let mut table = Table::read_from(HITS.as_bytes()).unwrap();
        let config = SelectConfig {
            percentile: 120.0,
            ..SelectConfig::default()
        };
        assert!(matches!(
            select_rows(&mut table, &config),
            Err(SelectError::InvalidPercentile(_))
        ));
    }

    #[test]
    fn select_dir_writes_the_top_table() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("unique_coords.tab"), HITS).unwrap();
        let config = SelectConfig {
            percentile: 50.0,
            ..SelectConfig::default()
        };

        let summary = select_dir(dir.path(), &config).unwrap();

        assert_eq!(summary.input_rows, 5);
        assert_eq!(summary.selected_rows, 2);
        let written = fs::read_to_string(dir.path().join("top_coords.tab")).unwrap();
        assert_eq!(
            written,
            "sub_idx\tcls_idx\tmol_name\tTotal\trec_x\trec_y\trec_z\n\
             0\t1\tA\t-40.0\t1.0\t2.0\t3.0\n\
             0\t1\tB\t-30.0\t1.0\t2.0\t3.0\n"
        );
    }

    #[test]
    fn directories_are_labelled_with_their_path() {
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();
        for dir in [&first, &second] {
            fs::write(dir.path().join("unique_coords.tab"), HITS).unwrap();
        }
        let config = SelectConfig {
            label_by_dir: true,
            ..SelectConfig::default()
        };
        let dirs = vec![first.path().to_path_buf(), second.path().to_path_buf()];

        let results = run(&dirs, &config, &ProgressReporter::new());

        assert!(results.iter().all(|(_, r)| r.is_ok()));
        for dir in &dirs {
            let table = Table::read_from(File::open(dir.join("top_coords.tab")).unwrap()).unwrap();
            let label = dir.display().to_string();
            assert_eq!(table.headers.last().map(String::as_str), Some("label"));
            assert!(table.rows.iter().all(|r| r.last() == Some(&label)));
        }
    }

    #[test]
    fn explicit_label_wins_over_directory_labels() {
        let config = SelectConfig {
            label: Some("actives".to_string()),
            label_by_dir: true,
            ..SelectConfig::default()
        };
        assert_eq!(config.label_for(Path::new("k4_0")), Some("actives".to_string()));
        assert_eq!(SelectConfig::default().label_for(Path::new("k4_0")), None);
        let by_dir = SelectConfig {
            label_by_dir: true,
            ..SelectConfig::default()
        };
        assert_eq!(by_dir.label_for(Path::new("out/k4_0")), Some("out/k4_0".to_string()));
    }

    #[test]
    fn missing_table_is_reported_per_directory() {
        let good = tempfile::tempdir().unwrap();
        fs::write(good.path().join("unique_coords.tab"), HITS).unwrap();
        let empty = tempfile::tempdir().unwrap();
        let dirs = vec![good.path().to_path_buf(), empty.path().to_path_buf()];

        let results = run(&dirs, &SelectConfig::default(), &ProgressReporter::new());

        assert!(results[0].1.is_ok());
        assert!(matches!(results[1].1, Err(SelectError::MissingInput { .. })));
    }
}
