//! Turns the docking output of a job tree into score and hit tables.
//!
//! Every shard's report is parsed into score records. The records are sorted by
//! total score and reduced to the best pose per compound. Those best poses are
//! then looked up in the compressed pose archives to recover their anchor
//! coordinates.

use crate::core::io::mol2::{self, open_archive};
use crate::core::io::outdock::read_report;
use crate::core::io::table::{self, ScoreLayout};
use crate::core::models::pose::{HitRow, PoseBlock, round_score};
use crate::core::models::score::OutdockRecord;
use crate::engine::config::ExtractConfig;
use crate::engine::error::ExtractError;
use crate::engine::progress::{Progress, ProgressReporter};
use rayon::prelude::*;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument, warn};

/// A shard directory of a job and the shard index parsed from its name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardDir {
    pub index: u32,
    pub path: PathBuf,
}

/// Lists the shard directories of a job, ordered by shard index.
pub fn discover_shards(job_dir: &Path, config: &ExtractConfig) -> Result<Vec<ShardDir>, ExtractError> {
    let entries = fs::read_dir(job_dir).map_err(ExtractError::io(job_dir))?;
    let mut shards = Vec::new();
    for entry in entries {
        let entry = entry.map_err(ExtractError::io(job_dir))?;
        let name = entry.file_name();
        let Some(index) = name
            .to_str()
            .and_then(|n| config.job_layout.parse_shard_dir_name(n))
        else {
            continue;
        };
        if entry.path().is_dir() {
            shards.push(ShardDir {
                index,
                path: entry.path(),
            });
        }
    }

    if shards.is_empty() {
        return Err(ExtractError::NoShards {
            dir: job_dir.to_path_buf(),
        });
    }
    shards.sort_by_key(|s| s.index);
    Ok(shards)
}

pub fn read_shard_records(shard: &ShardDir, config: &ExtractConfig) -> Result<Vec<OutdockRecord>, ExtractError> {
    let path = shard.path.join(&config.report_file);
    let file = File::open(&path).map_err(ExtractError::io(&path))?;
    let records = read_report(&mut BufReader::new(file), shard.index)
        .map_err(|e| ExtractError::report(&path, e))?;
    debug!(shard = shard.index, records = records.len(), "Parsed docking report.");
    Ok(records)
}

/// All score records of a job, and the best record of every compound.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScoreTables {
    /// Named records sorted by ascending total score.
    pub all: Vec<OutdockRecord>,
    /// The first (lowest scoring) record of each compound, in `all` order.
    pub unique: Vec<OutdockRecord>,
}

/// Sorts records by total score, drops nameless ones and keeps the best per compound.
///
/// The sort is stable, so records with equal totals keep their report order and
/// the earliest of them wins the deduplication.
pub fn aggregate(mut records: Vec<OutdockRecord>) -> ScoreTables {
    records.retain(|r| r.name.is_some());
    records.sort_by(OutdockRecord::cmp_by_total);

    let mut seen = HashSet::new();
    let unique = records
        .iter()
        .filter(|r| r.name.as_ref().is_some_and(|name| seen.insert(name.clone())))
        .cloned()
        .collect();

    ScoreTables {
        all: records,
        unique,
    }
}

/// The compound names to look up in each (shard, pose cluster) archive.
pub fn archive_targets(unique: &[OutdockRecord]) -> BTreeMap<(u32, u32), HashSet<String>> {
    let mut targets: BTreeMap<(u32, u32), HashSet<String>> = BTreeMap::new();
    for record in unique {
        if let Some(name) = &record.name {
            targets
                .entry((record.shard, record.pose_cluster))
                .or_default()
                .insert(name.clone());
        }
    }
    targets
}

/// Scans the archives named by `targets` and decodes the matching pose blocks.
pub fn collect_poses(
    shards: &[ShardDir],
    targets: &BTreeMap<(u32, u32), HashSet<String>>,
    config: &ExtractConfig,
) -> Result<Vec<PoseBlock>, ExtractError> {
    let shard_paths: HashMap<u32, &Path> = shards.iter().map(|s| (s.index, s.path.as_path())).collect();

    let groups: Vec<_> = targets.iter().collect();
    let per_archive = groups
        .par_iter()
        .map(|&(&(shard, pose_cluster), names)| {
            let Some(dir) = shard_paths.get(&shard) else {
                return Ok(Vec::new());
            };
            let path = dir.join(config.archive_name(pose_cluster));
            let reader = open_archive(&path).map_err(ExtractError::io(&path))?;
            let blocks = mol2::scan_archive(reader, names, shard, pose_cluster)
                .map_err(|e| ExtractError::archive(&path, e))?;
            if blocks.len() < names.len() {
                debug!(
                    archive = %path.display(),
                    requested = names.len(),
                    found = blocks.len(),
                    "Some compounds have no pose block."
                );
            }
            Ok(blocks)
        })
        .collect::<Result<Vec<_>, ExtractError>>()?;

    Ok(per_archive.into_iter().flatten().collect())
}

type JoinKey = (u32, u32, i64, String);

fn join_key(shard: u32, pose_cluster: u32, total: f64, name: &str) -> JoinKey {
    let centi = (round_score(total) * 100.0).round() as i64;
    (shard, pose_cluster, centi, name.to_string())
}

/// Keeps the anchor rows whose compound, location and score match a best record.
///
/// Rows come out in the order of `unique`; the anchor rows of one compound keep
/// their archive order.
pub fn join_hits(unique: &[OutdockRecord], blocks: &[PoseBlock]) -> Vec<HitRow> {
    let mut by_key: HashMap<JoinKey, Vec<HitRow>> = HashMap::new();
    for block in blocks {
        by_key
            .entry(join_key(block.shard, block.pose_cluster, block.total, &block.name))
            .or_default()
            .extend(block.hit_rows());
    }

    unique
        .iter()
        .filter_map(|record| {
            let name = record.name.as_deref()?;
            let total = record.total()?;
            by_key.get(&join_key(record.shard, record.pose_cluster, total, name))
        })
        .flatten()
        .cloned()
        .collect()
}

/// Counts of what one job's extraction produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractSummary {
    pub job_dir: PathBuf,
    pub shards: usize,
    pub records: usize,
    pub compounds: usize,
    pub hit_rows: usize,
}

/// Extracts one job directory and writes its four output tables into it.
#[instrument(skip_all, fields(job = %job_dir.display()))]
pub fn extract_job(job_dir: &Path, config: &ExtractConfig) -> Result<ExtractSummary, ExtractError> {
    let shards = discover_shards(job_dir, config)?;

    let per_shard = shards
        .par_iter()
        .map(|shard| read_shard_records(shard, config))
        .collect::<Result<Vec<_>, _>>()?;
    let tables = aggregate(per_shard.into_iter().flatten().collect());

    let targets = archive_targets(&tables.unique);
    let blocks = collect_poses(&shards, &targets, config)?;
    let hits = join_hits(&tables.unique, &blocks);

    write_outputs(job_dir, config, &tables, &hits)?;

    let summary = ExtractSummary {
        job_dir: job_dir.to_path_buf(),
        shards: shards.len(),
        records: tables.all.len(),
        compounds: tables.unique.len(),
        hit_rows: hits.len(),
    };
    info!(
        shards = summary.shards,
        records = summary.records,
        compounds = summary.compounds,
        hit_rows = summary.hit_rows,
        "Extraction finished."
    );
    Ok(summary)
}

fn write_outputs(
    job_dir: &Path,
    config: &ExtractConfig,
    tables: &ScoreTables,
    hits: &[HitRow],
) -> Result<(), ExtractError> {
    let create = |name: &str| -> Result<(PathBuf, BufWriter<File>), ExtractError> {
        let path = job_dir.join(name);
        let file = File::create(&path).map_err(ExtractError::io(&path))?;
        Ok((path, BufWriter::new(file)))
    };

    let (path, out) = create(&config.all_scores_file)?;
    table::write_scores(&tables.all, ScoreLayout::Compact, out)
        .map_err(|e| ExtractError::table(&path, e))?;

    let (path, out) = create(&config.unique_scores_file)?;
    table::write_scores(&tables.unique, ScoreLayout::Compact, out)
        .map_err(|e| ExtractError::table(&path, e))?;

    let (path, out) = create(&config.unique_scores_table)?;
    table::write_scores(&tables.unique, ScoreLayout::Full, out)
        .map_err(|e| ExtractError::table(&path, e))?;

    let (path, out) = create(&config.hits_table)?;
    table::write_hits(hits, out).map_err(|e| ExtractError::table(&path, e))?;

    Ok(())
}

/// Extracts every job directory in parallel.
///
/// A failing job never stops the others; every job gets its own result.
#[instrument(skip_all, name = "extract_workflow")]
pub fn run(
    job_dirs: &[PathBuf],
    config: &ExtractConfig,
    reporter: &ProgressReporter,
) -> Vec<(PathBuf, Result<ExtractSummary, ExtractError>)> {
    reporter.report(Progress::PhaseStart { name: "Extracting" });
    reporter.report(Progress::TaskStart {
        total_steps: job_dirs.len() as u64,
    });

    let results: Vec<_> = job_dirs
        .par_iter()
        .map(|dir| {
            let result = extract_job(dir, config);
            if let Err(e) = &result {
                warn!(job = %dir.display(), error = %e, "Extraction failed.");
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
    use crate::core::io::mol2::test_support::block_text;
    use crate::core::models::score::ScoreValue;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use std::io::Write;
    use tempfile::TempDir;

    const HEADER: &str = "  mol#           id_num     flexiblecode  matched    nscored  time    hac    setnum    matnum   rank cloud    elect +  gist +   vdW + psol +  asol + inter + rec_e + rec_d + r_hyd =    Total";

    fn score_line(idx: u32, name: &str, total: &str) -> String {
        format!(
            "{idx:>6}  {name}  0  1500  26  0.53  24  1   6   1  1  -3.12  0.00  -25.01  5.12  -1.18  0.00  0.00  0.00  0.00  {total}"
        )
    }

    fn record(shard: u32, cls: u32, name: Option<&str>, total: f64) -> OutdockRecord {
        OutdockRecord {
            shard,
            pose_cluster: cls,
            pose_index: 1,
            name: name.map(str::to_string),
            terms: vec![ScoreValue::Int(0), ScoreValue::Float(total)],
        }
    }

    fn write_gz(path: &Path, text: &str) {
        let mut encoder = GzEncoder::new(File::create(path).unwrap(), Compression::default());
        encoder.write_all(text.as_bytes()).unwrap();
        encoder.finish().unwrap();
    }

    /// Two shards; ZINC1 is docked in both and scores best in shard 1.
    fn job_fixture() -> TempDir {
        let dir = tempfile::tempdir().unwrap();
        let shard0 = dir.path().join("subcluster0000");
        let shard1 = dir.path().join("subcluster0001");
        fs::create_dir_all(&shard0).unwrap();
        fs::create_dir_all(&shard1).unwrap();
        fs::create_dir_all(dir.path().join("dockfiles")).unwrap();

        let report0 = [
            "open the file: split_database_index".to_string(),
            HEADER.to_string(),
            score_line(1, "ZINC1", "-20.00"),
            score_line(2, "ZINC2", "-30.50"),
            " 9999 9999 clashes".to_string(),
            "     3  ZINC3  skip_size exceeded".to_string(),
        ]
        .join("\n");
        fs::write(shard0.join("OUTDOCK"), report0).unwrap();
        write_gz(
            &shard0.join("test.0001.mol2.gz"),
            &(block_text("ZINC1", "-20.0", 1.0) + &block_text("ZINC2", "-30.5", 2.0)),
        );

        let report1 = [
            HEADER.to_string(),
            score_line(1, "ZINC4", "-5.00"),
            HEADER.to_string(),
            score_line(2, "ZINC1", "-25.25"),
        ]
        .join("\n");
        fs::write(shard1.join("OUTDOCK"), report1).unwrap();
        write_gz(&shard1.join("test.0001.mol2.gz"), &block_text("ZINC4", "-5.0", 4.0));
        write_gz(&shard1.join("test.0002.mol2.gz"), &block_text("ZINC1", "-25.25", 3.0));
        dir
    }

    mod aggregate_tests {
        use super::*;

        #[test]
        fn keeps_the_lowest_score_per_compound() {
            let tables = aggregate(vec![
                record(0, 1, Some("ZINC1"), 5.0),
                record(1, 1, Some("ZINC1"), 3.2),
            ]);
            assert_eq!(tables.all.len(), 2);
            assert_eq!(tables.unique.len(), 1);
            assert_eq!(tables.unique[0].total(), Some(3.2));
            assert_eq!(tables.unique[0].shard, 1);
        }

        #[test]
        fn drops_nameless_records_and_sorts_ascending() {
            let tables = aggregate(vec![
                record(0, 1, Some("B"), -1.0),
                record(0, 1, None, -50.0),
                record(0, 1, Some("A"), -9.0),
            ]);
            let names: Vec<_> = tables.all.iter().map(|r| r.name.as_deref().unwrap()).collect();
            assert_eq!(names, vec!["A", "B"]);
        }

        #[test]
        fn ties_keep_report_order() {
            let tables = aggregate(vec![
                record(3, 1, Some("Z"), -7.0),
                record(4, 2, Some("Z"), -7.0),
            ]);
            assert_eq!(tables.unique.len(), 1);
            assert_eq!(tables.unique[0].shard, 3);
        }

        #[test]
        fn targets_are_grouped_by_archive() {
            let unique = vec![
                record(0, 1, Some("A"), -3.0),
                record(0, 1, Some("B"), -2.0),
                record(2, 4, Some("C"), -1.0),
            ];
            let targets = archive_targets(&unique);
            assert_eq!(targets.len(), 2);
            assert_eq!(targets[&(0, 1)].len(), 2);
            assert!(targets[&(2, 4)].contains("C"));
        }
    }

    mod join_tests {
        use super::*;

        fn block(shard: u32, cls: u32, name: &str, total: f64) -> PoseBlock {
            PoseBlock {
                shard,
                pose_cluster: cls,
                name: name.to_string(),
                total,
                receptor_anchors: std::array::from_fn(|_| ["1.0", "2.0", "3.0"].map(String::from)),
                ligand_anchors: std::array::from_fn(|_| ["4.0", "5.0", "6.0"].map(String::from)),
            }
        }

        #[test]
        fn joins_on_location_score_and_name() {
            let unique = vec![record(0, 1, Some("A"), -10.004), record(1, 2, Some("B"), -3.0)];
            let blocks = vec![
                block(1, 2, "B", -3.0),
                block(0, 1, "A", -10.0),
                block(0, 2, "A", -10.0),
                block(1, 2, "B", -4.0),
            ];
            let hits = join_hits(&unique, &blocks);
            assert_eq!(hits.len(), 8);
            assert!(hits[..4].iter().all(|h| h.mol_name == "A" && h.cls_idx == 1));
            assert!(hits[4..].iter().all(|h| h.mol_name == "B" && h.total == -3.0));
        }

        #[test]
        fn unmatched_compounds_produce_no_rows() {
            let unique = vec![record(0, 1, Some("A"), -1.0)];
            assert!(join_hits(&unique, &[]).is_empty());
        }
    }

    mod job_tests {
        use super::*;

        fn read(dir: &Path, name: &str) -> String {
            fs::read_to_string(dir.join(name)).unwrap()
        }

        #[test]
        fn discovers_shards_in_index_order() {
            let job = job_fixture();
            let shards = discover_shards(job.path(), &ExtractConfig::default()).unwrap();
            let indices: Vec<u32> = shards.iter().map(|s| s.index).collect();
            assert_eq!(indices, vec![0, 1]);
        }

        #[test]
        fn directory_without_shards_is_an_error() {
            let dir = tempfile::tempdir().unwrap();
            let err = extract_job(dir.path(), &ExtractConfig::default()).unwrap_err();
            assert!(matches!(err, ExtractError::NoShards { .. }));
        }

        #[test]
        fn writes_all_four_tables() {
            let job = job_fixture();
            let summary = extract_job(job.path(), &ExtractConfig::default()).unwrap();

            assert_eq!(summary.shards, 2);
            assert_eq!(summary.records, 4);
            assert_eq!(summary.compounds, 3);
            assert_eq!(summary.hit_rows, 12);

            let all = read(job.path(), "extract_all.sort.txt");
            assert_eq!(all.lines().count(), 4);
            assert!(all.lines().next().unwrap().starts_with("0\t2\tZINC2\t"));
            assert!(all.lines().all(|l| l.split('\t').count() == 22));

            let uniq = read(job.path(), "extract_all.sort.uniq.txt");
            let names: Vec<&str> = uniq.lines().map(|l| l.split('\t').nth(2).unwrap()).collect();
            assert_eq!(names, vec!["ZINC2", "ZINC1", "ZINC4"]);

            let full = read(job.path(), "unique_scores.tab");
            let mut lines = full.lines();
            assert!(lines.next().unwrap().starts_with("sub_idx\tcls_idx\tmol_idx\tmol_name"));
            assert!(lines.nth(1).unwrap().starts_with("1\t2\t2\tZINC1\t"));

            let hits = read(job.path(), "unique_coords.tab");
            let mut lines = hits.lines();
            assert_eq!(
                lines.next().unwrap(),
                "sub_idx\tcls_idx\tmol_name\tTotal\trec_x\trec_y\trec_z\tlig_x\tlig_y\tlig_z"
            );
            let zinc1: Vec<&str> = lines.filter(|l| l.contains("ZINC1")).collect();
            assert_eq!(zinc1.len(), 4);
            assert!(zinc1.iter().all(|l| l.starts_with("1\t2\tZINC1\t-25.25\t")));
            assert_eq!(zinc1[0], "1\t2\tZINC1\t-25.25\t13.000\t3.000\t-3.000\t-17.000\t3.000\t3.000");
        }

        #[test]
        fn missing_archive_fails_the_job() {
            let job = job_fixture();
            fs::remove_file(job.path().join("subcluster0001/test.0002.mol2.gz")).unwrap();
            let err = extract_job(job.path(), &ExtractConfig::default()).unwrap_err();
            assert!(matches!(err, ExtractError::MissingInput { ref path } if path.ends_with("test.0002.mol2.gz")));
        }

        #[test]
        fn malformed_report_is_a_format_error() {
            let job = job_fixture();
            fs::write(
                job.path().join("subcluster0000/OUTDOCK"),
                format!("{HEADER}\n     1  ZINC1  0  x.y  -1.0\n"),
            )
            .unwrap();
            let err = extract_job(job.path(), &ExtractConfig::default()).unwrap_err();
            assert!(matches!(err, ExtractError::Format { .. }));
        }

        #[test]
        fn run_isolates_failing_jobs() {
            let good = job_fixture();
            let bad = tempfile::tempdir().unwrap();
            let dirs = vec![good.path().to_path_buf(), bad.path().to_path_buf()];

            let results = run(&dirs, &ExtractConfig::default(), &ProgressReporter::new());

            assert_eq!(results.len(), 2);
            assert!(results[0].1.is_ok());
            assert!(results[1].1.is_err());
            assert!(good.path().join("unique_coords.tab").exists());
        }
    }
}
