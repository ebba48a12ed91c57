//! Materialises one docking job tree per (cluster count, iteration) pair.

use crate::core::io::control::ControlFile;
use crate::core::io::traits::TextFile;
use crate::core::models::sphere::SphereSet;
use crate::engine::clustering::{ClusteredSpheres, cluster_spheres};
use crate::engine::config::{BuildConfig, FailurePolicy, MetaLayout};
use crate::engine::error::BuildError;
use crate::engine::fs::FileSystem;
use crate::engine::progress::{Progress, ProgressReporter};
use crate::engine::sharding::ShardPartition;
use rayon::prelude::*;
use std::fmt;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, instrument, warn};

/// One job of the build: `k` sphere clusters, clustered with seed `iteration`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobSpec {
    pub k: usize,
    pub iteration: usize,
}

impl JobSpec {
    pub fn new(k: usize, iteration: usize) -> Self {
        Self { k, iteration }
    }

    pub fn seed(&self) -> u64 {
        self.iteration as u64
    }
}

impl fmt::Display for JobSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "k{}_{}", self.k, self.iteration)
    }
}

/// The validated, read-only inputs shared by every job.
#[derive(Debug, Clone)]
pub struct MetaDirectory {
    root: PathBuf,
    layout: MetaLayout,
    template: ControlFile,
    spheres: SphereSet,
    aux_entries: Vec<PathBuf>,
}

impl MetaDirectory {
    /// Checks that every required member exists, then loads the template and spheres.
    ///
    /// All missing members are reported together in one `Precondition` error.
    pub fn open(root: &Path, layout: &MetaLayout) -> Result<Self, BuildError> {
        let mut missing: Vec<String> = layout
            .required_files()
            .into_iter()
            .filter(|name| !root.join(name).is_file())
            .map(str::to_string)
            .collect();

        let aux_dir = root.join(&layout.aux_dir);
        if !aux_dir.is_dir() {
            missing.push(format!("{}/", layout.aux_dir));
        } else if !aux_dir.join(&layout.sphere_file).is_file() {
            missing.push(format!("{}/{}", layout.aux_dir, layout.sphere_file));
        }

        if !missing.is_empty() {
            return Err(BuildError::Precondition {
                root: root.to_path_buf(),
                missing,
            });
        }

        let root = root.canonicalize().map_err(BuildError::io(root))?;
        let control_path = root.join(&layout.control_file);
        let template =
            ControlFile::read_from_path(&control_path).map_err(|e| BuildError::template(&control_path, e))?;

        let aux_dir = root.join(&layout.aux_dir);
        let sphere_path = aux_dir.join(&layout.sphere_file);
        let spheres =
            SphereSet::read_from_path(&sphere_path).map_err(|e| BuildError::sphere(&sphere_path, e))?;

        let mut aux_entries = Vec::new();
        for entry in std::fs::read_dir(&aux_dir).map_err(BuildError::io(&aux_dir))? {
            let entry = entry.map_err(BuildError::io(&aux_dir))?;
            if entry.file_name() != layout.sphere_file.as_str() {
                aux_entries.push(entry.path());
            }
        }
        aux_entries.sort();

        debug!(
            root = %root.display(),
            spheres = spheres.len(),
            aux_files = aux_entries.len(),
            "Opened meta directory."
        );

        Ok(Self {
            root,
            layout: layout.clone(),
            template,
            spheres,
            aux_entries,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn template(&self) -> &ControlFile {
        &self.template
    }

    pub fn spheres(&self) -> &SphereSet {
        &self.spheres
    }

    /// Auxiliary files linked into every job, without the canonical sphere file.
    pub fn aux_entries(&self) -> &[PathBuf] {
        &self.aux_entries
    }

    pub fn index_path(&self) -> PathBuf {
        self.root.join(&self.layout.compound_index)
    }

    /// Splits the master compound index into `shard_count` buckets.
    pub fn partition(&self, shard_count: usize) -> Result<ShardPartition, BuildError> {
        let path = self.index_path();
        let file = File::open(&path).map_err(BuildError::io(&path))?;
        ShardPartition::from_reader(BufReader::new(file), shard_count)
            .map_err(|e| BuildError::shard(&path, e))
    }
}

/// What was built for one job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobDirectory {
    pub spec: JobSpec,
    pub path: PathBuf,
    pub control_file: PathBuf,
    pub sphere_file: PathBuf,
    pub cluster_sizes: Vec<usize>,
    pub shard_dirs: Vec<PathBuf>,
    /// Shard directories relative to the job directory, as written to its manifest.
    pub manifest: Vec<String>,
}

impl JobDirectory {
    /// Manifest entries relative to the output root.
    pub fn root_manifest_entries(&self) -> Vec<String> {
        let job = self.spec.to_string();
        self.manifest
            .iter()
            .map(|entry| format!("./{}/{}", job, entry.trim_start_matches("./")))
            .collect()
    }
}

/// Builds the tree of a single job.
#[instrument(skip_all, fields(job = %spec))]
pub fn build_job(
    meta: &MetaDirectory,
    partition: &ShardPartition,
    spec: JobSpec,
    config: &BuildConfig,
    fs: &dyn FileSystem,
) -> Result<JobDirectory, BuildError> {
    let meta_layout = &config.meta_layout;
    let job_layout = &config.job_layout;

    let path = config
        .output_root
        .join(job_layout.job_dir_name(spec.k, spec.iteration));
    if fs.exists(&path) {
        if !config.overwrite {
            return Err(BuildError::DirectoryExists { path });
        }
        warn!(path = %path.display(), "Overwriting existing job directory.");
        fs.remove_dir_all(&path).map_err(BuildError::io(&path))?;
    }

    let aux_dir = path.join(&meta_layout.aux_dir);
    fs.create_dir_all(&aux_dir).map_err(BuildError::io(&aux_dir))?;

    let control_file = path.join(&meta_layout.control_file);
    for name in meta_layout.required_files() {
        let dest = path.join(name);
        if name == meta_layout.control_file {
            let rewritten = config
                .template
                .apply(meta.template(), spec.k, config.rescale_match_goal)
                .and_then(|file| file.to_bytes())
                .map_err(|e| BuildError::template(&meta.root().join(name), e))?;
            fs.write(&dest, &rewritten).map_err(BuildError::io(&dest))?;
        } else {
            fs.link(&meta.root().join(name), &dest)
                .map_err(BuildError::io(&dest))?;
        }
    }

    for source in meta.aux_entries() {
        let Some(file_name) = source.file_name() else {
            continue;
        };
        let dest = aux_dir.join(file_name);
        fs.link(source, &dest).map_err(BuildError::io(&dest))?;
    }

    let assignment = cluster_spheres(meta.spheres(), spec.k, spec.seed(), &config.kmeans)?;
    let clustered = ClusteredSpheres::new(meta.spheres(), assignment);
    let sphere_file = aux_dir.join(&meta_layout.sphere_file);
    let mut sphere_bytes = Vec::new();
    clustered
        .write_merged_to(&mut sphere_bytes)
        .map_err(|e| BuildError::sphere(&sphere_file, e))?;
    fs.write(&sphere_file, &sphere_bytes)
        .map_err(BuildError::io(&sphere_file))?;
    let cluster_sizes = clustered.cluster_sizes();
    debug!(?cluster_sizes, "Wrote clustered matching spheres.");

    // Shard links must resolve from inside the shard directory.
    let control_target = std::path::absolute(&control_file).map_err(BuildError::io(&control_file))?;
    let mut shard_dirs = Vec::with_capacity(partition.shard_count());
    let mut manifest = Vec::with_capacity(partition.shard_count());
    for shard in 0..partition.shard_count() {
        let name = job_layout.shard_dir_name(shard);
        let shard_dir = path.join(&name);
        fs.create_dir_all(&shard_dir).map_err(BuildError::io(&shard_dir))?;

        let control_link = shard_dir.join(&meta_layout.control_file);
        fs.link(&control_target, &control_link)
            .map_err(BuildError::io(&control_link))?;

        let index_file = shard_dir.join(&job_layout.shard_index_file);
        let bucket = partition
            .bucket_bytes(shard)
            .map_err(|e| BuildError::shard(&index_file, e))?;
        fs.write(&index_file, &bucket).map_err(BuildError::io(&index_file))?;

        manifest.push(format!("./{}", name));
        shard_dirs.push(shard_dir);
    }

    let manifest_path = path.join(&job_layout.manifest_file);
    fs.write(&manifest_path, manifest_text(&manifest).as_bytes())
        .map_err(BuildError::io(&manifest_path))?;

    Ok(JobDirectory {
        spec,
        path,
        control_file,
        sphere_file,
        cluster_sizes,
        shard_dirs,
        manifest,
    })
}

fn manifest_text(entries: &[String]) -> String {
    entries.iter().map(|e| format!("{}\n", e)).collect()
}

/// The result of a build run.
#[derive(Debug)]
pub struct BuildOutcome {
    pub jobs: Vec<JobDirectory>,
    /// Jobs that failed while the failure policy was [`FailurePolicy::Isolate`].
    pub failures: Vec<(JobSpec, BuildError)>,
    pub manifest_path: PathBuf,
}

impl BuildOutcome {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Validates the inputs once, builds every job in parallel and writes the
/// global manifest.
///
/// Validation failures (missing meta members, out-of-range cluster counts, a
/// template without the insertion marker) abort before anything is written.
#[instrument(skip_all, name = "build_workflow")]
pub fn run(
    config: &BuildConfig,
    fs: &dyn FileSystem,
    reporter: &ProgressReporter,
) -> Result<BuildOutcome, BuildError> {
    reporter.report(Progress::PhaseStart { name: "Validation" });
    let meta = MetaDirectory::open(&config.meta_dir, &config.meta_layout)?;
    validate(&meta, config)?;
    let partition = meta.partition(config.shard_count)?;
    info!(
        spheres = meta.spheres().len(),
        shards = partition.shard_count(),
        "Inputs validated."
    );
    reporter.report(Progress::PhaseFinish);

    fs.create_dir_all(&config.output_root)
        .map_err(BuildError::io(&config.output_root))?;

    let specs: Vec<JobSpec> = config
        .job_specs()
        .into_iter()
        .map(|(k, n)| JobSpec::new(k, n))
        .collect();

    reporter.report(Progress::PhaseStart { name: "Building jobs" });
    reporter.report(Progress::TaskStart {
        total_steps: specs.len() as u64,
    });

    let aborted = AtomicBool::new(false);
    let results: Vec<(JobSpec, Option<Result<JobDirectory, BuildError>>)> = specs
        .par_iter()
        .map(|&spec| {
            if aborted.load(Ordering::Relaxed) {
                return (spec, None);
            }
            let result = build_job(&meta, &partition, spec, config, fs);
            if let Err(e) = &result {
                warn!(job = %spec, error = %e, "Job failed.");
                if config.failure_policy == FailurePolicy::Abort {
                    aborted.store(true, Ordering::Relaxed);
                }
            }
            reporter.unit_finished(spec.to_string(), result.is_ok());
            (spec, Some(result))
        })
        .collect();

    reporter.report(Progress::TaskFinish);
    reporter.report(Progress::PhaseFinish);

    let mut jobs = Vec::new();
    let mut failures = Vec::new();
    for (spec, result) in results {
        match result {
            Some(Ok(job)) => jobs.push(job),
            Some(Err(e)) => failures.push((spec, e)),
            None => debug!(job = %spec, "Skipped after an earlier failure."),
        }
    }

    if config.failure_policy == FailurePolicy::Abort {
        if let Some((_, err)) = failures.into_iter().next() {
            return Err(err);
        }
        failures = Vec::new();
    }

    let mut entries: Vec<String> = jobs.iter().flat_map(JobDirectory::root_manifest_entries).collect();
    entries.sort();
    let manifest_path = config.output_root.join(&config.job_layout.manifest_file);
    fs.write(&manifest_path, manifest_text(&entries).as_bytes())
        .map_err(BuildError::io(&manifest_path))?;

    info!(
        built = jobs.len(),
        failed = failures.len(),
        "Build finished; manifest lists {} shard directories.",
        entries.len()
    );

    Ok(BuildOutcome {
        jobs,
        failures,
        manifest_path,
    })
}

fn validate(meta: &MetaDirectory, config: &BuildConfig) -> Result<(), BuildError> {
    let records = meta.spheres().len();
    if let Some(&k) = config.k_values.iter().find(|&&k| k == 0 || k > records) {
        return Err(BuildError::InvalidParameter(format!(
            "cluster count {k} is outside 1..={records} (number of matching spheres)"
        )));
    }
    if meta.spheres().last_header().is_none() {
        let path = meta
            .root()
            .join(&config.meta_layout.aux_dir)
            .join(&config.meta_layout.sphere_file);
        return Err(BuildError::sphere(
            &path,
            crate::core::io::sphere::SphereError::MissingHeader,
        ));
    }
    for &k in &config.k_values {
        config
            .template
            .apply(meta.template(), k, config.rescale_match_goal)
            .map_err(|e| BuildError::template(&meta.root().join(&config.meta_layout.control_file), e))?;
    }
    Ok(())
}
