use crate::core::io::control::ControlTemplate;
use crate::engine::fs::LinkMode;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum ConfigError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),
    #[error("Invalid value for {parameter}: {reason}")]
    InvalidValue {
        parameter: &'static str,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct KMeansConfig {
    pub max_iterations: usize,
    /// Relative tolerance on the total centroid shift, scaled by the mean
    /// per-axis variance of the points.
    pub tolerance: f64,
    pub n_init: usize,
}

impl Default for KMeansConfig {
    fn default() -> Self {
        Self {
            max_iterations: 300,
            tolerance: 1e-4,
            n_init: 10,
        }
    }
}

/// Names of the members of a meta directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetaLayout {
    pub control_file: String,
    pub name_lists: Vec<String>,
    pub compound_index: String,
    pub aux_dir: String,
    pub sphere_file: String,
}

impl Default for MetaLayout {
    fn default() -> Self {
        Self {
            control_file: "INDOCK".to_string(),
            name_lists: vec!["ligands.names".to_string(), "decoys.names".to_string()],
            compound_index: "enrichment_sdi".to_string(),
            aux_dir: "dockfiles".to_string(),
            sphere_file: "matching_spheres.sph".to_string(),
        }
    }
}

impl MetaLayout {
    /// Top-level files that must exist, in the order they are linked.
    pub fn required_files(&self) -> Vec<&str> {
        let mut files = vec![self.control_file.as_str()];
        files.extend(self.name_lists.iter().map(String::as_str));
        files.push(self.compound_index.as_str());
        files
    }
}

/// Naming of the directories and files inside a job tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobLayout {
    pub shard_prefix: String,
    pub shard_width: usize,
    pub shard_index_file: String,
    pub manifest_file: String,
}

impl Default for JobLayout {
    fn default() -> Self {
        Self {
            shard_prefix: "subcluster".to_string(),
            shard_width: 4,
            shard_index_file: "split_database_index".to_string(),
            manifest_file: "dirlist".to_string(),
        }
    }
}

impl JobLayout {
    pub fn job_dir_name(&self, k: usize, iteration: usize) -> String {
        format!("k{}_{}", k, iteration)
    }

    pub fn shard_dir_name(&self, shard: usize) -> String {
        format!("{}{:0width$}", self.shard_prefix, shard, width = self.shard_width)
    }

    /// Recovers the shard index from a shard directory name.
    pub fn parse_shard_dir_name(&self, name: &str) -> Option<u32> {
        let digits = name.strip_prefix(&self.shard_prefix)?;
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        digits.parse().ok()
    }
}

/// What happens to the rest of a run when one unit of work fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Stop scheduling new units and return the first error.
    #[default]
    Abort,
    /// Run every unit and report all failures at the end.
    Isolate,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BuildConfig {
    pub meta_dir: PathBuf,
    pub output_root: PathBuf,
    pub k_values: Vec<usize>,
    pub iterations: usize,
    pub shard_count: usize,
    pub rescale_match_goal: bool,
    pub overwrite: bool,
    pub failure_policy: FailurePolicy,
    pub link_mode: LinkMode,
    pub kmeans: KMeansConfig,
    pub template: ControlTemplate,
    pub meta_layout: MetaLayout,
    pub job_layout: JobLayout,
}

impl BuildConfig {
    /// Every (k, iteration) pair to build, k-major.
    pub fn job_specs(&self) -> Vec<(usize, usize)> {
        self.k_values
            .iter()
            .flat_map(|&k| (0..self.iterations).map(move |n| (k, n)))
            .collect()
    }
}

#[derive(Default)]
pub struct BuildConfigBuilder {
    meta_dir: Option<PathBuf>,
    output_root: Option<PathBuf>,
    k_values: Option<Vec<usize>>,
    iterations: Option<usize>,
    shard_count: Option<usize>,
    rescale_match_goal: bool,
    overwrite: bool,
    failure_policy: FailurePolicy,
    link_mode: LinkMode,
    kmeans: Option<KMeansConfig>,
    template: Option<ControlTemplate>,
    meta_layout: Option<MetaLayout>,
    job_layout: Option<JobLayout>,
}

impl BuildConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn meta_dir(mut self, path: PathBuf) -> Self {
        self.meta_dir = Some(path);
        self
    }
    pub fn output_root(mut self, path: PathBuf) -> Self {
        self.output_root = Some(path);
        self
    }
    pub fn k_values(mut self, values: Vec<usize>) -> Self {
        self.k_values = Some(values);
        self
    }
    pub fn iterations(mut self, n: usize) -> Self {
        self.iterations = Some(n);
        self
    }
    pub fn shard_count(mut self, n: usize) -> Self {
        self.shard_count = Some(n);
        self
    }
    pub fn rescale_match_goal(mut self, enabled: bool) -> Self {
        self.rescale_match_goal = enabled;
        self
    }
    pub fn overwrite(mut self, enabled: bool) -> Self {
        self.overwrite = enabled;
        self
    }
    pub fn failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }
    pub fn link_mode(mut self, mode: LinkMode) -> Self {
        self.link_mode = mode;
        self
    }
    pub fn kmeans(mut self, config: KMeansConfig) -> Self {
        self.kmeans = Some(config);
        self
    }
    pub fn template(mut self, template: ControlTemplate) -> Self {
        self.template = Some(template);
        self
    }
    pub fn meta_layout(mut self, layout: MetaLayout) -> Self {
        self.meta_layout = Some(layout);
        self
    }
    pub fn job_layout(mut self, layout: JobLayout) -> Self {
        self.job_layout = Some(layout);
        self
    }

    pub fn build(self) -> Result<BuildConfig, ConfigError> {
        let k_values = self
            .k_values
            .ok_or(ConfigError::MissingParameter("k_values"))?;
        if k_values.is_empty() {
            return Err(ConfigError::InvalidValue {
                parameter: "k_values",
                reason: "at least one cluster count is required".to_string(),
            });
        }
        if let Some(&bad) = k_values.iter().find(|&&k| k == 0) {
            return Err(ConfigError::InvalidValue {
                parameter: "k_values",
                reason: format!("cluster counts must be at least 1, got {bad}"),
            });
        }
        let mut seen = HashSet::new();
        if let Some(&dup) = k_values.iter().find(|&&k| !seen.insert(k)) {
            return Err(ConfigError::InvalidValue {
                parameter: "k_values",
                reason: format!("cluster count {dup} is listed more than once"),
            });
        }

        let iterations = self.iterations.unwrap_or(1);
        if iterations == 0 {
            return Err(ConfigError::InvalidValue {
                parameter: "iterations",
                reason: "must be at least 1".to_string(),
            });
        }

        let shard_count = self.shard_count.unwrap_or(20);
        if shard_count == 0 {
            return Err(ConfigError::InvalidValue {
                parameter: "shard_count",
                reason: "must be at least 1".to_string(),
            });
        }

        let kmeans = self.kmeans.unwrap_or_default();
        if kmeans.n_init == 0 || kmeans.max_iterations == 0 {
            return Err(ConfigError::InvalidValue {
                parameter: "kmeans",
                reason: "n_init and max_iterations must be at least 1".to_string(),
            });
        }
        if !(kmeans.tolerance.is_finite() && kmeans.tolerance >= 0.0) {
            return Err(ConfigError::InvalidValue {
                parameter: "kmeans.tolerance",
                reason: format!("must be a non-negative number, got {}", kmeans.tolerance),
            });
        }

        Ok(BuildConfig {
            meta_dir: self
                .meta_dir
                .ok_or(ConfigError::MissingParameter("meta_dir"))?,
            output_root: self.output_root.unwrap_or_else(|| PathBuf::from(".")),
            k_values,
            iterations,
            shard_count,
            rescale_match_goal: self.rescale_match_goal,
            overwrite: self.overwrite,
            failure_policy: self.failure_policy,
            link_mode: self.link_mode,
            kmeans,
            template: self.template.unwrap_or_default(),
            meta_layout: self.meta_layout.unwrap_or_default(),
            job_layout: self.job_layout.unwrap_or_default(),
        })
    }
}

/// Names of the inputs and outputs of result extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractConfig {
    pub job_layout: JobLayout,
    pub report_file: String,
    pub archive_prefix: String,
    pub archive_suffix: String,
    pub archive_width: usize,
    pub all_scores_file: String,
    pub unique_scores_file: String,
    pub unique_scores_table: String,
    pub hits_table: String,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            job_layout: JobLayout::default(),
            report_file: "OUTDOCK".to_string(),
            archive_prefix: "test".to_string(),
            archive_suffix: "mol2.gz".to_string(),
            archive_width: 4,
            all_scores_file: "extract_all.sort.txt".to_string(),
            unique_scores_file: "extract_all.sort.uniq.txt".to_string(),
            unique_scores_table: "unique_scores.tab".to_string(),
            hits_table: "unique_coords.tab".to_string(),
        }
    }
}

impl ExtractConfig {
    pub fn archive_name(&self, pose_cluster: u32) -> String {
        format!(
            "{}.{:0width$}.{}",
            self.archive_prefix,
            pose_cluster,
            self.archive_suffix,
            width = self.archive_width
        )
    }
}

/// Parameters of the top-hit selection.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectConfig {
    /// Rows scoring strictly below this percentile of `Total` are kept.
    pub percentile: f64,
    pub include_ligands: bool,
    pub label: Option<String>,
    /// Without an explicit `label`, label each directory's rows with its path.
    pub label_by_dir: bool,
    pub input_table: String,
    pub output_table: String,
}

impl SelectConfig {
    /// The label written for the rows of `dir`, if any.
    pub fn label_for(&self, dir: &Path) -> Option<String> {
        self.label
            .clone()
            .or_else(|| self.label_by_dir.then(|| dir.display().to_string()))
    }
}

impl Default for SelectConfig {
    fn default() -> Self {
        Self {
            percentile: 10.0,
            include_ligands: false,
            label: None,
            label_by_dir: false,
            input_table: "unique_coords.tab".to_string(),
            output_table: "top_coords.tab".to_string(),
        }
    }
}
