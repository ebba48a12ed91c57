use crate::error::{CliError, Result};
use dockprep::engine::fs::LinkMode;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileConfig {
    pub meta_dir: Option<PathBuf>,
    pub output_root: Option<PathBuf>,
    pub k_values: Option<Vec<usize>>,
    pub iterations: Option<usize>,
    pub shards: Option<usize>,
    pub scale_match_goal: Option<bool>,
    pub overwrite: Option<bool>,
    pub keep_going: Option<bool>,
    pub link_mode: Option<FileLinkMode>,
    pub kmeans: Option<FileKMeansConfig>,
    pub template: Option<FileTemplateConfig>,
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum FileLinkMode {
    Symlink,
    Copy,
}

impl From<FileLinkMode> for LinkMode {
    fn from(mode: FileLinkMode) -> Self {
        match mode {
            FileLinkMode::Symlink => LinkMode::Symlink,
            FileLinkMode::Copy => LinkMode::Copy,
        }
    }
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileKMeansConfig {
    pub max_iterations: Option<usize>,
    pub tolerance: Option<f64>,
    pub n_init: Option<usize>,
}

/// Overrides of the control-file keywords.
#[derive(Deserialize, Debug, Default, Clone)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileTemplateConfig {
    pub rescale_keyword: Option<String>,
    pub marker_keyword: Option<String>,
    pub parameter_name: Option<String>,
    pub padding: Option<usize>,
}

impl FileConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Loading configuration from file: {:?}", path);
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| CliError::FileParsing {
            path: path.to_path_buf(),
            source: e.into(),
        })
    }
}
