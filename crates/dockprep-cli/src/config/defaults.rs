use dockprep::engine::config::KMeansConfig;
use std::path::PathBuf;

pub struct DefaultsConfig {
    pub output_root: PathBuf,
    pub iterations: usize,
    pub shards: usize,
    pub kmeans: KMeansConfig,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            output_root: PathBuf::from("."),
            iterations: 1,
            shards: 20,
            kmeans: KMeansConfig::default(),
        }
    }
}
