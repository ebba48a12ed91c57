use super::config::ConfigError;
use crate::core::io::control::TemplateError;
use crate::core::io::mol2::PoseArchiveError;
use crate::core::io::outdock::ReportError;
use crate::core::io::sphere::SphereError;
use crate::core::io::table::TableError;
use crate::engine::clustering::ClusterError;
use crate::engine::sharding::ShardError;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// A malformed line in one of the parsed input formats.
#[derive(Debug, Error)]
pub enum FormatError {
    #[error("sphere file: {0}")]
    Sphere(#[source] SphereError),
    #[error("control template: {0}")]
    Template(#[source] TemplateError),
    #[error("docking report: {0}")]
    Report(#[source] ReportError),
    #[error("pose archive: {0}")]
    PoseArchive(#[source] PoseArchiveError),
    #[error("table: {0}")]
    Table(#[source] TableError),
}

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("Meta directory {root:?} is missing required members: {}", .missing.join(", "))]
    Precondition { root: PathBuf, missing: Vec<String> },

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Control template {path:?} has no '{marker}' line")]
    MissingMarker { path: PathBuf, marker: String },

    #[error("Job directory {path:?} already exists (enable overwrite to replace it)")]
    DirectoryExists { path: PathBuf },

    #[error("Malformed input {path:?}: {source}")]
    Format {
        path: PathBuf,
        #[source]
        source: FormatError,
    },

    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl BuildError {
    pub(crate) fn io(path: &Path) -> impl FnOnce(io::Error) -> Self + '_ {
        move |source| Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn sphere(path: &Path, err: SphereError) -> Self {
        match err {
            SphereError::Io(source) => Self::Io {
                path: path.to_path_buf(),
                source,
            },
            other => Self::Format {
                path: path.to_path_buf(),
                source: FormatError::Sphere(other),
            },
        }
    }

    pub(crate) fn template(path: &Path, err: TemplateError) -> Self {
        match err {
            TemplateError::Io(source) => Self::Io {
                path: path.to_path_buf(),
                source,
            },
            TemplateError::MissingMarker { marker } => Self::MissingMarker {
                path: path.to_path_buf(),
                marker,
            },
            TemplateError::InvalidClusterCount => {
                Self::InvalidParameter("cluster count must be at least 1".to_string())
            }
            other => Self::Format {
                path: path.to_path_buf(),
                source: FormatError::Template(other),
            },
        }
    }

    pub(crate) fn shard(path: &Path, err: ShardError) -> Self {
        match err {
            ShardError::Io(source) => Self::Io {
                path: path.to_path_buf(),
                source,
            },
            other => Self::InvalidParameter(other.to_string()),
        }
    }

    /// Errors that invalidate the whole run rather than a single job.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::Precondition { .. }
                | Self::InvalidParameter(_)
                | Self::MissingMarker { .. }
                | Self::Config(_)
        )
    }
}

impl From<ClusterError> for BuildError {
    fn from(err: ClusterError) -> Self {
        Self::InvalidParameter(err.to_string())
    }
}

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("Job directory {dir:?} contains no shard directories")]
    NoShards { dir: PathBuf },

    #[error("Required input {path:?} does not exist")]
    MissingInput { path: PathBuf },

    #[error("Malformed input {path:?}: {source}")]
    Format {
        path: PathBuf,
        #[source]
        source: FormatError,
    },

    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl ExtractError {
    pub(crate) fn io(path: &Path) -> impl FnOnce(io::Error) -> Self + '_ {
        move |source| {
            if source.kind() == io::ErrorKind::NotFound {
                Self::MissingInput {
                    path: path.to_path_buf(),
                }
            } else {
                Self::Io {
                    path: path.to_path_buf(),
                    source,
                }
            }
        }
    }

    pub(crate) fn report(path: &Path, err: ReportError) -> Self {
        match err {
            ReportError::Io(source) => Self::io(path)(source),
            other => Self::Format {
                path: path.to_path_buf(),
                source: FormatError::Report(other),
            },
        }
    }

    pub(crate) fn archive(path: &Path, err: PoseArchiveError) -> Self {
        match err {
            PoseArchiveError::Io(source) => Self::io(path)(source),
            other => Self::Format {
                path: path.to_path_buf(),
                source: FormatError::PoseArchive(other),
            },
        }
    }

    pub(crate) fn table(path: &Path, err: TableError) -> Self {
        match err {
            TableError::Io(source) => Self::io(path)(source),
            other => Self::Format {
                path: path.to_path_buf(),
                source: FormatError::Table(other),
            },
        }
    }
}

#[derive(Debug, Error)]
pub enum SelectError {
    #[error("Hit table {path:?} does not exist")]
    MissingInput { path: PathBuf },

    #[error("Percentile must be within 0..=100, got {0}")]
    InvalidPercentile(f64),

    #[error("Malformed table {path:?}: {source}")]
    Table {
        path: PathBuf,
        #[source]
        source: TableError,
    },

    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl SelectError {
    pub(crate) fn io(path: &Path) -> impl FnOnce(io::Error) -> Self + '_ {
        move |source| {
            if source.kind() == io::ErrorKind::NotFound {
                Self::MissingInput {
                    path: path.to_path_buf(),
                }
            } else {
                Self::Io {
                    path: path.to_path_buf(),
                    source,
                }
            }
        }
    }
}
