use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

#[derive(Parser, Debug)]
#[command(
    version,
    about = "dockprep - Build sphere-clustered docking job trees and harvest their results.",
    help_template = HELP_TEMPLATE,
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity level (-v for INFO, -vv for DEBUG, -vvv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all log output
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Write logs to a specified file in addition to the console output
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Number of worker threads for jobs and directories processed in parallel.
    /// Defaults to the number of available logical cores.
    #[arg(short = 'j', long, global = true, value_name = "NUM")]
    pub threads: Option<usize>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build one docking job tree per (cluster count, iteration) pair from a meta directory.
    Build(BuildArgs),
    /// Extract score tables and hit coordinates from finished job trees.
    Extract(ExtractArgs),
    /// Keep the best-scoring percentile of each job's hits.
    Select(SelectArgs),
    /// Cluster a single matching-sphere file.
    Spheres(SpheresArgs),
}

/// Arguments for the `build` subcommand.
#[derive(Args, Debug, Default)]
pub struct BuildArgs {
    /// Meta directory holding INDOCK, the name lists, enrichment_sdi and dockfiles/.
    #[arg(short, long, value_name = "PATH")]
    pub input: Option<PathBuf>,

    /// Directory in which the job trees are created.
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Optional configuration file in TOML format.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Cluster counts to build (multiple values allowed).
    #[arg(short = 'k', long = "num-clusters", value_name = "K", num_args(1..))]
    pub k_values: Vec<usize>,

    /// Number of iterations (clustering seeds) per cluster count.
    #[arg(short = 'n', long = "num-iter", value_name = "INT")]
    pub iterations: Option<usize>,

    /// Number of shards the compound index is split into.
    #[arg(short = 's', long = "num-sdi", value_name = "INT")]
    pub shards: Option<usize>,

    /// Divide the match_goal of each control file by its cluster count.
    #[arg(short = 'm', long)]
    pub scale_match_goal: bool,

    /// Replace job directories that already exist.
    #[arg(short = 'f', long)]
    pub overwrite: bool,

    /// Keep building the remaining jobs when one fails.
    #[arg(long)]
    pub keep_going: bool,

    /// Copy shared input files instead of symlinking them.
    #[arg(long)]
    pub copy: bool,

    /// Print the tree that would be built without touching the disk.
    #[arg(long)]
    pub dry_run: bool,

    /// Set a specific configuration value, overriding the config file.
    /// Can be used multiple times. Example: -S kmeans.n-init=20
    #[arg(short = 'S', long = "set", value_name = "KEY=VALUE", num_args(0..))]
    pub set_values: Vec<String>,
}

/// Directories given directly or through a list file.
#[derive(Args, Debug, Default, Clone)]
pub struct DirInputs {
    /// Job directories to process.
    #[arg(short, long, value_name = "DIR", num_args(1..))]
    pub input: Vec<PathBuf>,

    /// File listing one directory per line (combined with --input).
    #[arg(short, long, value_name = "PATH")]
    pub file: Option<PathBuf>,
}

/// Arguments for the `extract` subcommand.
#[derive(Args, Debug)]
pub struct ExtractArgs {
    #[command(flatten)]
    pub dirs: DirInputs,
}

/// Arguments for the `select` subcommand.
#[derive(Args, Debug)]
pub struct SelectArgs {
    #[command(flatten)]
    pub dirs: DirInputs,

    /// Percentile of the total score below which a hit is kept.
    #[arg(short, long, value_name = "FLOAT", default_value_t = 10.0)]
    pub percentile: f64,

    /// Keep the ligand anchor coordinates in the output.
    #[arg(long)]
    pub include_ligands: bool,

    /// Value of an extra `label` column added to every row. With several
    /// directories or a list file, each directory is labelled with its path
    /// unless this is given.
    #[arg(short, long, value_name = "TEXT")]
    pub label: Option<String>,
}

/// Arguments for the `spheres` subcommand.
#[derive(Args, Debug)]
pub struct SpheresArgs {
    /// Input matching-sphere file.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub input: PathBuf,

    /// Output file, or the file name prefix with --split.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub output: PathBuf,

    /// Number of clusters.
    #[arg(short = 'k', long = "num-clusters", required = true, value_name = "K")]
    pub k: usize,

    /// Seed of the clustering.
    #[arg(long, default_value_t = 0, value_name = "INT")]
    pub seed: u64,

    /// Write one file per cluster (`<output>.<i>.sph`) instead of a merged file.
    #[arg(long)]
    pub split: bool,
}
