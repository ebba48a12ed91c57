use crate::cli::BuildArgs;
use crate::config::{self, AppConfig};
use crate::error::{CliError, Result};
use crate::utils::progress::CliProgressHandler;
use dockprep::engine::fs::{FileSystem, LocalFileSystem, MemoryFileSystem};
use dockprep::engine::progress::ProgressReporter;
use dockprep::workflows::build::{self, BuildOutcome};
use tracing::{error, info};

pub async fn run(args: BuildArgs) -> Result<()> {
    info!("Resolving build configuration...");
    let AppConfig {
        core_config,
        dry_run,
    } = config::build_config(&args)?;

    let progress_handler = CliProgressHandler::new();
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());

    let memory_fs = MemoryFileSystem::new();
    let local_fs = LocalFileSystem::new(core_config.link_mode);
    let fs: &dyn FileSystem = if dry_run { &memory_fs } else { &local_fs };

    println!(
        "Building {} job(s) from {}...",
        core_config.job_specs().len(),
        core_config.meta_dir.display()
    );
    let outcome = tokio::task::block_in_place(|| build::run(&core_config, fs, &reporter))?;

    if dry_run {
        println!("Dry run; the following tree would be created:");
        print!("{}", memory_fs.render_tree());
    }
    report(&outcome)
}

fn report(outcome: &BuildOutcome) -> Result<()> {
    for job in &outcome.jobs {
        info!(
            job = %job.spec,
            sizes = ?job.cluster_sizes,
            "Job directory ready at {}.",
            job.path.display()
        );
    }
    println!(
        "✓ Built {} job(s); shard directories listed in {}",
        outcome.jobs.len(),
        outcome.manifest_path.display()
    );

    if outcome.is_success() {
        return Ok(());
    }
    for (spec, err) in &outcome.failures {
        error!(job = %spec, "{}", err);
        eprintln!("✗ {}: {}", spec, err);
    }
    Err(CliError::UnitsFailed {
        unit: "jobs",
        failed: outcome.failures.len(),
        total: outcome.jobs.len() + outcome.failures.len(),
    })
}
