use crate::cli::ExtractArgs;
use crate::error::{CliError, Result};
use crate::utils::inputs::collect_dirs;
use crate::utils::progress::CliProgressHandler;
use dockprep::engine::config::ExtractConfig;
use dockprep::engine::progress::ProgressReporter;
use dockprep::workflows::extract;
use tracing::{error, info};

pub async fn run(args: ExtractArgs) -> Result<()> {
    let dirs = collect_dirs(&args.dirs)?;
    let config = ExtractConfig::default();
    info!("Extracting {} job directories.", dirs.len());

    let progress_handler = CliProgressHandler::new();
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());

    let results = tokio::task::block_in_place(|| extract::run(&dirs, &config, &reporter));

    for (dir, result) in &results {
        match result {
            Ok(summary) => println!(
                "✓ {}: {} poses, {} compounds, {} hit rows",
                dir.display(),
                summary.records,
                summary.compounds,
                summary.hit_rows
            ),
            Err(e) => {
                error!(dir = %dir.display(), "{}", e);
                eprintln!("✗ {}: {}", dir.display(), e);
            }
        }
    }

    let failed = progress_handler.failed_units();
    if failed > 0 {
        return Err(CliError::UnitsFailed {
            unit: "job directories",
            failed,
            total: results.len(),
        });
    }
    Ok(())
}
