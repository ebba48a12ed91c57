use crate::cli::SelectArgs;
use crate::error::{CliError, Result};
use crate::utils::inputs::collect_dirs;
use crate::utils::progress::CliProgressHandler;
use dockprep::engine::config::SelectConfig;
use dockprep::engine::progress::ProgressReporter;
use dockprep::workflows::select;
use tracing::error;

pub async fn run(args: SelectArgs) -> Result<()> {
    let dirs = collect_dirs(&args.dirs)?;
    let config = select_config(args, dirs.len());

    let progress_handler = CliProgressHandler::new();
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());

    let results = tokio::task::block_in_place(|| select::run(&dirs, &config, &reporter));

    for (dir, result) in &results {
        match result {
            Ok(summary) => println!(
                "✓ {}: kept {} of {} rows",
                dir.display(),
                summary.selected_rows,
                summary.input_rows
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
            unit: "directories",
            failed,
            total: results.len(),
        });
    }
    Ok(())
}

/// Batches (a list file or several directories) label every directory's rows
/// with its path unless `--label` is given.
fn select_config(args: SelectArgs, dir_count: usize) -> SelectConfig {
    SelectConfig {
        percentile: args.percentile,
        include_ligands: args.include_ligands,
        label_by_dir: args.dirs.file.is_some() || dir_count > 1,
        label: args.label,
        ..SelectConfig::default()
    }
}
