use crate::cli::DirInputs;
use crate::error::{CliError, Result};
use std::path::PathBuf;

/// Resolves the directories named on the command line and in the optional list
/// file. Blank lines and `#` comments in the list file are skipped; list entries
/// come after the directly named ones.
pub fn collect_dirs(inputs: &DirInputs) -> Result<Vec<PathBuf>> {
    let mut dirs = inputs.input.clone();

    if let Some(list) = &inputs.file {
        let content = std::fs::read_to_string(list).map_err(|e| CliError::FileParsing {
            path: list.clone(),
            source: e.into(),
        })?;
        dirs.extend(
            content
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty() && !l.starts_with('#'))
                .map(PathBuf::from),
        );
    }

    if dirs.is_empty() {
        return Err(CliError::Argument(
            "No directories given; use --input or --file.".to_string(),
        ));
    }
    Ok(dirs)
}
