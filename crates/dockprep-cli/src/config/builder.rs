use super::defaults::DefaultsConfig;
use super::file::{FileConfig, FileLinkMode};
use super::models::AppConfig;
use crate::cli::BuildArgs;
use crate::error::{CliError, Result};
use dockprep::core::io::control::ControlTemplate;
use dockprep::engine::config::{BuildConfigBuilder, FailurePolicy, KMeansConfig};
use dockprep::engine::fs::LinkMode;
use std::str::FromStr;

pub fn build_config(args: &BuildArgs) -> Result<AppConfig> {
    let defaults = DefaultsConfig::default();

    let file_config = match &args.config {
        Some(path) => FileConfig::from_file(path)?,
        None => FileConfig::default(),
    };
    let file_config = apply_set_values(file_config, &args.set_values)?;

    let meta_dir = args
        .input
        .clone()
        .or(file_config.meta_dir)
        .ok_or_else(|| {
            CliError::Config(
                "A meta directory is required either in the config file (`meta-dir`) or via --input."
                    .to_string(),
            )
        })?;
    let output_root = args
        .output
        .clone()
        .or(file_config.output_root)
        .unwrap_or(defaults.output_root);

    let k_values = if args.k_values.is_empty() {
        file_config.k_values.ok_or_else(|| {
            CliError::Config(
                "At least one cluster count is required either in the config file (`k-values`) or via -k."
                    .to_string(),
            )
        })?
    } else {
        args.k_values.clone()
    };

    let iterations = args
        .iterations
        .or(file_config.iterations)
        .unwrap_or(defaults.iterations);
    let shards = args
        .shards
        .or(file_config.shards)
        .unwrap_or(defaults.shards);

    let flag = |cli: bool, file: Option<bool>| cli || file.unwrap_or(false);
    let failure_policy = if flag(args.keep_going, file_config.keep_going) {
        FailurePolicy::Isolate
    } else {
        FailurePolicy::Abort
    };
    let link_mode = if args.copy {
        LinkMode::Copy
    } else {
        file_config.link_mode.map(Into::into).unwrap_or_default()
    };

    let kmeans_file = file_config.kmeans.unwrap_or_default();
    let kmeans = KMeansConfig {
        max_iterations: kmeans_file
            .max_iterations
            .unwrap_or(defaults.kmeans.max_iterations),
        tolerance: kmeans_file.tolerance.unwrap_or(defaults.kmeans.tolerance),
        n_init: kmeans_file.n_init.unwrap_or(defaults.kmeans.n_init),
    };

    let template_file = file_config.template.unwrap_or_default();
    let base = ControlTemplate::default();
    let template = ControlTemplate {
        rescale_keyword: template_file.rescale_keyword.unwrap_or(base.rescale_keyword),
        marker_keyword: template_file.marker_keyword.unwrap_or(base.marker_keyword),
        parameter_name: template_file.parameter_name.unwrap_or(base.parameter_name),
        padding: template_file.padding.unwrap_or(base.padding),
    };

    let core_config = BuildConfigBuilder::new()
        .meta_dir(meta_dir)
        .output_root(output_root)
        .k_values(k_values)
        .iterations(iterations)
        .shard_count(shards)
        .rescale_match_goal(flag(args.scale_match_goal, file_config.scale_match_goal))
        .overwrite(flag(args.overwrite, file_config.overwrite))
        .failure_policy(failure_policy)
        .link_mode(link_mode)
        .kmeans(kmeans)
        .template(template)
        .build()
        .map_err(|e| CliError::Config(e.to_string()))?;

    Ok(AppConfig {
        core_config,
        dry_run: args.dry_run,
    })
}

fn parse_value<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value.trim().parse().map_err(|_| {
        CliError::Config(format!(
            "Invalid value for {}: '{}' ({} expected)",
            key,
            value,
            std::any::type_name::<T>()
        ))
    })
}

fn apply_set_values(mut config: FileConfig, set_values: &[String]) -> Result<FileConfig> {
    for kv_pair in set_values {
        let (key, value) = kv_pair.split_once('=').ok_or_else(|| {
            CliError::Config(format!(
                "Invalid --set format: '{}'. Expected KEY=VALUE.",
                kv_pair
            ))
        })?;

        match key {
            "meta-dir" => config.meta_dir = Some(value.into()),
            "output-root" => config.output_root = Some(value.into()),
            "k-values" => {
                config.k_values = Some(
                    value
                        .split(',')
                        .map(|k| parse_value(key, k))
                        .collect::<Result<Vec<usize>>>()?,
                )
            }
            "iterations" => config.iterations = Some(parse_value(key, value)?),
            "shards" => config.shards = Some(parse_value(key, value)?),
            "scale-match-goal" => config.scale_match_goal = Some(parse_value(key, value)?),
            "overwrite" => config.overwrite = Some(parse_value(key, value)?),
            "keep-going" => config.keep_going = Some(parse_value(key, value)?),
            "link-mode" => {
                config.link_mode = Some(match value {
                    "symlink" => FileLinkMode::Symlink,
                    "copy" => FileLinkMode::Copy,
                    _ => {
                        return Err(CliError::Config(format!(
                            "Invalid value for {}: '{}' (symlink or copy expected)",
                            key, value
                        )));
                    }
                })
            }
            "kmeans.max-iterations" => {
                config
                    .kmeans
                    .get_or_insert_with(Default::default)
                    .max_iterations = Some(parse_value(key, value)?)
            }
            "kmeans.tolerance" => {
                config.kmeans.get_or_insert_with(Default::default).tolerance =
                    Some(parse_value(key, value)?)
            }
            "kmeans.n-init" => {
                config.kmeans.get_or_insert_with(Default::default).n_init =
                    Some(parse_value(key, value)?)
            }
            "template.rescale-keyword" => {
                config
                    .template
                    .get_or_insert_with(Default::default)
                    .rescale_keyword = Some(value.to_string())
            }
            "template.marker-keyword" => {
                config
                    .template
                    .get_or_insert_with(Default::default)
                    .marker_keyword = Some(value.to_string())
            }
            "template.parameter-name" => {
                config
                    .template
                    .get_or_insert_with(Default::default)
                    .parameter_name = Some(value.to_string())
            }
            "template.padding" => {
                config.template.get_or_insert_with(Default::default).padding =
                    Some(parse_value(key, value)?)
            }
            _ => {
                return Err(CliError::Config(format!(
                    "Unsupported configuration key for --set: '{}'",
                    key
                )));
            }
        }
    }
    Ok(config)
}
