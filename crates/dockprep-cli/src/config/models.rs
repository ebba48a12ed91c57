use dockprep::engine::config::BuildConfig;

pub struct AppConfig {
    pub core_config: BuildConfig,
    pub dry_run: bool,
}
