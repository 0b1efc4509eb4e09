use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use fmv_core::config::{default_log_path, ensure_parent_dir, ViewerConfig};
use tracing::info;
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "fmv_core=info,fmv_adapters=info,fmv_tui=info,warn";

fn init_logging(log_path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    ensure_parent_dir(log_path)?;
    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    // A second init (tests, embedding) keeps the existing subscriber.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(log_file))
        .with_ansi(false)
        .try_init();
    Ok(())
}

fn run_app(
    load_config: impl FnOnce() -> Result<ViewerConfig, fmv_core::config::ConfigError>,
    run_tui: impl FnOnce(ViewerConfig) -> Result<(), fmv_tui::TuiError>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config()?;
    info!(
        ui = fmv_tui::ui_name(),
        dataset = %config.dataset_id,
        page_size = config.page_size,
        "launching viewer"
    );
    run_tui(config)?;
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging(&default_log_path()?)?;
    run_app(ViewerConfig::load_default, fmv_tui::run)
}
