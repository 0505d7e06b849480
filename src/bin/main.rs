use anyhow::{bail, Result};
use clap::Parser;

#[derive(Parser)]
#[command(name = hallpad_lib::config::APP_NAME)]
#[command(bin_name = hallpad_lib::config::APP_COMMAND_NAME)]
#[command(version = hallpad_lib::config::APP_VERSION_STR)]
#[command(about = hallpad_lib::config::APP_ABOUT)]
struct Cli {
    #[arg(short, long, default_value = hallpad_lib::config::APP_DEFAULT_CONFIG_FILE,
    help = "Path to the config file, including filename.")]
    cfg_file_path: std::path::PathBuf,
    #[arg(long, help = "Disable automatic config reload on file change.")]
    no_hot_reload: bool,
    #[arg(short, long, help = "Enable debug output (per-press samples and frame values).")]
    debug: bool,
    #[arg(long, default_value = hallpad_lib::config::APP_DEFAULT_MAX_LOG_LEVEL, help = "Limit max log level.")]
    log_level: String,

    #[command(subcommand)]
    aux_task: Option<hallpad_lib::driver::AuxDriverTask>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&cli.log_level))
        .init();

    log::info!("Starting {}.", hallpad_lib::config::APP_LONG_NAME);
    log::info!("Re-run with -h if any help required.");
    if cli.debug {
        log::debug!("Debug output enabled.");
    }

    if cfg!(target_os = "linux") {
        hallpad_lib::driver::check_linux_system_requirements()?;
    } else {
        bail!("This application requires Linux.");
    }

    if let Some(ref aux_task) = cli.aux_task {
        return hallpad_lib::driver::run_aux_task(aux_task, &cli.cfg_file_path, cli.debug).await;
    }

    hallpad_lib::driver::run_bridge(&cli.cfg_file_path, cli.no_hot_reload, cli.debug).await
}
