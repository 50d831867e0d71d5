use crate::{
    commands::{Commands, SyncArgs},
    conn::{ConnectionPinger, ServiceNowPinger},
    error::CliError,
    shutdown::{ExitCode, ShutdownCoordinator},
};
use clap::Parser;
use engine_config::{connection::resolve_connection, env::EnvManager, settings::SyncSettings};
use engine_runtime::execution::{executor, factory::DefaultComponentFactory};
use std::path::Path;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

mod commands;
mod conn;
mod error;
mod output;
mod shutdown;

#[derive(Parser)]
#[command(
    name = "snowsync",
    version,
    about = "Copies ServiceNow tables into a versioned warehouse"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() {
    // RUST_LOG wins; plain info otherwise
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();

    let code = match run(cli.command).await {
        Ok(code) => code,
        Err(err) => {
            error!("{}", err);
            ExitCode::GeneralError
        }
    };
    std::process::exit(code.as_i32());
}

async fn run(command: Commands) -> Result<ExitCode, CliError> {
    match command {
        Commands::Sync(args) => sync(args).await,
        Commands::TestConn {
            connection_name,
            table,
            env_file,
        } => {
            let env = load_env(env_file.as_deref())?;
            let profile = resolve_connection(&connection_name, &env, &SyncSettings::default())?;
            ServiceNowPinger { profile, table }.ping().await?;
            Ok(ExitCode::Success)
        }
    }
}

async fn sync(args: SyncArgs) -> Result<ExitCode, CliError> {
    let env = load_env(args.env_file.as_deref())?;
    let raw = args.raw_job_args().with_env_fallback(&env);
    let settings = args.settings();

    let shutdown = ShutdownCoordinator::new(CancellationToken::new());
    shutdown.register_handlers();

    let factory = DefaultComponentFactory::new(env);
    let report = executor::launch(raw, settings, &factory, shutdown.cancel_token()).await?;

    output::print_summary(&report);
    if let Some(path) = &args.report {
        output::write_report(&report, path).await?;
        info!("Run report written to {}", path.display());
    }

    if report.interrupted || shutdown.is_shutdown_requested() {
        warn!("Run stopped early on shutdown request");
        return Ok(ExitCode::ShutdownRequested);
    }
    Ok(ExitCode::Success)
}

fn load_env(env_file: Option<&Path>) -> Result<EnvManager, CliError> {
    let mut env = EnvManager::new();
    if let Some(path) = env_file {
        env.load_from_file(path)?;
        info!("Loaded environment from {}", path.display());
    }
    Ok(env)
}
