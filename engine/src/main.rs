// Strands CLI
// Main entry point for the strands binary

use clap::Parser;
use sdk::errors::{EngineError, StrandsErrorExt};
use strands_engine::cli::Cli;
use strands_engine::config::{env_keys, Environment, Settings};
use strands_engine::handlers::{handle_list_sessions, handle_run};
use strands_engine::telemetry::{init_telemetry, log_startup};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Tools print their own output while the agent works. Set before any
    // runtime threads exist.
    std::env::set_var(env_keys::STRANDS_TOOL_CONSOLE_MODE, "enabled");

    let destination = init_telemetry(cli.log_level.as_deref(), cli.log_file.as_deref())?;
    log_startup(cli.log_level.as_deref(), &destination);

    let version = env!("CARGO_PKG_VERSION");
    let commit = env!("GIT_COMMIT_HASH");
    let timestamp = env!("BUILD_TIMESTAMP");

    tracing::info!("Strands v{} ({} - {})", version, commit, timestamp);

    let work_dir = std::env::current_dir()?;
    let settings = Settings::resolve(&cli, &Environment::capture(), work_dir)?;

    if settings.list_sessions {
        return handle_list_sessions(settings.session_path.as_deref());
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let result = runtime.block_on(handle_run(settings));
    if let Err(e) = &result {
        match e.downcast_ref::<EngineError>() {
            Some(cause) => tracing::error!("{:#} ({})", e, cause.user_hint()),
            None => tracing::error!("{:#}", e),
        }
    }
    result
}
