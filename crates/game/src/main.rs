use std::process::ExitCode;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod app;

fn main() -> ExitCode {
    init_tracing();
    info!("=== Lanternfall Startup ===");

    let wiring = match app::bootstrap::build_session() {
        Ok(wiring) => wiring,
        Err(error) => {
            error!(error = %error, "startup_failed");
            return ExitCode::FAILURE;
        }
    };

    match app::harness::run_scripted_playthrough(wiring) {
        Ok(summary) => {
            info!(
                ticks = summary.ticks,
                transitions_completed = summary.transitions_completed,
                final_stage = summary.final_stage.map(|stage| stage.0),
                "=== run summary ==="
            );
            ExitCode::SUCCESS
        }
        Err(error) => {
            error!(error = %error, "playthrough_failed");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_names(true)
        .compact()
        .init();
}
