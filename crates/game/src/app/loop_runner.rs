use std::process::ExitCode;

use engine::run_app;
use tracing::{error, info};

use super::bootstrap::{AppWiring, StartupError};

pub(crate) fn run(app: Result<AppWiring, StartupError>) -> ExitCode {
    let app = match app {
        Ok(app) => app,
        Err(err) => {
            error!(error = %err, "startup_failed");
            return ExitCode::FAILURE;
        }
    };

    match run_app(app.config, app.scene, app.input) {
        Ok(summary) => {
            info!(
                reason = summary.reason.as_str(),
                ticks = summary.ticks,
                scene_loads = summary.scene_loads,
                "run_finished"
            );
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!(error = %err, "run_failed");
            ExitCode::FAILURE
        }
    }
}
