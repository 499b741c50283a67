use std::process::ExitCode;

use clap::Parser;

mod app;

fn main() -> ExitCode {
    let cli = app::cli::Cli::parse();
    app::loop_runner::run(app::bootstrap::build_app(&cli))
}
