use std::io;

use engine::{InputScriptError, InputSource, LoopConfig, Pacing, Scene, ScriptedInput, StdinInput};
use thiserror::Error;
use tracing::info;
use tracing_subscriber::EnvFilter;

use super::cli::Cli;
use super::config::{ConfigError, GameConfig};
use super::gameplay;

#[derive(Debug, Error)]
pub(crate) enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    InputScript(#[from] InputScriptError),
    #[error("failed to start stdin reader: {0}")]
    Stdin(#[source] io::Error),
}

pub(crate) struct AppWiring {
    pub(crate) config: LoopConfig,
    pub(crate) scene: Box<dyn Scene>,
    pub(crate) input: Box<dyn InputSource>,
}

pub(crate) fn build_app(cli: &Cli) -> Result<AppWiring, StartupError> {
    init_tracing();
    info!("=== Dayfall Startup ===");

    let game_config = GameConfig::resolve(cli.config.as_deref())?;
    let seed = cli
        .seed
        .or(game_config.seed)
        .unwrap_or_else(rand::random);
    info!(
        columns = game_config.board.columns,
        rows = game_config.board.rows,
        food = game_config.player_food_points,
        "config_loaded"
    );

    let input: Box<dyn InputSource> = match cli.script.as_deref() {
        Some(path) => {
            let script = ScriptedInput::from_path(path)?;
            info!(path = %path.display(), steps = script.remaining(), "input_script_loaded");
            Box::new(script)
        }
        None => Box::new(StdinInput::spawn().map_err(StartupError::Stdin)?),
    };

    let config = LoopConfig {
        pacing: if cli.unpaced {
            Pacing::Unpaced
        } else {
            Pacing::RealTime
        },
        max_ticks: cli.max_ticks,
        ..LoopConfig::default()
    };

    Ok(AppWiring {
        config,
        scene: gameplay::build_scene(game_config, seed),
        input,
    })
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_names(true)
        .with_writer(io::stderr)
        .compact()
        .init();
}
