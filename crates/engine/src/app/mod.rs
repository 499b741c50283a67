mod input;
mod loop_runner;
mod metrics;
mod rendering;
mod scene;
mod timers;
mod ui;

pub use input::{
    InputAction, InputPoll, InputScriptError, InputSnapshot, InputSource, ScriptedInput,
    StdinInput,
};
pub use loop_runner::{
    run_app, run_app_with_metrics, AppError, LoopConfig, Pacing, RunSummary, ShutdownReason,
    Simulation,
};
pub use metrics::{LoopMetricsSnapshot, MetricsHandle};
pub use rendering::{compose_frame, Renderer, TextFrame};
pub use scene::{
    Entity, EntityId, GridPos, LayerMask, Obstruction, RenderableDesc, Scene, SceneCommand,
    SceneWorld, Tick, TileKind, Tilemap, TilemapError,
};
pub use timers::{FiredTimer, SimClock, SimTime, TimerId, TimerQueue};
pub use ui::{Display, ElementHandle, ElementTemplate, Label, LabelTemplate, UiDocument, VisualElement};
