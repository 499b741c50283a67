pub mod app;

pub use app::{
    compose_frame, run_app, run_app_with_metrics, AppError, Display, ElementHandle,
    ElementTemplate, Entity, EntityId, FiredTimer, GridPos, InputAction, InputPoll,
    InputScriptError, InputSnapshot, InputSource, Label, LabelTemplate, LayerMask, LoopConfig,
    LoopMetricsSnapshot, MetricsHandle, Obstruction, Pacing, RenderableDesc, Renderer, RunSummary,
    Scene, SceneCommand, SceneWorld, ScriptedInput, ShutdownReason, SimClock, SimTime, Simulation,
    StdinInput, TextFrame, Tick, TileKind, Tilemap, TilemapError, TimerId, TimerQueue, UiDocument,
    VisualElement,
};
