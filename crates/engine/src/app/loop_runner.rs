use std::io::{self, Write};
use std::thread;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{info, warn};

use super::input::{InputPoll, InputSnapshot, InputSource};
use super::metrics::{MetricsAccumulator, MetricsHandle};
use super::rendering::{compose_frame, Renderer, TextFrame};
use super::scene::{Scene, SceneCommand, SceneMachine, SceneWorld, Tick};
use super::timers::{SimClock, SimTime};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pacing {
    /// Ticks follow the wall clock at `target_tps`.
    RealTime,
    /// One tick per loop iteration with no sleeping; simulation time still
    /// advances by the fixed step.
    Unpaced,
}

#[derive(Debug, Clone)]
pub struct LoopConfig {
    pub target_tps: u32,
    pub max_frame_delta: Duration,
    pub max_ticks_per_frame: u32,
    pub metrics_log_interval: Duration,
    pub pacing: Pacing,
    pub max_ticks: Option<u64>,
    pub render_frames: bool,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            target_tps: 60,
            max_frame_delta: Duration::from_millis(250),
            max_ticks_per_frame: 5,
            metrics_log_interval: Duration::from_secs(1),
            pacing: Pacing::RealTime,
            max_ticks: None,
            render_frames: true,
        }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("failed to present frame: {0}")]
    Present(#[source] io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    SceneQuit,
    QuitRequested,
    InputExhausted,
    TickLimit,
}

impl ShutdownReason {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SceneQuit => "scene_quit",
            Self::QuitRequested => "quit_requested",
            Self::InputExhausted => "input_exhausted",
            Self::TickLimit => "tick_limit",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub reason: ShutdownReason,
    pub ticks: u64,
    pub sim_time: SimTime,
    pub scene_loads: u64,
}

/// Fixed-step driver for one scene, independent of wall-clock pacing.
pub struct Simulation {
    scenes: SceneMachine,
    clock: SimClock,
    fixed_dt: Duration,
    ticks: u64,
}

impl Simulation {
    pub fn new(scene: Box<dyn Scene>, target_tps: u32) -> Self {
        Self {
            scenes: SceneMachine::new(scene),
            clock: SimClock::default(),
            fixed_dt: Duration::from_secs_f64(1.0 / target_tps.max(1) as f64),
            ticks: 0,
        }
    }

    pub fn load(&mut self) {
        self.scenes.load_active(self.clock.now());
        info!(
            entity_count = self.scenes.world().entity_count(),
            "scene_loaded"
        );
    }

    /// Runs one tick. Input is polled only when the scene asks for it.
    pub fn step(&mut self, input: &mut dyn InputSource) -> Option<ShutdownReason> {
        let snapshot = if self.scenes.wants_input() {
            match input.poll() {
                InputPoll::Ready(snapshot) => snapshot,
                InputPoll::Pending => InputSnapshot::empty(),
                InputPoll::Exhausted => return Some(ShutdownReason::InputExhausted),
            }
        } else {
            InputSnapshot::empty()
        };
        if snapshot.quit_requested() {
            return Some(ShutdownReason::QuitRequested);
        }

        let tick = Tick {
            index: self.ticks,
            now: self.clock.now(),
            dt: self.fixed_dt,
        };
        let command = self.scenes.update_active(&tick, &snapshot);
        self.ticks = self.ticks.saturating_add(1);
        self.clock.advance(self.fixed_dt);

        match command {
            SceneCommand::None => None,
            SceneCommand::Reload => {
                self.scenes.reload(self.clock.now());
                info!(
                    scene_loads = self.scenes.load_count(),
                    entity_count = self.scenes.world().entity_count(),
                    "scene_reloaded"
                );
                None
            }
            SceneCommand::Quit => Some(ShutdownReason::SceneQuit),
        }
    }

    pub fn frame(&self) -> TextFrame {
        let status = self.scenes.status_line();
        compose_frame(
            self.scenes.world(),
            self.scenes.ui_document(),
            status.as_deref(),
        )
    }

    pub fn now(&self) -> SimTime {
        self.clock.now()
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn fixed_dt(&self) -> Duration {
        self.fixed_dt
    }

    pub fn scene_loads(&self) -> u64 {
        self.scenes.load_count()
    }

    pub fn wants_input(&self) -> bool {
        self.scenes.wants_input()
    }

    pub fn world(&self) -> &SceneWorld {
        self.scenes.world()
    }

    pub fn shutdown(&mut self) {
        self.scenes.shutdown();
    }
}

pub fn run_app(
    config: LoopConfig,
    scene: Box<dyn Scene>,
    input: Box<dyn InputSource>,
) -> Result<RunSummary, AppError> {
    run_app_with_metrics(config, scene, input, io::stdout(), MetricsHandle::default())
}

pub fn run_app_with_metrics<W: Write>(
    config: LoopConfig,
    scene: Box<dyn Scene>,
    mut input: Box<dyn InputSource>,
    out: W,
    metrics_handle: MetricsHandle,
) -> Result<RunSummary, AppError> {
    let target_tps = config.target_tps.max(1);
    let max_frame_delta =
        normalize_non_zero_duration(config.max_frame_delta, Duration::from_millis(250));
    let max_ticks_per_frame = config.max_ticks_per_frame.max(1);
    let metrics_log_interval =
        normalize_non_zero_duration(config.metrics_log_interval, Duration::from_secs(1));

    let mut sim = Simulation::new(scene, target_tps);
    let fixed_dt = sim.fixed_dt();
    let mut renderer = config.render_frames.then(|| Renderer::new(out));
    info!(
        target_tps,
        pacing = ?config.pacing,
        max_ticks = ?config.max_ticks,
        max_frame_delta_ms = max_frame_delta.as_millis() as u64,
        max_ticks_per_frame,
        "loop_config"
    );
    sim.load();

    let started = Instant::now();
    let mut metrics_accumulator = MetricsAccumulator::new(metrics_log_interval, started);
    let mut accumulator = Duration::ZERO;
    let mut last_frame_instant = started;

    let reason = 'frames: loop {
        let ticks_to_run = match config.pacing {
            Pacing::Unpaced => 1,
            Pacing::RealTime => {
                let now = Instant::now();
                let raw_frame_dt = now.saturating_duration_since(last_frame_instant);
                last_frame_instant = now;
                accumulator =
                    accumulator.saturating_add(clamp_frame_delta(raw_frame_dt, max_frame_delta));

                let step_plan = plan_sim_steps(accumulator, fixed_dt, max_ticks_per_frame);
                accumulator = step_plan.remaining_accumulator;
                if step_plan.dropped_backlog > Duration::ZERO {
                    warn!(
                        dropped_backlog_ms = step_plan.dropped_backlog.as_millis() as u64,
                        max_ticks_per_frame, "sim_clamp_triggered"
                    );
                }
                step_plan.ticks_to_run
            }
        };

        for _ in 0..ticks_to_run {
            if config.max_ticks.is_some_and(|limit| sim.ticks() >= limit) {
                break 'frames ShutdownReason::TickLimit;
            }
            let tick_started = Instant::now();
            let outcome = sim.step(input.as_mut());
            metrics_accumulator.record_tick(tick_started.elapsed());
            if let Some(reason) = outcome {
                break 'frames reason;
            }
        }

        present(&mut renderer, &sim)?;

        if let Some(snapshot) = metrics_accumulator.maybe_snapshot(Instant::now(), sim.scene_loads())
        {
            metrics_handle.publish(snapshot);
            info!(
                tps = snapshot.tps,
                tick_cost_ms = snapshot.tick_cost_ms,
                total_ticks = snapshot.total_ticks,
                scene_loads = snapshot.scene_loads,
                "loop_metrics"
            );
        }

        if config.pacing == Pacing::RealTime {
            let until_next_tick = fixed_dt.saturating_sub(accumulator);
            if until_next_tick > Duration::ZERO {
                thread::sleep(until_next_tick);
            }
        }
    };

    present(&mut renderer, &sim)?;
    let summary = RunSummary {
        reason,
        ticks: sim.ticks(),
        sim_time: sim.now(),
        scene_loads: sim.scene_loads(),
    };
    sim.shutdown();
    info!(
        reason = reason.as_str(),
        ticks = summary.ticks,
        sim_seconds = summary.sim_time.as_secs_f64(),
        "shutdown"
    );
    Ok(summary)
}

fn present<W: Write>(renderer: &mut Option<Renderer<W>>, sim: &Simulation) -> Result<(), AppError> {
    if let Some(renderer) = renderer.as_mut() {
        renderer.present(sim.frame()).map_err(AppError::Present)?;
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct StepPlan {
    ticks_to_run: u32,
    remaining_accumulator: Duration,
    dropped_backlog: Duration,
}

fn plan_sim_steps(accumulator: Duration, fixed_dt: Duration, max_ticks_per_frame: u32) -> StepPlan {
    let mut remaining = accumulator;
    let mut ticks_to_run = 0;
    while remaining >= fixed_dt && ticks_to_run < max_ticks_per_frame {
        remaining -= fixed_dt;
        ticks_to_run += 1;
    }

    let mut dropped_backlog = Duration::ZERO;
    if ticks_to_run == max_ticks_per_frame && remaining >= fixed_dt {
        dropped_backlog = remaining;
        remaining = Duration::ZERO;
    }

    StepPlan {
        ticks_to_run,
        remaining_accumulator: remaining,
        dropped_backlog,
    }
}

fn clamp_frame_delta(frame_dt: Duration, max_frame_delta: Duration) -> Duration {
    frame_dt.min(max_frame_delta)
}

fn normalize_non_zero_duration(value: Duration, fallback: Duration) -> Duration {
    if value.is_zero() {
        fallback
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::input::{InputAction, ScriptedInput};
    use crate::app::scene::{GridPos, LayerMask, RenderableDesc, Tilemap};

    struct CountdownScene {
        remaining: u32,
        reload_at: Option<u32>,
        wants_input: bool,
        seen_moves: Vec<InputAction>,
    }

    impl CountdownScene {
        fn boxed(remaining: u32) -> Box<Self> {
            Box::new(Self {
                remaining,
                reload_at: None,
                wants_input: true,
                seen_moves: Vec::new(),
            })
        }
    }

    impl Scene for CountdownScene {
        fn load(&mut self, _now: SimTime, world: &mut SceneWorld) {
            world.set_tilemap(Tilemap::walled_room(1, 1).expect("room"));
            world.spawn(
                GridPos::new(0, 0),
                RenderableDesc {
                    glyph: '@',
                    debug_name: "marker",
                },
                LayerMask::BLOCKING,
            );
        }

        fn update(
            &mut self,
            _tick: &Tick,
            input: &InputSnapshot,
            _world: &mut SceneWorld,
        ) -> SceneCommand {
            if input.is_down(InputAction::MoveUp) {
                self.seen_moves.push(InputAction::MoveUp);
            }
            if self.remaining == 0 {
                return SceneCommand::Quit;
            }
            self.remaining -= 1;
            if self.reload_at == Some(self.remaining) {
                return SceneCommand::Reload;
            }
            SceneCommand::None
        }

        fn unload(&mut self, _world: &mut SceneWorld) {}

        fn wants_input(&self) -> bool {
            self.wants_input
        }
    }

    struct IdleInput;

    impl InputSource for IdleInput {
        fn poll(&mut self) -> InputPoll {
            InputPoll::Pending
        }
    }

    fn unpaced(max_ticks: Option<u64>) -> LoopConfig {
        LoopConfig {
            pacing: Pacing::Unpaced,
            max_ticks,
            ..LoopConfig::default()
        }
    }

    #[test]
    fn clamp_frame_delta_caps_large_frame() {
        let max = Duration::from_millis(250);
        assert_eq!(clamp_frame_delta(Duration::from_secs(2), max), max);
        assert_eq!(
            clamp_frame_delta(Duration::from_millis(5), max),
            Duration::from_millis(5)
        );
    }

    #[test]
    fn plan_sim_steps_runs_expected_ticks_without_drop() {
        let fixed_dt = Duration::from_millis(16);
        let result = plan_sim_steps(Duration::from_millis(40), fixed_dt, 5);

        assert_eq!(result.ticks_to_run, 2);
        assert_eq!(result.remaining_accumulator, Duration::from_millis(8));
        assert_eq!(result.dropped_backlog, Duration::ZERO);
    }

    #[test]
    fn plan_sim_steps_drops_backlog_when_tick_cap_hit() {
        let fixed_dt = Duration::from_millis(16);
        let result = plan_sim_steps(Duration::from_millis(120), fixed_dt, 3);

        assert_eq!(result.ticks_to_run, 3);
        assert_eq!(result.remaining_accumulator, Duration::ZERO);
        assert_eq!(result.dropped_backlog, Duration::from_millis(72));
    }

    #[test]
    fn simulation_time_advances_by_fixed_step() {
        let mut sim = Simulation::new(CountdownScene::boxed(10), 50);
        sim.load();
        for _ in 0..5 {
            assert!(sim.step(&mut IdleInput).is_none());
        }
        assert_eq!(sim.ticks(), 5);
        assert_eq!(sim.now().as_duration(), Duration::from_millis(100));
    }

    #[test]
    fn scene_quit_ends_unpaced_run() {
        let summary = run_app_with_metrics(
            unpaced(None),
            CountdownScene::boxed(3),
            Box::new(IdleInput),
            Vec::new(),
            MetricsHandle::default(),
        )
        .expect("run");

        assert_eq!(summary.reason, ShutdownReason::SceneQuit);
        assert_eq!(summary.ticks, 4);
        assert_eq!(summary.scene_loads, 1);
    }

    #[test]
    fn tick_limit_stops_run() {
        let summary = run_app_with_metrics(
            unpaced(Some(7)),
            CountdownScene::boxed(100),
            Box::new(IdleInput),
            Vec::new(),
            MetricsHandle::default(),
        )
        .expect("run");

        assert_eq!(summary.reason, ShutdownReason::TickLimit);
        assert_eq!(summary.ticks, 7);
    }

    #[test]
    fn exhausted_script_stops_run_and_quit_token_wins() {
        let exhausted = run_app_with_metrics(
            unpaced(None),
            CountdownScene::boxed(100),
            Box::new(ScriptedInput::parse("up up").expect("script")),
            Vec::new(),
            MetricsHandle::default(),
        )
        .expect("run");
        assert_eq!(exhausted.reason, ShutdownReason::InputExhausted);
        assert_eq!(exhausted.ticks, 2);

        let quit = run_app_with_metrics(
            unpaced(None),
            CountdownScene::boxed(100),
            Box::new(ScriptedInput::parse("up quit up").expect("script")),
            Vec::new(),
            MetricsHandle::default(),
        )
        .expect("run");
        assert_eq!(quit.reason, ShutdownReason::QuitRequested);
        assert_eq!(quit.ticks, 1);
    }

    #[test]
    fn input_is_not_polled_while_scene_is_busy() {
        let mut scene = CountdownScene::boxed(2);
        scene.wants_input = false;
        let mut script = ScriptedInput::parse("up").expect("script");
        let mut sim = Simulation::new(scene, 60);
        sim.load();

        assert!(sim.step(&mut script).is_none());
        assert!(sim.step(&mut script).is_none());
        assert_eq!(script.remaining(), 1);
    }

    #[test]
    fn reload_command_reloads_scene() {
        let mut scene = CountdownScene::boxed(5);
        scene.reload_at = Some(3);
        let mut sim = Simulation::new(scene, 60);
        sim.load();

        for _ in 0..3 {
            sim.step(&mut IdleInput);
        }
        assert_eq!(sim.scene_loads(), 2);
        assert_eq!(sim.world().entity_count(), 1);
    }

    #[test]
    fn frame_shows_loaded_scene() {
        let mut sim = Simulation::new(CountdownScene::boxed(1), 60);
        sim.load();
        let frame = sim.frame();
        assert_eq!(frame.lines(), &["###", "#@#", "###"].map(String::from));
    }
}
