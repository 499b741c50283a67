use std::ops::ControlFlow;
use std::time::Duration;

use engine::{EntityId, ScriptedInput, ShutdownReason, SimTime, Simulation};

use super::turn::{
    BoardSetup, EnemyMoves, EnemyRef, LevelManager, LevelSetup, ManagerSlot, TurnEvent, TurnPhase,
    TurnState,
};
use super::ui::UiFacade;
use super::*;
use crate::app::config::{BoardConfig, TurnTiming, UiTemplates};

const COARSE_TICK_MS: u64 = 16;

fn ms(value: u64) -> Duration {
    Duration::from_millis(value)
}

fn at(millis: u64) -> SimTime {
    SimTime::from_duration(ms(millis))
}

fn enemy(id: u64, move_ms: u64) -> EnemyRef {
    EnemyRef {
        id: EntityId(id),
        move_time: ms(move_ms),
    }
}

#[derive(Default)]
struct FixedBoard {
    enemies: Vec<EnemyRef>,
    observed: Vec<(u32, usize, TurnState)>,
}

impl FixedBoard {
    fn with_enemies(enemies: Vec<EnemyRef>) -> Self {
        Self {
            enemies,
            observed: Vec::new(),
        }
    }
}

impl BoardSetup for FixedBoard {
    fn setup_scene(&mut self, setup: &mut LevelSetup<'_>) {
        self.observed
            .push((setup.level(), setup.enemy_count(), setup.turn_state()));
        for enemy in &self.enemies {
            setup.register_enemy(*enemy);
        }
    }
}

#[derive(Default)]
struct RecordingMoves {
    moved: Vec<EntityId>,
    break_on: Option<EntityId>,
}

impl EnemyMoves for RecordingMoves {
    fn move_enemy(&mut self, enemy: EnemyRef) -> ControlFlow<()> {
        self.moved.push(enemy.id);
        if self.break_on == Some(enemy.id) {
            ControlFlow::Break(())
        } else {
            ControlFlow::Continue(())
        }
    }
}

fn manager_with_ui() -> LevelManager {
    LevelManager::new(
        TurnTiming::default(),
        Some(UiFacade::bind(&UiTemplates::default())),
    )
}

/// Starts level `level` at t=0 and runs to the end of its setup delay.
fn ready_at_level(level: u32, board: &mut FixedBoard) -> LevelManager {
    let mut manager = manager_with_ui();
    manager.start(SimTime::ZERO, board);
    for _ in 1..level {
        manager.on_scene_loaded(SimTime::ZERO, board);
    }
    let events = manager.advance(at(2000), &mut RecordingMoves::default());
    assert_eq!(events, vec![TurnEvent::BannerHidden { level }]);
    manager
}

/// Ends the player's turn at `start_ms` and ticks at a coarse fixed step until
/// the enemy phase finishes.
fn run_enemy_phase(
    manager: &mut LevelManager,
    moves: &mut RecordingMoves,
    start_ms: u64,
) -> Vec<TurnEvent> {
    manager.end_player_turn();
    assert!(manager.on_tick(at(start_ms)));
    let mut events = Vec::new();
    let mut now = start_ms;
    while now < start_ms + 5_000 {
        now += COARSE_TICK_MS;
        events.extend(manager.advance(at(now), moves));
        if matches!(events.last(), Some(TurnEvent::EnemyPhaseFinished { .. })) {
            break;
        }
    }
    events
}

fn phase_summary(events: &[TurnEvent]) -> (Duration, usize) {
    match events.last() {
        Some(TurnEvent::EnemyPhaseFinished {
            started_at,
            finished_at,
            moves,
        }) => (finished_at.saturating_duration_since(*started_at), *moves),
        other => panic!("enemy phase did not finish: {other:?}"),
    }
}

fn assert_duration_close(actual: Duration, expected: Duration) {
    let delta = actual.as_secs_f64() - expected.as_secs_f64();
    assert!(delta.abs() < 1e-6, "expected {expected:?}, got {actual:?}");
}

#[test]
fn first_level_with_no_enemies_waits_two_turn_delays() {
    let mut board = FixedBoard::default();
    let mut manager = ready_at_level(1, &mut board);
    let mut moves = RecordingMoves::default();

    manager.end_player_turn();
    assert!(manager.on_tick(at(2000)));
    assert!(manager.advance(at(2100), &mut moves).is_empty());
    assert!(manager.advance(at(2199), &mut moves).is_empty());
    let events = manager.advance(at(2200), &mut moves);

    let (elapsed, move_count) = phase_summary(&events);
    assert_duration_close(elapsed, ms(200));
    assert_eq!(move_count, 0);
    assert!(moves.moved.is_empty());
    let state = manager.state();
    assert!(state.is_player_turn && !state.is_enemy_phase_active);
}

#[test]
fn single_enemy_on_day_three_takes_delay_plus_move_time() {
    let mut board = FixedBoard::with_enemies(vec![enemy(7, 300)]);
    let mut manager = ready_at_level(3, &mut board);
    let mut moves = RecordingMoves::default();

    manager.end_player_turn();
    assert!(manager.on_tick(at(2000)));
    assert_eq!(
        manager.advance(at(2100), &mut moves),
        vec![TurnEvent::EnemyMoved {
            enemy: EntityId(7),
            at: at(2100)
        }]
    );
    assert!(manager.advance(at(2399), &mut moves).is_empty());
    let events = manager.advance(at(2400), &mut moves);

    let (elapsed, move_count) = phase_summary(&events);
    assert_duration_close(elapsed, ms(400));
    assert_eq!(move_count, 1);
    assert_eq!(manager.state().phase(), TurnPhase::PlayerTurn);
}

#[test]
fn enemies_move_in_registration_order_with_exact_spacing() {
    let mut board = FixedBoard::with_enemies(vec![enemy(1, 200), enemy(2, 100)]);
    let mut manager = ready_at_level(1, &mut board);
    let mut moves = RecordingMoves::default();

    let events = run_enemy_phase(&mut manager, &mut moves, 2000);

    assert_eq!(moves.moved, vec![EntityId(1), EntityId(2)]);
    let moved_at: Vec<_> = events
        .iter()
        .filter_map(|event| match event {
            TurnEvent::EnemyMoved { at, .. } => Some(*at),
            _ => None,
        })
        .collect();
    assert_eq!(moved_at, vec![at(2100), at(2300)]);
    let (elapsed, move_count) = phase_summary(&events);
    assert_duration_close(elapsed, ms(400));
    assert_eq!(move_count, 2);
}

#[test]
fn phase_duration_is_independent_of_tick_size() {
    let mut board = FixedBoard::with_enemies(vec![enemy(1, 150), enemy(2, 50), enemy(3, 75)]);
    let mut manager = ready_at_level(1, &mut board);

    let events = run_enemy_phase(&mut manager, &mut RecordingMoves::default(), 2000);
    let (elapsed, move_count) = phase_summary(&events);
    assert_duration_close(elapsed, ms(100 + 150 + 50 + 75));
    assert_eq!(move_count, 3);
}

#[test]
fn any_raised_flag_keeps_on_tick_idle() {
    let mut board = FixedBoard::with_enemies(vec![enemy(1, 100)]);
    let mut manager = manager_with_ui();
    manager.start(SimTime::ZERO, &mut board);

    assert_eq!(manager.state().phase(), TurnPhase::Setup);
    assert!(!manager.on_tick(at(10)));

    manager.advance(at(2000), &mut RecordingMoves::default());
    assert_eq!(manager.state().phase(), TurnPhase::PlayerTurn);
    assert!(!manager.on_tick(at(2000)));

    manager.end_player_turn();
    assert_eq!(manager.state().phase(), TurnPhase::AwaitingEnemies);
    assert!(manager.on_tick(at(2000)));
    assert_eq!(manager.state().phase(), TurnPhase::EnemyPhase);
    assert!(!manager.on_tick(at(2016)));

    let mut moves = RecordingMoves::default();
    manager.advance(at(3000), &mut moves);
    assert_eq!(moves.moved, vec![EntityId(1)]);
}

#[test]
fn game_over_is_terminal() {
    let mut board = FixedBoard::with_enemies(vec![enemy(1, 100)]);
    let mut manager = ready_at_level(2, &mut board);
    let mut moves = RecordingMoves::default();

    manager.end_player_turn();
    assert!(manager.on_tick(at(2000)));
    manager.on_game_over();

    let ui = manager.ui().expect("ui");
    assert!(ui.is_game_over_visible());
    assert_eq!(ui.game_over_text(), Some("After 2 days, you starved."));

    assert!(manager.advance(at(10_000), &mut moves).is_empty());
    assert!(moves.moved.is_empty());
    assert!(!manager.on_tick(at(10_000)));
    manager.end_player_turn();
    assert!(!manager.on_tick(at(10_016)));

    manager.on_scene_loaded(at(10_032), &mut board);
    assert_eq!(manager.state().current_level, 2);
    assert_eq!(manager.state().phase(), TurnPhase::GameOver);
}

#[test]
fn init_level_raises_setup_and_clears_roster_before_board_runs() {
    let mut board = FixedBoard::with_enemies(vec![enemy(4, 100), enemy(4, 100)]);
    let mut manager = ready_at_level(1, &mut board);
    assert_eq!(manager.roster().len(), 2);

    manager.on_scene_loaded(at(2500), &mut board);

    let (level, roster_len, state) = *board.observed.last().expect("board ran");
    assert_eq!(level, 2);
    assert_eq!(roster_len, 0);
    assert!(state.is_setup_in_progress);
    assert_eq!(manager.roster().len(), 2);

    let ui = manager.ui().expect("ui");
    assert!(ui.is_level_banner_visible());
    assert_eq!(ui.level_banner_text(), Some("Day 2"));
}

#[test]
fn reentering_a_level_cancels_the_stale_banner_hide() {
    let mut board = FixedBoard::default();
    let mut manager = manager_with_ui();
    manager.start(SimTime::ZERO, &mut board);
    manager.on_scene_loaded(at(1500), &mut board);

    assert!(manager
        .advance(at(2000), &mut RecordingMoves::default())
        .is_empty());
    assert!(manager.state().is_setup_in_progress);
    assert!(manager.ui().expect("ui").is_level_banner_visible());

    let events = manager.advance(at(3500), &mut RecordingMoves::default());
    assert_eq!(events, vec![TurnEvent::BannerHidden { level: 2 }]);
    assert!(!manager.ui().expect("ui").is_level_banner_visible());
}

#[test]
fn reentering_a_level_mid_phase_hands_the_turn_back() {
    let mut board = FixedBoard::with_enemies(vec![enemy(1, 100)]);
    let mut manager = ready_at_level(1, &mut board);
    let mut moves = RecordingMoves::default();

    manager.end_player_turn();
    assert!(manager.on_tick(at(2000)));
    manager.on_scene_loaded(at(2050), &mut board);

    assert!(manager.advance(at(2200), &mut moves).is_empty());
    assert!(moves.moved.is_empty());
    let state = manager.state();
    assert!(state.is_player_turn && !state.is_enemy_phase_active && state.is_setup_in_progress);
}

#[test]
fn break_from_a_move_ends_the_game() {
    let mut board = FixedBoard::with_enemies(vec![enemy(1, 100), enemy(2, 100)]);
    let mut manager = ready_at_level(1, &mut board);
    let mut moves = RecordingMoves {
        break_on: Some(EntityId(1)),
        ..RecordingMoves::default()
    };

    manager.end_player_turn();
    manager.on_tick(at(2000));
    manager.advance(at(5000), &mut moves);

    assert_eq!(moves.moved, vec![EntityId(1)]);
    let state = manager.state();
    assert!(state.is_game_over && !state.is_enemy_phase_active);
    assert_eq!(
        manager.ui().expect("ui").game_over_text(),
        Some("After 1 days, you starved.")
    );
    assert!(manager.advance(at(9000), &mut moves).is_empty());
    assert!(!manager.on_tick(at(9000)));
    assert_eq!(moves.moved, vec![EntityId(1)]);
}

#[test]
fn manager_without_ui_runs_silently() {
    let mut board = FixedBoard::with_enemies(vec![enemy(1, 100)]);
    let mut manager = LevelManager::new(TurnTiming::default(), None);
    manager.start(SimTime::ZERO, &mut board);
    manager.advance(at(2000), &mut RecordingMoves::default());

    let events = run_enemy_phase(&mut manager, &mut RecordingMoves::default(), 2000);
    assert_eq!(phase_summary(&events).1, 1);
    manager.on_game_over();
    assert!(manager.ui().is_none());
    assert!(manager.state().is_game_over);
}

#[test]
fn second_manager_is_discarded() {
    let mut slot = ManagerSlot::default();
    let mut first = manager_with_ui();
    first.start(
        SimTime::ZERO,
        &mut FixedBoard::with_enemies(vec![enemy(1, 100)]),
    );

    assert!(slot.install(first));
    assert!(!slot.install(manager_with_ui()));
    assert_eq!(slot.get().expect("manager").roster().len(), 1);
}

fn small_board_config(food: i32) -> GameConfig {
    GameConfig {
        player_food_points: food,
        board: BoardConfig {
            columns: 3,
            rows: 3,
        },
        ..GameConfig::default()
    }
}

fn run_script(config: GameConfig, script: &str) -> (Simulation, ShutdownReason) {
    let mut sim = Simulation::new(build_scene(config, 1), 60);
    let mut input = ScriptedInput::parse(script).expect("script");
    sim.load();
    assert!(!sim.wants_input(), "input polled during setup");
    for _ in 0..5_000 {
        if let Some(reason) = sim.step(&mut input) {
            return (sim, reason);
        }
    }
    panic!("script did not finish");
}

#[test]
fn walking_to_the_exit_starts_the_next_day() {
    let (sim, reason) = run_script(small_board_config(100), "right right up up");

    assert_eq!(reason, ShutdownReason::InputExhausted);
    assert_eq!(sim.scene_loads(), 2);
    assert_eq!(
        sim.frame().lines(),
        &[
            "Day 2 | Food: 96",
            "#####",
            "#..>#",
            "#.+.#",
            "#@..#",
            "#####",
        ]
        .map(String::from)
    );
}

#[test]
fn running_out_of_food_shows_game_over() {
    let (sim, reason) = run_script(small_board_config(2), "right right down");

    assert_eq!(reason, ShutdownReason::InputExhausted);
    assert_eq!(sim.scene_loads(), 1);
    let frame = sim.frame();
    assert_eq!(frame.lines()[0], "Day 1 | Food: 0");
    assert!(frame.contains("== After 1 days, you starved. =="));
    assert!(!frame.contains("== Day 1 =="));
}
