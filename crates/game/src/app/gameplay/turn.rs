use std::ops::ControlFlow;
use std::time::Duration;

use engine::{EntityId, SimTime, TimerId, TimerQueue};
use tracing::{debug, info, warn};

use super::ui::UiFacade;
use crate::app::config::TurnTiming;

/// Phase flags of the turn cycle.
///
/// The player may act only on the player's turn with no enemy phase, no level
/// setup and no game over. Any raised flag keeps `on_tick` from starting an
/// enemy phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct TurnState {
    pub(crate) current_level: u32,
    pub(crate) is_player_turn: bool,
    pub(crate) is_enemy_phase_active: bool,
    pub(crate) is_setup_in_progress: bool,
    pub(crate) is_game_over: bool,
}

impl Default for TurnState {
    fn default() -> Self {
        Self {
            current_level: 1,
            is_player_turn: true,
            is_enemy_phase_active: false,
            is_setup_in_progress: true,
            is_game_over: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TurnPhase {
    Setup,
    PlayerTurn,
    AwaitingEnemies,
    EnemyPhase,
    GameOver,
}

impl TurnState {
    pub(crate) fn blocks_enemy_phase(&self) -> bool {
        self.is_player_turn
            || self.is_enemy_phase_active
            || self.is_setup_in_progress
            || self.is_game_over
    }

    pub(crate) fn player_may_act(&self) -> bool {
        self.is_player_turn
            && !self.is_enemy_phase_active
            && !self.is_setup_in_progress
            && !self.is_game_over
    }

    pub(crate) fn phase(&self) -> TurnPhase {
        if self.is_game_over {
            TurnPhase::GameOver
        } else if self.is_setup_in_progress {
            TurnPhase::Setup
        } else if self.is_enemy_phase_active {
            TurnPhase::EnemyPhase
        } else if self.is_player_turn {
            TurnPhase::PlayerTurn
        } else {
            TurnPhase::AwaitingEnemies
        }
    }
}

/// Roster entry: which enemy to move and how long its move takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct EnemyRef {
    pub(crate) id: EntityId,
    pub(crate) move_time: Duration,
}

/// What a board builder sees while a level is being set up.
pub(crate) struct LevelSetup<'a> {
    level: u32,
    state: TurnState,
    roster: &'a mut Vec<EnemyRef>,
}

impl LevelSetup<'_> {
    pub(crate) fn level(&self) -> u32 {
        self.level
    }

    pub(crate) fn turn_state(&self) -> TurnState {
        self.state
    }

    pub(crate) fn register_enemy(&mut self, enemy: EnemyRef) {
        self.roster.push(enemy);
    }

    pub(crate) fn enemy_count(&self) -> usize {
        self.roster.len()
    }
}

pub(crate) trait BoardSetup {
    fn setup_scene(&mut self, setup: &mut LevelSetup<'_>);
}

pub(crate) trait EnemyMoves {
    /// `Break` means the move ended the game: the manager drops the rest of
    /// the phase and enters game over.
    fn move_enemy(&mut self, enemy: EnemyRef) -> ControlFlow<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TurnTimer {
    HideLevelBanner,
    EnemyStep(EnemyStep),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EnemyStep {
    Opening,
    Compensating,
    Move { index: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TurnEvent {
    BannerHidden {
        level: u32,
    },
    EnemyMoved {
        enemy: EntityId,
        at: SimTime,
    },
    EnemyPhaseFinished {
        started_at: SimTime,
        finished_at: SimTime,
        moves: usize,
    },
}

#[derive(Debug, Clone, Copy)]
struct EnemyPhase {
    started_at: SimTime,
    moves: usize,
    next_step: TimerId,
}

/// Owns the level counter, the phase flags, the enemy roster and every
/// deferred transition of the turn cycle.
pub(crate) struct LevelManager {
    timing: TurnTiming,
    state: TurnState,
    roster: Vec<EnemyRef>,
    timers: TimerQueue<TurnTimer>,
    banner_timer: Option<TimerId>,
    enemy_phase: Option<EnemyPhase>,
    ui: Option<UiFacade>,
}

impl LevelManager {
    pub(crate) fn new(timing: TurnTiming, ui: Option<UiFacade>) -> Self {
        Self {
            timing,
            state: TurnState::default(),
            roster: Vec::new(),
            timers: TimerQueue::new(),
            banner_timer: None,
            enemy_phase: None,
            ui,
        }
    }

    pub(crate) fn state(&self) -> TurnState {
        self.state
    }

    #[cfg(test)]
    pub(crate) fn roster(&self) -> &[EnemyRef] {
        &self.roster
    }

    pub(crate) fn ui(&self) -> Option<&UiFacade> {
        self.ui.as_ref()
    }

    /// Sets up the first level without touching the level counter.
    pub(crate) fn start(&mut self, now: SimTime, board: &mut dyn BoardSetup) {
        self.init_level(now, board);
    }

    pub(crate) fn on_scene_loaded(&mut self, now: SimTime, board: &mut dyn BoardSetup) {
        if self.state.is_game_over {
            debug!(
                level = self.state.current_level,
                "scene_load_ignored_after_game_over"
            );
            return;
        }
        self.state.current_level = self.state.current_level.saturating_add(1);
        self.init_level(now, board);
    }

    pub(crate) fn init_level(&mut self, now: SimTime, board: &mut dyn BoardSetup) {
        if let Some(stale) = self.banner_timer.take() {
            if self.timers.cancel(stale) {
                debug!("stale_banner_hide_cancelled");
            }
        }
        if let Some(phase) = self.enemy_phase.take() {
            self.timers.cancel(phase.next_step);
            debug!(moves = phase.moves, "enemy_phase_interrupted");
        }

        let level = self.state.current_level;
        self.state.is_setup_in_progress = true;
        self.state.is_enemy_phase_active = false;
        self.state.is_player_turn = true;

        if let Some(ui) = self.ui.as_mut() {
            ui.show_level_banner(&format!("Day {level}"));
        }
        self.banner_timer = Some(self.timers.schedule_after(
            now,
            self.timing.level_start_delay,
            TurnTimer::HideLevelBanner,
        ));

        self.roster.clear();
        let mut setup = LevelSetup {
            level,
            state: self.state,
            roster: &mut self.roster,
        };
        board.setup_scene(&mut setup);

        info!(level, enemy_count = self.roster.len(), "level_initialized");
    }

    pub(crate) fn end_player_turn(&mut self) {
        if self.state.is_game_over {
            return;
        }
        self.state.is_player_turn = false;
    }

    /// Starts the enemy phase when nothing blocks it. Returns whether it started.
    pub(crate) fn on_tick(&mut self, now: SimTime) -> bool {
        if self.state.blocks_enemy_phase() {
            return false;
        }
        self.state.is_enemy_phase_active = true;
        let next_step = self.timers.schedule_after(
            now,
            self.timing.turn_delay,
            TurnTimer::EnemyStep(EnemyStep::Opening),
        );
        self.enemy_phase = Some(EnemyPhase {
            started_at: now,
            moves: 0,
            next_step,
        });
        debug!(
            level = self.state.current_level,
            enemy_count = self.roster.len(),
            "enemy_phase_started"
        );
        true
    }

    /// Fires every transition due at `now`, in deadline order.
    pub(crate) fn advance(&mut self, now: SimTime, movers: &mut dyn EnemyMoves) -> Vec<TurnEvent> {
        let mut events = Vec::new();
        while let Some(fired) = self.timers.pop_due(now) {
            match fired.payload {
                TurnTimer::HideLevelBanner => {
                    if self.banner_timer == Some(fired.id) {
                        self.banner_timer = None;
                    }
                    if let Some(ui) = self.ui.as_mut() {
                        ui.hide_level_banner();
                    }
                    self.state.is_setup_in_progress = false;
                    events.push(TurnEvent::BannerHidden {
                        level: self.state.current_level,
                    });
                }
                TurnTimer::EnemyStep(step) => {
                    let flow = self.run_enemy_step(fired.deadline, step, movers, &mut events);
                    if flow.is_break() {
                        self.on_game_over();
                        break;
                    }
                }
            }
        }
        events
    }

    pub(crate) fn on_game_over(&mut self) {
        if self.state.is_game_over {
            return;
        }
        let level = self.state.current_level;
        if let Some(ui) = self.ui.as_mut() {
            ui.show_game_over_message(&format!("After {level} days, you starved."));
        }
        self.state.is_game_over = true;
        self.state.is_enemy_phase_active = false;
        self.enemy_phase = None;
        self.banner_timer = None;
        self.timers.clear();
        info!(level, "game_over");
    }

    fn run_enemy_step(
        &mut self,
        deadline: SimTime,
        step: EnemyStep,
        movers: &mut dyn EnemyMoves,
        events: &mut Vec<TurnEvent>,
    ) -> ControlFlow<()> {
        if self.enemy_phase.is_none() {
            warn!(?step, "enemy_step_without_phase");
            return ControlFlow::Continue(());
        }
        match step {
            EnemyStep::Opening if self.roster.is_empty() => {
                self.schedule_enemy_step(deadline + self.timing.turn_delay, EnemyStep::Compensating);
                ControlFlow::Continue(())
            }
            EnemyStep::Opening | EnemyStep::Compensating => {
                self.move_enemy_at(deadline, 0, movers, events)
            }
            EnemyStep::Move { index } => self.move_enemy_at(deadline, index, movers, events),
        }
    }

    fn move_enemy_at(
        &mut self,
        deadline: SimTime,
        index: usize,
        movers: &mut dyn EnemyMoves,
        events: &mut Vec<TurnEvent>,
    ) -> ControlFlow<()> {
        let Some(enemy) = self.roster.get(index).copied() else {
            self.finish_enemy_phase(deadline, events);
            return ControlFlow::Continue(());
        };

        let flow = movers.move_enemy(enemy);
        if let Some(phase) = self.enemy_phase.as_mut() {
            phase.moves += 1;
        }
        events.push(TurnEvent::EnemyMoved {
            enemy: enemy.id,
            at: deadline,
        });
        if flow.is_break() {
            return flow;
        }

        self.schedule_enemy_step(
            deadline + enemy.move_time,
            EnemyStep::Move { index: index + 1 },
        );
        ControlFlow::Continue(())
    }

    fn schedule_enemy_step(&mut self, deadline: SimTime, step: EnemyStep) {
        let id = self.timers.schedule_at(deadline, TurnTimer::EnemyStep(step));
        if let Some(phase) = self.enemy_phase.as_mut() {
            phase.next_step = id;
        }
    }

    fn finish_enemy_phase(&mut self, finished_at: SimTime, events: &mut Vec<TurnEvent>) {
        let Some(phase) = self.enemy_phase.take() else {
            return;
        };
        self.state.is_player_turn = true;
        self.state.is_enemy_phase_active = false;
        events.push(TurnEvent::EnemyPhaseFinished {
            started_at: phase.started_at,
            finished_at,
            moves: phase.moves,
        });
    }
}

/// Holds the single level manager of a run. The first manager installed wins.
#[derive(Default)]
pub(crate) struct ManagerSlot {
    manager: Option<LevelManager>,
}

impl ManagerSlot {
    pub(crate) fn install(&mut self, manager: LevelManager) -> bool {
        if self.manager.is_some() {
            warn!(
                level = manager.state.current_level,
                "duplicate_level_manager_discarded"
            );
            return false;
        }
        self.manager = Some(manager);
        true
    }

    pub(crate) fn get(&self) -> Option<&LevelManager> {
        self.manager.as_ref()
    }

    pub(crate) fn get_mut(&mut self) -> Option<&mut LevelManager> {
        self.manager.as_mut()
    }
}
