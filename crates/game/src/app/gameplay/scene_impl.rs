use engine::{InputSnapshot, Scene, SceneCommand, SceneWorld, SimTime, Tick, UiDocument};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info, warn};

use super::board::{BoardState, RandomBoard};
use super::enemy::EnemyController;
use super::player::{PickupRewards, PlayerController, PlayerTurn, PLAYER_START};
use super::turn::{LevelManager, ManagerSlot, TurnEvent, TurnPhase};
use super::ui::UiFacade;
use crate::app::config::GameConfig;

pub(crate) struct DungeonScene {
    config: GameConfig,
    rng: ChaCha8Rng,
    slot: ManagerSlot,
    board: BoardState,
    player: PlayerController,
    restart_at: Option<SimTime>,
    loads: u64,
    last_phase: Option<TurnPhase>,
}

impl DungeonScene {
    pub(crate) fn new(config: GameConfig, seed: u64) -> Self {
        let mut slot = ManagerSlot::default();
        slot.install(LevelManager::new(
            config.turn_timing(),
            Some(UiFacade::bind(&config.ui)),
        ));
        let player = PlayerController::new(
            config.player_food_points,
            config.player_move_time(),
            PickupRewards {
                food: config.food_per_pickup,
                soda: config.soda_per_pickup,
            },
        );
        info!(seed, "dungeon_seeded");
        Self {
            config,
            rng: ChaCha8Rng::seed_from_u64(seed),
            slot,
            board: BoardState::default(),
            player,
            restart_at: None,
            loads: 0,
            last_phase: None,
        }
    }

    fn log_phase_change(&mut self) {
        let phase = self.slot.get().map(|manager| manager.state().phase());
        if phase != self.last_phase {
            debug!(from = ?self.last_phase, to = ?phase, "turn_phase_changed");
            self.last_phase = phase;
        }
    }
}

impl Scene for DungeonScene {
    fn load(&mut self, now: SimTime, world: &mut SceneWorld) {
        self.board = BoardState::default();
        self.restart_at = None;
        let Some(manager) = self.slot.get_mut() else {
            warn!("level_manager_missing");
            return;
        };

        let mut board = RandomBoard::new(
            world,
            &mut self.rng,
            &mut self.board,
            self.config.board,
            self.config.enemy_move_time(),
        );
        if self.loads == 0 {
            manager.start(now, &mut board);
        } else {
            manager.on_scene_loaded(now, &mut board);
        }
        self.loads += 1;
        self.player.spawn(world, PLAYER_START);
    }

    fn update(&mut self, tick: &Tick, input: &InputSnapshot, world: &mut SceneWorld) -> SceneCommand {
        if self.restart_at.is_some_and(|at| tick.now >= at) {
            self.restart_at = None;
            info!(food = self.player.food(), "level_restart");
            return SceneCommand::Reload;
        }
        let Some(manager) = self.slot.get_mut() else {
            return SceneCommand::None;
        };

        let mut enemies = EnemyController::new(world, &mut self.board.enemies, &mut self.player);
        for event in manager.advance(tick.now, &mut enemies) {
            match event {
                TurnEvent::BannerHidden { level } => debug!(level, "setup_finished"),
                TurnEvent::EnemyMoved { enemy, at } => {
                    let at_ms = at.as_duration().as_millis() as u64;
                    debug!(enemy = enemy.0, at_ms, "enemy_moved");
                }
                TurnEvent::EnemyPhaseFinished {
                    started_at,
                    finished_at,
                    moves,
                } => debug!(
                    moves,
                    elapsed_ms = finished_at.saturating_duration_since(started_at).as_millis()
                        as u64,
                    "enemies_done"
                ),
            }
        }
        if self.player.is_starving() {
            manager.on_game_over();
        }

        if !manager.state().is_game_over {
            self.player.queue(input);
            if manager.state().player_may_act() {
                if let Some(turn) = self.player.act(world, &mut self.board) {
                    manager.end_player_turn();
                    if self.player.is_starving() {
                        manager.on_game_over();
                    } else if turn == PlayerTurn::ReachedExit {
                        self.restart_at = Some(tick.now + self.config.restart_level_delay());
                    }
                }
            }
            manager.on_tick(tick.now);
        }

        self.log_phase_change();
        SceneCommand::None
    }

    fn unload(&mut self, _world: &mut SceneWorld) {
        self.player.despawned();
        debug!(loads = self.loads, "dungeon_unloaded");
    }

    fn wants_input(&self) -> bool {
        let Some(manager) = self.slot.get() else {
            return false;
        };
        let state = manager.state();
        state.is_game_over
            || (state.player_may_act()
                && self.player.is_enabled()
                && !self.player.has_queued_move())
    }

    fn ui_document(&self) -> Option<&UiDocument> {
        self.slot
            .get()
            .and_then(LevelManager::ui)
            .map(UiFacade::document)
    }

    fn status_line(&self, _world: &SceneWorld) -> Option<String> {
        let level = self.slot.get()?.state().current_level;
        Some(format!("Day {level} | Food: {}", self.player.food()))
    }
}
