use std::time::Duration;

use engine::{EntityId, GridPos, InputSnapshot, LayerMask, Obstruction, RenderableDesc, SceneWorld};
use tracing::{debug, info};

use super::board::{BoardState, Pickup};
use super::mover::{try_step, Direction, MoverStats, StepOutcome};

pub(crate) const PLAYER_START: GridPos = GridPos::new(0, 0);
const WALL_DAMAGE: u32 = 1;
const FOOD_PER_MOVE: i32 = 1;

const PLAYER_RENDERABLE: RenderableDesc = RenderableDesc {
    glyph: '@',
    debug_name: "player",
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PickupRewards {
    pub(crate) food: i32,
    pub(crate) soda: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PlayerTurn {
    Moved { to: GridPos },
    PickedUp { pickup: Pickup, food: i32 },
    DamagedWall { wall: EntityId, destroyed: bool },
    Blocked,
    ReachedExit,
}

/// The player's food meter and queued move. Survives level reloads; only the
/// entity is respawned.
#[derive(Debug)]
pub(crate) struct PlayerController {
    id: Option<EntityId>,
    stats: MoverStats,
    food: i32,
    rewards: PickupRewards,
    queued: Option<Direction>,
    enabled: bool,
}

impl PlayerController {
    pub(crate) fn new(food: i32, move_time: Duration, rewards: PickupRewards) -> Self {
        Self {
            id: None,
            stats: MoverStats::with_move_time(move_time),
            food,
            rewards,
            queued: None,
            enabled: false,
        }
    }

    pub(crate) fn spawn(&mut self, world: &mut SceneWorld, position: GridPos) -> EntityId {
        let id = world.spawn(position, PLAYER_RENDERABLE, LayerMask::BLOCKING);
        self.id = Some(id);
        self.queued = None;
        self.enabled = true;
        id
    }

    pub(crate) fn despawned(&mut self) {
        self.id = None;
        self.queued = None;
        self.enabled = false;
    }

    pub(crate) fn id(&self) -> Option<EntityId> {
        self.id
    }

    pub(crate) fn food(&self) -> i32 {
        self.food
    }

    pub(crate) fn is_starving(&self) -> bool {
        self.food <= 0
    }

    pub(crate) fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub(crate) fn has_queued_move(&self) -> bool {
        self.queued.is_some()
    }

    pub(crate) fn lose_food(&mut self, amount: i32) -> i32 {
        self.food -= amount;
        self.food
    }

    pub(crate) fn queue(&mut self, input: &InputSnapshot) {
        if !self.enabled || self.queued.is_some() {
            return;
        }
        self.queued = Direction::from_input(input);
    }

    /// Spends the queued move, if any. Every attempt costs food, including
    /// bumps into walls.
    pub(crate) fn act(&mut self, world: &mut SceneWorld, board: &mut BoardState) -> Option<PlayerTurn> {
        if !self.enabled {
            return None;
        }
        let id = self.id?;
        let direction = self.queued.take()?;
        self.food -= FOOD_PER_MOVE;

        let outcome = match try_step(world, &self.stats, id, direction)? {
            StepOutcome::Moved { to, .. } => self.enter_tile(world, board, to),
            StepOutcome::Blocked {
                by: Obstruction::Entity(wall),
                ..
            } if board.walls.contains_key(&wall) => {
                let destroyed = board
                    .damage_wall(world, wall, WALL_DAMAGE)
                    .unwrap_or(false);
                PlayerTurn::DamagedWall { wall, destroyed }
            }
            StepOutcome::Blocked { .. } => PlayerTurn::Blocked,
        };
        match outcome {
            PlayerTurn::Moved { to } => debug!(?direction, x = to.x, y = to.y, "player_moved"),
            PlayerTurn::PickedUp { pickup, food } => {
                info!(?pickup, food, "pickup_collected");
            }
            PlayerTurn::DamagedWall { wall, destroyed } => {
                debug!(wall = wall.0, destroyed, "wall_damaged");
            }
            PlayerTurn::Blocked => debug!(?direction, "player_blocked"),
            PlayerTurn::ReachedExit => info!(food = self.food, "exit_reached"),
        }
        Some(outcome)
    }

    fn enter_tile(&mut self, world: &mut SceneWorld, board: &mut BoardState, to: GridPos) -> PlayerTurn {
        if board.exit == Some(to) {
            self.enabled = false;
            return PlayerTurn::ReachedExit;
        }
        match board.take_pickup_at(world, to) {
            Some(pickup) => {
                self.food += match pickup {
                    Pickup::Food => self.rewards.food,
                    Pickup::Soda => self.rewards.soda,
                };
                PlayerTurn::PickedUp {
                    pickup,
                    food: self.food,
                }
            }
            None => PlayerTurn::Moved { to },
        }
    }
}
