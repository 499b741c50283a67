use std::collections::HashMap;
use std::time::Duration;

use engine::{EntityId, GridPos, LayerMask, RenderableDesc, SceneWorld, Tilemap};
use rand::seq::SliceRandom;
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use tracing::{info, warn};

use super::enemy::{EnemyKind, EnemyState};
use super::mover::Mover;
use super::turn::{BoardSetup, EnemyRef, LevelSetup};
use crate::app::config::BoardConfig;

const WALL_COUNT_RANGE: (usize, usize) = (5, 9);
const FOOD_COUNT_RANGE: (usize, usize) = (1, 5);
const WALL_HIT_POINTS: u32 = 3;

const WALL_RENDERABLE: RenderableDesc = RenderableDesc {
    glyph: '+',
    debug_name: "wall",
};
const FOOD_RENDERABLE: RenderableDesc = RenderableDesc {
    glyph: 'f',
    debug_name: "food",
};
const SODA_RENDERABLE: RenderableDesc = RenderableDesc {
    glyph: 's',
    debug_name: "soda",
};
const EXIT_RENDERABLE: RenderableDesc = RenderableDesc {
    glyph: '>',
    debug_name: "exit",
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Pickup {
    Food,
    Soda,
}

/// Gameplay data attached to the entities of the current level.
#[derive(Debug, Default)]
pub(crate) struct BoardState {
    pub(crate) walls: HashMap<EntityId, u32>,
    pub(crate) pickups: HashMap<EntityId, Pickup>,
    pub(crate) enemies: HashMap<EntityId, EnemyState>,
    pub(crate) exit: Option<GridPos>,
}

impl BoardState {
    /// Applies `damage` to an inner wall and despawns it at zero hit points.
    /// Returns `None` if `id` is not a wall, otherwise whether it was destroyed.
    pub(crate) fn damage_wall(
        &mut self,
        world: &mut SceneWorld,
        id: EntityId,
        damage: u32,
    ) -> Option<bool> {
        let hit_points = self.walls.get_mut(&id)?;
        *hit_points = hit_points.saturating_sub(damage);
        if *hit_points > 0 {
            return Some(false);
        }
        self.walls.remove(&id);
        world.despawn(id);
        Some(true)
    }

    pub(crate) fn take_pickup_at(
        &mut self,
        world: &mut SceneWorld,
        position: GridPos,
    ) -> Option<Pickup> {
        let id = world
            .entities_at(position)
            .map(|entity| entity.id)
            .find(|id| self.pickups.contains_key(id))?;
        let pickup = self.pickups.remove(&id)?;
        world.despawn(id);
        Some(pickup)
    }
}

/// Random level layout over a walled room: the start tile is (0,0) and the
/// exit sits in the opposite corner. Walls, pickups and enemies only use the
/// inner tiles, so the outer floor ring always stays open.
pub(crate) struct RandomBoard<'a> {
    world: &'a mut SceneWorld,
    rng: &'a mut ChaCha8Rng,
    state: &'a mut BoardState,
    config: BoardConfig,
    enemy_move_time: Duration,
}

impl<'a> RandomBoard<'a> {
    pub(crate) fn new(
        world: &'a mut SceneWorld,
        rng: &'a mut ChaCha8Rng,
        state: &'a mut BoardState,
        config: BoardConfig,
        enemy_move_time: Duration,
    ) -> Self {
        Self {
            world,
            rng,
            state,
            config,
            enemy_move_time,
        }
    }

    fn inner_positions(&self) -> Vec<GridPos> {
        let columns = self.config.columns as i32;
        let rows = self.config.rows as i32;
        (1..rows - 1)
            .flat_map(|y| (1..columns - 1).map(move |x| GridPos::new(x, y)))
            .collect()
    }

    fn take_positions(
        &mut self,
        free: &mut Vec<GridPos>,
        (min, max): (usize, usize),
    ) -> Vec<GridPos> {
        let wanted = self.rng.gen_range(min..=max);
        let count = wanted.min(free.len());
        free.split_off(free.len() - count)
    }
}

pub(crate) fn enemy_count_for_level(level: u32) -> usize {
    level.max(1).ilog2() as usize
}

impl BoardSetup for RandomBoard<'_> {
    fn setup_scene(&mut self, setup: &mut LevelSetup<'_>) {
        let level = setup.level();
        let tilemap = match Tilemap::walled_room(self.config.columns, self.config.rows) {
            Ok(tilemap) => tilemap,
            Err(error) => {
                warn!(level, %error, "board_rejected");
                return;
            }
        };
        self.world.set_tilemap(tilemap);

        let exit = GridPos::new(self.config.columns as i32 - 1, self.config.rows as i32 - 1);
        self.world.spawn(exit, EXIT_RENDERABLE, LayerMask::ITEMS);
        self.state.exit = Some(exit);

        let mut free = self.inner_positions();
        free.shuffle(&mut *self.rng);

        let wall_positions = self.take_positions(&mut free, WALL_COUNT_RANGE);
        for position in &wall_positions {
            let id = self
                .world
                .spawn(*position, WALL_RENDERABLE, LayerMask::BLOCKING);
            self.state.walls.insert(id, WALL_HIT_POINTS);
        }

        let pickup_positions = self.take_positions(&mut free, FOOD_COUNT_RANGE);
        for position in &pickup_positions {
            let pickup = if self.rng.gen_bool(0.5) {
                Pickup::Soda
            } else {
                Pickup::Food
            };
            let renderable = match pickup {
                Pickup::Food => FOOD_RENDERABLE,
                Pickup::Soda => SODA_RENDERABLE,
            };
            let id = self.world.spawn(*position, renderable, LayerMask::ITEMS);
            self.state.pickups.insert(id, pickup);
        }

        let enemy_count = enemy_count_for_level(level).min(free.len());
        for position in free.split_off(free.len() - enemy_count) {
            let kind = if self.rng.gen_bool(0.5) {
                EnemyKind::Vampire
            } else {
                EnemyKind::Zombie
            };
            let id = self
                .world
                .spawn(position, kind.renderable(), LayerMask::BLOCKING);
            let enemy = EnemyState::new(kind, self.enemy_move_time);
            setup.register_enemy(EnemyRef {
                id,
                move_time: enemy.move_duration(),
            });
            self.state.enemies.insert(id, enemy);
        }

        info!(
            level,
            walls = wall_positions.len(),
            pickups = pickup_positions.len(),
            enemies = setup.enemy_count(),
            phase = ?setup.turn_state().phase(),
            "board_built"
        );
    }
}
