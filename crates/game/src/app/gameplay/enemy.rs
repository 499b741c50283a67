use std::collections::HashMap;
use std::ops::ControlFlow;
use std::time::Duration;

use engine::{EntityId, LayerMask, Obstruction, RenderableDesc, SceneWorld};
use tracing::{debug, info};

use super::mover::{try_step, Direction, Mover, MoverStats, StepOutcome};
use super::player::PlayerController;
use super::turn::{EnemyMoves, EnemyRef};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EnemyKind {
    Zombie,
    Vampire,
}

impl EnemyKind {
    pub(crate) const fn player_damage(self) -> i32 {
        match self {
            EnemyKind::Zombie => 10,
            EnemyKind::Vampire => 20,
        }
    }

    pub(crate) const fn renderable(self) -> RenderableDesc {
        match self {
            EnemyKind::Zombie => RenderableDesc {
                glyph: 'z',
                debug_name: "zombie",
            },
            EnemyKind::Vampire => RenderableDesc {
                glyph: 'v',
                debug_name: "vampire",
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct EnemyState {
    pub(crate) kind: EnemyKind,
    stats: MoverStats,
    skip_move: bool,
}

impl EnemyState {
    pub(crate) fn new(kind: EnemyKind, move_time: Duration) -> Self {
        Self {
            kind,
            stats: MoverStats::with_move_time(move_time),
            skip_move: false,
        }
    }
}

impl Mover for EnemyState {
    fn move_duration(&self) -> Duration {
        self.stats.move_duration()
    }

    fn blocking_mask(&self) -> LayerMask {
        self.stats.blocking_mask()
    }
}

/// Moves roster enemies toward the player during the enemy phase.
///
/// Each enemy rests every other turn. A step into the player is an attack.
pub(crate) struct EnemyController<'a> {
    world: &'a mut SceneWorld,
    enemies: &'a mut HashMap<EntityId, EnemyState>,
    player: &'a mut PlayerController,
}

impl<'a> EnemyController<'a> {
    pub(crate) fn new(
        world: &'a mut SceneWorld,
        enemies: &'a mut HashMap<EntityId, EnemyState>,
        player: &'a mut PlayerController,
    ) -> Self {
        Self {
            world,
            enemies,
            player,
        }
    }
}

impl EnemyMoves for EnemyController<'_> {
    fn move_enemy(&mut self, enemy: EnemyRef) -> ControlFlow<()> {
        let Some(state) = self.enemies.get_mut(&enemy.id) else {
            debug!(enemy = enemy.id.0, "enemy_missing");
            return ControlFlow::Continue(());
        };
        if state.skip_move {
            state.skip_move = false;
            return ControlFlow::Continue(());
        }
        state.skip_move = true;

        let Some(player_id) = self.player.id() else {
            return ControlFlow::Continue(());
        };
        let positions = self
            .world
            .find_entity(enemy.id)
            .zip(self.world.find_entity(player_id))
            .map(|(mover, target)| (mover.position, target.position));
        let Some(direction) = positions.and_then(|(from, target)| Direction::toward(from, target))
        else {
            return ControlFlow::Continue(());
        };

        let state = *state;
        if let Some(StepOutcome::Blocked {
            by: Obstruction::Entity(hit),
            ..
        }) = try_step(self.world, &state, enemy.id, direction)
        {
            if hit == player_id {
                let damage = state.kind.player_damage();
                let food = self.player.lose_food(damage);
                info!(
                    enemy = enemy.id.0,
                    kind = ?state.kind,
                    damage,
                    food,
                    "player_attacked"
                );
                if self.player.is_starving() {
                    return ControlFlow::Break(());
                }
            }
        }
        ControlFlow::Continue(())
    }
}
