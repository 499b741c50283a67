use std::time::Duration;

use engine::{EntityId, GridPos, InputAction, InputSnapshot, LayerMask, Obstruction, SceneWorld};

pub(crate) const DEFAULT_MOVE_TIME: Duration = Duration::from_millis(100);

/// Anything that steps one tile at a time on the board.
pub(crate) trait Mover {
    fn move_duration(&self) -> Duration;
    fn blocking_mask(&self) -> LayerMask;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct MoverStats {
    pub(crate) move_time: Duration,
    pub(crate) blocking: LayerMask,
}

impl Default for MoverStats {
    fn default() -> Self {
        Self {
            move_time: DEFAULT_MOVE_TIME,
            blocking: LayerMask::BLOCKING,
        }
    }
}

impl MoverStats {
    pub(crate) fn with_move_time(move_time: Duration) -> Self {
        Self {
            move_time,
            ..Self::default()
        }
    }
}

impl Mover for MoverStats {
    fn move_duration(&self) -> Duration {
        self.move_time
    }

    fn blocking_mask(&self) -> LayerMask {
        self.blocking
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    pub(crate) const fn delta(self) -> (i32, i32) {
        match self {
            Direction::Up => (0, 1),
            Direction::Down => (0, -1),
            Direction::Left => (-1, 0),
            Direction::Right => (1, 0),
        }
    }

    pub(crate) fn from_input(input: &InputSnapshot) -> Option<Self> {
        [
            (InputAction::MoveUp, Direction::Up),
            (InputAction::MoveDown, Direction::Down),
            (InputAction::MoveLeft, Direction::Left),
            (InputAction::MoveRight, Direction::Right),
        ]
        .into_iter()
        .find(|(action, _)| input.is_down(*action))
        .map(|(_, direction)| direction)
    }

    /// Greedy single step: close the horizontal gap first, then the vertical one.
    pub(crate) fn toward(from: GridPos, target: GridPos) -> Option<Self> {
        if from.x != target.x {
            return Some(if target.x > from.x {
                Direction::Right
            } else {
                Direction::Left
            });
        }
        match target.y.cmp(&from.y) {
            std::cmp::Ordering::Greater => Some(Direction::Up),
            std::cmp::Ordering::Less => Some(Direction::Down),
            std::cmp::Ordering::Equal => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StepOutcome {
    Moved { from: GridPos, to: GridPos },
    Blocked { target: GridPos, by: Obstruction },
}

/// Moves `id` one tile unless something on the mover's blocking mask is in the way.
/// Returns `None` when the entity is not in the world.
pub(crate) fn try_step(
    world: &mut SceneWorld,
    mover: &impl Mover,
    id: EntityId,
    direction: Direction,
) -> Option<StepOutcome> {
    let from = world.find_entity(id)?.position;
    let (dx, dy) = direction.delta();
    let to = from.offset(dx, dy);
    if let Some(by) = world.obstruction_at(to, mover.blocking_mask()) {
        return Some(StepOutcome::Blocked { target: to, by });
    }
    world.set_position(id, to);
    Some(StepOutcome::Moved { from, to })
}
