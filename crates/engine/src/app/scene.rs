use std::time::Duration;

use bitflags::bitflags;
use thiserror::Error;

use super::input::InputSnapshot;
use super::timers::SimTime;
use super::ui::UiDocument;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SceneCommand {
    None,
    Reload,
    Quit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tick {
    pub index: u64,
    pub now: SimTime,
    pub dt: Duration,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(pub u64);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct GridPos {
    pub x: i32,
    pub y: i32,
}

impl GridPos {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub const fn offset(self, dx: i32, dy: i32) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
        }
    }
}

bitflags! {
    /// Collision layers an entity occupies; movers test against a mask of these.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    pub struct LayerMask: u8 {
        const BLOCKING = 1 << 0;
        const ITEMS    = 1 << 1;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileKind {
    Floor,
    Solid,
}

/// Tilemap origin convention:
/// - `origin` is the grid position of tile (0,0).
/// - Tiles outside the map count as solid for blocking queries.
#[derive(Debug, Clone, PartialEq)]
pub struct Tilemap {
    width: u32,
    height: u32,
    origin: GridPos,
    tiles: Vec<TileKind>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TilemapError {
    #[error("tile count mismatch: expected {expected}, got {actual}")]
    TileCountMismatch { expected: usize, actual: usize },
    #[error("room of {columns}x{rows} does not fit the grid")]
    RoomTooLarge { columns: u32, rows: u32 },
}

impl Tilemap {
    pub fn new(
        width: u32,
        height: u32,
        origin: GridPos,
        tiles: Vec<TileKind>,
    ) -> Result<Self, TilemapError> {
        let expected = width as usize * height as usize;
        let actual = tiles.len();
        if expected != actual {
            return Err(TilemapError::TileCountMismatch { expected, actual });
        }
        Ok(Self {
            width,
            height,
            origin,
            tiles,
        })
    }

    /// Floor area of `columns`×`rows` starting at (0,0), ringed by solid tiles.
    pub fn walled_room(columns: u32, rows: u32) -> Result<Self, TilemapError> {
        let too_large = TilemapError::RoomTooLarge { columns, rows };
        let side = |floor: u32| {
            floor
                .checked_add(2)
                .filter(|side| i32::try_from(*side).is_ok())
        };
        let (Some(width), Some(height)) = (side(columns), side(rows)) else {
            return Err(too_large);
        };
        let count = (width as usize)
            .checked_mul(height as usize)
            .ok_or(too_large)?;
        let mut tiles = Vec::with_capacity(count);
        for y in 0..height {
            for x in 0..width {
                let edge = x == 0 || y == 0 || x == width - 1 || y == height - 1;
                tiles.push(if edge { TileKind::Solid } else { TileKind::Floor });
            }
        }
        Ok(Self {
            width,
            height,
            origin: GridPos::new(-1, -1),
            tiles,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn origin(&self) -> GridPos {
        self.origin
    }

    pub fn index_of(&self, position: GridPos) -> Option<usize> {
        let local_x = position.x.checked_sub(self.origin.x)?;
        let local_y = position.y.checked_sub(self.origin.y)?;
        if local_x < 0 || local_y < 0 {
            return None;
        }
        let (x, y) = (local_x as u32, local_y as u32);
        if x >= self.width || y >= self.height {
            return None;
        }
        Some(y as usize * self.width as usize + x as usize)
    }

    pub fn tile_at(&self, position: GridPos) -> Option<TileKind> {
        self.index_of(position)
            .and_then(|index| self.tiles.get(index).copied())
    }

    pub fn is_solid(&self, position: GridPos) -> bool {
        !matches!(self.tile_at(position), Some(TileKind::Floor))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderableDesc {
    pub glyph: char,
    pub debug_name: &'static str,
}

#[derive(Debug, Clone)]
pub struct Entity {
    pub id: EntityId,
    pub position: GridPos,
    pub renderable: RenderableDesc,
    pub layer: LayerMask,
    applied_spawn_order: u64,
}

impl Entity {
    pub fn applied_spawn_order(&self) -> u64 {
        self.applied_spawn_order
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Obstruction {
    Tile,
    Entity(EntityId),
}

#[derive(Debug, Default)]
pub struct EntityIdAllocator {
    next: u64,
}

impl EntityIdAllocator {
    pub fn allocate(&mut self) -> EntityId {
        let id = EntityId(self.next);
        self.next = self.next.saturating_add(1);
        id
    }
}

/// Entities and board of the loaded scene.
///
/// Spawns and despawns are staged and take effect on [`SceneWorld::apply_pending`].
/// Ids are never reused, even across [`SceneWorld::clear`].
#[derive(Debug, Default)]
pub struct SceneWorld {
    allocator: EntityIdAllocator,
    entities: Vec<Entity>,
    pending_spawns: Vec<Entity>,
    pending_despawns: Vec<EntityId>,
    next_applied_spawn_order: u64,
    tilemap: Option<Tilemap>,
}

impl SceneWorld {
    pub fn spawn(
        &mut self,
        position: GridPos,
        renderable: RenderableDesc,
        layer: LayerMask,
    ) -> EntityId {
        let id = self.allocator.allocate();
        self.pending_spawns.push(Entity {
            id,
            position,
            renderable,
            layer,
            applied_spawn_order: 0,
        });
        id
    }

    pub fn despawn(&mut self, id: EntityId) -> bool {
        let exists_now = self.entities.iter().any(|entity| entity.id == id);
        let pending_spawn = self.pending_spawns.iter().any(|entity| entity.id == id);
        if !exists_now && !pending_spawn {
            return false;
        }
        self.pending_despawns.push(id);
        true
    }

    pub fn apply_pending(&mut self) {
        if !self.pending_spawns.is_empty() {
            for mut entity in self.pending_spawns.drain(..) {
                entity.applied_spawn_order = self.next_applied_spawn_order;
                self.next_applied_spawn_order = self.next_applied_spawn_order.saturating_add(1);
                self.entities.push(entity);
            }
        }

        if !self.pending_despawns.is_empty() {
            self.pending_despawns.sort_unstable();
            self.pending_despawns.dedup();
            let pending = &self.pending_despawns;
            self.entities
                .retain(|entity| pending.binary_search(&entity.id).is_err());
            self.pending_despawns.clear();
        }
    }

    pub fn clear(&mut self) {
        self.entities.clear();
        self.pending_spawns.clear();
        self.pending_despawns.clear();
        self.next_applied_spawn_order = 0;
        self.tilemap = None;
    }

    pub fn set_tilemap(&mut self, tilemap: Tilemap) {
        self.tilemap = Some(tilemap);
    }

    pub fn tilemap(&self) -> Option<&Tilemap> {
        self.tilemap.as_ref()
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    pub fn find_entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.iter().find(|entity| entity.id == id)
    }

    pub fn find_entity_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.iter_mut().find(|entity| entity.id == id)
    }

    pub fn set_position(&mut self, id: EntityId, position: GridPos) -> bool {
        match self.find_entity_mut(id) {
            Some(entity) => {
                entity.position = position;
                true
            }
            None => false,
        }
    }

    pub fn entities_at(&self, position: GridPos) -> impl Iterator<Item = &Entity> + '_ {
        self.entities
            .iter()
            .filter(move |entity| entity.position == position)
    }

    /// Topmost entity at `position` on any layer in `mask`; later spawns win.
    pub fn pick_topmost_at(&self, position: GridPos, mask: LayerMask) -> Option<EntityId> {
        let mut best: Option<(u64, EntityId)> = None;
        for entity in self.entities_at(position) {
            if !entity.layer.intersects(mask) {
                continue;
            }
            match best {
                Some((order, _)) if order >= entity.applied_spawn_order => {}
                _ => best = Some((entity.applied_spawn_order, entity.id)),
            }
        }
        best.map(|(_, id)| id)
    }

    /// What stops a mover using `mask` from entering `position`, if anything.
    ///
    /// Solid tiles block only movers whose mask includes `BLOCKING`.
    pub fn obstruction_at(&self, position: GridPos, mask: LayerMask) -> Option<Obstruction> {
        if mask.contains(LayerMask::BLOCKING) {
            let solid = self
                .tilemap
                .as_ref()
                .map_or(false, |tilemap| tilemap.is_solid(position));
            if solid {
                return Some(Obstruction::Tile);
            }
        }
        self.pick_topmost_at(position, mask)
            .map(Obstruction::Entity)
    }
}

pub trait Scene {
    fn load(&mut self, now: SimTime, world: &mut SceneWorld);
    fn update(&mut self, tick: &Tick, input: &InputSnapshot, world: &mut SceneWorld)
        -> SceneCommand;
    fn unload(&mut self, world: &mut SceneWorld);
    /// The loop only polls its input source while this returns true.
    fn wants_input(&self) -> bool {
        true
    }
    fn ui_document(&self) -> Option<&UiDocument> {
        None
    }
    fn status_line(&self, _world: &SceneWorld) -> Option<String> {
        None
    }
}

struct SceneRuntime {
    scene: Box<dyn Scene>,
    world: SceneWorld,
    is_loaded: bool,
}

pub(crate) struct SceneMachine {
    runtime: SceneRuntime,
    load_count: u64,
}

impl SceneMachine {
    pub(crate) fn new(scene: Box<dyn Scene>) -> Self {
        Self {
            runtime: SceneRuntime {
                scene,
                world: SceneWorld::default(),
                is_loaded: false,
            },
            load_count: 0,
        }
    }

    pub(crate) fn load_count(&self) -> u64 {
        self.load_count
    }

    pub(crate) fn load_active(&mut self, now: SimTime) {
        if self.runtime.is_loaded {
            return;
        }
        let runtime = &mut self.runtime;
        runtime.scene.load(now, &mut runtime.world);
        runtime.world.apply_pending();
        runtime.is_loaded = true;
        self.load_count = self.load_count.saturating_add(1);
    }

    pub(crate) fn update_active(&mut self, tick: &Tick, input: &InputSnapshot) -> SceneCommand {
        let runtime = &mut self.runtime;
        let command = runtime.scene.update(tick, input, &mut runtime.world);
        runtime.world.apply_pending();
        command
    }

    pub(crate) fn wants_input(&self) -> bool {
        self.runtime.is_loaded && self.runtime.scene.wants_input()
    }

    pub(crate) fn world(&self) -> &SceneWorld {
        &self.runtime.world
    }

    pub(crate) fn ui_document(&self) -> Option<&UiDocument> {
        self.runtime.scene.ui_document()
    }

    pub(crate) fn status_line(&self) -> Option<String> {
        self.runtime.scene.status_line(&self.runtime.world)
    }

    /// Unloads, clears the world and loads again; the scene object survives.
    pub(crate) fn reload(&mut self, now: SimTime) {
        let runtime = &mut self.runtime;
        if runtime.is_loaded {
            runtime.scene.unload(&mut runtime.world);
        }
        runtime.world.clear();
        runtime.is_loaded = false;
        self.load_active(now);
    }

    pub(crate) fn shutdown(&mut self) {
        let runtime = &mut self.runtime;
        if runtime.is_loaded {
            runtime.scene.unload(&mut runtime.world);
            runtime.world.clear();
            runtime.is_loaded = false;
        }
    }
}
