use engine::Scene;

use crate::app::config::GameConfig;

mod board;
mod enemy;
mod mover;
mod player;
mod scene_impl;
mod turn;
mod ui;

pub(crate) use scene_impl::DungeonScene;

pub(crate) fn build_scene(config: GameConfig, seed: u64) -> Box<dyn Scene> {
    Box::new(DungeonScene::new(config, seed))
}

#[cfg(test)]
mod tests;
