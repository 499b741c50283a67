use std::io::{self, Write};

use super::scene::{GridPos, SceneWorld, TileKind};
use super::ui::UiDocument;

const FLOOR_GLYPH: char = '.';
const SOLID_GLYPH: char = '#';
const VOID_GLYPH: char = ' ';
const OVERLAY_BORDER: &str = "==";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextFrame {
    lines: Vec<String>,
}

impl TextFrame {
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.lines.iter().any(|line| line.contains(needle))
    }
}

/// Status line, board rows top to bottom, then one block per visible overlay.
pub fn compose_frame(
    world: &SceneWorld,
    ui: Option<&UiDocument>,
    status: Option<&str>,
) -> TextFrame {
    let mut lines = Vec::new();
    if let Some(status) = status {
        lines.push(status.to_string());
    }

    if let Some(tilemap) = world.tilemap() {
        let origin = tilemap.origin();
        let width = tilemap.width() as i32;
        let height = tilemap.height() as i32;
        let mut rows = vec![vec![VOID_GLYPH; width as usize]; height as usize];
        for (y, row) in rows.iter_mut().enumerate() {
            for (x, cell) in row.iter_mut().enumerate() {
                let position = GridPos::new(origin.x + x as i32, origin.y + y as i32);
                *cell = match tilemap.tile_at(position) {
                    Some(TileKind::Floor) => FLOOR_GLYPH,
                    Some(TileKind::Solid) => SOLID_GLYPH,
                    None => VOID_GLYPH,
                };
            }
        }

        let mut drawn: Vec<_> = world.entities().iter().collect();
        drawn.sort_by_key(|entity| entity.applied_spawn_order());
        for entity in drawn {
            let local_x = entity.position.x - origin.x;
            let local_y = entity.position.y - origin.y;
            if (0..width).contains(&local_x) && (0..height).contains(&local_y) {
                rows[local_y as usize][local_x as usize] = entity.renderable.glyph;
            }
        }

        lines.extend(rows.into_iter().rev().map(|row| row.into_iter().collect()));
    }

    if let Some(document) = ui {
        for element in document.visible_elements() {
            for label in element.labels() {
                if label.text.is_empty() {
                    continue;
                }
                lines.push(format!("{OVERLAY_BORDER} {} {OVERLAY_BORDER}", label.text));
            }
        }
    }

    TextFrame { lines }
}

/// Writes frames to a text sink, skipping frames identical to the last one.
pub struct Renderer<W: Write> {
    out: W,
    last_frame: Option<TextFrame>,
}

impl<W: Write> Renderer<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            last_frame: None,
        }
    }

    pub fn present(&mut self, frame: TextFrame) -> io::Result<bool> {
        if self.last_frame.as_ref() == Some(&frame) {
            return Ok(false);
        }
        for line in frame.lines() {
            writeln!(self.out, "{line}")?;
        }
        writeln!(self.out)?;
        self.out.flush()?;
        self.last_frame = Some(frame);
        Ok(true)
    }

    pub fn get_ref(&self) -> &W {
        &self.out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::scene::{LayerMask, RenderableDesc, Tilemap};
    use crate::app::ui::{Display, VisualElement};

    fn glyph(glyph: char) -> RenderableDesc {
        RenderableDesc {
            glyph,
            debug_name: "test",
        }
    }

    #[test]
    fn board_rows_print_top_down_with_entities() {
        let mut world = SceneWorld::default();
        world.set_tilemap(Tilemap::walled_room(2, 2).expect("room"));
        world.spawn(GridPos::new(0, 0), glyph('@'), LayerMask::BLOCKING);
        world.spawn(GridPos::new(1, 1), glyph('E'), LayerMask::ITEMS);
        world.apply_pending();

        let frame = compose_frame(&world, None, Some("Food: 5"));
        assert_eq!(
            frame.lines(),
            &["Food: 5", "####", "#.E#", "#@.#", "####"].map(String::from)
        );
    }

    #[test]
    fn later_spawn_draws_over_earlier() {
        let mut world = SceneWorld::default();
        world.set_tilemap(Tilemap::walled_room(1, 1).expect("room"));
        world.spawn(GridPos::new(0, 0), glyph('f'), LayerMask::ITEMS);
        world.spawn(GridPos::new(0, 0), glyph('@'), LayerMask::BLOCKING);
        world.apply_pending();

        let frame = compose_frame(&world, None, None);
        assert_eq!(frame.lines()[1], "#@#");
    }

    #[test]
    fn visible_overlay_labels_are_appended() {
        let world = SceneWorld::default();
        let mut document = UiDocument::default();
        let mut card = VisualElement::new("TitleCard").with_label("TitleLabel", "Day 3");
        card.display = Display::Flex;
        document.add(card);
        document.add(VisualElement::new("GameOver").with_label("GameOverLabel", "hidden"));

        let frame = compose_frame(&world, Some(&document), None);
        assert_eq!(frame.lines(), &["== Day 3 ==".to_string()]);
        assert!(!frame.contains("hidden"));
    }

    #[test]
    fn renderer_skips_unchanged_frames() {
        let mut renderer = Renderer::new(Vec::new());
        let frame = TextFrame {
            lines: vec!["a".to_string()],
        };

        assert!(renderer.present(frame.clone()).expect("first"));
        assert!(!renderer.present(frame).expect("repeat"));
        assert_eq!(renderer.get_ref().as_slice(), b"a\n\n");
    }
}
