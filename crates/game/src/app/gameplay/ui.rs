use engine::{Display, ElementHandle, ElementTemplate, UiDocument};
use tracing::debug;

use crate::app::config::UiTemplates;

pub(crate) const TITLE_LABEL: &str = "TitleLabel";
pub(crate) const GAME_OVER_LABEL: &str = "GameOverLabel";

/// Owns the title card and game-over overlays.
///
/// Calls against an element that was never bound are ignored, as is text for
/// a label the element does not contain.
#[derive(Debug, Default)]
pub(crate) struct UiFacade {
    document: UiDocument,
    title_card: Option<ElementHandle>,
    game_over: Option<ElementHandle>,
}

impl UiFacade {
    pub(crate) fn bind(templates: &UiTemplates) -> Self {
        let mut document = UiDocument::default();
        let mut instantiate = |template: Option<&ElementTemplate>| {
            template.map(|template| {
                let mut element = template.clone_tree();
                element.display = Display::None;
                document.add(element)
            })
        };
        let title_card = instantiate(templates.title_card.as_ref());
        let game_over = instantiate(templates.game_over.as_ref());
        debug!(
            title_card_bound = title_card.is_some(),
            game_over_bound = game_over.is_some(),
            "ui_bound"
        );
        Self {
            document,
            title_card,
            game_over,
        }
    }

    pub(crate) fn show_level_banner(&mut self, text: &str) {
        show_with_text(&mut self.document, self.title_card, TITLE_LABEL, text);
    }

    pub(crate) fn hide_level_banner(&mut self) {
        if let Some(element) = self
            .title_card
            .and_then(|handle| self.document.element_mut(handle))
        {
            element.display = Display::None;
        }
    }

    pub(crate) fn show_game_over_message(&mut self, text: &str) {
        show_with_text(&mut self.document, self.game_over, GAME_OVER_LABEL, text);
    }

    pub(crate) fn document(&self) -> &UiDocument {
        &self.document
    }
}

#[cfg(test)]
impl UiFacade {
    pub(crate) fn is_level_banner_visible(&self) -> bool {
        self.is_visible(self.title_card)
    }

    pub(crate) fn is_game_over_visible(&self) -> bool {
        self.is_visible(self.game_over)
    }

    pub(crate) fn level_banner_text(&self) -> Option<&str> {
        self.label_text(self.title_card, TITLE_LABEL)
    }

    pub(crate) fn game_over_text(&self) -> Option<&str> {
        self.label_text(self.game_over, GAME_OVER_LABEL)
    }

    fn is_visible(&self, handle: Option<ElementHandle>) -> bool {
        handle
            .and_then(|handle| self.document.element(handle))
            .is_some_and(|element| element.is_visible())
    }

    fn label_text(&self, handle: Option<ElementHandle>, label: &str) -> Option<&str> {
        let element = self.document.element(handle?)?;
        element.query_label(label).map(|label| label.text.as_str())
    }
}

fn show_with_text(
    document: &mut UiDocument,
    handle: Option<ElementHandle>,
    label: &str,
    text: &str,
) {
    let Some(element) = handle.and_then(|handle| document.element_mut(handle)) else {
        return;
    };
    if let Some(label) = element.query_label_mut(label) {
        label.text = text.to_string();
    }
    element.display = Display::Flex;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bound_elements_start_hidden() {
        let ui = UiFacade::bind(&UiTemplates::default());
        assert_eq!(ui.document().len(), 2);
        assert!(!ui.is_level_banner_visible());
        assert!(!ui.is_game_over_visible());
        assert_eq!(ui.document().visible_elements().count(), 0);
    }

    #[test]
    fn banner_show_sets_text_and_hide_clears_visibility() {
        let mut ui = UiFacade::bind(&UiTemplates::default());
        ui.show_level_banner("Day 4");
        assert!(ui.is_level_banner_visible());
        assert_eq!(ui.level_banner_text(), Some("Day 4"));

        ui.hide_level_banner();
        assert!(!ui.is_level_banner_visible());
        assert_eq!(ui.level_banner_text(), Some("Day 4"));
    }

    #[test]
    fn game_over_message_is_shown() {
        let mut ui = UiFacade::bind(&UiTemplates::default());
        ui.show_game_over_message("After 2 days, you starved.");
        assert!(ui.is_game_over_visible());
        assert_eq!(ui.game_over_text(), Some("After 2 days, you starved."));
    }

    #[test]
    fn unbound_facade_ignores_every_call() {
        let mut ui = UiFacade::bind(&UiTemplates {
            title_card: None,
            game_over: None,
        });
        ui.show_level_banner("Day 1");
        ui.hide_level_banner();
        ui.show_game_over_message("After 1 days, you starved.");
        assert!(ui.document().is_empty());
        assert!(!ui.is_level_banner_visible());
        assert_eq!(ui.game_over_text(), None);
    }

    #[test]
    fn element_without_named_label_still_toggles_visibility() {
        let templates = UiTemplates {
            title_card: Some(ElementTemplate::with_label("TitleCard", "Subtitle")),
            game_over: None,
        };
        let mut ui = UiFacade::bind(&templates);
        ui.show_level_banner("Day 9");
        assert!(ui.is_level_banner_visible());
        assert_eq!(ui.level_banner_text(), None);

        ui.show_game_over_message("ignored");
        assert!(!ui.is_game_over_visible());
    }
}
