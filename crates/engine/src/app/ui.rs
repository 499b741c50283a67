use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Display {
    Flex,
    #[default]
    None,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Label {
    name: String,
    pub text: String,
}

impl Label {
    pub fn name(&self) -> &str {
        &self.name
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisualElement {
    name: String,
    pub display: Display,
    labels: Vec<Label>,
}

impl VisualElement {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            display: Display::None,
            labels: Vec::new(),
        }
    }

    pub fn with_label(mut self, name: impl Into<String>, text: impl Into<String>) -> Self {
        self.labels.push(Label {
            name: name.into(),
            text: text.into(),
        });
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_visible(&self) -> bool {
        self.display == Display::Flex
    }

    pub fn labels(&self) -> &[Label] {
        &self.labels
    }

    pub fn query_label(&self, name: &str) -> Option<&Label> {
        self.labels.iter().find(|label| label.name == name)
    }

    pub fn query_label_mut(&mut self, name: &str) -> Option<&mut Label> {
        self.labels.iter_mut().find(|label| label.name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelTemplate {
    pub name: String,
    #[serde(default)]
    pub text: String,
}

/// Declarative description of an overlay element, instantiated with
/// [`ElementTemplate::clone_tree`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementTemplate {
    pub name: String,
    #[serde(default)]
    pub labels: Vec<LabelTemplate>,
}

impl ElementTemplate {
    pub fn with_label(name: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            labels: vec![LabelTemplate {
                name: label.into(),
                text: String::new(),
            }],
        }
    }

    pub fn clone_tree(&self) -> VisualElement {
        self.labels.iter().fold(
            VisualElement::new(self.name.clone()),
            |element, label| element.with_label(label.name.clone(), label.text.clone()),
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ElementHandle(usize);

/// Root container of retained overlay elements, drawn in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UiDocument {
    elements: Vec<VisualElement>,
}

impl UiDocument {
    pub fn add(&mut self, element: VisualElement) -> ElementHandle {
        self.elements.push(element);
        ElementHandle(self.elements.len() - 1)
    }

    pub fn element(&self, handle: ElementHandle) -> Option<&VisualElement> {
        self.elements.get(handle.0)
    }

    pub fn element_mut(&mut self, handle: ElementHandle) -> Option<&mut VisualElement> {
        self.elements.get_mut(handle.0)
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn visible_elements(&self) -> impl Iterator<Item = &VisualElement> + '_ {
        self.elements.iter().filter(|element| element.is_visible())
    }
}
