//! In-memory fragment tree produced by the engine

use xmlview_model::{Namespace, QualifiedName, TextNormalization};

/// One produced XML document.
#[derive(Debug, Clone, PartialEq)]
pub struct FragmentDocument {
    pub name: QualifiedName,
    /// Pretty-print unless the serializer overrides it.
    pub formatted: bool,
    pub root: ElementFragment,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Fragment {
    Element(ElementFragment),
    Comment(String),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct AttributeFragment {
    pub name: String,
    pub namespace: Option<Namespace>,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ElementFragment {
    pub name: String,
    pub namespace: Option<Namespace>,
    /// Explicit declarations emitted on this element.
    pub declarations: Vec<Namespace>,
    pub attributes: Vec<AttributeFragment>,
    pub text: Option<String>,
    /// Render `xsi:nil="true"`.
    pub nil: bool,
    pub normalize: TextNormalization,
    pub children: Vec<Fragment>,
}

impl ElementFragment {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn has_text(&self) -> bool {
        self.text.as_deref().is_some_and(|t| !t.is_empty())
    }

    pub fn elements(&self) -> impl Iterator<Item = &ElementFragment> {
        self.children.iter().filter_map(|child| match child {
            Fragment::Element(e) => Some(e),
            Fragment::Comment(_) => None,
        })
    }

    /// First child element named `name`.
    pub fn child(&self, name: &str) -> Option<&ElementFragment> {
        self.elements().find(|e| e.name == name)
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.name == name)
            .map(|a| a.value.as_str())
    }

    /// No text, no nil marker, no attributes and no child elements.
    pub fn is_vacant(&self) -> bool {
        !self.has_text() && !self.nil && self.attributes.is_empty() && self.elements().next().is_none()
    }
}
