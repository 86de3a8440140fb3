//! Declarative mapping definitions
//!
//! [`DocumentDef`] is the owned, nested form of a mapping document: it is what
//! JSON/YAML mapping files deserialize into and what the fluent builders
//! produce. [`MappingDocument::new`](crate::MappingDocument::new) validates it
//! and flattens it into the immutable node arena.

use crate::document::MappingDocument;
use crate::error::Result;
use crate::expr::{ColumnRef, Expr};
use crate::name::{Namespace, QualifiedName};
use crate::node::{
    Attribute, Binding, Cardinality, Choice, Comment, Correlation, Criteria, Element,
    RecursiveElement, Sequence, TextNormalization, UNBOUNDED,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum NodeDef {
    Element(ElementDef),
    Attribute(AttributeDef),
    Sequence(SequenceDef),
    Choice(ChoiceDef),
    Criteria(CriteriaDef),
    Recursive(RecursiveDef),
    Comment(CommentDef),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentDef {
    pub name: QualifiedName,
    /// Pretty-print output by default.
    #[serde(default)]
    pub format: bool,
    pub roots: Vec<ElementDef>,
}

impl DocumentDef {
    pub fn new(name: impl Into<QualifiedName>) -> Self {
        Self {
            name: name.into(),
            format: false,
            roots: Vec::new(),
        }
    }

    pub fn format(mut self, format: bool) -> Self {
        self.format = format;
        self
    }

    pub fn root(mut self, root: ElementDef) -> Self {
        self.roots.push(root);
        self
    }

    pub fn build(self) -> Result<MappingDocument> {
        MappingDocument::new(self)
    }
}

fn bind(binding: &mut Option<Binding>, source: impl Into<QualifiedName>) {
    let source = source.into();
    match binding {
        Some(existing) => existing.source = source,
        None => *binding = Some(Binding::new(source)),
    }
}

fn correlate(binding: &mut Option<Binding>, column: String, parent: ColumnRef) {
    // Parameters declared before `source` keep an empty group until it is set.
    let binding = binding.get_or_insert_with(|| Binding::new(""));
    binding.parameters.push(Correlation { column, parent });
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementDef {
    #[serde(flatten)]
    pub element: Element,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<NodeDef>,
}

impl ElementDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            element: Element {
                name: name.into(),
                ..Default::default()
            },
            children: Vec::new(),
        }
    }

    /// Element rendering `column` of its owning mapping class as text.
    pub fn column(name: impl Into<String>, column: impl Into<ColumnRef>) -> Self {
        let mut def = Self::new(name);
        def.element.value = Some(column.into());
        def
    }

    pub fn source(mut self, source: impl Into<QualifiedName>) -> Self {
        bind(&mut self.element.binding, source);
        self
    }

    /// Bind the `column` parameter of this element's source to an ancestor column.
    pub fn param(mut self, column: impl Into<String>, parent: impl Into<ColumnRef>) -> Self {
        correlate(&mut self.element.binding, column.into(), parent.into());
        self
    }

    pub fn value(mut self, column: impl Into<ColumnRef>) -> Self {
        self.element.value = Some(column.into());
        self
    }

    pub fn namespace(mut self, namespace: Namespace) -> Self {
        self.element.namespace = Some(namespace);
        self
    }

    pub fn declare(mut self, namespace: Namespace) -> Self {
        self.element.declarations.push(namespace);
        self
    }

    pub fn min_occurs(mut self, min: u32) -> Self {
        self.element.cardinality.min_occurs = min;
        self
    }

    pub fn max_occurs(mut self, max: i64) -> Self {
        self.element.cardinality.max_occurs = max;
        self
    }

    pub fn optional(self) -> Self {
        self.min_occurs(0)
    }

    pub fn unbounded(self) -> Self {
        self.max_occurs(UNBOUNDED)
    }

    pub fn nillable(mut self) -> Self {
        self.element.nillable = true;
        self
    }

    pub fn default_value(mut self, value: impl Into<String>) -> Self {
        self.element.default_value = Some(value.into());
        self
    }

    pub fn fixed(mut self, value: impl Into<String>) -> Self {
        self.element.fixed_value = Some(value.into());
        self
    }

    pub fn exclude(mut self) -> Self {
        self.element.exclude = true;
        self
    }

    pub fn normalize(mut self, normalize: TextNormalization) -> Self {
        self.element.normalize = normalize;
        self
    }

    pub fn staging(mut self, group: impl Into<QualifiedName>) -> Self {
        self.element.staging_tables.push(group.into());
        self
    }

    pub fn child(mut self, child: impl Into<NodeDef>) -> Self {
        self.children.push(child.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeDef {
    #[serde(flatten)]
    pub attribute: Attribute,
}

impl AttributeDef {
    pub fn column(name: impl Into<String>, column: impl Into<ColumnRef>) -> Self {
        Self {
            attribute: Attribute {
                name: name.into(),
                value: Some(column.into()),
                ..Default::default()
            },
        }
    }

    pub fn fixed(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            attribute: Attribute {
                name: name.into(),
                fixed_value: Some(value.into()),
                ..Default::default()
            },
        }
    }

    pub fn namespace(mut self, namespace: Namespace) -> Self {
        self.attribute.namespace = Some(namespace);
        self
    }

    pub fn optional(mut self) -> Self {
        self.attribute.optional = true;
        self
    }

    pub fn exclude(mut self) -> Self {
        self.attribute.exclude = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SequenceDef {
    #[serde(flatten)]
    pub sequence: Sequence,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<NodeDef>,
}

impl SequenceDef {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn source(mut self, source: impl Into<QualifiedName>) -> Self {
        bind(&mut self.sequence.binding, source);
        self
    }

    pub fn param(mut self, column: impl Into<String>, parent: impl Into<ColumnRef>) -> Self {
        correlate(&mut self.sequence.binding, column.into(), parent.into());
        self
    }

    pub fn cardinality(mut self, min: u32, max: i64) -> Self {
        self.sequence.cardinality = Cardinality::new(min, max);
        self
    }

    pub fn child(mut self, child: impl Into<NodeDef>) -> Self {
        self.children.push(child.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ChoiceDef {
    #[serde(flatten)]
    pub choice: Choice,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<NodeDef>,
}

impl ChoiceDef {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn source(mut self, source: impl Into<QualifiedName>) -> Self {
        bind(&mut self.choice.binding, source);
        self
    }

    pub fn param(mut self, column: impl Into<String>, parent: impl Into<ColumnRef>) -> Self {
        correlate(&mut self.choice.binding, column.into(), parent.into());
        self
    }

    pub fn cardinality(mut self, min: u32, max: i64) -> Self {
        self.choice.cardinality = Cardinality::new(min, max);
        self
    }

    pub fn exception_on_default(mut self) -> Self {
        self.choice.exception_on_default = true;
        self
    }

    pub fn branch(mut self, branch: CriteriaDef) -> Self {
        self.children.push(NodeDef::Criteria(branch));
        self
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CriteriaDef {
    #[serde(flatten)]
    pub criteria: Criteria,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<NodeDef>,
}

impl CriteriaDef {
    pub fn when(criteria: Expr) -> Self {
        Self {
            criteria: Criteria {
                criteria: Some(criteria),
                exclude: false,
            },
            children: Vec::new(),
        }
    }

    pub fn otherwise() -> Self {
        Self::default()
    }

    pub fn exclude(mut self) -> Self {
        self.criteria.exclude = true;
        self
    }

    pub fn child(mut self, child: impl Into<NodeDef>) -> Self {
        self.children.push(child.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecursiveDef {
    #[serde(flatten)]
    pub recursive: RecursiveElement,
}

impl RecursiveDef {
    pub fn new(name: impl Into<String>, anchor: impl Into<String>) -> Self {
        Self {
            recursive: RecursiveElement {
                name: name.into(),
                anchor: anchor.into(),
                cardinality: Cardinality::new(0, UNBOUNDED),
                ..Default::default()
            },
        }
    }

    pub fn source(mut self, source: impl Into<QualifiedName>) -> Self {
        bind(&mut self.recursive.binding, source);
        self
    }

    pub fn param(mut self, column: impl Into<String>, parent: impl Into<ColumnRef>) -> Self {
        correlate(&mut self.recursive.binding, column.into(), parent.into());
        self
    }

    pub fn namespace(mut self, namespace: Namespace) -> Self {
        self.recursive.namespace = Some(namespace);
        self
    }

    pub fn limit(mut self, limit: i32) -> Self {
        self.recursive.recursion_limit = limit;
        self
    }

    pub fn exception_on_limit(mut self) -> Self {
        self.recursive.exception_on_limit = true;
        self
    }

    pub fn criteria(mut self, criteria: Expr) -> Self {
        self.recursive.criteria = Some(criteria);
        self
    }

    pub fn cardinality(mut self, min: u32, max: i64) -> Self {
        self.recursive.cardinality = Cardinality::new(min, max);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentDef {
    #[serde(flatten)]
    pub comment: Comment,
}

impl CommentDef {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            comment: Comment { text: text.into() },
        }
    }
}

macro_rules! into_node_def {
    ($($def:ident => $variant:ident),* $(,)?) => {
        $(
            impl From<$def> for NodeDef {
                fn from(def: $def) -> Self {
                    NodeDef::$variant(def)
                }
            }
        )*
    };
}

into_node_def! {
    ElementDef => Element,
    AttributeDef => Attribute,
    SequenceDef => Sequence,
    ChoiceDef => Choice,
    CriteriaDef => Criteria,
    RecursiveDef => Recursive,
    CommentDef => Comment,
}
