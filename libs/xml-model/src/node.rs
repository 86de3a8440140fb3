//! Node payloads of the mapping tree

use crate::expr::{ColumnRef, Expr};
use crate::name::{Namespace, QualifiedName};
use serde::{Deserialize, Serialize};

/// `maxOccurs` value meaning "no upper bound".
pub const UNBOUNDED: i64 = -1;

/// Recursion depth used when a recursive element declares a limit `<= 0`.
pub const DEFAULT_RECURSION_LIMIT: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cardinality {
    #[serde(default = "one")]
    pub min_occurs: u32,
    #[serde(default = "one_i64")]
    pub max_occurs: i64,
}

fn one() -> u32 {
    1
}

fn one_i64() -> i64 {
    1
}

impl Default for Cardinality {
    fn default() -> Self {
        Self {
            min_occurs: 1,
            max_occurs: 1,
        }
    }
}

impl Cardinality {
    pub fn new(min_occurs: u32, max_occurs: i64) -> Self {
        Self {
            min_occurs,
            max_occurs,
        }
    }

    pub fn is_unbounded(&self) -> bool {
        self.max_occurs == UNBOUNDED
    }

    pub fn is_optional(&self) -> bool {
        self.min_occurs == 0
    }

    /// Upper bound as a row count, `None` when unbounded.
    pub fn max(&self) -> Option<usize> {
        usize::try_from(self.max_occurs).ok()
    }

    pub fn is_valid(&self) -> bool {
        self.max_occurs == UNBOUNDED || self.max_occurs >= i64::from(self.min_occurs)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TextNormalization {
    #[default]
    None,
    Replace,
    Collapse,
}

/// Positional `?` parameter of a bound group, fed from an ancestor column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Correlation {
    /// Column of the bound group the parameter restricts.
    pub column: String,
    /// Ancestor column supplying the value.
    pub parent: ColumnRef,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Binding {
    pub source: QualifiedName,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<Correlation>,
}

impl Binding {
    pub fn new(source: impl Into<QualifiedName>) -> Self {
        Self {
            source: source.into(),
            parameters: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Element {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<Namespace>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub binding: Option<Binding>,
    /// Column rendered as text content.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<ColumnRef>,
    #[serde(flatten)]
    pub cardinality: Cardinality,
    #[serde(default)]
    pub nillable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fixed_value: Option<String>,
    #[serde(default)]
    pub exclude: bool,
    #[serde(default)]
    pub normalize: TextNormalization,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub staging_tables: Vec<QualifiedName>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub declarations: Vec<Namespace>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attribute {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<Namespace>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<ColumnRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fixed_value: Option<String>,
    #[serde(default)]
    pub optional: bool,
    #[serde(default)]
    pub exclude: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sequence {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub binding: Option<Binding>,
    #[serde(flatten)]
    pub cardinality: Cardinality,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Choice {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub binding: Option<Binding>,
    #[serde(flatten)]
    pub cardinality: Cardinality,
    #[serde(default)]
    pub exception_on_default: bool,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Criteria {
    /// `None` marks the default branch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub criteria: Option<Expr>,
    #[serde(default)]
    pub exclude: bool,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecursiveElement {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<Namespace>,
    /// Name of the ancestor element whose content repeats at every depth.
    pub anchor: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub binding: Option<Binding>,
    #[serde(flatten)]
    pub cardinality: Cardinality,
    #[serde(default)]
    pub recursion_limit: i32,
    #[serde(default)]
    pub exception_on_limit: bool,
    /// Extra condition on the parent row deciding whether it recurses.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub criteria: Option<Expr>,
}

impl RecursiveElement {
    /// Declared limit with the fallback applied.
    pub fn effective_limit(&self, fallback: u32) -> u32 {
        u32::try_from(self.recursion_limit)
            .ok()
            .filter(|limit| *limit > 0)
            .unwrap_or(fallback)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Comment {
    pub text: String,
}

/// Closed set of node variants.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Element(Element),
    Attribute(Attribute),
    Sequence(Sequence),
    Choice(Choice),
    Criteria(Criteria),
    Recursive(RecursiveElement),
    Comment(Comment),
}

impl NodeKind {
    pub fn label(&self) -> &'static str {
        match self {
            NodeKind::Element(_) => "element",
            NodeKind::Attribute(_) => "attribute",
            NodeKind::Sequence(_) => "sequence",
            NodeKind::Choice(_) => "choice",
            NodeKind::Criteria(_) => "criteria",
            NodeKind::Recursive(_) => "recursive",
            NodeKind::Comment(_) => "comment",
        }
    }

    /// Rendered name, for nodes that contribute a path segment.
    pub fn name(&self) -> Option<&str> {
        match self {
            NodeKind::Element(e) => Some(&e.name),
            NodeKind::Attribute(a) => Some(&a.name),
            NodeKind::Recursive(r) => Some(&r.name),
            _ => None,
        }
    }

    pub fn namespace(&self) -> Option<&Namespace> {
        match self {
            NodeKind::Element(e) => e.namespace.as_ref(),
            NodeKind::Attribute(a) => a.namespace.as_ref(),
            NodeKind::Recursive(r) => r.namespace.as_ref(),
            _ => None,
        }
    }

    pub fn binding(&self) -> Option<&Binding> {
        match self {
            NodeKind::Element(e) => e.binding.as_ref(),
            NodeKind::Sequence(s) => s.binding.as_ref(),
            NodeKind::Choice(c) => c.binding.as_ref(),
            NodeKind::Recursive(r) => r.binding.as_ref(),
            _ => None,
        }
    }

    pub fn cardinality(&self) -> Option<Cardinality> {
        match self {
            NodeKind::Element(e) => Some(e.cardinality),
            NodeKind::Sequence(s) => Some(s.cardinality),
            NodeKind::Choice(c) => Some(c.cardinality),
            NodeKind::Recursive(r) => Some(r.cardinality),
            _ => None,
        }
    }

    /// Column rendered by this node, if data-bearing.
    pub fn value_column(&self) -> Option<&ColumnRef> {
        match self {
            NodeKind::Element(e) => e.value.as_ref(),
            NodeKind::Attribute(a) => a.value.as_ref(),
            _ => None,
        }
    }

    pub fn is_excluded(&self) -> bool {
        match self {
            NodeKind::Element(e) => e.exclude,
            NodeKind::Attribute(a) => a.exclude,
            NodeKind::Criteria(c) => c.exclude,
            _ => false,
        }
    }
}
