//! Immutable mapping document arena

use crate::def::{DocumentDef, ElementDef, NodeDef};
use crate::error::{ModelError, Result};
use crate::expr::PathSegment;
use crate::name::QualifiedName;
use crate::node::{Binding, Cardinality, NodeKind};
use std::fmt;

/// Index of a node inside its [`MappingDocument`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MappingNode {
    pub id: NodeId,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    pub kind: NodeKind,
    /// Element/attribute names from the root down to this node.
    pub path: Vec<PathSegment>,
    /// Resolved anchor element of a recursive node.
    pub anchor: Option<NodeId>,
}

impl MappingNode {
    pub fn name(&self) -> Option<&str> {
        self.kind.name()
    }

    pub fn binding(&self) -> Option<&Binding> {
        self.kind.binding()
    }

    pub fn is_bound(&self) -> bool {
        self.binding().is_some()
    }

    pub fn cardinality(&self) -> Option<Cardinality> {
        self.kind.cardinality()
    }

    /// Slash-separated path used in diagnostics.
    pub fn display_path(&self) -> String {
        let mut out = String::new();
        for segment in &self.path {
            out.push('/');
            if segment.attribute {
                out.push('@');
            }
            out.push_str(&segment.name);
        }
        if self.kind.name().is_none() {
            out.push('/');
            out.push_str(self.kind.label());
        }
        out
    }
}

/// Validated mapping tree. Nodes are stored in document (pre-)order.
#[derive(Debug, Clone, PartialEq)]
pub struct MappingDocument {
    name: QualifiedName,
    format: bool,
    nodes: Vec<MappingNode>,
    roots: Vec<NodeId>,
}

impl MappingDocument {
    pub fn new(def: DocumentDef) -> Result<Self> {
        if def.roots.is_empty() {
            return Err(ModelError::NoRootElement(def.name.to_string()));
        }
        let mut builder = Builder { nodes: Vec::new() };
        let mut roots = Vec::with_capacity(def.roots.len());
        for root in def.roots {
            roots.push(builder.element(root, None)?);
        }
        Ok(Self {
            name: def.name,
            format: def.format,
            nodes: builder.nodes,
            roots,
        })
    }

    pub fn name(&self) -> &QualifiedName {
        &self.name
    }

    /// Whether output is pretty-printed unless overridden.
    pub fn format(&self) -> bool {
        self.format
    }

    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    pub fn node(&self, id: NodeId) -> &MappingNode {
        &self.nodes[id.0]
    }

    pub fn nodes(&self) -> impl Iterator<Item = &MappingNode> {
        self.nodes.iter()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.node(id).children
    }

    /// Strict ancestors, nearest first.
    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.parent(id), move |current| self.parent(*current))
    }

    /// Whether `ancestor` is `id` or one of its ancestors.
    pub fn is_ancestor_or_self(&self, ancestor: NodeId, id: NodeId) -> bool {
        ancestor == id || self.ancestors(id).any(|a| a == ancestor)
    }

    /// Nearest bound node at or above `id`: the mapping class owning it.
    pub fn owning_class(&self, id: NodeId) -> Option<NodeId> {
        if self.node(id).is_bound() {
            return Some(id);
        }
        self.enclosing_class(id)
    }

    /// Nearest bound strict ancestor of `id`.
    pub fn enclosing_class(&self, id: NodeId) -> Option<NodeId> {
        self.ancestors(id).find(|a| self.node(*a).is_bound())
    }

    /// Bound nodes from the outermost down to `class` itself.
    pub fn class_chain(&self, class: NodeId) -> Vec<NodeId> {
        let mut chain: Vec<NodeId> = std::iter::successors(Some(class), |c| self.enclosing_class(*c))
            .filter(|c| self.node(*c).is_bound())
            .collect();
        chain.reverse();
        chain
    }

    /// Pre-order traversal of the subtree rooted at `id`.
    pub fn walk(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            out.push(current);
            stack.extend(self.children(current).iter().rev());
        }
        out
    }

    pub fn anchor_of(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).anchor
    }
}

struct Builder {
    nodes: Vec<MappingNode>,
}

impl Builder {
    fn push(&mut self, parent: Option<NodeId>, kind: NodeKind) -> Result<NodeId> {
        let id = NodeId(self.nodes.len());
        let mut path = parent
            .map(|p| self.nodes[p.0].path.clone())
            .unwrap_or_default();
        if let Some(name) = kind.name() {
            validate_name(name)?;
            path.push(PathSegment {
                name: name.to_string(),
                attribute: matches!(kind, NodeKind::Attribute(_)),
            });
        }
        let node = MappingNode {
            id,
            parent,
            children: Vec::new(),
            kind,
            path,
            anchor: None,
        };
        let label = node.display_path();
        if let Some(cardinality) = node.cardinality() {
            if !cardinality.is_valid() {
                return Err(ModelError::InvalidCardinality {
                    path: label,
                    min: cardinality.min_occurs,
                    max: cardinality.max_occurs,
                });
            }
        }
        if let Some(binding) = node.binding() {
            if binding.source.as_str().is_empty() {
                return Err(ModelError::MissingSource(label));
            }
        }
        self.nodes.push(node);
        if let Some(p) = parent {
            self.nodes[p.0].children.push(id);
        }
        Ok(id)
    }

    fn element(&mut self, def: ElementDef, parent: Option<NodeId>) -> Result<NodeId> {
        let id = self.push(parent, NodeKind::Element(def.element))?;
        self.children(id, def.children)?;
        Ok(id)
    }

    fn children(&mut self, parent: NodeId, children: Vec<NodeDef>) -> Result<()> {
        for child in children {
            self.child(parent, child)?;
        }
        Ok(())
    }

    fn child(&mut self, parent: NodeId, def: NodeDef) -> Result<()> {
        let parent_is_choice = matches!(self.nodes[parent.0].kind, NodeKind::Choice(_));
        let parent_is_element = matches!(self.nodes[parent.0].kind, NodeKind::Element(_));
        let parent_label = self.nodes[parent.0].display_path();
        match def {
            NodeDef::Criteria(_) if !parent_is_choice => {
                return Err(ModelError::MisplacedCriteria(parent_label));
            }
            NodeDef::Criteria(_) => {}
            _ if parent_is_choice => {
                return Err(ModelError::InvalidChoiceChild(parent_label));
            }
            _ => {}
        }
        match def {
            NodeDef::Element(element) => {
                self.element(element, Some(parent))?;
            }
            NodeDef::Attribute(def) => {
                let attribute = def.attribute;
                if !parent_is_element {
                    return Err(ModelError::MisplacedAttribute {
                        attribute: attribute.name,
                        parent: parent_label,
                    });
                }
                if attribute.value.is_none() && attribute.fixed_value.is_none() {
                    return Err(ModelError::AttributeWithoutValue(attribute.name));
                }
                self.push(Some(parent), NodeKind::Attribute(attribute))?;
            }
            NodeDef::Sequence(def) => {
                let id = self.push(Some(parent), NodeKind::Sequence(def.sequence))?;
                self.children(id, def.children)?;
            }
            NodeDef::Choice(def) => {
                let id = self.push(Some(parent), NodeKind::Choice(def.choice))?;
                self.children(id, def.children)?;
            }
            NodeDef::Criteria(def) => {
                let id = self.push(Some(parent), NodeKind::Criteria(def.criteria))?;
                self.children(id, def.children)?;
            }
            NodeDef::Recursive(def) => {
                let id = self.push(Some(parent), NodeKind::Recursive(def.recursive))?;
                let anchor = self.resolve_anchor(id)?;
                self.nodes[id.0].anchor = Some(anchor);
            }
            NodeDef::Comment(def) => {
                self.push(Some(parent), NodeKind::Comment(def.comment))?;
            }
        }
        Ok(())
    }

    fn resolve_anchor(&self, id: NodeId) -> Result<NodeId> {
        let node = &self.nodes[id.0];
        let NodeKind::Recursive(recursive) = &node.kind else {
            return Err(ModelError::UnknownAnchor {
                element: node.display_path(),
                anchor: String::new(),
            });
        };
        if recursive.binding.is_none() {
            return Err(ModelError::MissingSource(node.display_path()));
        }
        let mut current = node.parent;
        while let Some(candidate) = current {
            let candidate_node = &self.nodes[candidate.0];
            if let NodeKind::Element(element) = &candidate_node.kind {
                if element.name.eq_ignore_ascii_case(&recursive.anchor) {
                    if element.binding.is_none() {
                        return Err(ModelError::UnboundAnchor(candidate_node.display_path()));
                    }
                    return Ok(candidate);
                }
            }
            current = candidate_node.parent;
        }
        Err(ModelError::UnknownAnchor {
            element: recursive.name.clone(),
            anchor: recursive.anchor.clone(),
        })
    }
}

fn validate_name(name: &str) -> Result<()> {
    let invalid = name.is_empty()
        || name
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, '.' | '@' | '/' | '<' | '>' | '&' | '"'));
    if invalid {
        return Err(ModelError::InvalidName(name.to_string()));
    }
    Ok(())
}
