//! Scope resolution
//!
//! Maps tree-path references to the mapping class that governs them:
//! the nearest bound ancestor-or-self of the referenced node.

use crate::error::{PlannerError, Result};
use xmlview_model::{ColumnRef, MappingDocument, NodeId, NodeKind, TreePath};

/// A reference to a rendered column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataRef {
    /// Element or attribute referenced.
    pub node: NodeId,
    /// Mapping class supplying the column.
    pub class: NodeId,
    pub column: String,
}

/// Outcome of `context(scope, target)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextScope {
    pub scope: NodeId,
    pub target: DataRef,
}

pub struct ScopeResolver<'a> {
    doc: &'a MappingDocument,
}

impl<'a> ScopeResolver<'a> {
    pub fn new(doc: &'a MappingDocument) -> Self {
        Self { doc }
    }

    /// Every named node whose full path ends with `path`, in document order.
    pub fn candidates(&self, path: &TreePath) -> Vec<NodeId> {
        self.doc
            .nodes()
            .filter(|node| node.name().is_some() && path.is_suffix_of(&node.path))
            .map(|node| node.id)
            .collect()
    }

    /// Class a candidate counts towards when checking ambiguity. A recursive
    /// node stands for its anchor.
    fn class_key(&self, node: NodeId) -> Option<NodeId> {
        match self.doc.anchor_of(node) {
            Some(anchor) => self.doc.owning_class(anchor),
            None => self.doc.owning_class(node),
        }
    }

    /// Resolve `path` to a single node.
    pub fn resolve(&self, path: &TreePath) -> Result<NodeId> {
        let candidates = self.candidates(path);
        let Some(first) = candidates.first().copied() else {
            return Err(PlannerError::UnresolvedPath(path.to_string()));
        };
        let key = self.class_key(first);
        if candidates.iter().any(|c| self.class_key(*c) != key) {
            return Err(PlannerError::AmbiguousPath {
                path: path.to_string(),
                candidates: candidates
                    .iter()
                    .map(|c| self.doc.node(*c).display_path())
                    .collect(),
            });
        }
        Ok(first)
    }

    /// Mapping class of `node`, failing for unbound nodes.
    pub fn owning_class(&self, node: NodeId) -> Result<NodeId> {
        self.doc
            .owning_class(node)
            .ok_or_else(|| PlannerError::UnboundReference(self.doc.node(node).display_path()))
    }

    /// Class supplying `column` as seen from `at`. With `strict` the lookup
    /// starts above `at`, as for correlation parameters.
    pub fn resolve_column(&self, at: NodeId, column: &ColumnRef, strict: bool) -> Result<NodeId> {
        let start = if strict { self.doc.parent(at) } else { Some(at) };
        let mut chain = std::iter::successors(start, |n| self.doc.parent(*n))
            .filter(|n| self.doc.node(*n).is_bound());
        let found = match &column.group {
            None => chain.next(),
            Some(group) => chain.find(|n| {
                self.doc
                    .node(*n)
                    .binding()
                    .is_some_and(|b| b.source == *group || b.source.matches(group.as_str()))
            }),
        };
        found.ok_or_else(|| PlannerError::UnresolvedColumn {
            column: column.to_string(),
            node: self.doc.node(at).display_path(),
        })
    }

    /// Resolve `path` to a data-bearing element or attribute.
    pub fn data_reference(&self, path: &TreePath) -> Result<DataRef> {
        let node = self.resolve(path)?;
        let column = match &self.doc.node(node).kind {
            NodeKind::Element(e) => e.value.as_ref(),
            NodeKind::Attribute(a) => a.value.as_ref(),
            _ => None,
        }
        .ok_or_else(|| PlannerError::UnboundReference(path.to_string()))?;
        // An unbound owner is reported as an unbound reference, not a column error.
        self.owning_class(node)?;
        let class = self.resolve_column(node, column, false)?;
        Ok(DataRef {
            node,
            class,
            column: column.column.clone(),
        })
    }

    /// `context(scope, target)`: the class owning `scope` must be an
    /// ancestor-or-self of the class supplying `target`.
    pub fn context(&self, scope: &TreePath, target: &TreePath) -> Result<ContextScope> {
        let scope_node = self.resolve(scope)?;
        let scope_class = self.owning_class(scope_node)?;
        let target = self.data_reference(target)?;
        if !self.doc.is_ancestor_or_self(scope_class, target.class) {
            return Err(PlannerError::InvalidContext {
                scope: scope.to_string(),
                target: self.doc.node(target.node).display_path(),
            });
        }
        Ok(ContextScope {
            scope: scope_class,
            target,
        })
    }

    /// Class capped by `rowlimit(path)`.
    pub fn row_limit_target(&self, path: &TreePath) -> Result<NodeId> {
        let node = self.resolve(path)?;
        self.doc
            .owning_class(node)
            .ok_or_else(|| PlannerError::UnboundRowLimit(path.to_string()))
    }

    /// Default restriction scope for a predicate whose deepest reference is
    /// supplied by `class`: the outermost class on its chain.
    pub fn default_scope(&self, class: NodeId) -> NodeId {
        self.doc
            .class_chain(class)
            .first()
            .copied()
            .unwrap_or(class)
    }

    /// Deepest class of `classes`, which must lie on one ancestor chain.
    pub fn deepest(&self, classes: &[NodeId]) -> Option<NodeId> {
        let mut deepest = *classes.first()?;
        for class in &classes[1..] {
            if self.doc.is_ancestor_or_self(deepest, *class) {
                deepest = *class;
            } else if !self.doc.is_ancestor_or_self(*class, deepest) {
                return None;
            }
        }
        Some(deepest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use xmlview_model::{AttributeDef, DocumentDef, ElementDef};

    fn catalog() -> MappingDocument {
        DocumentDef::new("xmltest.doc")
            .root(
                ElementDef::new("Catalogs").child(
                    ElementDef::new("Item")
                        .source("xmltest.items")
                        .optional()
                        .unbounded()
                        .child(AttributeDef::column("ItemID", "itemNum"))
                        .child(ElementDef::column("Name", "itemName"))
                        .child(
                            ElementDef::new("Suppliers").child(
                                ElementDef::new("Supplier")
                                    .source("xmltest.suppliers")
                                    .param("itemNum", "itemNum")
                                    .optional()
                                    .unbounded()
                                    .child(AttributeDef::column("SupplierID", "supplierNum"))
                                    .child(ElementDef::column("Name", "supplierName"))
                                    .child(ElementDef::column(
                                        "ItemName",
                                        "xmltest.items.itemName",
                                    )),
                            ),
                        ),
                ),
            )
            .build()
            .unwrap()
    }

    fn node(doc: &MappingDocument, path: &str) -> NodeId {
        doc.nodes()
            .find(|n| n.display_path() == path)
            .map(|n| n.id)
            .unwrap()
    }

    #[test]
    fn resolves_suffixes_case_insensitively() {
        let doc = catalog();
        let resolver = ScopeResolver::new(&doc);
        let item_id = resolver.resolve(&TreePath::dotted("itemid")).unwrap();
        assert_eq!(item_id, node(&doc, "/Catalogs/Item/@ItemID"));
        let supplier_name = resolver
            .resolve(&TreePath::dotted("Supplier.Name"))
            .unwrap();
        assert_eq!(supplier_name, node(&doc, "/Catalogs/Item/Suppliers/Supplier/Name"));
    }

    #[test]
    fn short_names_across_classes_are_ambiguous() {
        let doc = catalog();
        let resolver = ScopeResolver::new(&doc);
        let err = resolver.resolve(&TreePath::dotted("Name")).unwrap_err();
        assert!(matches!(err, PlannerError::AmbiguousPath { ref candidates, .. } if candidates.len() == 2));
        assert!(matches!(
            resolver.resolve(&TreePath::dotted("Missing")),
            Err(PlannerError::UnresolvedPath(_))
        ));
    }

    #[test]
    fn qualified_columns_resolve_to_named_ancestor() {
        let doc = catalog();
        let resolver = ScopeResolver::new(&doc);
        let reference = resolver
            .data_reference(&TreePath::dotted("Supplier.ItemName"))
            .unwrap();
        assert_eq!(reference.class, node(&doc, "/Catalogs/Item"));
        assert_eq!(reference.column, "itemName");
    }

    #[test]
    fn context_scope_must_enclose_target() {
        let doc = catalog();
        let resolver = ScopeResolver::new(&doc);
        let supplier = node(&doc, "/Catalogs/Item/Suppliers/Supplier");
        let ctx = resolver
            .context(&TreePath::dotted("SupplierID"), &TreePath::dotted("SupplierID"))
            .unwrap();
        assert_eq!(ctx.scope, supplier);

        let outer = resolver
            .context(&TreePath::dotted("Item"), &TreePath::dotted("SupplierID"))
            .unwrap();
        assert_eq!(outer.scope, node(&doc, "/Catalogs/Item"));

        assert!(matches!(
            resolver.context(&TreePath::dotted("SupplierID"), &TreePath::dotted("ItemID")),
            Err(PlannerError::InvalidContext { .. })
        ));
    }

    #[test]
    fn default_scope_is_outermost_class() {
        let doc = catalog();
        let resolver = ScopeResolver::new(&doc);
        let supplier = node(&doc, "/Catalogs/Item/Suppliers/Supplier");
        assert_eq!(resolver.default_scope(supplier), node(&doc, "/Catalogs/Item"));
    }

    #[test]
    fn unbound_references_fail() {
        let doc = catalog();
        let resolver = ScopeResolver::new(&doc);
        assert!(matches!(
            resolver.data_reference(&TreePath::dotted("Suppliers")),
            Err(PlannerError::UnboundReference(_))
        ));
        assert!(matches!(
            resolver.row_limit_target(&TreePath::dotted("Catalogs")),
            Err(PlannerError::UnboundRowLimit(_))
        ));
        assert_eq!(
            resolver.row_limit_target(&TreePath::dotted("supplier")).unwrap(),
            node(&doc, "/Catalogs/Item/Suppliers/Supplier")
        );
    }
}
