//! Mapping tree model
//!
//! A mapping document is the structural template used to render XML from
//! relational data. Nodes are optionally bound to relational groups, carry
//! cardinality, nillable, default and fixed-value metadata, and may nest,
//! recurse, or branch conditionally.
//!
//! # Construction
//!
//! ```text
//! DocumentDef (serde / fluent builder)
//!      |
//!  MappingDocument::new  -> validation
//!      |
//! MappingDocument (arena of MappingNode, immutable)
//! ```
//!
//! # Example
//!
//! ```rust
//! use xmlview_model::{AttributeDef, DocumentDef, ElementDef, MappingDocument};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let doc = MappingDocument::new(
//!     DocumentDef::new("xmltest.doc1").root(
//!         ElementDef::new("Items").child(
//!             ElementDef::new("Item")
//!                 .source("xmltest.items")
//!                 .optional()
//!                 .unbounded()
//!                 .child(AttributeDef::column("ItemID", "itemNum"))
//!                 .child(ElementDef::column("Name", "itemName")),
//!         ),
//!     ),
//! )?;
//! assert_eq!(doc.roots().len(), 1);
//! # Ok(())
//! # }
//! ```

pub mod def;
pub mod document;
pub mod error;
pub mod expr;
pub mod name;
pub mod node;
pub mod value;

pub use def::{
    AttributeDef, ChoiceDef, CommentDef, CriteriaDef, DocumentDef, ElementDef, NodeDef,
    RecursiveDef, SequenceDef,
};
pub use document::{MappingDocument, MappingNode, NodeId};
pub use error::{ModelError, Result};
pub use expr::{ColumnRef, CompareOp, Expr, PathSegment, TreePath};
pub use name::{Namespace, QualifiedName, XSI_NAMESPACE, XSI_PREFIX};
pub use node::{
    Attribute, Binding, Cardinality, Choice, Comment, Correlation, Criteria, Element, NodeKind,
    RecursiveElement, Sequence, TextNormalization, DEFAULT_RECURSION_LIMIT, UNBOUNDED,
};
pub use value::Value;
