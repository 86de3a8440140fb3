//! Document planning
//!
//! Turns a mapping document plus a resolved query into an executable
//! [`Program`]. No relational query text is produced: the program only
//! describes structural shape, parameter bindings, scoped filters, row caps,
//! recursion depths, staging steps and merge order.
//!
//! ```text
//! XmlQuery + MappingDocument
//!        |
//!   ScopeResolver   -> path / context() / rowlimit() to mapping class
//!        |
//!  DocumentPlanner  -> ClassPlan per bound node, recursion unrolled
//!        |
//!     Program       (immutable, Send + Sync)
//! ```
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use xmlview_model::{AttributeDef, DocumentDef, ElementDef, Expr};
//! use xmlview_planner::{DocumentPlanner, OrderKey, XmlQuery};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let doc = DocumentDef::new("xmltest.doc1")
//!     .root(
//!         ElementDef::new("Items").child(
//!             ElementDef::new("Item")
//!                 .source("xmltest.items")
//!                 .optional()
//!                 .unbounded()
//!                 .child(AttributeDef::column("ItemID", "itemNum"))
//!                 .child(ElementDef::column("Quantity", "itemQuantity")),
//!         ),
//!     )
//!     .build()?;
//! let query = XmlQuery::new()
//!     .filter(Expr::path("Quantity").greater_than(Expr::literal(0)))
//!     .order_by(OrderKey::desc("Quantity"));
//! let program = DocumentPlanner::default().plan(Arc::new(doc), &query)?;
//! assert_eq!(program.classes().len(), 1);
//! println!("{}", program.explain());
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod expr;
pub mod planner;
pub mod program;
pub mod query;
pub mod scope;

pub use error::{PlannerError, Result};
pub use expr::{BoundExpr, LikePattern, RowScope};
pub use planner::{DocumentPlanner, PlannerOptions};
pub use program::{
    BranchPlan, CapKind, ChoiceId, ChoicePlan, ClassId, ClassPlan, Filter, Instruction,
    MergeOrder, ParamBinding, Program, RecursionId, RecursionPlan, RowCap, SlotRef, SortKey,
    Step, UnitPlan,
};
pub use query::{OrderKey, SortDirection, XmlQuery};
pub use scope::{ContextScope, DataRef, ScopeResolver};
