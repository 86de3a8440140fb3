//! Render XML documents from relational data through a mapping tree.
//!
//! `xmlview` ties the pipeline together:
//!
//! ```text
//! DocumentDef --build--> MappingDocument
//!                              |
//! XmlQuery ----------> DocumentPlanner --> Program (cached per query)
//!                                            |
//! TupleSource -------------------------> execute --> FragmentDocument
//!                                                        |
//!                                               XmlSerializer --> String
//! ```
//!
//! # Example
//!
//! ```rust
//! use xmlview::{Expr, InMemorySource, Table, XmlQuery, XmlView};
//! use xmlview::model::{AttributeDef, DocumentDef, ElementDef};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let view = XmlView::from_def(
//!     DocumentDef::new("xmltest.doc1").root(
//!         ElementDef::new("Items").child(
//!             ElementDef::new("Item")
//!                 .source("xmltest.items")
//!                 .optional()
//!                 .unbounded()
//!                 .child(AttributeDef::column("ItemID", "itemNum")),
//!         ),
//!     ),
//! )?;
//! let source = InMemorySource::new().table(
//!     "xmltest.items",
//!     Table::new(["itemNum"]).row(["001"]).row(["002"]),
//! );
//! let query = XmlQuery::new().filter(Expr::path("ItemID").not_equals(Expr::literal("001")));
//!
//! let xml = view.render(&query, &source)?;
//! assert_eq!(
//!     xml[0],
//!     "<?xml version=\"1.0\" encoding=\"UTF-8\"?><Items><Item ItemID=\"002\"/></Items>"
//! );
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod view;

pub use error::{Error, Result};
pub use view::{ViewOptions, XmlView};

pub use xmlview_engine::{
    execute, ElementFragment, Fragment, FragmentDocument, InMemorySource, ProcessingError,
    ProductionOutput, ProductionStats, SourceError, Table, TupleCursor, TupleSource,
};
pub use xmlview_format::{FormatError, SerializerOptions, XmlSerializer};
pub use xmlview_model::{Expr, MappingDocument, ModelError};
pub use xmlview_planner::{
    DocumentPlanner, OrderKey, PlannerError, PlannerOptions, Program, SortDirection, XmlQuery,
};

/// Mapping-tree model.
pub mod model {
    pub use xmlview_model::*;
}
