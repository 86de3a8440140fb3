//! Execution engine
//!
//! Runs a planned [`Program`](xmlview_planner::Program) against a
//! [`TupleSource`] and assembles the produced rows into
//! [`FragmentDocument`]s, ready for serialization.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use xmlview_engine::{execute, InMemorySource, Table};
//! use xmlview_model::{AttributeDef, DocumentDef, ElementDef};
//! use xmlview_planner::{DocumentPlanner, XmlQuery};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let doc = DocumentDef::new("xmltest.doc1")
//!     .root(
//!         ElementDef::new("Items").child(
//!             ElementDef::new("Item")
//!                 .source("xmltest.items")
//!                 .optional()
//!                 .unbounded()
//!                 .child(AttributeDef::column("ItemID", "itemNum")),
//!         ),
//!     )
//!     .build()?;
//! let program = DocumentPlanner::default().plan(Arc::new(doc), &XmlQuery::new())?;
//! let source = InMemorySource::new().table(
//!     "xmltest.items",
//!     Table::new(["itemNum"]).row(["001"]).row(["002"]),
//! );
//!
//! let output = execute(&program, &source)?;
//! let items: Vec<_> = output.documents[0].root.elements().collect();
//! assert_eq!(items.len(), 2);
//! assert_eq!(items[1].attribute("ItemID"), Some("002"));
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod executor;
pub mod fragment;
pub mod memory;
pub mod source;
pub mod staging;

pub use error::{ProcessingError, Result, SourceError};
pub use executor::{execute, Production, ProductionOutput, ProductionStats};
pub use fragment::{AttributeFragment, ElementFragment, Fragment, FragmentDocument};
pub use memory::{InMemorySource, Table};
pub use source::{Tuple, TupleCursor, TupleSource};
pub use staging::{StagedCursor, StagedTable, StagingStore};
