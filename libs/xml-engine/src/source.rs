//! Tuple source collaborator

use crate::error::SourceError;
use xmlview_model::{QualifiedName, Value};

pub type Tuple = Vec<Value>;

/// Lazy, finite, ordered sequence of tuples. Dropping the cursor closes it.
pub trait TupleCursor {
    fn columns(&self) -> &[String];

    fn next_tuple(&mut self) -> Result<Option<Tuple>, SourceError>;
}

/// Executes the correlated relational command of a mapping class.
///
/// `params` are positional values for the group's `?` bindings. Sources are
/// restartable: every call opens an independent cursor.
pub trait TupleSource {
    fn open(
        &self,
        group: &QualifiedName,
        params: &[Value],
    ) -> Result<Box<dyn TupleCursor + '_>, SourceError>;
}
