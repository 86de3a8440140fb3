//! In-memory tuple source
//!
//! Tables are keyed by group name. A table declares its parameter columns;
//! the positional parameters of [`TupleSource::open`] restrict rows by SQL
//! equality on those columns, which is how correlated children see only the
//! rows of their parent. Opening without parameters reads the whole table,
//! as staging does.

use crate::error::SourceError;
use crate::source::{Tuple, TupleCursor, TupleSource};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
use std::sync::Arc;
use tracing::trace;
use xmlview_model::{QualifiedName, Value};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Table {
    pub columns: Vec<String>,
    #[serde(default)]
    pub parameters: Vec<String>,
    #[serde(default)]
    pub rows: Vec<Tuple>,
    /// Fail the cursor after this many tuples. Used to simulate data-access
    /// failures.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fail_after: Option<usize>,
}

impl Table {
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    pub fn parameters<I, S>(mut self, parameters: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.parameters = parameters.into_iter().map(Into::into).collect();
        self
    }

    pub fn row<I, V>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.rows.push(values.into_iter().map(Into::into).collect());
        self
    }

    pub fn fail_after(mut self, tuples: usize) -> Self {
        self.fail_after = Some(tuples);
        self
    }

    fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.eq_ignore_ascii_case(name))
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct InMemorySource {
    #[serde(default)]
    tables: HashMap<QualifiedName, Table>,
    #[serde(skip)]
    open: Arc<AtomicUsize>,
    #[serde(skip)]
    opened: Arc<AtomicUsize>,
}

impl InMemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn table(mut self, group: impl Into<QualifiedName>, table: Table) -> Self {
        self.insert(group, table);
        self
    }

    pub fn insert(&mut self, group: impl Into<QualifiedName>, table: Table) {
        self.tables.insert(group.into(), table);
    }

    pub fn get(&self, group: &QualifiedName) -> Option<&Table> {
        self.tables.get(group)
    }

    /// Cursors currently open.
    pub fn open_cursors(&self) -> usize {
        self.open.load(AtomicOrdering::SeqCst)
    }

    /// Cursors opened since creation.
    pub fn cursors_opened(&self) -> usize {
        self.opened.load(AtomicOrdering::SeqCst)
    }
}

impl TupleSource for InMemorySource {
    fn open(
        &self,
        group: &QualifiedName,
        params: &[Value],
    ) -> Result<Box<dyn TupleCursor + '_>, SourceError> {
        let table = self
            .tables
            .get(group)
            .ok_or_else(|| SourceError::UnknownGroup(group.to_string()))?;
        if !params.is_empty() && params.len() != table.parameters.len() {
            return Err(SourceError::ParameterCount {
                group: group.to_string(),
                expected: table.parameters.len(),
                actual: params.len(),
            });
        }
        let keys = table
            .parameters
            .iter()
            .take(params.len())
            .map(|p| {
                table.column_index(p).ok_or_else(|| SourceError::Failed {
                    group: group.to_string(),
                    message: format!("parameter column '{}' does not exist", p),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let rows = table
            .rows
            .iter()
            .filter(|row| {
                keys.iter().zip(params).all(|(index, param)| {
                    row.get(*index)
                        .and_then(|v| v.compare(param))
                        .is_some_and(|o| o == Ordering::Equal)
                })
            })
            .collect();

        self.open.fetch_add(1, AtomicOrdering::SeqCst);
        self.opened.fetch_add(1, AtomicOrdering::SeqCst);
        trace!(group = %group, params = params.len(), "opened in-memory cursor");
        Ok(Box::new(MemoryCursor {
            group: group.clone(),
            columns: &table.columns,
            rows,
            position: 0,
            fail_after: table.fail_after,
            open: Arc::clone(&self.open),
        }))
    }
}

struct MemoryCursor<'a> {
    group: QualifiedName,
    columns: &'a [String],
    rows: Vec<&'a Tuple>,
    position: usize,
    fail_after: Option<usize>,
    open: Arc<AtomicUsize>,
}

impl TupleCursor for MemoryCursor<'_> {
    fn columns(&self) -> &[String] {
        self.columns
    }

    fn next_tuple(&mut self) -> Result<Option<Tuple>, SourceError> {
        if self.fail_after.is_some_and(|n| self.position >= n) {
            return Err(SourceError::Failed {
                group: self.group.to_string(),
                message: format!("cursor failed after {} tuples", self.position),
            });
        }
        let tuple = self.rows.get(self.position).map(|row| (*row).clone());
        if tuple.is_some() {
            self.position += 1;
        }
        Ok(tuple)
    }
}

impl Drop for MemoryCursor<'_> {
    fn drop(&mut self) {
        self.open.fetch_sub(1, AtomicOrdering::SeqCst);
    }
}
