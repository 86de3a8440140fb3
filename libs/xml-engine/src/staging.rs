//! Production-scoped staging snapshots

use crate::error::{ProcessingError, Result};
use crate::source::{Tuple, TupleCursor, TupleSource};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;
use xmlview_model::{QualifiedName, Value};

use crate::error::SourceError;

#[derive(Debug)]
pub struct StagedTable {
    columns: Vec<String>,
    rows: Vec<Tuple>,
}

impl StagedTable {
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Snapshots of staging groups, read once per production and discarded when
/// the unit that declared them completes.
#[derive(Debug, Default)]
pub struct StagingStore {
    tables: HashMap<QualifiedName, Arc<StagedTable>>,
}

impl StagingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read `group` fully from `source`. Returns the number of rows staged.
    pub fn materialize(&mut self, group: &QualifiedName, source: &dyn TupleSource) -> Result<usize> {
        let mut cursor = source.open(group, &[])?;
        let columns = cursor.columns().to_vec();
        let mut rows = Vec::new();
        while let Some(tuple) = cursor.next_tuple()? {
            rows.push(tuple);
        }
        drop(cursor);
        let count = rows.len();
        debug!(group = %group, rows = count, "materialized staging table");
        self.tables
            .insert(group.clone(), Arc::new(StagedTable { columns, rows }));
        Ok(count)
    }

    pub fn unload(&mut self, group: &QualifiedName) -> bool {
        let removed = self.tables.remove(group).is_some();
        if removed {
            debug!(group = %group, "unloaded staging table");
        }
        removed
    }

    pub fn contains(&self, group: &QualifiedName) -> bool {
        self.tables.contains_key(group)
    }

    pub fn get(&self, group: &QualifiedName) -> Option<&Arc<StagedTable>> {
        self.tables.get(group)
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Cursor over staged rows whose named columns equal the given values.
    pub fn open(&self, group: &QualifiedName, restrict: &[(String, Value)]) -> Result<StagedCursor> {
        let table = self
            .tables
            .get(group)
            .ok_or_else(|| ProcessingError::Internal(format!("staging table {} is not materialized", group)))?;
        let keys = restrict
            .iter()
            .map(|(column, value)| {
                table
                    .columns
                    .iter()
                    .position(|c| c.eq_ignore_ascii_case(column))
                    .map(|index| (index, value))
                    .ok_or_else(|| ProcessingError::MissingColumn {
                        group: group.to_string(),
                        column: column.clone(),
                    })
            })
            .collect::<Result<Vec<_>>>()?;
        let matches = table
            .rows
            .iter()
            .enumerate()
            .filter(|(_, row)| {
                keys.iter().all(|(index, value)| {
                    row.get(*index)
                        .and_then(|v| v.compare(value))
                        .is_some_and(|o| o == Ordering::Equal)
                })
            })
            .map(|(index, _)| index)
            .collect();
        Ok(StagedCursor {
            table: Arc::clone(table),
            matches,
            position: 0,
        })
    }
}

pub struct StagedCursor {
    table: Arc<StagedTable>,
    matches: Vec<usize>,
    position: usize,
}

impl TupleCursor for StagedCursor {
    fn columns(&self) -> &[String] {
        &self.table.columns
    }

    fn next_tuple(&mut self) -> std::result::Result<Option<Tuple>, SourceError> {
        let tuple = self
            .matches
            .get(self.position)
            .and_then(|index| self.table.rows.get(*index))
            .cloned();
        if tuple.is_some() {
            self.position += 1;
        }
        Ok(tuple)
    }
}
