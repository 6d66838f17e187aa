use std::collections::HashMap;
use std::sync::Arc;

use super::row::{CustomDbRow, column_index};
use crate::types::RowValues;

/// A result set from a database query
///
/// Holds the rows of the first result set a command produced. Column names and
/// the name-to-index cache are shared by every row.
#[derive(Debug, Clone, Default)]
pub struct ResultSet {
    /// The rows returned by the query
    pub results: Vec<CustomDbRow>,
    /// Rows affected, as reported by the driver for DML
    pub rows_affected: usize,
    column_names: Option<Arc<Vec<String>>>,
    column_index_cache: Option<Arc<HashMap<String, usize>>>,
}

impl ResultSet {
    /// Create a new result set with preallocated row capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> ResultSet {
        ResultSet {
            results: Vec::with_capacity(capacity),
            ..ResultSet::default()
        }
    }

    /// Build a result set from column names and raw row values.
    #[must_use]
    pub fn from_rows<S: Into<String>>(columns: Vec<S>, rows: Vec<Vec<RowValues>>) -> ResultSet {
        let mut result_set = ResultSet::with_capacity(rows.len());
        result_set.set_column_names(Arc::new(columns.into_iter().map(Into::into).collect()));
        for row in rows {
            result_set.add_row_values(row);
        }
        result_set
    }

    /// Set the column names for this result set (to be shared by all rows)
    pub fn set_column_names(&mut self, column_names: Arc<Vec<String>>) {
        self.column_index_cache = Some(Arc::new(column_index(&column_names)));
        self.column_names = Some(column_names);
    }

    /// Get the column names for this result set
    #[must_use]
    pub fn get_column_names(&self) -> Option<&Arc<Vec<String>>> {
        self.column_names.as_ref()
    }

    /// Add a row to the result set. Rows added before column names are set
    /// are dropped.
    pub fn add_row_values(&mut self, row_values: Vec<RowValues>) {
        if let (Some(column_names), Some(cache)) = (&self.column_names, &self.column_index_cache) {
            self.results.push(CustomDbRow {
                column_names: Arc::clone(column_names),
                rows: row_values,
                column_index_cache: Arc::clone(cache),
            });
            self.rows_affected += 1;
        }
    }

    /// Number of buffered rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.results.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}
