use std::sync::Arc;

use super::result_set::ResultSet;
use super::row::CustomDbRow;
use crate::error::DbToolsError;
use crate::params::FromRowValue;
use crate::types::RowValues;

/// Forward-only cursor over a buffered [`ResultSet`].
///
/// ```rust
/// use db_tools::prelude::*;
///
/// let rs = ResultSet::from_rows(vec!["name"], vec![vec![RowValues::Text("master".into())]]);
/// let mut reader = DataReader::new(rs);
/// while reader.read() {
///     assert_eq!(reader.get_string(0).as_deref(), Some("master"));
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct DataReader {
    result: ResultSet,
    position: Option<usize>,
}

impl DataReader {
    #[must_use]
    pub fn new(result: ResultSet) -> Self {
        Self {
            result,
            position: None,
        }
    }

    /// Advance to the next row. Returns `false` once the rows are exhausted.
    pub fn read(&mut self) -> bool {
        let next = self.position.map_or(0, |p| p + 1);
        if next < self.result.len() {
            self.position = Some(next);
            true
        } else {
            self.position = Some(self.result.len());
            false
        }
    }

    /// Row under the cursor, if `read` returned `true`.
    #[must_use]
    pub fn current(&self) -> Option<&CustomDbRow> {
        self.position.and_then(|p| self.result.results.get(p))
    }

    #[must_use]
    pub fn get(&self, column_name: &str) -> Option<&RowValues> {
        self.current().and_then(|row| row.get(column_name))
    }

    #[must_use]
    pub fn get_by_index(&self, index: usize) -> Option<&RowValues> {
        self.current().and_then(|row| row.get_by_index(index))
    }

    /// Typed read of column `index` of the current row.
    ///
    /// # Errors
    /// Returns [`DbToolsError::ConversionError`] when there is no current row,
    /// the column does not exist, the value is NULL, or it cannot be read as `T`.
    pub fn get_value<T: FromRowValue>(&self, index: usize) -> Result<T, DbToolsError> {
        let value = self.get_by_index(index).ok_or_else(|| {
            DbToolsError::ConversionError(format!("no value at column {index}"))
        })?;
        if value.is_null() {
            return Err(DbToolsError::ConversionError(format!(
                "column {index} is NULL"
            )));
        }
        T::from_row_value(value).ok_or_else(|| {
            DbToolsError::ConversionError(format!(
                "column {index} holds {value:?}, which cannot be read as {}",
                std::any::type_name::<T>()
            ))
        })
    }

    /// Text of column `index`; `None` for NULL.
    #[must_use]
    pub fn get_string(&self, index: usize) -> Option<String> {
        self.get_by_index(index).and_then(String::from_row_value)
    }

    #[must_use]
    pub fn field_count(&self) -> usize {
        self.result.get_column_names().map_or(0, |c| c.len())
    }

    #[must_use]
    pub fn column_names(&self) -> Option<&Arc<Vec<String>>> {
        self.result.get_column_names()
    }

    #[must_use]
    pub fn into_result_set(self) -> ResultSet {
        self.result
    }
}
