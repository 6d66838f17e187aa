use std::sync::Arc;

use rusqlite::Statement;
use rusqlite::types::Value;

use super::params::bind_named;
use crate::error::DbToolsError;
use crate::results::ResultSet;
use crate::types::RowValues;

/// Extract a `RowValues` from a `SQLite` row.
///
/// # Errors
///
/// Returns `DbToolsError` if the value cannot be read.
pub fn sqlite_extract_value_sync(row: &rusqlite::Row, idx: usize) -> Result<RowValues, DbToolsError> {
    let value: Value = row.get(idx)?;
    match value {
        Value::Null => Ok(RowValues::Null),
        Value::Integer(i) => Ok(RowValues::Int(i)),
        Value::Real(f) => Ok(RowValues::Float(f)),
        Value::Text(s) => Ok(RowValues::Text(s)),
        Value::Blob(b) => Ok(RowValues::Blob(b)),
    }
}

/// Build a result set from a `SQLite` statement with named values bound.
///
/// # Errors
/// Returns `DbToolsError::SqliteError` if binding, execution or row access fails.
pub fn build_result_set(
    stmt: &mut Statement,
    values: &[(String, Value)],
) -> Result<ResultSet, DbToolsError> {
    let column_names: Vec<String> = stmt
        .column_names()
        .iter()
        .map(std::string::ToString::to_string)
        .collect();
    let col_count = column_names.len();

    bind_named(stmt, values)?;
    let mut rows_iter = stmt.raw_query();
    let mut result_set = ResultSet::with_capacity(10);
    result_set.set_column_names(Arc::new(column_names));

    while let Some(row) = rows_iter.next()? {
        let mut row_values = Vec::with_capacity(col_count);
        for i in 0..col_count {
            row_values.push(sqlite_extract_value_sync(row, i)?);
        }
        result_set.add_row_values(row_values);
    }

    Ok(result_set)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn values_keep_their_storage_class() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        let mut stmt = conn
            .prepare("SELECT :i AS i, :t AS t, NULL AS n, 1.5 AS f")
            .unwrap();
        let rs = build_result_set(
            &mut stmt,
            &[
                (":i".into(), Value::Integer(3)),
                (":t".into(), Value::Text("x".into())),
            ],
        )
        .unwrap();
        assert_eq!(rs.len(), 1);
        let row = &rs.results[0];
        assert_eq!(row.get("i"), Some(&RowValues::Int(3)));
        assert_eq!(row.get("t"), Some(&RowValues::Text("x".into())));
        assert_eq!(row.get("n"), Some(&RowValues::Null));
        assert_eq!(row.get("f"), Some(&RowValues::Float(1.5)));
    }
}
