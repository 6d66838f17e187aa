use rusqlite::Statement;
use rusqlite::types::Value;

use crate::error::DbToolsError;
use crate::kit::NativeParameter;
use crate::types::RowValues;

/// Convert a single `RowValue` to a rusqlite `Value`.
#[must_use]
pub fn row_value_to_sqlite_value(value: &RowValues) -> Value {
    match value {
        RowValues::Int(i) => Value::Integer(*i),
        RowValues::Float(f) => Value::Real(*f),
        RowValues::Text(s) => Value::Text(s.clone()),
        RowValues::Bool(b) => Value::Integer(i64::from(*b)),
        RowValues::Timestamp(dt) => Value::Text(dt.format("%F %T%.f").to_string()),
        RowValues::Null => Value::Null,
        RowValues::JSON(jval) => Value::Text(jval.to_string()),
        RowValues::Blob(bytes) => Value::Blob(bytes.clone()),
    }
}

/// Placeholder form of a parameter name; bare names bind as `:name`.
fn placeholder(name: &str) -> String {
    if name.starts_with([':', '@', '$']) {
        name.to_string()
    } else {
        format!(":{name}")
    }
}

/// Named values ready to bind, in parameter order. Parameters that take no
/// input are left out.
///
/// # Errors
/// Returns [`DbToolsError::Unimplemented`] for structured parameters.
pub fn named_values(parameters: &[NativeParameter]) -> Result<Vec<(String, Value)>, DbToolsError> {
    parameters
        .iter()
        .filter(|p| p.direction.accepts_input())
        .map(|p| {
            if p.structured {
                return Err(DbToolsError::Unimplemented(format!(
                    "table-valued parameter {} on SQLite",
                    p.name
                )));
            }
            let value = p.value.as_ref().map_or(Value::Null, row_value_to_sqlite_value);
            Ok((placeholder(&p.name), value))
        })
        .collect()
}

/// Bind `values` to the placeholders `stmt` declares. Values the statement
/// does not reference are skipped.
///
/// # Errors
/// Returns `DbToolsError::SqliteError` if binding fails.
pub fn bind_named(stmt: &mut Statement<'_>, values: &[(String, Value)]) -> Result<(), DbToolsError> {
    for (name, value) in values {
        if let Some(index) = stmt.parameter_index(name)? {
            stmt.raw_bind_parameter(index, value)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::Parameter;
    use crate::types::ParameterDirection;

    #[test]
    fn bare_names_get_a_colon_and_outputs_are_dropped() {
        let input = NativeParameter::from_portable(&Parameter::typed("name", "jobs", false));
        let at = NativeParameter::from_portable(&Parameter::typed("@id", 7_i64, false));
        let output = NativeParameter::from_portable(
            &Parameter::typed("@out", 0_i64, false).with_direction(ParameterDirection::Output),
        );
        let values = named_values(&[input, at, output]).unwrap();
        assert_eq!(
            values,
            vec![
                (":name".to_string(), Value::Text("jobs".into())),
                ("@id".to_string(), Value::Integer(7)),
            ]
        );
    }

    #[test]
    fn unset_input_binds_null() {
        let p = NativeParameter::from_portable(&Parameter::typed("@flag", false, true));
        assert_eq!(named_values(&[p]).unwrap()[0].1, Value::Null);
    }
}
