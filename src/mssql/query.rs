use std::fmt::Write as _;
use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};
use tiberius::numeric::Numeric;
use tiberius::{Query, Uuid};

use super::connection::MssqlClient;
use super::params::declaration;
use crate::error::DbToolsError;
use crate::kit::DbCommand;
use crate::results::ResultSet;
use crate::types::{CommandType, ParameterDirection, RowValues};

/// Column carrying `@@ROWCOUNT` in the trailing select of a batch that
/// returns output parameters.
const ROW_COUNT_COLUMN: &str = "__rows";

/// A command rewritten into a single positional batch.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct PreparedBatch {
    pub sql: String,
    /// Values for `@P1..@Pn`, in order.
    pub binds: Vec<RowValues>,
    /// Variables echoed back by the trailing select.
    pub returns: Vec<String>,
}

fn variable(name: &str) -> String {
    format!("@{}", name.trim_start_matches(['@', ':', '$']))
}

/// Rewrite `command` into one batch.
///
/// The driver only binds positional `@Pn` parameters, so each named
/// parameter becomes a local variable declared at the top of the batch and
/// initialised from its positional slot. When `collect_returns` is set and
/// the command has output parameters, a final select echoes `@@ROWCOUNT` and
/// every output variable.
pub(crate) fn prepare_batch(
    command: &DbCommand,
    collect_returns: bool,
) -> Result<PreparedBatch, DbToolsError> {
    let mut sql = String::new();
    let mut binds = Vec::new();
    let mut returns = Vec::new();

    for p in &command.parameters {
        let var = variable(&p.name);
        let decl = declaration(p)?;
        match (&p.value, p.direction.accepts_input()) {
            (Some(value), true) => {
                binds.push(value.clone());
                let _ = writeln!(sql, "DECLARE {var} {decl} = @P{};", binds.len());
            }
            _ => {
                let _ = writeln!(sql, "DECLARE {var} {decl};");
            }
        }
        if p.direction.returns_value() {
            returns.push(var);
        }
    }

    match command.command_type {
        CommandType::Text => sql.push_str(&command.text),
        CommandType::TableDirect => {
            let _ = write!(sql, "SELECT * FROM {}", command.text);
        }
        CommandType::StoredProcedure => {
            let ret = command
                .parameters
                .iter()
                .find(|p| p.direction == ParameterDirection::ReturnValue)
                .map(|p| format!("{} = ", variable(&p.name)))
                .unwrap_or_default();
            let args: Vec<String> = command
                .parameters
                .iter()
                .filter(|p| p.direction != ParameterDirection::ReturnValue)
                .map(|p| {
                    let var = variable(&p.name);
                    if p.direction.returns_value() {
                        format!("{var} = {var} OUTPUT")
                    } else {
                        format!("{var} = {var}")
                    }
                })
                .collect();
            let _ = write!(sql, "EXEC {ret}{}", command.text);
            if !args.is_empty() {
                let _ = write!(sql, " {}", args.join(", "));
            }
        }
    }

    if collect_returns && !returns.is_empty() {
        let echo: Vec<String> = returns.iter().map(|v| format!("{v} AS [{v}]")).collect();
        let _ = write!(
            sql,
            "\n;SELECT @@ROWCOUNT AS [{ROW_COUNT_COLUMN}], {}",
            echo.join(", ")
        );
    } else {
        returns.clear();
    }

    Ok(PreparedBatch {
        sql,
        binds,
        returns,
    })
}

/// Bind parameters directly to the query for SQL Server
pub(crate) fn bind_query_params<'a>(query: &'a str, params: &[RowValues]) -> Query<'a> {
    let mut query_builder = Query::new(query);

    for param in params {
        match param {
            RowValues::Int(i) => query_builder.bind(*i),
            RowValues::Float(f) => query_builder.bind(*f),
            RowValues::Text(s) => query_builder.bind(s.clone()),
            RowValues::Bool(b) => query_builder.bind(*b),
            RowValues::Timestamp(dt) => query_builder.bind(*dt),
            RowValues::Null => query_builder.bind(Option::<String>::None),
            RowValues::JSON(jsval) => query_builder.bind(jsval.to_string()),
            RowValues::Blob(bytes) => query_builder.bind(bytes.clone()),
        }
    }

    query_builder
}

/// Run a batch and buffer its first result set.
pub(crate) async fn build_result_set(
    client: &mut MssqlClient,
    batch: &PreparedBatch,
) -> Result<ResultSet, DbToolsError> {
    let query = bind_query_params(&batch.sql, &batch.binds);
    let mut stream = query.query(client).await?;

    let column_names: Vec<String> = match stream.columns().await? {
        Some(columns) => columns.iter().map(|c| c.name().to_string()).collect(),
        None => return Ok(ResultSet::default()),
    };
    let col_count = column_names.len();

    let rows = stream.into_first_result().await?;
    let mut result_set = ResultSet::with_capacity(rows.len());
    result_set.set_column_names(Arc::new(column_names));
    for row in &rows {
        let mut row_values = Vec::with_capacity(col_count);
        for i in 0..col_count {
            row_values.push(extract_value(row, i).unwrap_or(RowValues::Null));
        }
        result_set.add_row_values(row_values);
    }

    Ok(result_set)
}

/// Run a batch without a result set and return the rows it affected.
pub(crate) async fn execute_batch(
    client: &mut MssqlClient,
    batch: &PreparedBatch,
) -> Result<u64, DbToolsError> {
    let query = bind_query_params(&batch.sql, &batch.binds);
    let exec_result = query.execute(client).await?;
    Ok(exec_result.rows_affected().iter().sum())
}

/// Run a batch that ends with the output echo built by [`prepare_batch`].
/// Returns the affected row count and the value of every returned variable.
pub(crate) async fn execute_batch_with_returns(
    client: &mut MssqlClient,
    batch: &PreparedBatch,
) -> Result<(u64, Vec<(String, RowValues)>), DbToolsError> {
    let query = bind_query_params(&batch.sql, &batch.binds);
    let results = query.query(client).await?.into_results().await?;
    let row = results
        .last()
        .and_then(|rows| rows.first())
        .ok_or_else(|| DbToolsError::ExecutionError("output parameters were not returned".into()))?;

    let rows_affected = match extract_value(row, 0) {
        Some(RowValues::Int(n)) => u64::try_from(n).unwrap_or(0),
        _ => 0,
    };
    let values = batch
        .returns
        .iter()
        .enumerate()
        .map(|(i, name)| {
            (
                name.clone(),
                extract_value(row, i + 1).unwrap_or(RowValues::Null),
            )
        })
        .collect();
    Ok((rows_affected, values))
}

/// Extract a value from a row at a specific index
///
/// Tries the driver's typed getters in turn; `None` means NULL or a type the
/// toolkit does not read.
fn extract_value(row: &tiberius::Row, idx: usize) -> Option<RowValues> {
    if let Ok(Some(val)) = row.try_get::<i32, _>(idx) {
        return Some(RowValues::Int(i64::from(val)));
    }
    if let Ok(Some(val)) = row.try_get::<i64, _>(idx) {
        return Some(RowValues::Int(val));
    }
    if let Ok(Some(val)) = row.try_get::<i16, _>(idx) {
        return Some(RowValues::Int(i64::from(val)));
    }
    if let Ok(Some(val)) = row.try_get::<u8, _>(idx) {
        return Some(RowValues::Int(i64::from(val)));
    }
    if let Ok(Some(val)) = row.try_get::<f32, _>(idx) {
        return Some(RowValues::Float(f64::from(val)));
    }
    if let Ok(Some(val)) = row.try_get::<f64, _>(idx) {
        return Some(RowValues::Float(val));
    }
    if let Ok(Some(val)) = row.try_get::<Numeric, _>(idx) {
        #[allow(clippy::cast_precision_loss)]
        let value = val.value() as f64 / 10_f64.powi(i32::from(val.scale()));
        return Some(RowValues::Float(value));
    }
    if let Ok(Some(val)) = row.try_get::<bool, _>(idx) {
        return Some(RowValues::Bool(val));
    }
    if let Ok(Some(val)) = row.try_get::<NaiveDateTime, _>(idx) {
        return Some(RowValues::Timestamp(val));
    }
    if let Ok(Some(val)) = row.try_get::<NaiveDate, _>(idx) {
        return Some(RowValues::Text(val.format("%Y-%m-%d").to_string()));
    }
    if let Ok(Some(val)) = row.try_get::<Uuid, _>(idx) {
        return Some(RowValues::Text(val.to_string()));
    }
    if let Ok(Some(val)) = row.try_get::<&str, _>(idx) {
        return Some(RowValues::Text(val.to_string()));
    }
    if let Ok(Some(val)) = row.try_get::<&[u8], _>(idx) {
        return Some(RowValues::Blob(val.to_vec()));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kit::NativeParameter;
    use crate::params::{ParamType, Parameter};

    fn native(p: &Parameter) -> NativeParameter {
        let mut n = NativeParameter::from_portable(p);
        super::super::params::assign_native_type(&mut n);
        n
    }

    #[test]
    fn named_parameters_become_declared_variables() {
        let mut cmd = DbCommand::new("SELECT count(*) FROM sys.databases WHERE name = @database");
        cmd.parameters
            .push(native(&Parameter::typed("@database", "Sales", false)));
        let batch = prepare_batch(&cmd, true).unwrap();
        assert_eq!(
            batch.sql,
            "DECLARE @database nvarchar(max) = @P1;\nSELECT count(*) FROM sys.databases WHERE name = @database"
        );
        assert_eq!(batch.binds, vec![RowValues::Text("Sales".into())]);
        assert!(batch.returns.is_empty());
    }

    #[test]
    fn stored_procedure_outputs_are_echoed() {
        let mut cmd = DbCommand::new("dbo.next_id");
        cmd.command_type = CommandType::StoredProcedure;
        cmd.parameters.push(native(
            &Parameter::output("@ret", ParamType::Int32)
                .with_direction(ParameterDirection::ReturnValue),
        ));
        cmd.parameters
            .push(native(&Parameter::typed("@seed", 5_i32, false)));
        cmd.parameters
            .push(native(&Parameter::output("@id", ParamType::Int64)));
        let batch = prepare_batch(&cmd, true).unwrap();
        assert_eq!(
            batch.sql,
            "DECLARE @ret int;\nDECLARE @seed int = @P1;\nDECLARE @id bigint;\n\
             EXEC @ret = dbo.next_id @seed = @seed, @id = @id OUTPUT\n\
             ;SELECT @@ROWCOUNT AS [__rows], @ret AS [@ret], @id AS [@id]"
        );
        assert_eq!(batch.returns, vec!["@ret".to_string(), "@id".to_string()]);
    }

    #[test]
    fn table_direct_selects_everything() {
        let mut cmd = DbCommand::new("[dbo].[jobs]");
        cmd.command_type = CommandType::TableDirect;
        assert_eq!(prepare_batch(&cmd, false).unwrap().sql, "SELECT * FROM [dbo].[jobs]");
    }
}
