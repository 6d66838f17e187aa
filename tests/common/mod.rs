//! Scripted engine for driving managers and clients without a server.
//!
//! Replies are matched by substring against the command text, first match
//! wins. Unmatched readers return no rows and unmatched commands change
//! nothing.

#![allow(dead_code)]

use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use db_tools::DbToolsError;
use db_tools::kit::{
    ConnectionStringBuilder, DbCommand, DbConnection, DbKit, InfoMessage, InfoMessageHandler,
    TransactionHandle,
};
use db_tools::results::ResultSet;
use db_tools::types::{ConnectionState, DatabaseProvider, RowValues};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone)]
pub enum Reply {
    Rows(ResultSet),
    Count(u64),
    Fail(String),
    /// Never completes; only cancellation gets the caller out.
    Hang,
    /// Cancel the token while the command runs, then complete normally.
    Cancel(CancellationToken),
    /// Write these values into the command's returned parameters.
    Outputs(Vec<(String, RowValues)>),
    /// Server message of the given class. Goes to the info handler when one
    /// is attached and the class is low enough, otherwise fails the command.
    Info(String, u8),
}

/// Highest server message class relayed instead of failing.
const MAX_INFO_CLASS: u8 = 16;

#[derive(Debug, Default)]
struct ScriptState {
    replies: Vec<(String, Reply)>,
    executed: Vec<String>,
    parameters: Vec<Vec<(String, Option<RowValues>)>>,
    opens: usize,
    closes: usize,
    fail_open: Option<String>,
}

/// Shared script and call log of every connection a [`FixtureKit`] hands out.
#[derive(Debug, Clone, Default)]
pub struct Script(Arc<Mutex<ScriptState>>);

impl Script {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, ScriptState> {
        self.0.lock().unwrap()
    }

    pub fn reply(&self, contains: &str, reply: Reply) -> &Self {
        self.state().replies.push((contains.to_string(), reply));
        self
    }

    pub fn rows(&self, contains: &str, columns: &[&str], rows: Vec<Vec<RowValues>>) -> &Self {
        let columns: Vec<String> = columns.iter().map(|c| (*c).to_string()).collect();
        self.reply(contains, Reply::Rows(ResultSet::from_rows(columns, rows)))
    }

    pub fn scalar(&self, contains: &str, value: RowValues) -> &Self {
        self.rows(contains, &["value"], vec![vec![value]])
    }

    pub fn fail_open(&self, message: &str) -> &Self {
        self.state().fail_open = Some(message.to_string());
        self
    }

    pub fn executed(&self) -> Vec<String> {
        self.state().executed.clone()
    }

    pub fn executed_containing(&self, fragment: &str) -> Vec<String> {
        self.executed()
            .into_iter()
            .filter(|t| t.contains(fragment))
            .collect()
    }

    /// Parameters bound to each executed command, in execution order.
    pub fn parameters(&self) -> Vec<Vec<(String, Option<RowValues>)>> {
        self.state().parameters.clone()
    }

    pub fn opens(&self) -> usize {
        self.state().opens
    }

    pub fn closes(&self) -> usize {
        self.state().closes
    }

    fn record(&self, command: &DbCommand) -> Option<Reply> {
        let mut state = self.state();
        state.executed.push(command.text.clone());
        let bound = command
            .parameters
            .iter()
            .map(|p| (p.name.clone(), p.value.clone()))
            .collect();
        state.parameters.push(bound);
        state
            .replies
            .iter()
            .find(|(key, _)| command.text.contains(key.as_str()))
            .map(|(_, reply)| reply.clone())
    }
}

#[derive(Debug, Clone)]
pub struct FixtureKit {
    pub provider: DatabaseProvider,
    pub script: Script,
    /// Hand out no connections at all.
    pub refuse_connections: bool,
}

impl FixtureKit {
    pub fn new(provider: DatabaseProvider, script: &Script) -> Self {
        Self {
            provider,
            script: script.clone(),
            refuse_connections: false,
        }
    }
}

impl DbKit for FixtureKit {
    fn provider(&self) -> DatabaseProvider {
        self.provider
    }

    fn connection_string_builder(&self) -> Option<ConnectionStringBuilder> {
        Some(ConnectionStringBuilder::new())
    }

    fn connection(
        &self,
        connection_string: &str,
        info_message: Option<InfoMessageHandler>,
    ) -> Option<Box<dyn DbConnection>> {
        if self.refuse_connections {
            return None;
        }
        Some(Box::new(FixtureConnection {
            connection_string: connection_string.to_string(),
            script: self.script.clone(),
            info_message,
            state: ConnectionState::Closed,
            transaction: None,
            next_transaction: 1,
        }))
    }

    fn command(&self) -> Option<DbCommand> {
        Some(DbCommand::default())
    }
}

pub struct FixtureConnection {
    connection_string: String,
    script: Script,
    info_message: Option<InfoMessageHandler>,
    state: ConnectionState,
    transaction: Option<TransactionHandle>,
    next_transaction: u64,
}

impl std::fmt::Debug for FixtureConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FixtureConnection")
            .field("connection_string", &self.connection_string)
            .field("state", &self.state)
            .field("info_message", &self.info_message.is_some())
            .finish()
    }
}

fn fill_outputs(command: &mut DbCommand, values: &[(String, RowValues)]) {
    for parameter in &mut command.parameters {
        if !parameter.direction.returns_value() {
            continue;
        }
        if let Some((_, value)) = values.iter().find(|(name, _)| *name == parameter.name) {
            parameter.value = Some(value.clone());
        }
    }
}

impl FixtureConnection {
    fn builder(&self) -> Option<ConnectionStringBuilder> {
        ConnectionStringBuilder::parse(&self.connection_string).ok()
    }

    async fn run(&mut self, command: &DbCommand) -> Result<Option<Reply>, DbToolsError> {
        if self.state != ConnectionState::Open {
            return Err(DbToolsError::ConnectionError("connection is not open".into()));
        }
        match self.script.record(command) {
            Some(Reply::Fail(message)) => Err(DbToolsError::ExecutionError(message)),
            Some(Reply::Hang) => {
                std::future::pending::<()>().await;
                Ok(None)
            }
            Some(Reply::Cancel(token)) => {
                token.cancel();
                Ok(None)
            }
            Some(Reply::Info(message, class)) => match &self.info_message {
                Some(handler) if class <= MAX_INFO_CLASS => {
                    handler(&InfoMessage { message, class });
                    Ok(None)
                }
                _ => Err(DbToolsError::ExecutionError(message)),
            },
            other => Ok(other),
        }
    }
}

#[async_trait]
impl DbConnection for FixtureConnection {
    fn state(&self) -> ConnectionState {
        self.state
    }

    fn connection_string(&self) -> &str {
        &self.connection_string
    }

    fn database(&self) -> Option<String> {
        self.builder()?.initial_catalog().map(str::to_string)
    }

    fn data_source(&self) -> Option<String> {
        self.builder()?.data_source().map(str::to_string)
    }

    async fn open(&mut self) -> Result<(), DbToolsError> {
        if self.state == ConnectionState::Open {
            return Ok(());
        }
        let mut state = self.script.state();
        if let Some(message) = &state.fail_open {
            return Err(DbToolsError::ConnectionError(message.clone()));
        }
        state.opens += 1;
        self.state = ConnectionState::Open;
        Ok(())
    }

    async fn close(&mut self) -> Result<(), DbToolsError> {
        if self.state != ConnectionState::Closed {
            self.script.state().closes += 1;
        }
        self.state = ConnectionState::Closed;
        self.transaction = None;
        Ok(())
    }

    async fn begin_transaction(&mut self) -> Result<TransactionHandle, DbToolsError> {
        self.run(&DbCommand::new("BEGIN TRANSACTION")).await?;
        let handle = TransactionHandle(self.next_transaction);
        self.next_transaction += 1;
        self.transaction = Some(handle);
        Ok(handle)
    }

    async fn commit(&mut self, transaction: TransactionHandle) -> Result<(), DbToolsError> {
        if self.transaction != Some(transaction) {
            return Err(DbToolsError::ExecutionError("transaction is not active".into()));
        }
        self.run(&DbCommand::new("COMMIT")).await?;
        self.transaction = None;
        Ok(())
    }

    async fn rollback(&mut self, transaction: TransactionHandle) -> Result<(), DbToolsError> {
        if self.transaction != Some(transaction) {
            return Err(DbToolsError::ExecutionError("transaction is not active".into()));
        }
        self.transaction = None;
        self.run(&DbCommand::new("ROLLBACK")).await?;
        Ok(())
    }

    async fn execute_non_query(&mut self, command: &mut DbCommand) -> Result<u64, DbToolsError> {
        Ok(match self.run(command).await? {
            Some(Reply::Count(n)) => n,
            Some(Reply::Rows(rows)) => rows.rows_affected as u64,
            Some(Reply::Outputs(values)) => {
                fill_outputs(command, &values);
                1
            }
            _ => 0,
        })
    }

    async fn execute_reader(
        &mut self,
        command: &mut DbCommand,
    ) -> Result<ResultSet, DbToolsError> {
        Ok(match self.run(command).await? {
            Some(Reply::Rows(rows)) => rows,
            Some(Reply::Outputs(values)) => {
                fill_outputs(command, &values);
                ResultSet::default()
            }
            _ => ResultSet::default(),
        })
    }
}
