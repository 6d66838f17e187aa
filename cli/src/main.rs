mod args;
mod logging;

use std::process::ExitCode;

use clap::Parser;
use db_tools::client::DbClient;
use db_tools::errors::DbResult;
use serde::Serialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{Level, error, info, warn};

use crate::args::{Args, Command};
use crate::logging::LogWriter;

fn main() -> ExitCode {
    let args = Args::parse();
    let writer = LogWriter::new(args.log_file.clone()).unwrap_or_else(|err| {
        eprintln!("failed to open log file: {err}");
        std::process::exit(1);
    });

    tracing_subscriber::fmt()
        .with_writer(writer)
        .with_target(false)
        .with_max_level(if args.verbose { Level::DEBUG } else { Level::INFO })
        .init();

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(err) => {
            error!("failed to start runtime: {err}");
            return ExitCode::FAILURE;
        }
    };
    runtime.block_on(run(args))
}

async fn run(args: Args) -> ExitCode {
    let settings = match args.settings() {
        Ok(settings) => settings,
        Err(err) => {
            error!("{err}");
            return ExitCode::FAILURE;
        }
    };
    let client = match settings.client_options(false).and_then(|b| b.build()) {
        Ok(client) => client,
        Err(errors) => return report(&errors),
    };

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted, cancelling");
            trigger.cancel();
        }
    });

    match execute(client.as_ref(), &args.command, &cancel).await {
        Ok(Some(value)) => {
            match serde_json::to_string_pretty(&value) {
                Ok(text) => println!("{text}"),
                Err(err) => {
                    error!("cannot render result: {err}");
                    return ExitCode::FAILURE;
                }
            }
            ExitCode::SUCCESS
        }
        Ok(None) => {
            info!("done");
            ExitCode::SUCCESS
        }
        Err(errors) => report(&errors),
    }
}

fn report(errors: &[db_tools::DbError]) -> ExitCode {
    for err in errors {
        error!(code = err.code.as_str(), "{}", err.message);
    }
    ExitCode::FAILURE
}

fn json<T: Serialize>(value: &T) -> Option<Value> {
    serde_json::to_value(value).ok()
}

async fn execute(
    client: &dyn DbClient,
    command: &Command,
    cancel: &CancellationToken,
) -> DbResult<Option<Value>> {
    match command {
        Command::TestConnection { with_database } => {
            client.test_connection(*with_database, cancel).await?;
            Ok(None)
        }
        Command::Exec {
            sql,
            log_start,
            log_finish,
        } => {
            client
                .execute_command(sql, *log_start, *log_finish, cancel)
                .await?;
            Ok(None)
        }
        Command::Backup {
            database,
            file,
            name,
            backup_type,
            compression,
        } => {
            let name = name
                .clone()
                .unwrap_or_else(|| format!("{database}-{backup_type:?}"));
            client
                .backup_database(database, file, &name, *backup_type, *compression, cancel)
                .await?;
            Ok(None)
        }
        Command::Verify { database, file } => {
            client.verify_backup(database, file, cancel).await?;
            Ok(None)
        }
        Command::RestoreFiles { file } => {
            let files = client.get_restore_files(file, cancel).await?;
            Ok(json(&files))
        }
        Command::Restore {
            database,
            file,
            data_folder,
            log_folder,
            separator,
        } => {
            let files = client.get_restore_files(file, cancel).await?;
            client
                .restore_database(
                    database,
                    file,
                    Some(&files),
                    data_folder,
                    log_folder,
                    separator,
                    cancel,
                )
                .await?;
            Ok(None)
        }
        Command::Check { database } => {
            client.check_repair_database(database, cancel).await?;
            Ok(None)
        }
        Command::Recompile { database } => {
            client.recompile_procedures(database, cancel).await?;
            Ok(None)
        }
        Command::UpdateStatistics { database } => {
            client.update_statistics(database, cancel).await?;
            Ok(None)
        }
        Command::ServerInfo => Ok(json(&client.get_db_server_info(cancel).await?)),
        Command::Databases => Ok(json(&client.get_database_infos(cancel).await?)),
        Command::Exists { database } => {
            Ok(json(&client.is_database_exists(database, cancel).await?))
        }
        Command::IsLocal => Ok(json(&client.is_server_local(cancel).await?)),
        Command::Compression => Ok(json(&client.is_server_allows_compression(cancel).await?)),
        Command::SetDefaultFolders { backup, data, log } => {
            client.set_default_folders(backup, data, log, cancel).await?;
            Ok(None)
        }
        Command::RecoveryModel { database, model } => {
            client
                .change_database_recovery_model(database, *model, cancel)
                .await?;
            Ok(None)
        }
        Command::HostPlatform => Ok(json(&client.host_platform(cancel).await?)),
        Command::ServerName => Ok(json(&client.get_server_name(cancel).await?)),
    }
}
