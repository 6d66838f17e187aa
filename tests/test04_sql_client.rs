#![cfg(feature = "mssql")]

mod common;

use std::sync::Arc;

use common::{FixtureKit, Reply, Script};
use db_tools::mssql::commands;
use db_tools::prelude::*;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio_util::sync::CancellationToken;

const CONNECTION: &str = "Data Source=db01;Initial Catalog=Sales";

fn client(script: &Script) -> SqlDbClient {
    client_on(script, CONNECTION)
}

fn client_on(script: &Script, connection_string: &str) -> SqlDbClient {
    let kit = Arc::new(FixtureKit::new(DatabaseProvider::SqlServer, script));
    SqlDbClient::new(ClientCore::new(kit, connection_string))
}

fn client_with_messages(
    script: &Script,
) -> (SqlDbClient, UnboundedReceiver<db_tools::client::ProgressMessage>) {
    let (messages, rx) = ChannelMessages::new();
    let kit = Arc::new(FixtureKit::new(DatabaseProvider::SqlServer, script));
    let core = ClientCore::new(kit, CONNECTION).with_messages(Some(Arc::new(messages)), Some("ops".into()));
    (SqlDbClient::new(core), rx)
}

fn codes(errors: &[DbError]) -> Vec<ErrorCode> {
    errors.iter().map(|e| e.code).collect()
}

fn drain(rx: &mut UnboundedReceiver<db_tools::client::ProgressMessage>) -> Vec<String> {
    let mut lines = Vec::new();
    while let Ok(m) = rx.try_recv() {
        lines.push(m.message);
    }
    lines
}

fn text(value: &str) -> RowValues {
    RowValues::Text(value.into())
}

#[tokio::test]
async fn database_list_skips_tempdb_and_flags_system_databases() {
    let script = Script::new();
    script.rows(
        "FROM sys.databases",
        &["dbName", "recoveryModel", "isSystemDatabase"],
        vec![
            vec![text("master"), RowValues::Int(3), RowValues::Int(1)],
            vec![text("model"), RowValues::Int(1), RowValues::Int(1)],
            vec![text("msdb"), RowValues::Int(3), RowValues::Int(1)],
            vec![text("tempdb"), RowValues::Int(3), RowValues::Int(0)],
            vec![text("Sales"), RowValues::Int(1), RowValues::Int(0)],
        ],
    );
    let infos = client(&script)
        .get_database_infos(&CancellationToken::new())
        .await
        .unwrap();

    let names: Vec<&str> = infos.iter().map(|i| i.name.as_str()).collect();
    assert_eq!(names, ["master", "model", "msdb", "Sales"]);
    assert_eq!(
        infos[3],
        DatabaseInfo {
            name: "Sales".into(),
            recovery_model: DatabaseRecoveryModel::Full,
            is_system_database: false,
        }
    );
    assert!(infos[..3].iter().all(|i| i.is_system_database));
    assert_eq!(infos[0].recovery_model, DatabaseRecoveryModel::Simple);
    assert_eq!(script.closes(), 1);
}

#[tokio::test]
async fn unknown_recovery_model_is_skipped() {
    let script = Script::new();
    script.rows(
        "FROM sys.databases",
        &["dbName", "recoveryModel", "isSystemDatabase"],
        vec![
            vec![text("Odd"), RowValues::Int(9), RowValues::Int(0)],
            vec![text("Hr"), RowValues::Int(2), RowValues::Null],
        ],
    );
    let infos = client(&script)
        .get_database_infos(&CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(infos.len(), 1);
    assert_eq!(infos[0].recovery_model, DatabaseRecoveryModel::BulkLogged);
}

#[tokio::test]
async fn cancelled_before_start_runs_nothing() {
    let script = Script::new();
    let (client, mut rx) = client_with_messages(&script);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let recompiled = client.recompile_procedures("Sales", &cancel).await.unwrap_err();
    assert_eq!(codes(&recompiled), [ErrorCode::CancellationRequested]);
    let updated = client.update_statistics("Sales", &cancel).await.unwrap_err();
    assert_eq!(codes(&updated), [ErrorCode::CancellationRequested]);

    assert!(script.executed().is_empty());
    assert_eq!(script.opens(), 0);
    assert!(drain(&mut rx).is_empty());
}

#[tokio::test]
async fn cancellation_between_objects_stops_the_loop() {
    let cancel = CancellationToken::new();

    let script = Script::new();
    script
        .rows(
            "sp_stored_procedures",
            &["PROCEDURE_QUALIFIER", "PROCEDURE_OWNER", "PROCEDURE_NAME"],
            vec![
                vec![text("Sales"), text("dbo"), text("usp_first;1")],
                vec![text("Sales"), text("dbo"), text("usp_second;1")],
            ],
        )
        .reply("usp_first", Reply::Cancel(cancel.clone()));
    let errors = client(&script)
        .recompile_procedures("Sales", &cancel)
        .await
        .unwrap_err();
    assert_eq!(codes(&errors), [ErrorCode::CancellationRequested]);
    assert_eq!(script.executed_containing("usp_first").len(), 1);
    assert!(script.executed_containing("usp_second").is_empty());
    assert!(script.executed_containing("sys.triggers").is_empty());

    let cancel = CancellationToken::new();
    let tables = Script::new();
    tables
        .rows(
            "sysindexes",
            &["SchemaName", "TableName"],
            vec![
                vec![text("dbo"), text("Orders")],
                vec![text("dbo"), text("Lines")],
            ],
        )
        .reply("[Orders]", Reply::Cancel(cancel.clone()));
    let errors = client(&tables)
        .update_statistics("Sales", &cancel)
        .await
        .unwrap_err();
    assert_eq!(codes(&errors), [ErrorCode::CancellationRequested]);
    assert_eq!(tables.executed_containing("UPDATE STATISTICS").len(), 1);
    assert!(tables.executed_containing("[Lines]").is_empty());
}

#[tokio::test]
async fn recompile_covers_user_procedures_and_triggers() {
    let script = Script::new();
    script
        .rows(
            "sp_stored_procedures",
            &["PROCEDURE_QUALIFIER", "PROCEDURE_OWNER", "PROCEDURE_NAME"],
            vec![
                vec![text("Sales"), text("dbo"), text("usp_load;1")],
                vec![text("Sales"), text("sys"), text("sp_help;1")],
                vec![text("Sales"), text("dbo"), text("dt_verstamp;1")],
                vec![text("Sales"), text("etl"), text("usp_bad;1")],
            ],
        )
        .rows(
            "sys.triggers",
            &["SchemaName", "name"],
            vec![vec![text("dbo"), text("trg_audit")]],
        )
        .reply("usp_bad", Reply::Fail("invalid object".into()));

    let (client, mut rx) = client_with_messages(&script);
    client
        .recompile_procedures("Sales", &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(
        script.executed_containing("sp_recompile"),
        [
            commands::recompile_text("Sales", "[dbo].[usp_load]"),
            commands::recompile_text("Sales", "[etl].[usp_bad]"),
            commands::recompile_text("Sales", "[dbo].[trg_audit]"),
        ]
    );
    let lines = drain(&mut rx);
    assert_eq!(lines[0], "Recompiling procedures and triggers for database Sales...");
    assert!(lines.iter().any(|l| l.contains("[etl].[usp_bad]") && l.contains("invalid object")));
}

#[tokio::test]
async fn statistics_are_updated_per_table() {
    let script = Script::new();
    script.rows(
        "sysindexes",
        &["SchemaName", "TableName"],
        vec![
            vec![text("dbo"), text("Orders")],
            vec![text("etl"), text("Staging")],
        ],
    );
    client(&script)
        .update_statistics("Sales", &CancellationToken::new())
        .await
        .unwrap();

    let executed = script.executed();
    assert!(executed[0].starts_with("USE [Sales];\n"));
    assert_eq!(
        &executed[1..],
        [
            commands::update_statistics_text("Sales", "[dbo].[Orders]"),
            commands::update_statistics_text("Sales", "[etl].[Staging]"),
        ]
    );
}

#[tokio::test]
async fn restore_validates_the_manifest_before_touching_the_server() {
    let script = Script::new();
    let client = client(&script);
    let cancel = CancellationToken::new();
    let restore = |files: Option<Vec<RestoreFileModel>>| {
        let client = &client;
        let cancel = &cancel;
        async move {
            client
                .restore_database("Sales", r"D:\bak\Sales.bak", files.as_deref(), r"D:\data", r"L:\log", "\\", cancel)
                .await
        }
    };

    let none = restore(None).await.unwrap_err();
    assert_eq!(codes(&none), [ErrorCode::NoRestoreFileNames]);

    let two_data = restore(Some(vec![
        RestoreFileModel::new("Sales", "D"),
        RestoreFileModel::new("Sales2", "D"),
        RestoreFileModel::new("Sales_log", "L"),
    ]))
    .await
    .unwrap_err();
    assert_eq!(codes(&two_data), [ErrorCode::NoDataPart]);

    let no_log = restore(Some(vec![RestoreFileModel::new("Sales", "D")]))
        .await
        .unwrap_err();
    assert_eq!(codes(&no_log), [ErrorCode::NoLogPart]);
    assert!(script.executed().is_empty());

    restore(Some(vec![
        RestoreFileModel::new("Sales", "D"),
        RestoreFileModel::new("Sales_log", "L"),
    ]))
    .await
    .unwrap();
    let executed = script.executed();
    assert_eq!(executed.len(), 1);
    assert!(executed[0].contains(r"MOVE N'Sales' TO N'D:\data\Sales.mdf'"));
    assert!(executed[0].contains(r"MOVE N'Sales_log' TO N'L:\log\Sales_log.ldf'"));
}

#[tokio::test]
async fn restore_file_list_reads_logical_names() {
    let script = Script::new();
    script.rows(
        "FILELISTONLY",
        &["LogicalName", "PhysicalName", "Type"],
        vec![
            vec![text("Sales"), text(r"C:\data\Sales.mdf"), text("D")],
            vec![text("Sales_log"), text(r"C:\data\Sales_log.ldf"), text("L")],
        ],
    );
    let files = client(&script)
        .get_restore_files(r"D:\bak\Sales.bak", &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(
        files,
        [
            RestoreFileModel::new("Sales", "D"),
            RestoreFileModel::new("Sales_log", "L"),
        ]
    );
}

#[tokio::test]
async fn backup_runs_one_command_and_reports_progress() {
    let script = Script::new();
    let (client, mut rx) = client_with_messages(&script);
    client
        .backup_database("Sales", r"D:\bak\Sales.bak", "Sales-Full", BackupType::Full, true, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(
        script.executed(),
        [commands::backup_command_text("Sales", r"D:\bak\Sales.bak", "Sales-Full", BackupType::Full, true)]
    );
    assert_eq!(drain(&mut rx), [r"Backup database Sales to D:\bak\Sales.bak..."]);
}

#[tokio::test]
async fn verify_checks_the_newest_backup_set() {
    let script = Script::new();
    script.scalar("msdb..backupset", RowValues::Int(4));
    let (client, mut rx) = client_with_messages(&script);
    client
        .verify_backup("Sales", r"D:\bak\Sales.bak", &CancellationToken::new())
        .await
        .unwrap();

    let executed = script.executed();
    assert_eq!(executed.len(), 2);
    assert!(executed[0].contains("max(backup_set_id)"));
    assert_eq!(
        executed[1],
        r"RESTORE VERIFYONLY FROM DISK = N'D:\bak\Sales.bak' WITH FILE = 4, NOUNLOAD, NOREWIND"
    );
    assert_eq!(
        script.parameters(),
        [vec![("@database".to_string(), Some(text("Sales")))], vec![]]
    );
    assert_eq!(drain(&mut rx), [r"Verify backup D:\bak\Sales.bak of Sales..."]);
    assert_eq!(script.closes(), 1);
}

#[tokio::test]
async fn verify_without_backup_history_fails() {
    let script = Script::new();
    script.scalar("msdb..backupset", RowValues::Null);
    let seen = Arc::new(std::sync::Mutex::new(0_usize));
    let sink = Arc::clone(&seen);
    let handler: InfoMessageHandler = Arc::new(move |_: &InfoMessage| {
        *sink.lock().unwrap() += 1;
    });
    let kit = Arc::new(FixtureKit::new(DatabaseProvider::SqlServer, &script));
    let relaying = SqlDbClient::new(ClientCore::new(kit, CONNECTION).with_info_message(Some(handler)));

    let errors = relaying
        .verify_backup("Sales", r"D:\bak\Sales.bak", &CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(codes(&errors), [ErrorCode::ErrorIn]);
    assert_eq!(
        errors[0].message,
        "error in verify_backup: SQL execution error: Verify failed. Backup information for database 'Sales' not found."
    );
    assert!(script.executed_containing("VERIFYONLY").is_empty());
    assert_eq!(*seen.lock().unwrap(), 0);
}

#[tokio::test]
async fn failed_verification_is_reported() {
    let script = Script::new();
    script
        .scalar("msdb..backupset", RowValues::Int(1))
        .reply("VERIFYONLY", Reply::Fail("media is damaged".into()));
    let errors = client(&script)
        .verify_backup("Sales", r"D:\bak\Sales.bak", &CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(codes(&errors), [ErrorCode::ErrorIn]);
    assert!(errors[0].message.contains("verify_backup"));
    assert!(errors[0].message.contains("media is damaged"));
    assert_eq!(script.executed_containing("FROM DISK").len(), 1);
}

#[tokio::test]
async fn failed_backup_is_reported_with_its_operation() {
    let script = Script::new();
    script.reply("BACKUP", Reply::Fail("disk full".into()));
    let (client, mut rx) = client_with_messages(&script);
    let errors = client
        .backup_database("Sales", r"D:\bak\Sales.bak", "Sales-Log", BackupType::TransactionLog, false, &CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(codes(&errors), [ErrorCode::ErrorIn]);
    assert!(errors[0].message.contains("backup_database"));
    assert!(errors[0].message.contains("disk full"));
    let lines = drain(&mut rx);
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[1], errors[0].message);
    assert_eq!(script.closes(), 1);
}

fn script_server(script: &Script) {
    script
        .scalar("'productversion'", text("15.0.2000.5"))
        .scalar("'InstanceName'", RowValues::Null)
        .rows(
            "N'BackupDirectory'",
            &["Value", "Data"],
            vec![vec![text("BackupDirectory"), text(r"D:\bak")]],
        )
        .rows(
            "N'SqlArg0'",
            &["Value", "Data"],
            vec![vec![text("SqlArg0"), text(r"-dC:\Data\master.mdf")]],
        )
        .rows(
            "N'DefaultLog'",
            &["Value", "Data"],
            vec![vec![text("DefaultLog"), text(r"L:\log")]],
        )
        .scalar("backup compression default", RowValues::Int(1))
        .scalar("@@servername", text("DB01"));
}

#[tokio::test]
async fn server_info_falls_back_to_the_master_file_folder() {
    let script = Script::new();
    script_server(&script);
    let client = client(&script);
    let cancel = CancellationToken::new();

    let info = client.get_db_server_info(&cancel).await.unwrap();
    assert_eq!(
        info,
        DbServerInfo {
            server_product_version: "15.0.2000.5".into(),
            server_instance_name: "MSSQLSERVER".into(),
            backup_directory: Some(r"D:\bak".into()),
            default_data_directory: Some(r"C:\Data".into()),
            default_log_directory: Some(r"L:\log".into()),
            allows_compression: true,
            server_name: "DB01".into(),
        }
    );
    assert!(script.executed_containing("xp_instance_regread").len() >= 4);

    client.get_db_server_info(&cancel).await.unwrap();
    assert_eq!(script.executed_containing("'productversion'").len(), 1);
    assert_eq!(script.executed_containing("'InstanceName'").len(), 1);
}

#[tokio::test]
async fn missing_product_version_is_coded() {
    let script = Script::new();
    let errors = client(&script)
        .get_db_server_info(&CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(codes(&errors), [ErrorCode::ProductVersionIsNotDetected]);
}

#[tokio::test]
async fn default_folders_need_every_write_to_land() {
    let script = Script::new();
    script_server(&script);
    script.reply("xp_instance_regwrite", Reply::Count(1));
    let cancel = CancellationToken::new();
    client(&script)
        .set_default_folders(r"D:\bak", r"D:\data", r"L:\log", &cancel)
        .await
        .unwrap();
    assert_eq!(script.executed_containing("xp_instance_regwrite").len(), 3);

    let refused = Script::new();
    script_server(&refused);
    refused.reply("xp_instance_regwrite", Reply::Count(0));
    let errors = client(&refused)
        .set_default_folders(r"D:\bak", r"D:\data", r"L:\log", &cancel)
        .await
        .unwrap_err();
    assert_eq!(codes(&errors), [ErrorCode::ErrorWriteRegData]);
    assert_eq!(refused.executed_containing("xp_instance_regwrite").len(), 1);
}

#[tokio::test]
async fn existence_check_binds_the_database_name() {
    let script = Script::new();
    script.scalar("sysdatabases", RowValues::Int(1));
    let exists = client(&script)
        .is_database_exists("Sales", &CancellationToken::new())
        .await
        .unwrap();
    assert!(exists);
    assert_eq!(
        script.parameters()[0],
        [("@database".to_string(), Some(text("Sales")))]
    );
}

#[tokio::test]
async fn missing_scalars_are_coded() {
    let cancel = CancellationToken::new();

    let empty = Script::new();
    let errors = client(&empty).is_database_exists("Sales", &cancel).await.unwrap_err();
    assert_eq!(codes(&errors), [ErrorCode::ExecuteScalarResultIsNull]);
    let errors = client(&empty).is_server_allows_compression(&cancel).await.unwrap_err();
    assert_eq!(codes(&errors), [ErrorCode::ExecuteScalarResultIsNull]);

    let blank = Script::new();
    blank.scalar("'InstanceName'", text("  "));
    script_server(&blank);
    let errors = client(&blank).get_db_server_info(&cancel).await.unwrap_err();
    assert_eq!(codes(&errors), [ErrorCode::ServerInstanceNameIsNotDetected]);
    assert!(blank.executed_containing("xp_instance_regread").is_empty());
}

#[tokio::test]
async fn local_server_is_recognized_by_client_address() {
    let script = Script::new();
    script.scalar("client_net_address", text("<local machine>"));
    assert!(client(&script).is_server_local(&CancellationToken::new()).await.unwrap());

    let remote = Script::new();
    remote.scalar("client_net_address", text("10.1.2.3"));
    assert!(!client(&remote).is_server_local(&CancellationToken::new()).await.unwrap());
}

#[tokio::test]
async fn test_connection_codes() {
    let cancel = CancellationToken::new();

    let ok = Script::new();
    client(&ok).test_connection(true, &cancel).await.unwrap();
    assert_eq!((ok.opens(), ok.closes()), (1, 1));

    let down = Script::new();
    down.fail_open("login failed");
    let errors = client(&down).test_connection(false, &cancel).await.unwrap_err();
    assert_eq!(codes(&errors), [ErrorCode::ConnectionFailed]);
    assert!(errors[0].message.contains("login failed"));

    let no_catalog = Script::new();
    let errors = client_on(&no_catalog, "Data Source=db01")
        .test_connection(true, &cancel)
        .await
        .unwrap_err();
    assert_eq!(codes(&errors), [ErrorCode::DatabaseNameIsNotSpecified]);

    let empty = Script::new();
    let errors = client_on(&empty, "").test_connection(false, &cancel).await.unwrap_err();
    assert_eq!(codes(&errors), [ErrorCode::ConnectionServerDoesNotSpecified]);
}

#[tokio::test]
async fn execute_command_logs_start_and_finish() {
    let script = Script::new();
    let (client, mut rx) = client_with_messages(&script);
    client
        .execute_command("EXEC dbo.usp_cleanup", true, true, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(
        drain(&mut rx),
        [
            "Start - EXEC dbo.usp_cleanup For Database - db01.Sales",
            "Finish - EXEC dbo.usp_cleanup For Database - db01.Sales",
        ]
    );
    assert_eq!(script.executed(), ["EXEC dbo.usp_cleanup"]);
}

#[tokio::test]
async fn server_messages_reach_the_info_handler() {
    let script = Script::new();
    script
        .reply("DBCC CHECKDB", Reply::Info("Page checksum repaired.".into(), 10))
        .reply("sp_recompile", Reply::Info("Permission denied.".into(), 16))
        .reply("BACKUP", Reply::Info("Disk is offline.".into(), 20))
        .rows(
            "sp_stored_procedures",
            &["PROCEDURE_QUALIFIER", "PROCEDURE_OWNER", "PROCEDURE_NAME"],
            vec![vec![text("Sales"), text("dbo"), text("usp_load;1")]],
        );
    let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let handler: InfoMessageHandler = Arc::new(move |m: &InfoMessage| {
        sink.lock().unwrap().push((m.class, m.message.clone()));
    });
    let kit = Arc::new(FixtureKit::new(DatabaseProvider::SqlServer, &script));
    let relaying = SqlDbClient::new(ClientCore::new(kit, CONNECTION).with_info_message(Some(handler)));
    let cancel = CancellationToken::new();

    relaying.check_repair_database("Sales", &cancel).await.unwrap();
    relaying.recompile_procedures("Sales", &cancel).await.unwrap();
    let errors = relaying
        .backup_database("Sales", r"D:\bak\Sales.bak", "Sales-Full", BackupType::Full, false, &cancel)
        .await
        .unwrap_err();
    assert_eq!(codes(&errors), [ErrorCode::ErrorIn]);
    assert!(errors[0].message.contains("Disk is offline."));
    assert_eq!(
        *seen.lock().unwrap(),
        [
            (10, "Page checksum repaired.".to_string()),
            (16, "Permission denied.".to_string()),
        ]
    );

    // without a handler the same message fails the command
    let errors = client(&script)
        .check_repair_database("Sales", &cancel)
        .await
        .unwrap_err();
    assert_eq!(codes(&errors), [ErrorCode::ErrorIn]);
    assert!(errors[0].message.contains("Page checksum repaired."));
}

#[tokio::test]
async fn recovery_model_change_is_one_alter() {
    let script = Script::new();
    client(&script)
        .change_database_recovery_model("Sales", DatabaseRecoveryModel::Simple, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(
        script.executed(),
        ["ALTER DATABASE [Sales] SET RECOVERY SIMPLE WITH NO_WAIT"]
    );
}
