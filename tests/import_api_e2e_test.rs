// ==========================================
// ImportApi 端到端测试
// ==========================================
// 测试目标: AppState → ImportApi 的导入、导出、历史查询、并发导入
// ==========================================

mod test_helpers;

use warehouse_import::api::{ApiError, ImportRequest};
use warehouse_import::app::AppState;
use warehouse_import::config::config_keys;
use warehouse_import::config::ConfigManager;
use warehouse_import::domain::{FieldValue, ImportStatus, RowErrorKind};
use warehouse_import::importer::ImportSession;
use warehouse_import::logging;

fn create_state() -> (tempfile::NamedTempFile, AppState) {
    let (temp_file, db_path) = test_helpers::create_test_db().unwrap();
    let state = AppState::new(db_path).unwrap();
    (temp_file, state)
}

#[tokio::test]
async fn test_import_then_history_records_success() {
    logging::init_test();
    let (_db, state) = create_state();

    let file = test_helpers::write_csv_file(
        "SKU,Item Name,Warehouse,Qty\nB-1,Bolt,W1,12 units\nB-2,,W1,3\n",
    )
    .unwrap();
    let response = state
        .import_api
        .import_file("inventory", &test_helpers::path_of(&file))
        .await
        .unwrap();

    assert_eq!(response.status, ImportStatus::Success);
    assert_eq!(response.table, "inventory");
    assert_eq!(response.result.inserted, 1);
    assert!(response
        .file_name
        .as_deref()
        .is_some_and(|name| name.ends_with(".csv")));

    let logs = state.import_api.list_import_logs(None).unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].import_id, response.import_id);
    assert_eq!(logs[0].status, ImportStatus::Success);
    assert_eq!(logs[0].inserted, 1);
    assert_eq!(logs[0].error_rows, 1);

    let errors = state
        .import_api
        .get_import_errors(&response.import_id)
        .unwrap();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].kind, RowErrorKind::MissingMandatory);
    assert_eq!(errors[0].row_number, 3);
}

#[tokio::test]
async fn test_export_then_reimport_updates_in_place() {
    logging::init_test();
    let (_db, state) = create_state();

    let file = test_helpers::write_csv_file(
        "Part Number,Part Name,Category,Qty,Rack\n\
         P-100,Bearing,Mechanical,4,R1\n\
         P-200,Fuse,Electrical,10,R2\n",
    )
    .unwrap();
    state
        .import_api
        .import_file("spare_parts", &test_helpers::path_of(&file))
        .await
        .unwrap();

    let csv = state.import_api.export_table_to_string("spare_parts").unwrap();
    // 查找字段导出为名称
    assert!(csv.contains("Mechanical"));
    assert!(csv.contains("P-200"));

    let out = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
    let out_path = test_helpers::path_of(&out);
    let exported = state.import_api.export_table("spare_parts", &out_path).unwrap();
    assert_eq!(exported, 2);

    let response = state
        .import_api
        .import_file("spare_parts", &out_path)
        .await
        .unwrap();
    assert_eq!(response.result.inserted, 0);
    assert_eq!(response.result.updated, 2);
    assert!(response.result.row_errors.is_empty());

    let (_, records) = state.import_api.fetch_table("spare_parts").unwrap();
    assert_eq!(records.len(), 2);
    let fuse = records
        .iter()
        .find(|r| r.get("part_number").and_then(|v| v.as_str()) == Some("P-200"))
        .unwrap();
    assert_eq!(fuse.get("qty"), Some(&FieldValue::Integer(10)));
    assert_eq!(fuse.get("category_id"), Some(&FieldValue::Text("Electrical".to_string())));
    assert_eq!(fuse.get("rack_id"), Some(&FieldValue::Text("R2".to_string())));
}

#[tokio::test]
async fn test_concurrent_imports_are_independent() {
    logging::init_test();
    let (_db, state) = create_state();

    let inventory = test_helpers::write_csv_file(&test_helpers::inventory_csv(30)).unwrap();
    let warehouses =
        test_helpers::write_csv_file("Warehouse Code,Warehouse Name\nW1,Main\nW2,Annex\n").unwrap();
    let bad = tempfile::Builder::new().suffix(".txt").tempfile().unwrap();

    let requests = vec![
        ImportRequest::new("inventory", &test_helpers::path_of(&inventory)),
        ImportRequest::new("warehouses", &test_helpers::path_of(&warehouses)),
        ImportRequest::new("inventory", &test_helpers::path_of(&bad)),
    ];
    let results = state.import_api.import_files(&requests).await;

    assert_eq!(results.len(), 3);
    assert_eq!(results[0].as_ref().unwrap().result.inserted, 30);
    assert_eq!(results[1].as_ref().unwrap().result.inserted, 2);
    assert!(matches!(results[2], Err(ApiError::ImportError(_))));

    // 每个文件独立会话
    let first = results[0].as_ref().unwrap();
    let second = results[1].as_ref().unwrap();
    assert_ne!(first.import_id, second.import_id);

    let logs = state.import_api.list_import_logs(Some(10)).unwrap();
    assert_eq!(logs.len(), 3);
    assert_eq!(
        logs.iter().filter(|l| l.status == ImportStatus::Failed).count(),
        1
    );
}

#[tokio::test]
async fn test_cancelled_import_is_logged() {
    logging::init_test();
    let (_db, state) = create_state();

    let file = test_helpers::write_csv_file(&test_helpers::inventory_csv(3)).unwrap();
    let mut session = ImportSession::new();
    session.cancel();

    let err = state
        .import_api
        .import_file_in_session(&mut session, "inventory", &test_helpers::path_of(&file))
        .await
        .unwrap_err();

    assert!(matches!(err, ApiError::ImportCancelled { .. }));
    assert_eq!(err.partial_result().map(|p| p.written()), Some(0));

    let logs = state.import_api.list_import_logs(None).unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].import_id, session.import_id());
    assert_eq!(logs[0].status, ImportStatus::Cancelled);
}

#[tokio::test]
async fn test_unknown_table_is_not_found() {
    logging::init_test();
    let (_db, state) = create_state();

    let file = test_helpers::write_csv_file("Name\nx\n").unwrap();
    let err = state
        .import_api
        .import_file("suppliers", &test_helpers::path_of(&file))
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::NotFound(_)));

    assert!(matches!(
        state.import_api.export_table_to_string("suppliers"),
        Err(ApiError::NotFound(_))
    ));
    assert!(matches!(
        state.import_api.get_import_errors("missing-id"),
        Err(ApiError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_batch_size_config_is_applied() {
    logging::init_test();
    let (_db, db_path) = test_helpers::create_test_db().unwrap();

    let config = ConfigManager::new(&db_path).unwrap();
    config
        .set_global_config_value(config_keys::BATCH_SIZE, "4")
        .unwrap();
    drop(config);

    let state = AppState::new(db_path).unwrap();
    let mut events = state.import_api.subscribe();

    let file = test_helpers::write_csv_file(&test_helpers::inventory_csv(10)).unwrap();
    let response = state
        .import_api
        .import_file("inventory", &test_helpers::path_of(&file))
        .await
        .unwrap();

    assert_eq!(response.result.batches_submitted, 3);
    let mut received = 0;
    while events.try_recv().is_ok() {
        received += 1;
    }
    assert_eq!(received, 3);
}
