// ==========================================
// 测试辅助函数
// ==========================================
// 职责: 提供测试所需的数据库初始化、测试文件生成等功能
// ==========================================

#![allow(dead_code)]

use rusqlite::Connection;
use std::error::Error;
use std::io::Write;
use std::sync::{Arc, Mutex};
use tempfile::NamedTempFile;
use warehouse_import::db;
use warehouse_import::repository::SqliteRecordStore;

/// 创建临时测试数据库并初始化 schema
///
/// # 返回
/// - NamedTempFile: 临时数据库文件（需要保持存活）
/// - String: 数据库文件路径
pub fn create_test_db() -> Result<(NamedTempFile, String), Box<dyn Error>> {
    let temp_file = NamedTempFile::new()?;
    let db_path = temp_file
        .path()
        .to_str()
        .ok_or("临时文件路径不是 UTF-8")?
        .to_string();

    let conn = db::open_sqlite_connection(&db_path)?;
    db::init_schema(&conn)?;

    Ok((temp_file, db_path))
}

/// 打开共享连接（与 AppState 相同的包装方式）
pub fn open_shared_conn(db_path: &str) -> Result<Arc<Mutex<Connection>>, Box<dyn Error>> {
    let conn = db::open_sqlite_connection(db_path)?;
    Ok(Arc::new(Mutex::new(conn)))
}

/// 基于临时库创建记录存储
pub fn create_test_store() -> Result<(NamedTempFile, SqliteRecordStore), Box<dyn Error>> {
    let (temp_file, db_path) = create_test_db()?;
    let store = SqliteRecordStore::from_connection(open_shared_conn(&db_path)?);
    Ok((temp_file, store))
}

/// 写入一个临时 CSV 文件
///
/// 文件以 .csv 结尾，以便按扩展名选择解析器
pub fn write_csv_file(content: &str) -> Result<NamedTempFile, Box<dyn Error>> {
    let mut file = tempfile::Builder::new()
        .prefix("import_")
        .suffix(".csv")
        .tempfile()?;
    file.write_all(content.as_bytes())?;
    file.flush()?;
    Ok(file)
}

/// 生成 N 行库存 CSV（SKU-1..SKU-N，全部在 W1 仓库）
pub fn inventory_csv(rows: usize) -> String {
    let mut csv = String::from("SKU,Item Name,Warehouse,Stock On Hand,Unit Price\n");
    for i in 1..=rows {
        csv.push_str(&format!("SKU-{},Item {},W1,{},{}.5\n", i, i, i * 10, i));
    }
    csv
}

/// 临时文件路径（字符串形式）
pub fn path_of(file: &NamedTempFile) -> String {
    file.path().to_string_lossy().to_string()
}
