// ==========================================
// 仓库管理看板 - 导入历史 Repository
// ==========================================
// 职责: import_log 表的写入与查询
// 红线: Repository 不含业务规则，只做数据 CRUD
// ==========================================

use crate::domain::record::{ImportLogEntry, ImportStatus, RowError};
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex};

pub struct ImportLogRepository {
    conn: Arc<Mutex<Connection>>,
}

const SELECT_COLUMNS: &str = "import_id, table_name, file_name, total_rows, inserted, updated, \
     error_rows, status, elapsed_ms, error_message, imported_at";

fn map_entry(row: &Row) -> rusqlite::Result<ImportLogEntry> {
    let status: String = row.get(7)?;
    let imported_at: String = row.get(10)?;
    let imported_at = DateTime::parse_from_rfc3339(&imported_at)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(10, rusqlite::types::Type::Text, Box::new(e))
        })?;

    Ok(ImportLogEntry {
        import_id: row.get(0)?,
        table_name: row.get(1)?,
        file_name: row.get(2)?,
        total_rows: row.get(3)?,
        inserted: row.get(4)?,
        updated: row.get(5)?,
        error_rows: row.get(6)?,
        status: ImportStatus::parse(&status),
        elapsed_ms: row.get(8)?,
        error_message: row.get(9)?,
        imported_at,
    })
}

impl ImportLogRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 写入一条导入记录（同 import_id 覆盖）
    ///
    /// # 参数
    /// - entry: 导入摘要
    /// - row_errors: 行级错误明细（以 JSON 存储）
    pub fn insert(&self, entry: &ImportLogEntry, row_errors: &[RowError]) -> RepositoryResult<()> {
        let row_errors_json = if row_errors.is_empty() {
            None
        } else {
            Some(
                serde_json::to_string(row_errors)
                    .map_err(|e| RepositoryError::InternalError(e.to_string()))?,
            )
        };

        let conn = self
            .conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))?;

        conn.execute(
            r#"
            INSERT OR REPLACE INTO import_log (
                import_id, table_name, file_name, total_rows, inserted, updated,
                error_rows, status, elapsed_ms, error_message, row_errors_json, imported_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            "#,
            params![
                entry.import_id,
                entry.table_name,
                entry.file_name,
                entry.total_rows,
                entry.inserted,
                entry.updated,
                entry.error_rows,
                entry.status.as_str(),
                entry.elapsed_ms,
                entry.error_message,
                row_errors_json,
                entry.imported_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// 最近的导入记录（新的在前）
    pub fn list_recent(&self, limit: usize) -> RepositoryResult<Vec<ImportLogEntry>> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))?;

        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM import_log ORDER BY imported_at DESC, rowid DESC LIMIT ?1",
            SELECT_COLUMNS
        ))?;
        let rows = stmt.query_map(params![limit as i64], map_entry)?;

        let mut entries = Vec::new();
        for row in rows {
            entries.push(row?);
        }
        Ok(entries)
    }

    pub fn find(&self, import_id: &str) -> RepositoryResult<Option<ImportLogEntry>> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))?;

        let entry = conn
            .query_row(
                &format!("SELECT {} FROM import_log WHERE import_id = ?1", SELECT_COLUMNS),
                params![import_id],
                map_entry,
            )
            .optional()?;
        Ok(entry)
    }

    /// 行级错误明细
    pub fn row_errors(&self, import_id: &str) -> RepositoryResult<Vec<RowError>> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))?;

        let raw: Option<Option<String>> = conn
            .query_row(
                "SELECT row_errors_json FROM import_log WHERE import_id = ?1",
                params![import_id],
                |row| row.get(0),
            )
            .optional()?;

        match raw.flatten() {
            Some(json) => serde_json::from_str(&json)
                .map_err(|e| RepositoryError::InternalError(e.to_string())),
            None => Ok(Vec::new()),
        }
    }
}
