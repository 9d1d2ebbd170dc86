// ==========================================
// 仓库管理看板 - SQLite 记录存储
// ==========================================
// 职责: 实现 RecordWriter / LookupResolver（使用 rusqlite）
// 写入语义:
//   - INSERT ... ON CONFLICT(唯一键) DO UPDATE SET c = COALESCE(excluded.c, t.c)
//     即新值为 NULL 时保留库中旧值
//   - 写入前按唯一键探测是否已存在，区分 inserted / updated
//   - 一个批次一个事务，任何一行失败整批回滚
//   - SQLite 错误原文作为拒绝消息透传（供漂移重试识别）
// 红线: Repository 不含业务规则，只做数据 CRUD
// ==========================================

use crate::domain::record::TargetRecord;
use crate::domain::types::FieldValue;
use crate::importer::import_trait::{LookupResolver, RecordWriter, WriteReceipt, WriteRejection};
use crate::repository::error::{RepositoryError, RepositoryResult};
use async_trait::async_trait;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Transaction};
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};

/// SQL 标识符加引号（双引号转义）
fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// 批次中出现过的全部字段（有序）
fn batch_columns(rows: &[TargetRecord], conflict_key: &[String]) -> Vec<String> {
    let mut columns: BTreeSet<String> = conflict_key.iter().cloned().collect();
    for row in rows {
        columns.extend(row.fields.keys().cloned());
    }
    columns.into_iter().collect()
}

fn table_columns_tx(conn: &Connection, table: &str) -> rusqlite::Result<Vec<String>> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", quote_ident(table)))?;
    let rows = stmt.query_map([], |row| row.get::<_, String>(1))?;
    rows.collect()
}

// ==========================================
// SqliteRecordStore
// ==========================================
#[derive(Clone)]
pub struct SqliteRecordStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteRecordStore {
    /// 创建新的 Store 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = crate::db::open_sqlite_connection(db_path)
            .map_err(|e| RepositoryError::DatabaseConnectionError(e.to_string()))?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建（共享连接）
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn lock(&self) -> RepositoryResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 在事务中写入一个批次
    fn write_batch_tx(
        tx: &Transaction,
        table: &str,
        rows: &[TargetRecord],
        conflict_key: &[String],
    ) -> rusqlite::Result<WriteReceipt> {
        let columns = batch_columns(rows, conflict_key);
        let has_updated_at = table_columns_tx(tx, table)?.iter().any(|c| c == "updated_at");

        let table_ident = quote_ident(table);
        let column_list: Vec<String> = columns.iter().map(|c| quote_ident(c)).collect();
        let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{}", i)).collect();

        let mut assignments: Vec<String> = columns
            .iter()
            .filter(|c| !conflict_key.contains(c))
            .map(|c| {
                let col = quote_ident(c);
                format!("{col} = COALESCE(excluded.{col}, {table_ident}.{col})")
            })
            .collect();
        if has_updated_at && !columns.iter().any(|c| c == "updated_at") {
            assignments.push("\"updated_at\" = datetime('now')".to_string());
        }

        let conflict_clause = if conflict_key.is_empty() {
            String::new()
        } else {
            let keys: Vec<String> = conflict_key.iter().map(|k| quote_ident(k)).collect();
            if assignments.is_empty() {
                format!(" ON CONFLICT ({}) DO NOTHING", keys.join(", "))
            } else {
                format!(
                    " ON CONFLICT ({}) DO UPDATE SET {}",
                    keys.join(", "),
                    assignments.join(", ")
                )
            }
        };

        let insert_sql = format!(
            "INSERT INTO {} ({}) VALUES ({}){}",
            table_ident,
            column_list.join(", "),
            placeholders.join(", "),
            conflict_clause
        );
        let mut insert = tx.prepare(&insert_sql)?;

        let probe_sql = (!conflict_key.is_empty()).then(|| {
            let conditions: Vec<String> = conflict_key
                .iter()
                .enumerate()
                .map(|(i, k)| format!("{} = ?{}", quote_ident(k), i + 1))
                .collect();
            format!(
                "SELECT 1 FROM {} WHERE {} LIMIT 1",
                table_ident,
                conditions.join(" AND ")
            )
        });
        let mut probe = match &probe_sql {
            Some(sql) => Some(tx.prepare(sql)?),
            None => None,
        };

        let mut receipt = WriteReceipt::default();
        for row in rows {
            let key_values: Vec<&FieldValue> = conflict_key
                .iter()
                .map(|k| row.get(k).unwrap_or(&FieldValue::Null))
                .collect();

            // 任一键字段为 NULL 时不会触发冲突，一定是新增
            let exists = match probe.as_mut() {
                Some(stmt) if key_values.iter().all(|v| !v.is_null()) => stmt
                    .query_row(params_from_iter(key_values.iter()), |_| Ok(()))
                    .optional()?
                    .is_some(),
                _ => false,
            };

            let values: Vec<&FieldValue> = columns
                .iter()
                .map(|c| row.get(c).unwrap_or(&FieldValue::Null))
                .collect();
            insert.execute(params_from_iter(values.iter()))?;

            if exists {
                receipt.updated += 1;
            } else {
                receipt.inserted += 1;
            }
        }

        Ok(receipt)
    }

    /// 查询表的实际列
    pub fn table_columns(&self, table: &str) -> RepositoryResult<Vec<String>> {
        let conn = self.lock()?;
        Ok(table_columns_tx(&conn, table)?)
    }

    /// 按给定列读取表中全部记录（按 id 排序）
    pub fn fetch_rows(&self, table: &str, columns: &[String]) -> RepositoryResult<Vec<TargetRecord>> {
        if columns.is_empty() {
            return Ok(Vec::new());
        }

        let conn = self.lock()?;
        let column_list: Vec<String> = columns.iter().map(|c| quote_ident(c)).collect();
        let sql = format!(
            "SELECT {} FROM {} ORDER BY rowid",
            column_list.join(", "),
            quote_ident(table)
        );

        let mut stmt = conn.prepare(&sql)?;
        let mut rows = stmt.query([])?;
        let mut records = Vec::new();
        while let Some(row) = rows.next()? {
            let mut record = TargetRecord::new(records.len() + 1);
            for (idx, column) in columns.iter().enumerate() {
                let value: Value = row.get(idx)?;
                record.set(column, FieldValue::from(value));
            }
            records.push(record);
        }
        Ok(records)
    }

    /// 表中记录数
    pub fn count_rows(&self, table: &str) -> RepositoryResult<usize> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM {}", quote_ident(table)),
            [],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    /// 辅助表 id → name 映射（导出时把查找字段还原为名称）
    pub fn lookup_names(&self, table: &str) -> RepositoryResult<HashMap<String, String>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!("SELECT id, name FROM {}", quote_ident(table)))?;
        let rows = stmt.query_map([], |row| {
            let id: Value = row.get(0)?;
            let name: String = row.get(1)?;
            Ok((FieldValue::from(id).to_string(), name))
        })?;

        let mut names = HashMap::new();
        for row in rows {
            let (id, name) = row?;
            names.insert(id, name);
        }
        Ok(names)
    }

    fn resolve_or_create_sync(&self, table: &str, name: &str) -> RepositoryResult<String> {
        let name = name.trim();
        if name.is_empty() {
            return Err(RepositoryError::FieldValueError {
                field: "name".to_string(),
                message: "名称为空".to_string(),
            });
        }

        let conn = self.lock()?;
        let table_ident = quote_ident(table);

        let existing: Option<Value> = conn
            .query_row(
                &format!("SELECT id FROM {} WHERE name = ?1 COLLATE NOCASE LIMIT 1", table_ident),
                params![name],
                |row| row.get(0),
            )
            .optional()?;
        if let Some(id) = existing {
            return Ok(FieldValue::from(id).to_string());
        }

        conn.execute(
            &format!("INSERT INTO {} (name) VALUES (?1)", table_ident),
            params![name],
        )?;
        Ok(conn.last_insert_rowid().to_string())
    }
}

#[async_trait]
impl RecordWriter for SqliteRecordStore {
    async fn write(
        &self,
        table: &str,
        rows: &[TargetRecord],
        conflict_key: &[String],
    ) -> Result<WriteReceipt, WriteRejection> {
        if rows.is_empty() {
            return Ok(WriteReceipt::default());
        }

        let mut conn = self
            .conn
            .lock()
            .map_err(|e| WriteRejection::new(format!("锁获取失败: {}", e)))?;

        let tx = conn.transaction().map_err(|e| WriteRejection::new(e.to_string()))?;
        // 出错时 tx 被 drop，自动回滚
        let receipt = Self::write_batch_tx(&tx, table, rows, conflict_key)
            .map_err(|e| WriteRejection::new(e.to_string()))?;
        tx.commit().map_err(|e| WriteRejection::new(e.to_string()))?;

        Ok(receipt)
    }

    async fn describe_columns(&self, table: &str) -> Result<Option<Vec<String>>, WriteRejection> {
        let columns = self
            .table_columns(table)
            .map_err(|e| WriteRejection::new(e.to_string()))?;
        // 表不存在时 PRAGMA 返回空集，此时不做校验
        Ok((!columns.is_empty()).then_some(columns))
    }
}

#[async_trait]
impl LookupResolver for SqliteRecordStore {
    async fn resolve_or_create(&self, table: &str, name: &str) -> Result<String, WriteRejection> {
        self.resolve_or_create_sync(table, name)
            .map_err(|e| WriteRejection::new(e.to_string()))
    }
}
