// ==========================================
// 仓库管理看板 - 导入导出 API
// ==========================================
// 职责: 封装表格导入、批量并发导入、CSV 导出、导入历史查询
// 说明: 每次导入使用独立的 ImportSession（暂存区、查找缓存互不共享）
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::config::{table_spec, ConfigManager, ImportSettings};
use crate::domain::record::{
    ImportLogEntry, ImportResult, ImportStatus, RowError, TableSpec, TargetRecord,
};
use crate::domain::types::{CoercionRule, FieldValue};
use crate::events::{BroadcastNotifier, ChangeEvent};
use crate::importer::exporter;
use crate::importer::{ImportSession, TabularReconciler};
use crate::repository::{ImportLogRepository, SqliteRecordStore};
use chrono::Utc;
use futures::future::join_all;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;
use tracing::{info, instrument, warn};

/// 历史查询默认条数
pub const DEFAULT_HISTORY_LIMIT: usize = 50;

/// 导入API响应
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportApiResponse {
    pub import_id: String,
    pub table: String,
    pub file_name: Option<String>,
    pub status: ImportStatus,
    pub result: ImportResult,
}

/// 批量导入的单个请求
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportRequest {
    pub table: String,
    pub file_path: String,
}

impl ImportRequest {
    pub fn new(table: &str, file_path: &str) -> Self {
        Self {
            table: table.to_string(),
            file_path: file_path.to_string(),
        }
    }
}

fn file_name_of(file_path: &str) -> Option<String> {
    Path::new(file_path)
        .file_name()
        .and_then(|n| n.to_str())
        .map(|s| s.to_string())
}

/// 导入API
pub struct ImportApi {
    store: Arc<SqliteRecordStore>,
    config: Arc<ConfigManager>,
    log_repo: Arc<ImportLogRepository>,
    notifier: Arc<BroadcastNotifier>,
}

impl ImportApi {
    /// 创建新的ImportApi实例（共享连接）
    pub fn new(conn: Arc<Mutex<Connection>>, notifier: Arc<BroadcastNotifier>) -> ApiResult<Self> {
        let config = ConfigManager::from_connection(conn.clone())
            .map_err(|e| ApiError::DatabaseConnectionError(e.to_string()))?;

        Ok(Self {
            store: Arc::new(SqliteRecordStore::from_connection(conn.clone())),
            config: Arc::new(config),
            log_repo: Arc::new(ImportLogRepository::new(conn)),
            notifier,
        })
    }

    /// 订阅数据变更事件
    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.notifier.subscribe()
    }

    fn resolve_spec(table: &str) -> ApiResult<TableSpec> {
        table_spec(table).ok_or_else(|| ApiError::NotFound(format!("目标表 {}", table)))
    }

    async fn reconciler(
        &self,
    ) -> ApiResult<TabularReconciler<SqliteRecordStore, SqliteRecordStore>> {
        let settings = ImportSettings::load(self.config.as_ref()).await?;
        Ok(
            TabularReconciler::new(self.store.clone(), self.store.clone(), settings)
                .with_notifier(self.notifier.clone()),
        )
    }

    /// 导入一个文件到目标表
    ///
    /// # 参数
    /// - table: 目标表（见 config::TABLE_NAMES）
    /// - file_path: 文件路径（.csv/.xlsx/.xls/.ods）
    ///
    /// # 返回
    /// - Ok(ImportApiResponse): 导入完成（行级错误在 result.row_errors 中）
    /// - Err(ApiError): 解析失败、批次写入失败（携带部分结果）或已取消
    pub async fn import_file(&self, table: &str, file_path: &str) -> ApiResult<ImportApiResponse> {
        let mut session = ImportSession::new();
        self.import_file_in_session(&mut session, table, file_path).await
    }

    /// 在指定会话中导入（同一会话的多次导入共享暂存区，可通过会话取消）
    #[instrument(skip(self, session), fields(import_id = %session.import_id()))]
    pub async fn import_file_in_session(
        &self,
        session: &mut ImportSession,
        table: &str,
        file_path: &str,
    ) -> ApiResult<ImportApiResponse> {
        let spec = Self::resolve_spec(table)?;
        let reconciler = self.reconciler().await?;

        let outcome = reconciler.import_file(session, &spec, file_path).await;
        let file_name = file_name_of(file_path);

        match outcome {
            Ok(result) => {
                self.record_log(&result, file_name.clone(), ImportStatus::Success, None);
                Ok(ImportApiResponse {
                    import_id: result.import_id.clone(),
                    table: table.to_string(),
                    file_name,
                    status: ImportStatus::Success,
                    result,
                })
            }
            Err(err) => {
                let err: ApiError = err.into();
                let status = match err {
                    ApiError::ImportCancelled { .. } => ImportStatus::Cancelled,
                    _ => ImportStatus::Failed,
                };
                let partial = err
                    .partial_result()
                    .cloned()
                    .unwrap_or_else(|| ImportResult::new(session.import_id(), table, 0));
                self.record_log(&partial, file_name, status, Some(err.to_string()));
                Err(err)
            }
        }
    }

    /// 并发导入多个文件（每个文件独立会话，互不影响）
    ///
    /// 返回结果与请求顺序一致
    pub async fn import_files(&self, requests: &[ImportRequest]) -> Vec<ApiResult<ImportApiResponse>> {
        info!(files = requests.len(), "开始批量导入");
        join_all(
            requests
                .iter()
                .map(|req| self.import_file(&req.table, &req.file_path)),
        )
        .await
    }

    fn record_log(
        &self,
        result: &ImportResult,
        file_name: Option<String>,
        status: ImportStatus,
        error_message: Option<String>,
    ) {
        let entry = ImportLogEntry {
            import_id: result.import_id.clone(),
            table_name: result.table.clone(),
            file_name,
            total_rows: result.total_rows as i64,
            inserted: result.inserted as i64,
            updated: result.updated as i64,
            error_rows: result.row_errors.len() as i64,
            status,
            elapsed_ms: result.elapsed_ms as i64,
            error_message,
            imported_at: Utc::now(),
        };

        // 写日志失败不影响导入结果
        if let Err(e) = self.log_repo.insert(&entry, &result.row_errors) {
            warn!(import_id = %entry.import_id, error = %e, "导入日志写入失败");
        }
    }

    /// 读取目标表全部记录（查找字段还原为名称）
    pub fn fetch_table(&self, table: &str) -> ApiResult<(TableSpec, Vec<TargetRecord>)> {
        let spec = Self::resolve_spec(table)?;
        let mut records = self.store.fetch_rows(&spec.table, &spec.column_names())?;

        for field in &spec.fields {
            if let CoercionRule::Lookup { table: lookup_table } = &field.rule {
                let names = self.store.lookup_names(lookup_table)?;
                for record in records.iter_mut() {
                    let name = record
                        .get(&field.name)
                        .filter(|v| !v.is_null())
                        .and_then(|id| names.get(&id.to_string()))
                        .cloned();
                    if let Some(name) = name {
                        record.set(&field.name, FieldValue::Text(name));
                    }
                }
            }
        }

        Ok((spec, records))
    }

    /// 导出目标表为 CSV 文件，返回导出的行数
    pub fn export_table(&self, table: &str, out_path: &str) -> ApiResult<usize> {
        let (spec, records) = self.fetch_table(table)?;
        let file = std::fs::File::create(out_path)
            .map_err(|e| ApiError::InvalidInput(format!("无法创建导出文件 {}: {}", out_path, e)))?;
        let count = exporter::write_csv(&spec, &records, file)?;
        info!(table = %table, rows = count, out_path = %out_path, "导出完成");
        Ok(count)
    }

    /// 导出目标表为 CSV 字符串
    pub fn export_table_to_string(&self, table: &str) -> ApiResult<String> {
        let (spec, records) = self.fetch_table(table)?;
        Ok(exporter::to_csv_string(&spec, &records)?)
    }

    /// 导入历史（新的在前）
    pub fn list_import_logs(&self, limit: Option<usize>) -> ApiResult<Vec<ImportLogEntry>> {
        Ok(self
            .log_repo
            .list_recent(limit.unwrap_or(DEFAULT_HISTORY_LIMIT))?)
    }

    /// 某次导入的行级错误明细
    pub fn get_import_errors(&self, import_id: &str) -> ApiResult<Vec<RowError>> {
        if self.log_repo.find(import_id)?.is_none() {
            return Err(ApiError::NotFound(format!("导入记录 {}", import_id)));
        }
        Ok(self.log_repo.row_errors(import_id)?)
    }
}
