// ==========================================
// 仓库管理看板 - 表格导入对账器
// ==========================================
// 职责: 整合导入流程，从文件到目标表
// 流程: 解析 → 映射/转换 → 查找表解析 → 唯一键 → 暂存合并
//       → 表结构契约校验（可选） → 分批 upsert（含漂移重试）
// 会话: ImportSession 持有暂存区、查找缓存、已剔除列、取消令牌；
//       并发导入各自使用独立会话
// ==========================================

use crate::config::ImportSettings;
use crate::domain::record::{ImportResult, RawRow, TableSpec, TargetRecord};
use crate::events::{ChangeNotifier, NoopNotifier};
use crate::importer::error::{ImportError, ImporterResult};
use crate::importer::file_parser::UniversalFileParser;
use crate::importer::import_trait::{LookupResolver, RecordWriter, SheetParser};
use crate::importer::lookup_cache::SessionLookups;
use crate::importer::row_coercer::RowCoercer;
use crate::importer::schema_contract::enforce_columns;
use crate::importer::staging::StagingMap;
use crate::importer::upsert_batcher::{BatchTarget, UpsertBatcher};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

// ==========================================
// ImportSession - 导入会话
// ==========================================
pub struct ImportSession {
    import_id: String,
    staging: StagingMap,
    lookups: SessionLookups,
    dropped_columns: Vec<String>,
    cancel: CancellationToken,
}

impl Default for ImportSession {
    fn default() -> Self {
        Self::new()
    }
}

impl ImportSession {
    pub fn new() -> Self {
        Self::with_cancel(CancellationToken::new())
    }

    /// 使用外部取消令牌创建会话
    pub fn with_cancel(cancel: CancellationToken) -> Self {
        Self {
            import_id: Uuid::new_v4().to_string(),
            staging: StagingMap::new(),
            lookups: SessionLookups::new(),
            dropped_columns: Vec::new(),
            cancel,
        }
    }

    pub fn import_id(&self) -> &str {
        &self.import_id
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn staging(&self) -> &StagingMap {
        &self.staging
    }

    pub fn lookups(&self) -> &SessionLookups {
        &self.lookups
    }

    /// 会话内因表结构漂移剔除的列
    pub fn dropped_columns(&self) -> &[String] {
        &self.dropped_columns
    }
}

// ==========================================
// TabularReconciler - 导入对账器
// ==========================================
pub struct TabularReconciler<W, L>
where
    W: RecordWriter,
    L: LookupResolver,
{
    // 写入目标
    writer: Arc<W>,

    // 辅助表查找
    resolver: Arc<L>,

    // 变更通知
    notifier: Arc<dyn ChangeNotifier>,

    settings: ImportSettings,
    coercer: RowCoercer,
}

impl<W, L> TabularReconciler<W, L>
where
    W: RecordWriter,
    L: LookupResolver,
{
    /// 创建新的对账器实例
    ///
    /// # 参数
    /// - writer: 批量写入实现
    /// - resolver: 辅助表查找实现
    /// - settings: 本次导入使用的配置快照
    pub fn new(writer: Arc<W>, resolver: Arc<L>, settings: ImportSettings) -> Self {
        let coercer = RowCoercer::new(&settings.placeholder_prefix);
        Self {
            writer,
            resolver,
            notifier: Arc::new(NoopNotifier),
            settings,
            coercer,
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn ChangeNotifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn settings(&self) -> &ImportSettings {
        &self.settings
    }

    /// 从文件导入（按扩展名选择解析器）
    pub async fn import_file<P: AsRef<Path>>(
        &self,
        session: &mut ImportSession,
        spec: &TableSpec,
        file_path: P,
    ) -> ImporterResult<ImportResult> {
        let rows = UniversalFileParser.parse(file_path.as_ref())?;
        self.import_rows(session, spec, rows).await
    }

    /// 从字节导入（调用方提供解析器）
    pub async fn import_bytes(
        &self,
        session: &mut ImportSession,
        spec: &TableSpec,
        parser: &dyn SheetParser,
        bytes: &[u8],
    ) -> ImporterResult<ImportResult> {
        // 解析错误在任何批次开始之前返回
        let rows = parser.parse_sheet(bytes)?;
        self.import_rows(session, spec, rows).await
    }

    /// 导入已解析的行
    ///
    /// # 返回
    /// - Ok(ImportResult): 所有批次成功（行级错误记录在结果中）
    /// - Err(BatchWrite | Cancelled): 中止，错误中携带部分结果
    #[instrument(skip_all, fields(import_id = %session.import_id, table = %spec.table))]
    pub async fn import_rows(
        &self,
        session: &mut ImportSession,
        spec: &TableSpec,
        rows: Vec<RawRow>,
    ) -> ImporterResult<ImportResult> {
        let start_time = Instant::now();
        let mut result = ImportResult::new(&session.import_id, &spec.table, rows.len());
        info!(total_rows = rows.len(), "开始导入");

        // === 步骤 1: 映射/转换 + 查找表解析 ===
        // 查找表解析会写辅助表，取消后不再触发
        let mut records: Vec<TargetRecord> = Vec::with_capacity(rows.len());
        for row in &rows {
            if session.cancel.is_cancelled() {
                result.elapsed_ms = start_time.elapsed().as_millis() as u64;
                info!(row_number = row.row_number, "导入已取消（批次提交前）");
                return Err(ImportError::Cancelled {
                    next_batch: 0,
                    partial: Box::new(result),
                });
            }

            let mut record = match self.coercer.coerce(row, &spec.fields) {
                Ok(record) => record,
                Err(row_error) => {
                    warn!(row_number = row.row_number, error = %row_error.message, "行转换失败，已剔除");
                    result.row_errors.push(row_error);
                    continue;
                }
            };

            if let Err(row_error) = session
                .lookups
                .apply(self.resolver.as_ref(), &spec.fields, &mut record)
                .await
            {
                warn!(row_number = row.row_number, error = %row_error.message, "查找表解析失败，已剔除");
                result.row_errors.push(row_error);
                continue;
            }

            record.assign_key(&spec.key_fields);
            records.push(record);
        }
        debug!(
            coerced = records.len(),
            rejected = result.row_errors.len(),
            "行转换完成"
        );

        // === 步骤 2: 暂存合并 ===
        if self.settings.merge_duplicates {
            let staged = session.staging.stage_all(records);
            result.merged_duplicates = staged.merged_duplicates;
            records = staged.records;
            debug!(merged = result.merged_duplicates, staged = session.staging.len(), "暂存合并完成");
        }

        // === 步骤 3: 表结构契约校验 ===
        if self.settings.schema_check {
            match self.writer.describe_columns(&spec.table).await {
                Ok(Some(known)) => {
                    let report = enforce_columns(&spec.table, &mut records, &known);
                    if !report.unknown_fields.is_empty() {
                        warn!(unknown = ?report.unknown_fields, "存在表中没有的字段，已剔除");
                    }
                    for field in report.unknown_fields {
                        if !result.dropped_columns.contains(&field) {
                            result.dropped_columns.push(field);
                        }
                    }
                    result.row_errors.extend(report.row_errors);
                }
                Ok(None) => debug!("写入端未提供表结构，跳过契约校验"),
                Err(e) => warn!(error = %e, "读取表结构失败，跳过契约校验"),
            }
        }

        // === 步骤 4: 分批写入 ===
        let batcher = UpsertBatcher::new(
            self.writer.as_ref(),
            self.notifier.as_ref(),
            self.settings.batch_size,
            self.settings.drift_retry,
        );
        let target = BatchTarget {
            import_id: &session.import_id,
            table: &spec.table,
            conflict_key: &spec.key_fields,
        };

        let outcome = batcher
            .submit_all(
                &target,
                records,
                &session.cancel,
                &mut session.dropped_columns,
                &mut result,
            )
            .await;

        let elapsed_ms = start_time.elapsed().as_millis() as u64;
        match outcome {
            Ok(()) => {
                result.elapsed_ms = elapsed_ms;
                info!(
                    inserted = result.inserted,
                    updated = result.updated,
                    merged = result.merged_duplicates,
                    row_errors = result.row_errors.len(),
                    recovered_batches = result.batches_recovered,
                    elapsed_ms,
                    "导入完成"
                );
                Ok(result)
            }
            Err(mut err) => {
                if let ImportError::BatchWrite { partial, .. } | ImportError::Cancelled { partial, .. } =
                    &mut err
                {
                    partial.elapsed_ms = elapsed_ms;
                }
                warn!(error = %err, "导入中止");
                Err(err)
            }
        }
    }
}
