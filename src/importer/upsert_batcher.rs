// ==========================================
// 仓库管理看板 - 分批 upsert 提交
// ==========================================
// 职责: 按批次大小切分记录，严格按顺序逐批提交
// 约束:
//   - 前一批达到终态（成功/恢复成功/失败）之前不启动下一批
//   - 每批开始前检查取消令牌
//   - 批次失败（含重试后失败）即中止整个导入，返回已累计的部分结果
//   - 会话内已因漂移剔除的列，在后续批次提交前直接剔除
// ==========================================

use crate::domain::record::{ImportResult, RowError, RowErrorKind, TargetRecord};
use crate::events::{ChangeEvent, ChangeNotifier};
use crate::importer::error::{ImportError, ImporterResult};
use crate::importer::import_trait::RecordWriter;
use crate::importer::schema_drift::{strip_column, DriftRetry};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument};

/// 批次大小上限
pub const MAX_BATCH_SIZE: usize = 1000;

/// 默认批次大小
pub const DEFAULT_BATCH_SIZE: usize = 250;

/// 一次提交的目标
pub struct BatchTarget<'a> {
    pub import_id: &'a str,
    pub table: &'a str,
    pub conflict_key: &'a [String],
}

pub struct UpsertBatcher<'a> {
    writer: &'a dyn RecordWriter,
    notifier: &'a dyn ChangeNotifier,
    batch_size: usize,
    drift: DriftRetry,
}

impl<'a> UpsertBatcher<'a> {
    /// # 参数
    /// - batch_size: 批次大小（限制在 1..=MAX_BATCH_SIZE）
    /// - drift_retry: 是否启用表结构漂移重试
    pub fn new(
        writer: &'a dyn RecordWriter,
        notifier: &'a dyn ChangeNotifier,
        batch_size: usize,
        drift_retry: bool,
    ) -> Self {
        Self {
            writer,
            notifier,
            batch_size: batch_size.clamp(1, MAX_BATCH_SIZE),
            drift: DriftRetry::new(drift_retry),
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// 逐批提交
    ///
    /// # 参数
    /// - records: 本次导入的全部记录（已转换、已合并）
    /// - session_dropped: 会话内已剔除的列（恢复成功的批次会追加）
    /// - result: 计数累加到这里
    ///
    /// # 返回
    /// - Ok(()): 所有批次成功
    /// - Err(BatchWrite | Cancelled): 中止，携带部分结果
    #[instrument(skip_all, fields(import_id = %target.import_id, table = %target.table))]
    pub async fn submit_all(
        &self,
        target: &BatchTarget<'_>,
        records: Vec<TargetRecord>,
        cancel: &CancellationToken,
        session_dropped: &mut Vec<String>,
        result: &mut ImportResult,
    ) -> ImporterResult<()> {
        let total_batches = records.len().div_ceil(self.batch_size);
        debug!(rows = records.len(), total_batches, batch_size = self.batch_size, "开始分批提交");

        for (batch_index, chunk) in records.chunks(self.batch_size).enumerate() {
            if cancel.is_cancelled() {
                info!(next_batch = batch_index, written = result.written(), "导入已取消");
                return Err(ImportError::Cancelled {
                    next_batch: batch_index,
                    partial: Box::new(result.clone()),
                });
            }

            let mut batch = chunk.to_vec();
            for column in session_dropped.iter() {
                strip_column(&mut batch, column);
            }

            result.batches_submitted += 1;
            let attempt = self
                .drift
                .submit(self.writer, target.table, batch_index, &batch, target.conflict_key)
                .await;

            match attempt.receipt {
                Some(receipt) => {
                    result.inserted += receipt.inserted;
                    result.updated += receipt.updated;

                    if attempt.recovered() {
                        result.batches_recovered += 1;
                        for column in &attempt.dropped_columns {
                            if !session_dropped.contains(column) {
                                session_dropped.push(column.clone());
                            }
                            if !result.dropped_columns.contains(column) {
                                result.dropped_columns.push(column.clone());
                            }
                        }
                    }

                    debug!(
                        batch_index,
                        inserted = receipt.inserted,
                        updated = receipt.updated,
                        "批次写入成功"
                    );
                    self.notifier.notify(ChangeEvent {
                        table: target.table.to_string(),
                        import_id: target.import_id.to_string(),
                        batch_index,
                        inserted: receipt.inserted,
                        updated: receipt.updated,
                    });
                }
                None => {
                    let message = attempt
                        .error
                        .map(|e| e.message)
                        .unwrap_or_else(|| "批次写入失败".to_string());
                    error!(batch_index, error = %message, "批次写入失败，中止导入");

                    for record in &batch {
                        result.row_errors.push(RowError::new(
                            record.row_number,
                            "",
                            RowErrorKind::BatchRejected,
                            message.clone(),
                        ));
                    }

                    return Err(ImportError::BatchWrite {
                        batch_index,
                        message,
                        partial: Box::new(result.clone()),
                    });
                }
            }
        }

        Ok(())
    }
}
