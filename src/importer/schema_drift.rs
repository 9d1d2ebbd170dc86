// ==========================================
// 仓库管理看板 - 表结构漂移重试
// ==========================================
// 职责: 识别"未知列"类写入失败，剔除该列后重试一次
// 注意: 依赖后端错误文本，属于兜底手段；
//       可配合 schema_contract 在写入前校验列名
// 批次状态机:
//   Pending → Submitted → {Success | SchemaError}
//   SchemaError → Retried → {Success | Failed}
// ==========================================

use crate::domain::record::TargetRecord;
use crate::importer::import_trait::{RecordWriter, WriteReceipt, WriteRejection};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

// ==========================================
// 列名提取
// ==========================================

/// 截取 `prefix` 之后、`terminator` 之前的片段
fn slice_between<'a>(message: &'a str, prefix: &str, terminator: char) -> Option<&'a str> {
    let start = message.find(prefix)? + prefix.len();
    let rest = &message[start..];
    let end = rest.find(terminator)?;
    let token = &rest[..end];
    (!token.is_empty()).then_some(token)
}

/// 截取 `prefix` 之后的标识符（到空白/标点为止）
fn identifier_after<'a>(message: &'a str, prefix: &str) -> Option<&'a str> {
    let start = message.find(prefix)? + prefix.len();
    let rest = message[start..].trim_start();
    let end = rest
        .find(|c: char| !(c.is_alphanumeric() || c == '_' || c == '.'))
        .unwrap_or(rest.len());
    let token = rest[..end].trim_end_matches('.');
    (!token.is_empty()).then_some(token)
}

/// 去掉 "table.column" 形式中的表名
fn strip_qualifier(token: &str) -> &str {
    token.rsplit('.').next().unwrap_or(token)
}

/// 从写入错误消息中提取未知列名
///
/// 识别的形式:
/// - `column "x" of relation "t" does not exist`
/// - `column "x" does not exist`
/// - `Could not find the 'x' column of 't' in the schema cache`
/// - `table t has no column named x`
/// - `no such column: x`
pub fn extract_unknown_column(message: &str) -> Option<String> {
    if message.contains("does not exist") {
        if let Some(token) = slice_between(message, "column \"", '"') {
            return Some(strip_qualifier(token).to_string());
        }
    }
    if message.contains("column of") {
        if let Some(token) = slice_between(message, "Could not find the '", '\'') {
            return Some(token.to_string());
        }
    }
    if let Some(token) = identifier_after(message, "has no column named") {
        return Some(strip_qualifier(token).to_string());
    }
    if let Some(token) = identifier_after(message, "no such column:") {
        return Some(strip_qualifier(token).to_string());
    }
    None
}

// ==========================================
// 命名风格变体
// ==========================================

/// camelCase → snake_case
pub fn to_snake_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for (idx, ch) in name.chars().enumerate() {
        if ch.is_uppercase() {
            if idx > 0 && !out.ends_with('_') {
                out.push('_');
            }
            out.extend(ch.to_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}

/// snake_case → camelCase
pub fn to_camel_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper_next = false;
    for ch in name.chars() {
        if ch == '_' {
            upper_next = !out.is_empty();
        } else if upper_next {
            out.extend(ch.to_uppercase());
            upper_next = false;
        } else {
            out.push(ch);
        }
    }
    out
}

/// 列名及其 snake/camel 变体（去重，原名在前）
pub fn column_variants(name: &str) -> Vec<String> {
    let mut variants = vec![name.to_string()];
    for candidate in [to_snake_case(name), to_camel_case(name)] {
        if !variants.contains(&candidate) {
            variants.push(candidate);
        }
    }
    variants
}

/// 从所有记录中剔除列（含变体），返回实际剔除的字段名
pub fn strip_column(records: &mut [TargetRecord], name: &str) -> Vec<String> {
    let mut removed = Vec::new();
    for variant in column_variants(name) {
        let mut hit = false;
        for record in records.iter_mut() {
            hit |= record.remove(&variant);
        }
        if hit {
            removed.push(variant);
        }
    }
    removed
}

// ==========================================
// 批次状态机
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BatchState {
    Pending,
    Submitted,
    SchemaError,
    Retried,
    Success,
    Failed,
}

impl BatchState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, BatchState::Success | BatchState::Failed)
    }

    /// 状态迁移是否合法
    pub fn can_transition_to(&self, next: BatchState) -> bool {
        use BatchState::*;
        matches!(
            (self, next),
            (Pending, Submitted)
                | (Submitted, Success)
                | (Submitted, SchemaError)
                | (Submitted, Failed)
                | (SchemaError, Retried)
                | (SchemaError, Failed)
                | (Retried, Success)
                | (Retried, Failed)
        )
    }
}

/// 一个批次的提交结果
#[derive(Debug, Clone)]
pub struct BatchAttempt {
    pub state: BatchState,
    pub receipt: Option<WriteReceipt>,
    /// 重试时剔除的字段
    pub dropped_columns: Vec<String>,
    /// 失败时为原始错误（重试失败也返回首次错误）
    pub error: Option<WriteRejection>,
}

impl BatchAttempt {
    pub fn recovered(&self) -> bool {
        self.state == BatchState::Success && !self.dropped_columns.is_empty()
    }
}

// ==========================================
// DriftRetry - 带一次漂移重试的批次提交
// ==========================================
pub struct DriftRetry {
    enabled: bool,
}

impl DriftRetry {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    fn advance(state: &mut BatchState, next: BatchState, batch_index: usize) {
        debug_assert!(
            state.can_transition_to(next),
            "非法批次状态迁移: {:?} → {:?}",
            state,
            next
        );
        debug!(batch_index, from = ?state, to = ?next, "批次状态迁移");
        *state = next;
    }

    /// 提交一个批次，遇到未知列时最多重试一次
    pub async fn submit<W: RecordWriter + ?Sized>(
        &self,
        writer: &W,
        table: &str,
        batch_index: usize,
        records: &[TargetRecord],
        conflict_key: &[String],
    ) -> BatchAttempt {
        let mut state = BatchState::Pending;
        Self::advance(&mut state, BatchState::Submitted, batch_index);

        let original = match writer.write(table, records, conflict_key).await {
            Ok(receipt) => {
                Self::advance(&mut state, BatchState::Success, batch_index);
                return BatchAttempt {
                    state,
                    receipt: Some(receipt),
                    dropped_columns: Vec::new(),
                    error: None,
                };
            }
            Err(rejection) => rejection,
        };

        let failed = |mut state: BatchState, error: WriteRejection| {
            Self::advance(&mut state, BatchState::Failed, batch_index);
            BatchAttempt {
                state,
                receipt: None,
                dropped_columns: Vec::new(),
                error: Some(error),
            }
        };

        if !self.enabled {
            return failed(state, original);
        }

        let column = match extract_unknown_column(&original.message) {
            Some(column) => column,
            None => return failed(state, original),
        };

        Self::advance(&mut state, BatchState::SchemaError, batch_index);
        warn!(batch_index, column = %column, error = %original, "写入因未知列失败，剔除后重试");

        let mut retry_rows = records.to_vec();
        let dropped = strip_column(&mut retry_rows, &column);
        if dropped.is_empty() {
            // 报错列不在本批次里，重试也不会有不同结果
            return failed(state, original);
        }

        Self::advance(&mut state, BatchState::Retried, batch_index);
        match writer.write(table, &retry_rows, conflict_key).await {
            Ok(receipt) => {
                Self::advance(&mut state, BatchState::Success, batch_index);
                info!(batch_index, dropped = ?dropped, "漂移重试成功");
                BatchAttempt {
                    state,
                    receipt: Some(receipt),
                    dropped_columns: dropped,
                    error: None,
                }
            }
            Err(retry_error) => {
                warn!(batch_index, error = %retry_error, "漂移重试仍失败");
                failed(state, original)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::FieldValue;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[test]
    fn test_extract_postgres_relation_message() {
        let msg = r#"column "rack_id" of relation "spare_parts" does not exist"#;
        assert_eq!(extract_unknown_column(msg), Some("rack_id".to_string()));
    }

    #[test]
    fn test_extract_other_shapes() {
        assert_eq!(
            extract_unknown_column(r#"column "t.binCode" does not exist"#),
            Some("binCode".to_string())
        );
        assert_eq!(
            extract_unknown_column("Could not find the 'rack_id' column of 'spare_parts' in the schema cache"),
            Some("rack_id".to_string())
        );
        assert_eq!(
            extract_unknown_column("table spare_parts has no column named rack_id"),
            Some("rack_id".to_string())
        );
        assert_eq!(
            extract_unknown_column("no such column: inventory.min_stock"),
            Some("min_stock".to_string())
        );
    }

    #[test]
    fn test_extract_none_for_other_errors() {
        assert_eq!(
            extract_unknown_column("UNIQUE constraint failed: inventory.sku"),
            None
        );
        assert_eq!(extract_unknown_column("connection reset by peer"), None);
        assert_eq!(extract_unknown_column(r#"relation "x" does not exist"#), None);
    }

    #[test]
    fn test_case_variants() {
        assert_eq!(to_snake_case("rackId"), "rack_id");
        assert_eq!(to_snake_case("rack_id"), "rack_id");
        assert_eq!(to_camel_case("rack_id"), "rackId");
        assert_eq!(to_camel_case("rackId"), "rackId");
        assert_eq!(column_variants("rack_id"), vec!["rack_id", "rackId"]);
        assert_eq!(column_variants("qty"), vec!["qty"]);
    }

    #[test]
    fn test_strip_column_variants() {
        let mut rows = vec![
            TargetRecord::new(2).with_field("rack_id", "R1").with_field("qty", 1i64),
            TargetRecord::new(3).with_field("rackId", "R2").with_field("qty", 2i64),
        ];
        let removed = strip_column(&mut rows, "rack_id");
        assert_eq!(removed, vec!["rack_id", "rackId"]);
        assert!(rows.iter().all(|r| r.get("rack_id").is_none() && r.get("rackId").is_none()));
        assert_eq!(rows[1].get("qty"), Some(&FieldValue::Integer(2)));
    }

    #[test]
    fn test_state_transitions() {
        assert!(BatchState::Pending.can_transition_to(BatchState::Submitted));
        assert!(BatchState::SchemaError.can_transition_to(BatchState::Retried));
        assert!(!BatchState::Retried.can_transition_to(BatchState::SchemaError));
        assert!(!BatchState::Success.can_transition_to(BatchState::Submitted));
        assert!(BatchState::Failed.is_terminal());
        assert!(!BatchState::Retried.is_terminal());
    }

    /// 按顺序返回脚本化结果的写入器
    struct ScriptedWriter {
        script: Mutex<Vec<Result<WriteReceipt, WriteRejection>>>,
        calls: Mutex<Vec<Vec<TargetRecord>>>,
    }

    impl ScriptedWriter {
        fn new(mut script: Vec<Result<WriteReceipt, WriteRejection>>) -> Self {
            script.reverse();
            Self {
                script: Mutex::new(script),
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl RecordWriter for ScriptedWriter {
        async fn write(
            &self,
            _table: &str,
            rows: &[TargetRecord],
            _conflict_key: &[String],
        ) -> Result<WriteReceipt, WriteRejection> {
            self.calls.lock().unwrap().push(rows.to_vec());
            self.script.lock().unwrap().pop().unwrap_or(Ok(WriteReceipt::default()))
        }
    }

    fn rows() -> Vec<TargetRecord> {
        vec![
            TargetRecord::new(2).with_field("part_number", "P1").with_field("rack_id", "R1"),
            TargetRecord::new(3).with_field("part_number", "P2").with_field("rack_id", "R2"),
        ]
    }

    #[tokio::test]
    async fn test_retry_once_and_succeed() {
        let writer = ScriptedWriter::new(vec![
            Err(WriteRejection::new(
                r#"column "rack_id" of relation "spare_parts" does not exist"#,
            )),
            Ok(WriteReceipt { inserted: 2, updated: 0 }),
        ]);
        let attempt = DriftRetry::new(true)
            .submit(&writer, "spare_parts", 0, &rows(), &["part_number".to_string()])
            .await;

        assert_eq!(attempt.state, BatchState::Success);
        assert!(attempt.recovered());
        assert_eq!(attempt.dropped_columns, vec!["rack_id"]);
        let calls = writer.calls.lock().unwrap();
        assert_eq!(calls.len(), 2);
        assert!(calls[1].iter().all(|r| r.get("rack_id").is_none()));
    }

    #[tokio::test]
    async fn test_retry_failure_surfaces_original_error() {
        let original = r#"column "rack_id" of relation "spare_parts" does not exist"#;
        let writer = ScriptedWriter::new(vec![
            Err(WriteRejection::new(original)),
            Err(WriteRejection::new(r#"column "bin" of relation "spare_parts" does not exist"#)),
            Ok(WriteReceipt::default()),
        ]);
        let attempt = DriftRetry::new(true)
            .submit(&writer, "spare_parts", 0, &rows(), &["part_number".to_string()])
            .await;

        assert_eq!(attempt.state, BatchState::Failed);
        assert_eq!(attempt.error.unwrap().message, original);
        // 只重试一次
        assert_eq!(writer.calls.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_no_retry_for_non_drift_errors() {
        let writer = ScriptedWriter::new(vec![Err(WriteRejection::new("disk I/O error"))]);
        let attempt = DriftRetry::new(true)
            .submit(&writer, "spare_parts", 0, &rows(), &["part_number".to_string()])
            .await;

        assert_eq!(attempt.state, BatchState::Failed);
        assert_eq!(writer.calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_no_retry_when_column_absent_from_batch() {
        let writer = ScriptedWriter::new(vec![Err(WriteRejection::new(
            "table spare_parts has no column named shelf",
        ))]);
        let attempt = DriftRetry::new(true)
            .submit(&writer, "spare_parts", 0, &rows(), &["part_number".to_string()])
            .await;

        assert_eq!(attempt.state, BatchState::Failed);
        assert_eq!(writer.calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_retry_disabled() {
        let writer = ScriptedWriter::new(vec![Err(WriteRejection::new(
            "table spare_parts has no column named rack_id",
        ))]);
        let attempt = DriftRetry::new(false)
            .submit(&writer, "spare_parts", 0, &rows(), &["part_number".to_string()])
            .await;

        assert_eq!(attempt.state, BatchState::Failed);
        assert_eq!(writer.calls.lock().unwrap().len(), 1);
    }
}
