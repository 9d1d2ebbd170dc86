// ==========================================
// 仓库管理看板 - 导入记录模型
// ==========================================
// 职责: RawRow / FieldSpec / TableSpec / TargetRecord / ImportResult
// 生命周期: RawRow、TargetRecord 仅存活于一次导入过程
// ==========================================

use crate::domain::types::{CellValue, CoercionRule, FieldValue, KeyPolicy};
use crate::importer::header_normalizer::normalize_header;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 主键字段之间的连接符
pub const KEY_SEPARATOR: &str = "::";

// ==========================================
// RawRow - 原始行
// ==========================================
// 用途: 文件解析产物（列名 → 单元格），列顺序与源文件一致
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRow {
    pub row_number: usize, // 源文件行号（表头为第 1 行）
    pub cells: Vec<(String, CellValue)>,
}

impl RawRow {
    pub fn new(row_number: usize) -> Self {
        Self {
            row_number,
            cells: Vec::new(),
        }
    }

    /// 构造辅助（测试与内存导入使用）
    pub fn from_pairs<I, K>(row_number: usize, pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, CellValue)>,
        K: Into<String>,
    {
        Self {
            row_number,
            cells: pairs.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }

    pub fn push(&mut self, header: impl Into<String>, value: CellValue) {
        self.cells.push((header.into(), value));
    }

    pub fn headers(&self) -> impl Iterator<Item = &str> {
        self.cells.iter().map(|(h, _)| h.as_str())
    }

    /// 按原始列名取值（同名列取第一个）
    pub fn get(&self, header: &str) -> Option<&CellValue> {
        self.cells
            .iter()
            .find(|(h, _)| h == header)
            .map(|(_, v)| v)
    }

    pub fn is_blank(&self) -> bool {
        self.cells.iter().all(|(_, v)| v.is_empty())
    }
}

// ==========================================
// FieldSpec - 目标字段描述
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,         // 目标字段名（列名）
    pub label: String,        // 导出时使用的表头
    pub aliases: Vec<String>, // 候选表头（已规范化，按优先级排列）
    pub rule: CoercionRule,
    pub default: FieldValue, // 数值无法解析时的默认值
    pub null_if_blank: bool,
    pub key_policy: KeyPolicy,
}

impl FieldSpec {
    /// 创建字段描述，字段名本身作为第一个候选别名
    pub fn new(name: &str, rule: CoercionRule) -> Self {
        let mut spec = Self {
            name: name.to_string(),
            label: name.to_string(),
            aliases: Vec::new(),
            rule,
            default: FieldValue::Null,
            null_if_blank: true,
            key_policy: KeyPolicy::Optional,
        };
        spec.push_alias(name);
        spec
    }

    pub fn text(name: &str) -> Self {
        Self::new(name, CoercionRule::Text)
    }

    pub fn integer(name: &str) -> Self {
        Self::new(name, CoercionRule::Integer).with_default(FieldValue::Integer(0))
    }

    pub fn decimal(name: &str) -> Self {
        Self::new(name, CoercionRule::Decimal)
    }

    pub fn lookup(name: &str, table: &str) -> Self {
        Self::new(
            name,
            CoercionRule::Lookup {
                table: table.to_string(),
            },
        )
    }

    /// 追加别名（自动规范化；第一个别名同时作为导出表头）
    pub fn alias(mut self, alias: &str) -> Self {
        if self.label == self.name {
            self.label = alias.to_string();
        }
        self.push_alias(alias);
        self
    }

    pub fn aliases(self, aliases: &[&str]) -> Self {
        aliases.iter().fold(self, |spec, a| spec.alias(a))
    }

    pub fn label(mut self, label: &str) -> Self {
        self.label = label.to_string();
        self
    }

    pub fn with_default(mut self, default: FieldValue) -> Self {
        self.default = default;
        self
    }

    pub fn keep_blank(mut self) -> Self {
        self.null_if_blank = false;
        self
    }

    pub fn synthesize(mut self) -> Self {
        self.key_policy = KeyPolicy::Synthesize;
        self
    }

    pub fn mandatory(mut self) -> Self {
        self.key_policy = KeyPolicy::Mandatory;
        self
    }

    fn push_alias(&mut self, alias: &str) {
        let normalized = normalize_header(alias);
        if !normalized.is_empty() && !self.aliases.contains(&normalized) {
            self.aliases.push(normalized);
        }
    }
}

// ==========================================
// TableSpec - 目标表描述
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSpec {
    pub table: String,
    pub fields: Vec<FieldSpec>,
    pub key_fields: Vec<String>, // 唯一键（同时作为写入的 conflict key）
}

impl TableSpec {
    pub fn new(table: &str, key_fields: &[&str], fields: Vec<FieldSpec>) -> Self {
        Self {
            table: table.to_string(),
            fields,
            key_fields: key_fields.iter().map(|k| k.to_string()).collect(),
        }
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn column_names(&self) -> Vec<String> {
        self.fields.iter().map(|f| f.name.clone()).collect()
    }
}

// ==========================================
// TargetRecord - 转换后的目标记录
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetRecord {
    pub row_number: usize,
    pub fields: BTreeMap<String, FieldValue>,
    pub key: Option<String>, // 任一主键字段为空时为 None（不参与合并）
}

impl TargetRecord {
    pub fn new(row_number: usize) -> Self {
        Self {
            row_number,
            fields: BTreeMap::new(),
            key: None,
        }
    }

    pub fn with_field(mut self, name: &str, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(name.to_string(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    pub fn set(&mut self, name: &str, value: FieldValue) {
        self.fields.insert(name.to_string(), value);
    }

    /// 移除字段，返回是否确实存在
    pub fn remove(&mut self, name: &str) -> bool {
        self.fields.remove(name).is_some()
    }

    /// 按主键字段计算唯一键（暂存记录与新记录使用同一算法）
    pub fn compute_key(&self, key_fields: &[String]) -> Option<String> {
        if key_fields.is_empty() {
            return None;
        }
        let mut parts = Vec::with_capacity(key_fields.len());
        for field in key_fields {
            match self.fields.get(field) {
                Some(value) if !value.is_null() => parts.push(value.to_string()),
                _ => return None,
            }
        }
        Some(parts.join(KEY_SEPARATOR))
    }

    pub fn assign_key(&mut self, key_fields: &[String]) {
        self.key = self.compute_key(key_fields);
    }
}

// ==========================================
// RowError - 行级错误
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RowErrorKind {
    MissingMandatory, // 必填字段缺失（行被剔除）
    LookupFailed,     // 名称 → ID 解析失败（行被剔除）
    UnknownColumn,    // 字段不在表结构中（字段被剔除，行保留）
    BatchRejected,    // 所在批次写入失败
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowError {
    pub row_number: usize,
    pub field: String,
    pub kind: RowErrorKind,
    pub message: String,
}

impl RowError {
    pub fn new(row_number: usize, field: &str, kind: RowErrorKind, message: String) -> Self {
        Self {
            row_number,
            field: field.to_string(),
            kind,
            message,
        }
    }
}

// ==========================================
// ImportResult - 导入结果
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImportResult {
    pub import_id: String,
    pub table: String,
    pub total_rows: usize,
    pub inserted: usize,
    pub updated: usize,
    pub merged_duplicates: usize, // 同键合并掉的行数
    pub batches_submitted: usize,
    pub batches_recovered: usize, // 经表结构漂移重试后成功的批次数
    pub dropped_columns: Vec<String>,
    pub row_errors: Vec<RowError>,
    pub elapsed_ms: u64,
}

impl ImportResult {
    pub fn new(import_id: &str, table: &str, total_rows: usize) -> Self {
        Self {
            import_id: import_id.to_string(),
            table: table.to_string(),
            total_rows,
            ..Default::default()
        }
    }

    pub fn written(&self) -> usize {
        self.inserted + self.updated
    }
}

// ==========================================
// ImportLogEntry - 导入历史
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ImportStatus {
    Success,
    Failed,
    Cancelled,
}

impl ImportStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImportStatus::Success => "SUCCESS",
            ImportStatus::Failed => "FAILED",
            ImportStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_uppercase().as_str() {
            "SUCCESS" => ImportStatus::Success,
            "CANCELLED" => ImportStatus::Cancelled,
            _ => ImportStatus::Failed,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportLogEntry {
    pub import_id: String,
    pub table_name: String,
    pub file_name: Option<String>,
    pub total_rows: i64,
    pub inserted: i64,
    pub updated: i64,
    pub error_rows: i64,
    pub status: ImportStatus,
    pub elapsed_ms: i64,
    pub error_message: Option<String>,
    pub imported_at: DateTime<Utc>,
}
