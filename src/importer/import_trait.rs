// ==========================================
// 仓库管理看板 - 导入层 Trait
// ==========================================
// 职责: 定义导入管道的注入点（不包含实现）
//   - SheetParser: 文件字节 → RawRow 序列
//   - FieldMapper: FieldSpec + 表头集合 → 源表头
//   - RecordWriter: 批量 upsert 写入
//   - LookupResolver: 辅助表 名称 → ID
// ==========================================

use crate::domain::record::{FieldSpec, RawRow, TargetRecord};
use crate::importer::error::ImporterResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// SheetParser Trait
// ==========================================
// 实现者: CsvSheetParser, ExcelSheetParser
pub trait SheetParser: Send + Sync {
    /// 解析一个工作表
    ///
    /// # 返回
    /// - Ok(Vec<RawRow>): 非空数据行（保留源行号）
    /// - Err: ImportError 中的解析类错误（任何批次开始之前即返回）
    fn parse_sheet(&self, bytes: &[u8]) -> ImporterResult<Vec<RawRow>>;
}

// ==========================================
// FieldMapper Trait
// ==========================================
// 实现者: AliasFieldMapper
pub trait FieldMapper: Send + Sync {
    /// 为目标字段解析源表头
    ///
    /// # 返回
    /// - Some(header): 命中的原始表头
    /// - None: 该行没有提供此字段（非错误）
    fn resolve<'a>(&self, spec: &FieldSpec, headers: &[&'a str]) -> Option<&'a str>;
}

// ==========================================
// 写入结果
// ==========================================

/// 一次批量写入的回执
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteReceipt {
    pub inserted: usize,
    pub updated: usize,
}

/// 后端拒绝写入（消息为后端原文，不做解释）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteRejection {
    pub message: String,
}

impl WriteRejection {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for WriteRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for WriteRejection {}

// ==========================================
// RecordWriter Trait
// ==========================================
// 实现者: SqliteRecordStore（测试中有脚本化的 Mock）
#[async_trait]
pub trait RecordWriter: Send + Sync {
    /// 按唯一键批量 upsert
    ///
    /// # 参数
    /// - table: 目标表
    /// - rows: 本批次记录
    /// - conflict_key: 唯一键字段
    ///
    /// # 约束
    /// - 一个批次要么整体成功，要么整体失败
    async fn write(
        &self,
        table: &str,
        rows: &[TargetRecord],
        conflict_key: &[String],
    ) -> Result<WriteReceipt, WriteRejection>;

    /// 描述表的实际列（用于写入前的表结构校验）
    ///
    /// 默认不提供（None），此时仅依赖写入失败后的漂移重试
    async fn describe_columns(&self, _table: &str) -> Result<Option<Vec<String>>, WriteRejection> {
        Ok(None)
    }
}

// ==========================================
// LookupResolver Trait
// ==========================================
#[async_trait]
pub trait LookupResolver: Send + Sync {
    /// 按名称查找辅助表记录 ID，不存在则创建
    async fn resolve_or_create(&self, table: &str, name: &str) -> Result<String, WriteRejection>;
}
