// ==========================================
// 仓库管理看板 - 导入模块错误类型
// ==========================================
// 分类:
//   - 解析错误: 任何批次开始之前直接返回
//   - 批次写入错误: 中止整个导入，携带已累计的部分结果
//   - 取消: 在批次间检查，携带部分结果
// 行级错误 (RowError) 不走这里，记录在 ImportResult 中
// ==========================================

use crate::domain::record::ImportResult;
use thiserror::Error;

/// 导入模块错误类型
#[derive(Error, Debug)]
pub enum ImportError {
    // ===== 文件相关错误 =====
    #[error("文件不存在: {0}")]
    FileNotFound(String),

    #[error("文件格式不支持: {0}（仅支持 .xlsx/.xls/.ods/.csv）")]
    UnsupportedFormat(String),

    #[error("文件读取失败: {0}")]
    FileReadError(String),

    #[error("Excel 解析失败: {0}")]
    ExcelParseError(String),

    #[error("CSV 解析失败: {0}")]
    CsvParseError(String),

    #[error("工作表为空: {0}")]
    EmptySheet(String),

    // ===== 写入错误 =====
    #[error("批次写入失败 (批次 {batch_index}): {message}")]
    BatchWrite {
        batch_index: usize,
        message: String,
        partial: Box<ImportResult>,
    },

    #[error("导入已取消 (下一批次 {next_batch}): 已写入 {} 行", .partial.written())]
    Cancelled {
        next_batch: usize,
        partial: Box<ImportResult>,
    },

    // ===== 配置错误 =====
    #[error("配置读取失败 (key: {key}): {message}")]
    ConfigReadError { key: String, message: String },

    // ===== 通用错误 =====
    #[error("内部错误: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ImportError {
    /// 是否属于文件解析类错误
    pub fn is_parse_error(&self) -> bool {
        matches!(
            self,
            ImportError::FileNotFound(_)
                | ImportError::UnsupportedFormat(_)
                | ImportError::FileReadError(_)
                | ImportError::ExcelParseError(_)
                | ImportError::CsvParseError(_)
                | ImportError::EmptySheet(_)
        )
    }

    /// 中止时已累计的部分结果
    pub fn partial_result(&self) -> Option<&ImportResult> {
        match self {
            ImportError::BatchWrite { partial, .. } | ImportError::Cancelled { partial, .. } => {
                Some(partial)
            }
            _ => None,
        }
    }
}

// 实现 From<std::io::Error>
impl From<std::io::Error> for ImportError {
    fn from(err: std::io::Error) -> Self {
        ImportError::FileReadError(err.to_string())
    }
}

// 实现 From<csv::Error>
impl From<csv::Error> for ImportError {
    fn from(err: csv::Error) -> Self {
        ImportError::CsvParseError(err.to_string())
    }
}

// 实现 From<calamine::Error>
impl From<calamine::Error> for ImportError {
    fn from(err: calamine::Error) -> Self {
        ImportError::ExcelParseError(err.to_string())
    }
}

/// Result 类型别名
pub type ImporterResult<T> = Result<T, ImportError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_classification() {
        assert!(ImportError::CsvParseError("x".into()).is_parse_error());
        assert!(ImportError::EmptySheet("Sheet1".into()).is_parse_error());
        assert!(!ImportError::InternalError("t".into()).is_parse_error());
    }

    #[test]
    fn test_partial_result_carried() {
        let mut partial = ImportResult::new("imp-1", "inventory", 10);
        partial.inserted = 4;
        let err = ImportError::BatchWrite {
            batch_index: 1,
            message: "constraint failed".into(),
            partial: Box::new(partial),
        };
        assert_eq!(err.partial_result().map(|p| p.inserted), Some(4));
        assert!(err.to_string().contains("constraint failed"));
    }
}
