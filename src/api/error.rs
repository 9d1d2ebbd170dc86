// ==========================================
// 仓库管理看板 - API层错误类型
// ==========================================
// 职责: 定义API层错误类型，把导入层/仓储层错误转换为面向调用方的错误
// 约定: 中止类错误携带已累计的部分结果，不做静默吞掉
// ==========================================

use crate::domain::record::ImportResult;
use crate::importer::error::ImportError;
use crate::repository::error::RepositoryError;
use thiserror::Error;

/// API层错误类型
#[derive(Error, Debug)]
pub enum ApiError {
    // ==========================================
    // 输入错误
    // ==========================================
    #[error("无效输入: {0}")]
    InvalidInput(String),

    #[error("资源未找到: {0}")]
    NotFound(String),

    // ==========================================
    // 导入错误
    // ==========================================
    /// 文件无法解析（任何批次开始之前）
    #[error("文件导入失败: {0}")]
    ImportError(String),

    /// 批次写入失败，导入中止
    #[error("导入中止: {message}")]
    ImportAborted {
        message: String,
        partial: Box<ImportResult>,
    },

    #[error("导入已取消: 已写入 {} 行", .partial.written())]
    ImportCancelled { partial: Box<ImportResult> },

    #[error("配置错误: {0}")]
    ConfigError(String),

    // ==========================================
    // 数据访问错误
    // ==========================================
    #[error("数据库错误: {0}")]
    DatabaseError(String),

    #[error("数据库连接失败: {0}")]
    DatabaseConnectionError(String),

    // ==========================================
    // 通用错误
    // ==========================================
    #[error("内部错误: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ApiError {
    /// 中止/取消时已累计的部分结果
    pub fn partial_result(&self) -> Option<&ImportResult> {
        match self {
            ApiError::ImportAborted { partial, .. } | ApiError::ImportCancelled { partial } => {
                Some(partial)
            }
            _ => None,
        }
    }
}

// ==========================================
// 从 RepositoryError 转换
// ==========================================
impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound { entity, id } => {
                ApiError::NotFound(format!("{}(id={})不存在", entity, id))
            }
            RepositoryError::DatabaseConnectionError(msg) => ApiError::DatabaseConnectionError(msg),
            RepositoryError::LockError(msg) => {
                ApiError::DatabaseConnectionError(format!("数据库锁获取失败: {}", msg))
            }
            RepositoryError::DatabaseQueryError(msg)
            | RepositoryError::UniqueConstraintViolation(msg)
            | RepositoryError::ForeignKeyViolation(msg) => ApiError::DatabaseError(msg),
            RepositoryError::FieldValueError { field, message } => {
                ApiError::InvalidInput(format!("字段{}错误: {}", field, message))
            }
            RepositoryError::InternalError(msg) => ApiError::InternalError(msg),
            RepositoryError::Other(err) => ApiError::Other(err),
        }
    }
}

// ==========================================
// 从 ImportError 转换
// ==========================================
impl From<ImportError> for ApiError {
    fn from(err: ImportError) -> Self {
        match err {
            ImportError::BatchWrite {
                batch_index,
                message,
                partial,
            } => ApiError::ImportAborted {
                message: format!("批次 {} 写入失败: {}", batch_index, message),
                partial,
            },
            ImportError::Cancelled { partial, .. } => ApiError::ImportCancelled { partial },
            ImportError::ConfigReadError { key, message } => {
                ApiError::ConfigError(format!("{}: {}", key, message))
            }
            ImportError::InternalError(msg) => ApiError::InternalError(msg),
            ImportError::Other(err) => ApiError::Other(err),
            parse_error => ApiError::ImportError(parse_error.to_string()),
        }
    }
}

/// Result 类型别名
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repository_error_conversion() {
        let repo_err = RepositoryError::NotFound {
            entity: "import_log".to_string(),
            id: "imp-1".to_string(),
        };
        let api_err: ApiError = repo_err.into();
        match api_err {
            ApiError::NotFound(msg) => {
                assert!(msg.contains("import_log"));
                assert!(msg.contains("imp-1"));
            }
            _ => panic!("Expected NotFound"),
        }
    }

    #[test]
    fn test_batch_write_keeps_partial_result() {
        let mut partial = ImportResult::new("imp-1", "inventory", 10);
        partial.inserted = 4;
        let api_err: ApiError = ImportError::BatchWrite {
            batch_index: 2,
            message: "disk I/O error".to_string(),
            partial: Box::new(partial),
        }
        .into();

        assert!(api_err.to_string().contains("disk I/O error"));
        assert_eq!(api_err.partial_result().map(|p| p.inserted), Some(4));
    }

    #[test]
    fn test_parse_error_conversion() {
        let api_err: ApiError = ImportError::UnsupportedFormat("txt".to_string()).into();
        assert!(matches!(api_err, ApiError::ImportError(_)));
        assert!(api_err.partial_result().is_none());
    }
}
