// ==========================================
// 仓库管理看板 - API 层
// ==========================================
// 职责: 提供导入/导出业务接口，供 CLI 或上层应用调用
// ==========================================

pub mod error;
pub mod import_api;

// 重导出核心类型
pub use error::{ApiError, ApiResult};
pub use import_api::{ImportApi, ImportApiResponse, ImportRequest};
