// ==========================================
// 仓库管理看板 - 数据仓储层
// ==========================================
// 职责: 数据访问，封装 SQL 操作
// 红线: Repository 不含业务规则
// ==========================================

pub mod error;
pub mod import_log_repo;
pub mod record_store;

pub use error::{RepositoryError, RepositoryResult};
pub use import_log_repo::ImportLogRepository;
pub use record_store::SqliteRecordStore;
