// ==========================================
// 仓库管理看板 - 配置层
// ==========================================
// 职责: 导入配置管理、内置目标表目录
// 存储: config_kv 表
// ==========================================

pub mod config_manager;
pub mod import_config_trait;
pub mod table_catalog;

// 重导出核心配置管理器
pub use config_manager::{config_keys, ConfigManager};
pub use import_config_trait::{ImportConfigReader, ImportSettings};
pub use table_catalog::{table_spec, TABLE_NAMES};
