// ==========================================
// 仓库管理看板 - 核心库
// ==========================================
// 职责: 表格文件导入对账（解析 → 映射 → 转换 → 暂存合并 → 分批写入）
// 技术栈: Rust + SQLite
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 数据类型
pub mod domain;

// 导入层 - 外部数据
pub mod importer;

// 数据仓储层 - 数据访问
pub mod repository;

// 配置层 - 导入配置与目标表目录
pub mod config;

// 数据变更通知
pub mod events;

// 数据库基础设施（连接初始化/PRAGMA 统一）
pub mod db;

// 日志系统
pub mod logging;

// API 层 - 业务接口
pub mod api;

// 应用层 - 共享状态组装
pub mod app;

// ==========================================
// 重导出核心类型
// ==========================================

pub use domain::{
    CellValue, CoercionRule, FieldSpec, FieldValue, ImportResult, KeyPolicy, RowError,
    RowErrorKind, TableSpec, TargetRecord,
};

pub use importer::{ImportError, ImportSession, TabularReconciler};

pub use api::{ApiError, ImportApi};

pub use app::AppState;

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "仓库管理看板";
