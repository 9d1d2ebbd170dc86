// ==========================================
// 仓库管理看板 - 领域模型层
// ==========================================
// 职责: 定义导入对账所用的数据类型
// 红线: 不含数据访问逻辑
// ==========================================

pub mod record;
pub mod types;

// 重导出核心类型
pub use record::{
    FieldSpec, ImportLogEntry, ImportResult, ImportStatus, RawRow, RowError, RowErrorKind,
    TableSpec, TargetRecord, KEY_SEPARATOR,
};
pub use types::{CellValue, CoercionRule, FieldValue, KeyPolicy};
