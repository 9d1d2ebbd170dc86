// ==========================================
// 仓库管理看板 - 导入层
// ==========================================
// 职责: 表格文件 → 目标表的导入对账，以及 CSV 导出
// 支持: Excel (.xlsx/.xls/.ods), CSV
// ==========================================

// 模块声明
pub mod error;
pub mod exporter;
pub mod field_mapper;
pub mod file_parser;
pub mod header_normalizer;
pub mod import_trait;
pub mod lookup_cache;
pub mod reconciler;
pub mod row_coercer;
pub mod schema_contract;
pub mod schema_drift;
pub mod staging;
pub mod upsert_batcher;

// 重导出核心类型
pub use error::{ImportError, ImporterResult};
pub use field_mapper::AliasFieldMapper;
pub use file_parser::{CsvSheetParser, ExcelSheetParser, UniversalFileParser};
pub use header_normalizer::normalize_header;
pub use lookup_cache::SessionLookups;
pub use reconciler::{ImportSession, TabularReconciler};
pub use row_coercer::RowCoercer;
pub use schema_drift::{extract_unknown_column, BatchState, DriftRetry};
pub use staging::{merge_records, StagingMap};
pub use upsert_batcher::UpsertBatcher;

// 重导出 Trait 接口
pub use import_trait::{
    FieldMapper, LookupResolver, RecordWriter, SheetParser, WriteReceipt, WriteRejection,
};
