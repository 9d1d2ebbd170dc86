// ==========================================
// 仓库管理看板 - 导入配置读取 Trait
// ==========================================
// 职责: 定义导入模块所需的配置读取接口（不包含实现），
//       以及一次导入使用的配置快照 ImportSettings
// 红线: 不包含配置写入、不包含业务逻辑
// ==========================================

use crate::importer::error::{ImportError, ImporterResult};
use crate::importer::row_coercer::DEFAULT_PLACEHOLDER_PREFIX;
use crate::importer::upsert_batcher::{DEFAULT_BATCH_SIZE, MAX_BATCH_SIZE};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::error::Error;

// ==========================================
// ImportConfigReader Trait
// ==========================================
// 用途: 导入模块所需的配置读取接口
// 实现者: ConfigManager（从 config_kv 表读取）
#[async_trait]
pub trait ImportConfigReader: Send + Sync {
    /// 获取批次大小
    ///
    /// # 默认值
    /// - 250（限制在 1..=1000）
    async fn get_batch_size(&self) -> Result<usize, Box<dyn Error>>;

    /// 同一导入内重复键是否先合并再分批
    ///
    /// # 默认值
    /// - true
    async fn get_merge_duplicates(&self) -> Result<bool, Box<dyn Error>>;

    /// 是否启用表结构漂移重试（剔除未知列后重试一次）
    ///
    /// # 默认值
    /// - true
    async fn get_drift_retry(&self) -> Result<bool, Box<dyn Error>>;

    /// 是否在写入前按表的实际列做契约校验
    ///
    /// # 默认值
    /// - false
    async fn get_schema_check(&self) -> Result<bool, Box<dyn Error>>;

    /// 获取占位标识前缀
    ///
    /// # 默认值
    /// - "AUTO"
    async fn get_placeholder_prefix(&self) -> Result<String, Box<dyn Error>>;
}

// ==========================================
// ImportSettings - 单次导入的配置快照
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportSettings {
    pub batch_size: usize,
    pub merge_duplicates: bool,
    pub drift_retry: bool,
    pub schema_check: bool,
    pub placeholder_prefix: String,
}

impl Default for ImportSettings {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            merge_duplicates: true,
            drift_retry: true,
            schema_check: false,
            placeholder_prefix: DEFAULT_PLACEHOLDER_PREFIX.to_string(),
        }
    }
}

fn read_failed(key: &str, err: Box<dyn Error>) -> ImportError {
    ImportError::ConfigReadError {
        key: key.to_string(),
        message: err.to_string(),
    }
}

impl ImportSettings {
    /// 从配置读取器加载（导入开始时解析一次）
    pub async fn load<C: ImportConfigReader + ?Sized>(config: &C) -> ImporterResult<Self> {
        let batch_size = config
            .get_batch_size()
            .await
            .map_err(|e| read_failed("import.batch_size", e))?;
        let merge_duplicates = config
            .get_merge_duplicates()
            .await
            .map_err(|e| read_failed("import.merge_duplicates", e))?;
        let drift_retry = config
            .get_drift_retry()
            .await
            .map_err(|e| read_failed("import.drift_retry", e))?;
        let schema_check = config
            .get_schema_check()
            .await
            .map_err(|e| read_failed("import.schema_check", e))?;
        let placeholder_prefix = config
            .get_placeholder_prefix()
            .await
            .map_err(|e| read_failed("import.placeholder_prefix", e))?;

        Ok(Self {
            batch_size: batch_size.clamp(1, MAX_BATCH_SIZE),
            merge_duplicates,
            drift_retry,
            schema_check,
            placeholder_prefix,
        })
    }
}
