// ==========================================
// 仓库管理看板 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写管理
// 存储: config_kv 表 (key-value + scope)
// ==========================================

use crate::config::import_config_trait::ImportConfigReader;
use crate::db::open_sqlite_connection;
use crate::importer::row_coercer::DEFAULT_PLACEHOLDER_PREFIX;
use crate::importer::upsert_batcher::{DEFAULT_BATCH_SIZE, MAX_BATCH_SIZE};
use async_trait::async_trait;
use rusqlite::{params, Connection};
use serde_json::json;
use std::collections::BTreeMap;
use std::error::Error;
use std::sync::{Arc, Mutex};

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> Result<Self, Box<dyn Error>> {
        let conn = open_sqlite_connection(db_path)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建 ConfigManager
    ///
    /// 说明：对传入连接再次应用统一 PRAGMA（幂等）。
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Result<Self, Box<dyn Error>> {
        {
            let conn_guard = conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
            crate::db::configure_sqlite_connection(&conn_guard)?;
        }

        Ok(Self { conn })
    }

    /// 从 config_kv 表读取配置值（scope_id='global'）
    ///
    /// # 返回
    /// - Some(String): 配置值
    /// - None: 配置不存在
    fn get_config_value(&self, key: &str) -> Result<Option<String>, Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let result = conn.query_row(
            "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
            params![key],
            |row| row.get::<_, String>(0),
        );

        match result {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(Box::new(e)),
        }
    }

    /// 读取 global scope 的配置值（公开方法，供其他模块复用）
    pub fn get_global_config_value(&self, key: &str) -> Result<Option<String>, Box<dyn Error>> {
        self.get_config_value(key)
    }

    /// 从 config_kv 表读取配置值，带默认值
    fn get_config_or_default(&self, key: &str, default: &str) -> Result<String, Box<dyn Error>> {
        Ok(self.get_config_value(key)?.unwrap_or_else(|| default.to_string()))
    }

    /// 写入 global scope 配置（存在则覆盖）
    pub fn set_global_config_value(&self, key: &str, value: &str) -> Result<(), Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
        conn.execute(
            "INSERT INTO config_kv (scope_id, key, value, updated_at)
             VALUES ('global', ?1, ?2, datetime('now'))
             ON CONFLICT(scope_id, key) DO UPDATE SET value = ?2, updated_at = datetime('now')",
            params![key, value],
        )?;
        Ok(())
    }

    /// 获取所有 global 配置的快照（JSON格式）
    pub fn get_config_snapshot(&self) -> Result<String, Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let mut stmt =
            conn.prepare("SELECT key, value FROM config_kv WHERE scope_id = 'global' ORDER BY key")?;

        let mut config_map: BTreeMap<String, String> = BTreeMap::new();
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        for row in rows {
            let (key, value) = row?;
            config_map.insert(key, value);
        }

        Ok(serde_json::to_string(&json!(config_map))?)
    }

    fn get_bool(&self, key: &str, default: bool) -> Result<bool, Box<dyn Error>> {
        let value = self.get_config_or_default(key, if default { "true" } else { "false" })?;
        Ok(match value.trim().to_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => true,
            "false" | "0" | "no" | "off" => false,
            _ => {
                tracing::warn!(config_key = key, raw_value = %value, "布尔配置格式错误，使用默认值");
                default
            }
        })
    }
}

// ==========================================
// ImportConfigReader Trait 实现
// ==========================================
#[async_trait]
impl ImportConfigReader for ConfigManager {
    async fn get_batch_size(&self) -> Result<usize, Box<dyn Error>> {
        let default = DEFAULT_BATCH_SIZE.to_string();
        let value = self.get_config_or_default(config_keys::BATCH_SIZE, &default)?;
        let size = value.trim().parse::<usize>().unwrap_or(DEFAULT_BATCH_SIZE);
        Ok(size.clamp(1, MAX_BATCH_SIZE))
    }

    async fn get_merge_duplicates(&self) -> Result<bool, Box<dyn Error>> {
        self.get_bool(config_keys::MERGE_DUPLICATES, true)
    }

    async fn get_drift_retry(&self) -> Result<bool, Box<dyn Error>> {
        self.get_bool(config_keys::DRIFT_RETRY, true)
    }

    async fn get_schema_check(&self) -> Result<bool, Box<dyn Error>> {
        self.get_bool(config_keys::SCHEMA_CHECK, false)
    }

    async fn get_placeholder_prefix(&self) -> Result<String, Box<dyn Error>> {
        let value =
            self.get_config_or_default(config_keys::PLACEHOLDER_PREFIX, DEFAULT_PLACEHOLDER_PREFIX)?;
        let value = value.trim();
        if value.is_empty() {
            Ok(DEFAULT_PLACEHOLDER_PREFIX.to_string())
        } else {
            Ok(value.to_string())
        }
    }
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    pub const BATCH_SIZE: &str = "import.batch_size";
    pub const MERGE_DUPLICATES: &str = "import.merge_duplicates";
    pub const DRIFT_RETRY: &str = "import.drift_retry";
    pub const SCHEMA_CHECK: &str = "import.schema_check";
    pub const PLACEHOLDER_PREFIX: &str = "import.placeholder_prefix";
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ImportSettings;

    fn manager() -> ConfigManager {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::init_schema(&conn).unwrap();
        ConfigManager::from_connection(Arc::new(Mutex::new(conn))).unwrap()
    }

    #[tokio::test]
    async fn test_defaults_when_missing() {
        let config = manager();
        let settings = ImportSettings::load(&config).await.unwrap();
        assert_eq!(settings, ImportSettings::default());
    }

    #[tokio::test]
    async fn test_overrides_and_clamping() {
        let config = manager();
        config.set_global_config_value(config_keys::BATCH_SIZE, "5000").unwrap();
        config.set_global_config_value(config_keys::SCHEMA_CHECK, "yes").unwrap();
        config.set_global_config_value(config_keys::PLACEHOLDER_PREFIX, " INV ").unwrap();

        let settings = ImportSettings::load(&config).await.unwrap();
        assert_eq!(settings.batch_size, MAX_BATCH_SIZE);
        assert!(settings.schema_check);
        assert_eq!(settings.placeholder_prefix, "INV");
    }

    #[tokio::test]
    async fn test_invalid_values_fall_back() {
        let config = manager();
        config.set_global_config_value(config_keys::BATCH_SIZE, "lots").unwrap();
        config.set_global_config_value(config_keys::DRIFT_RETRY, "maybe").unwrap();

        assert_eq!(config.get_batch_size().await.unwrap(), DEFAULT_BATCH_SIZE);
        assert!(config.get_drift_retry().await.unwrap());
    }

    #[test]
    fn test_snapshot_and_overwrite() {
        let config = manager();
        config.set_global_config_value(config_keys::BATCH_SIZE, "10").unwrap();
        config.set_global_config_value(config_keys::BATCH_SIZE, "20").unwrap();

        assert_eq!(
            config.get_global_config_value(config_keys::BATCH_SIZE).unwrap(),
            Some("20".to_string())
        );
        let snapshot: BTreeMap<String, String> =
            serde_json::from_str(&config.get_config_snapshot().unwrap()).unwrap();
        assert_eq!(snapshot.get(config_keys::BATCH_SIZE).map(String::as_str), Some("20"));
    }
}
