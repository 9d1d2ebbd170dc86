// ==========================================
// 仓库管理看板 - 应用状态
// ==========================================
// 职责: 管理应用级别的共享状态和API实例
// ==========================================

use std::sync::{Arc, Mutex};

use crate::api::ImportApi;
use crate::config::config_manager::ConfigManager;
use crate::events::BroadcastNotifier;

/// 应用状态
///
/// 包含所有API实例和共享资源
pub struct AppState {
    /// 数据库路径
    pub db_path: String,

    /// 导入导出API
    pub import_api: Arc<ImportApi>,

    /// 配置管理器
    pub config_manager: Arc<ConfigManager>,

    /// 数据变更通知（各页面订阅以刷新列表）
    pub notifier: Arc<BroadcastNotifier>,
}

impl AppState {
    /// 创建新的AppState实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    ///
    /// # 返回
    /// - Ok(AppState): 应用状态实例
    /// - Err(String): 初始化错误
    ///
    /// # 说明
    /// 该方法会：
    /// 1. 打开共享连接并建表（幂等）
    /// 2. 创建配置管理器与变更通知
    /// 3. 创建 API 实例
    pub fn new(db_path: String) -> Result<Self, String> {
        tracing::info!("初始化AppState，数据库路径: {}", db_path);

        let conn = crate::db::open_sqlite_connection(&db_path)
            .map_err(|e| format!("无法打开数据库: {}", e))?;
        crate::db::init_schema(&conn).map_err(|e| format!("建表失败: {}", e))?;

        match crate::db::read_schema_version(&conn) {
            Ok(Some(v)) if v != crate::db::CURRENT_SCHEMA_VERSION => {
                tracing::warn!(
                    actual = v,
                    expected = crate::db::CURRENT_SCHEMA_VERSION,
                    "数据库 schema_version 与当前代码不一致"
                );
            }
            Err(e) => tracing::warn!("读取 schema_version 失败: {}", e),
            _ => {}
        }

        let conn = Arc::new(Mutex::new(conn));
        let notifier = Arc::new(BroadcastNotifier::default());

        let config_manager = Arc::new(
            ConfigManager::from_connection(conn.clone())
                .map_err(|e| format!("无法创建ConfigManager: {}", e))?,
        );
        let import_api = Arc::new(
            ImportApi::new(conn, notifier.clone())
                .map_err(|e| format!("无法创建ImportApi: {}", e))?,
        );

        tracing::info!("AppState初始化完成");

        Ok(Self {
            db_path,
            import_api,
            config_manager,
            notifier,
        })
    }
}

/// 获取默认数据库路径
///
/// 优先级:
/// 1. 环境变量 WAREHOUSE_IMPORT_DB_PATH
/// 2. 用户数据目录下的 warehouse-import/warehouse.db
/// 3. 当前目录 ./warehouse.db
pub fn get_default_db_path() -> String {
    use std::path::PathBuf;

    // 允许通过环境变量显式指定 DB 路径（便于调试/测试/CI）
    if let Ok(path) = std::env::var("WAREHOUSE_IMPORT_DB_PATH") {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let mut path = PathBuf::from("./warehouse.db");

    if let Some(data_dir) = dirs::data_dir() {
        let dir = data_dir.join("warehouse-import");
        // 目录创建失败时退回当前目录
        if std::fs::create_dir_all(&dir).is_ok() {
            path = dir.join("warehouse.db");
        }
    }

    path.to_string_lossy().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_get_default_db_path() {
        let path = get_default_db_path();
        assert!(!path.is_empty());
        assert!(path.ends_with(".db"));
    }

    #[test]
    fn test_app_state_bootstraps_schema() {
        let temp = NamedTempFile::new().unwrap();
        let db_path = temp.path().to_str().unwrap().to_string();

        let state = AppState::new(db_path.clone()).unwrap();
        assert_eq!(state.db_path, db_path);
        assert!(state.import_api.list_import_logs(None).unwrap().is_empty());
    }
}
