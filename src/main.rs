// ==========================================
// 仓库管理看板 - 命令行入口
// ==========================================
// 用法:
//   warehouse-import import <table> <file> [db_path]
//   warehouse-import export <table> <out.csv> [db_path]
//   warehouse-import history [db_path]
//   warehouse-import errors <import_id> [db_path]
//   warehouse-import tables
//   warehouse-import config [db_path]
//   warehouse-import config-set <key> <value> [db_path]
//
// 结果以 JSON 输出到 stdout，日志输出到 stderr（RUST_LOG 控制级别）
// ==========================================

use std::error::Error;

use warehouse_import::app::{get_default_db_path, AppState};
use warehouse_import::config::TABLE_NAMES;
use warehouse_import::{logging, ApiError};

const USAGE: &str = "用法:
  warehouse-import import <table> <file> [db_path]
  warehouse-import export <table> <out.csv> [db_path]
  warehouse-import history [db_path]
  warehouse-import errors <import_id> [db_path]
  warehouse-import tables
  warehouse-import config [db_path]
  warehouse-import config-set <key> <value> [db_path]";

fn open_state(db_path: Option<String>) -> Result<AppState, Box<dyn Error>> {
    let db_path = db_path
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(get_default_db_path);
    tracing::info!("使用数据库: {}", db_path);
    Ok(AppState::new(db_path)?)
}

fn required(arg: Option<String>, name: &str) -> Result<String, Box<dyn Error>> {
    arg.ok_or_else(|| format!("缺少参数 <{}>\n{}", name, USAGE).into())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    logging::init();
    run(std::env::args().skip(1)).await
}

/// 执行一条命令（参数不含程序名）
async fn run<I>(args: I) -> Result<(), Box<dyn Error>>
where
    I: IntoIterator<Item = String>,
{
    let mut args = args.into_iter();
    let command = args.next().unwrap_or_default();

    match command.as_str() {
        "import" => {
            let table = required(args.next(), "table")?;
            let file = required(args.next(), "file")?;
            let state = open_state(args.next())?;

            match state.import_api.import_file(&table, &file).await {
                Ok(response) => {
                    println!("{}", serde_json::to_string_pretty(&response)?);
                }
                Err(err) => {
                    // 中止/取消时仍输出已累计的部分结果
                    if let Some(partial) = err.partial_result() {
                        println!("{}", serde_json::to_string_pretty(partial)?);
                    }
                    return Err(err.into());
                }
            }
        }
        "export" => {
            let table = required(args.next(), "table")?;
            let out_path = required(args.next(), "out.csv")?;
            let state = open_state(args.next())?;

            let rows = state.import_api.export_table(&table, &out_path)?;
            println!(
                "{}",
                serde_json::json!({ "table": table, "out_path": out_path, "rows": rows })
            );
        }
        "history" => {
            let state = open_state(args.next())?;
            let logs = state.import_api.list_import_logs(None)?;
            println!("{}", serde_json::to_string_pretty(&logs)?);
        }
        "errors" => {
            let import_id = required(args.next(), "import_id")?;
            let state = open_state(args.next())?;
            let errors = state.import_api.get_import_errors(&import_id)?;
            println!("{}", serde_json::to_string_pretty(&errors)?);
        }
        "config" => {
            let state = open_state(args.next())?;
            println!("{}", state.config_manager.get_config_snapshot()?);
        }
        "config-set" => {
            let key = required(args.next(), "key")?;
            let value = required(args.next(), "value")?;
            let state = open_state(args.next())?;
            state.config_manager.set_global_config_value(&key, &value)?;
            println!("{}", state.config_manager.get_config_snapshot()?);
        }
        "tables" => {
            println!("{}", serde_json::to_string(TABLE_NAMES)?);
        }
        "" | "help" | "--help" | "-h" => {
            println!("{} {}\n{}", warehouse_import::APP_NAME, warehouse_import::VERSION, USAGE);
        }
        other => {
            return Err(ApiError::InvalidInput(format!("未知命令 {}\n{}", other, USAGE)).into());
        }
    }

    Ok(())
}
