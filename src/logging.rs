// ==========================================
// 仓库管理看板 - 日志初始化
// ==========================================
// 职责: 安装 tracing 订阅器（RUST_LOG 覆盖默认级别）
// ==========================================

use tracing_subscriber::{fmt, EnvFilter};

/// 未设置 RUST_LOG 时：本 crate info，依赖库只看 warn
const DEFAULT_DIRECTIVES: &str = "warn,warehouse_import=info";

fn env_filter(fallback: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback))
}

/// CLI 入口调用；日志写 stderr，stdout 留给 JSON 结果
pub fn init() {
    let installed = fmt()
        .with_env_filter(env_filter(DEFAULT_DIRECTIVES))
        .with_target(true)
        .with_line_number(true)
        .with_writer(std::io::stderr)
        .try_init()
        .is_ok();
    if !installed {
        tracing::debug!("日志订阅器已存在，跳过初始化");
    }
}

/// 测试用，可重复调用
pub fn init_test() {
    let _ = fmt()
        .with_env_filter(env_filter("debug"))
        .with_test_writer()
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_repeatable() {
        init_test();
        init_test();
        init();
        tracing::info!(table = "inventory", "日志初始化后可正常输出");
    }
}
