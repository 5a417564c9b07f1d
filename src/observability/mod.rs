//! 可观测性：tracing 日志初始化

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// 未设置 RUST_LOG 时的过滤规则；工具审计日志走 calbee::tools 的 info 级别
const DEFAULT_FILTER: &str = "info,calbee=info,tower_http=info,hyper=warn,reqwest=warn";

/// 初始化日志，可通过 RUST_LOG 覆盖；重复调用不会 panic
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true))
        .try_init();
}
