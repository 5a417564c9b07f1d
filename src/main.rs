//! CalBee 服务入口
//!
//! 初始化日志、加载配置、构建 Agent 组件并启动 HTTP 服务。
//! 启动: cargo run --bin calbee（可选参数：配置文件路径）

use std::sync::Arc;

use anyhow::Context;
use calbee::agent::create_agent_components;
use calbee::config::load_config;
use calbee::observability;
use calbee::web::{create_router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    observability::init();

    let config_path = std::env::args().nth(1).map(std::path::PathBuf::from);
    let cfg = load_config(config_path).context("Failed to load config")?;

    let components =
        Arc::new(create_agent_components(&cfg).context("Failed to create agent components")?);
    tracing::info!(
        model = %components.provider.model_name(),
        tools = components.executor.tool_names().len(),
        max_iterations = components.max_iterations,
        "agent ready"
    );
    if let Err(e) = components.provider.health_check().await {
        tracing::warn!(error = %e, "LLM provider is not reachable yet; /chat will return 503 until it is");
    }

    let state = Arc::new(AppState::new(components, &cfg.app));
    let app = create_router(state, &cfg.app.cors_origins);

    let listener = tokio::net::TcpListener::bind(&cfg.app.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", cfg.app.bind_addr))?;
    tracing::info!("CalBee listening on http://{}", cfg.app.bind_addr);
    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
