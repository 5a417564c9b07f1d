//! CalBee - Rust 日历智能体后端
//!
//! 模块划分：
//! - **agent**: 无头 Agent 运行时（组件构建、单次 run）
//! - **calendar**: 日程模型、内存存储、日历服务与日历工具
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 错误类型、循环状态机、工具并发调度
//! - **integrations**: 邮件通知、Google Calendar 同步与 OAuth
//! - **llm**: Decision Provider 抽象与实现（Ollama / OpenAI 兼容 / Mock）
//! - **memory**: 单次 run 的对话记录
//! - **react**: ReAct 主循环与过程事件
//! - **tools**: 工具注册表、别名与执行器
//! - **web**: HTTP 服务（/chat、/mcp、/events）

pub mod agent;
pub mod calendar;
pub mod config;
pub mod core;
pub mod integrations;
pub mod llm;
pub mod memory;
pub mod observability;
pub mod react;
pub mod tools;
#[cfg(feature = "web")]
pub mod web;
