//! 工具层：定义与调用结构、注册表、别名/归一化、执行器、参数 Schema 生成

pub mod alias;
pub mod call;
pub mod executor;
pub mod registry;
pub mod schema;

pub use alias::{normalize_arguments, resolve_alias, PROXY_TOOL_NAME};
pub use call::{JsonMap, ToolDefinition, ToolRequest, ToolResult};
pub use executor::ToolExecutor;
pub use registry::{ToolError, ToolHandler, ToolRegistry};
pub use schema::input_schema_for;
