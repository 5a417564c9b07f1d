//! 核心层：错误类型、循环状态、工具任务调度

pub mod error;
pub mod state;
pub mod task_scheduler;

pub use error::AgentError;
pub use state::{LoopPhase, Termination};
pub use task_scheduler::TaskScheduler;
