//! 记忆层：单次 run 的短期对话记录

pub mod conversation;

pub use conversation::{AssistantTurn, Conversation, Turn};
