//! System prompt：优先读取 config/prompts/system.md，找不到时用内置模板
//!
//! 模板占位符 `{now}` / `{time_zone}` 在每次 decide 时替换，保证模型看到的是当前时间。

use std::path::Path;

use chrono::{DateTime, Utc};

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are an expert AI Calendar Assistant.

Your job is to help the user manage their schedule with the calendar tools.
You can create, list, update and delete events, send reminders, sync with Google Calendar, and import events.

- Always convert natural language dates/times to ISO 8601 UTC timestamps.
- When the user does not specify duration, default to a 1-hour meeting.
- When in doubt about timezone, assume the user is in {time_zone} and convert that local time to UTC for the tool parameters.
- After calling a tool, summarize what happened in clear, friendly language.

Current UTC time: {now}";

/// 按候选路径读取 prompt 模板；都不存在时返回内置模板
pub fn load_system_prompt(explicit: Option<&Path>) -> String {
    let candidates = [
        explicit.map(Path::to_path_buf),
        Some(Path::new("config/prompts/system.md").to_path_buf()),
        Some(Path::new("../config/prompts/system.md").to_path_buf()),
    ];
    candidates
        .into_iter()
        .flatten()
        .find_map(|p| std::fs::read_to_string(p).ok())
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string())
}

pub fn render_system_prompt(template: &str, now: DateTime<Utc>, time_zone: &str) -> String {
    template
        .replace("{now}", &now.to_rfc3339())
        .replace("{time_zone}", time_zone)
        .trim()
        .to_string()
}
