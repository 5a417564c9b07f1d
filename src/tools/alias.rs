//! 工具名别名表与参数归一化
//!
//! 模型既可能调用面向 LLM 的友好名（如 `create_calendar_event_tool`），也可能直接调用规范名
//! （如 `calendar_create_event`）；部分调用约定还会把参数包在一层 `{"kwargs": {...}}` 里。

use serde_json::Value;

use crate::tools::JsonMap;

/// 旧式代理工具名：参数里用 `tool_name` 指定真正的工具
pub const PROXY_TOOL_NAME: &str = "mcp_calendar_tool";

/// 友好名 -> 规范名
const ALIASES: &[(&str, &str)] = &[
    ("create_calendar_event_tool", "calendar_create_event"),
    ("get_calendar_events_tool", "calendar_get_events"),
    ("update_calendar_event_tool", "calendar_update_event"),
    ("delete_calendar_event_tool", "calendar_delete_event"),
    ("get_today_events_tool", "calendar_get_today_events"),
    ("send_calendar_reminder_tool", "calendar_send_reminder"),
    ("sync_google_calendar_tool", "calendar_sync_google"),
    ("import_google_calendar_tool", "calendar_import_google"),
];

/// 解析别名；不在表中的名字原样返回（规范名直接透传）
pub fn resolve_alias(name: &str) -> &str {
    let name = name.trim();
    ALIASES
        .iter()
        .find(|(alias, _)| *alias == name)
        .map(|(_, canonical)| *canonical)
        .unwrap_or(name)
}

/// 参数归一化：恰好一个键且其值为对象时，取内层对象；否则原样使用。对已展平的参数是幂等的。
pub fn normalize_arguments(mut args: JsonMap) -> JsonMap {
    if args.len() != 1 {
        return args;
    }
    let Some(key) = args.keys().next().cloned() else {
        return args;
    };
    match args.remove(&key) {
        Some(Value::Object(inner)) => inner,
        Some(other) => {
            args.insert(key, other);
            args
        }
        None => args,
    }
}

/// 展开代理调用 `mcp_calendar_tool(tool_name, **kwargs)`；返回 (目标工具名, 剩余参数)
pub fn unwrap_proxy_call(name: &str, mut args: JsonMap) -> (String, JsonMap) {
    if name != PROXY_TOOL_NAME {
        return (name.to_string(), args);
    }
    match args.remove("tool_name") {
        Some(Value::String(target)) => (target, args),
        Some(other) => {
            args.insert("tool_name".into(), other);
            (name.to_string(), args)
        }
        None => (name.to_string(), args),
    }
}
