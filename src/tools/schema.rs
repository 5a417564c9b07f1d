//! 工具参数 JSON Schema 生成（schemars 自动生成）
//!
//! 每个工具的参数用一个带 `JsonSchema` 的结构体描述，注册时生成 input_schema，
//! 同一个结构体再用于反序列化参数，保证 Schema 与实际解析一致。

use schemars::{gen::SchemaSettings, JsonSchema};
use serde_json::Value;

/// 生成参数结构体的 input_schema（去掉 `$schema` / `title`，内联子定义）
pub fn input_schema_for<T: JsonSchema>() -> Value {
    let settings = SchemaSettings::draft07().with(|s| {
        s.inline_subschemas = true;
        s.option_nullable = false;
        s.option_add_null_type = false;
    });
    let schema = settings.into_generator().into_root_schema_for::<T>();
    let mut value = serde_json::to_value(schema).unwrap_or_else(|_| empty_object_schema());
    if let Some(obj) = value.as_object_mut() {
        obj.remove("$schema");
        obj.remove("title");
        obj.remove("definitions");
        obj.entry("properties")
            .or_insert_with(|| Value::Object(Default::default()));
    }
    value
}

pub fn empty_object_schema() -> Value {
    serde_json::json!({
        "type": "object",
        "properties": {},
    })
}
