//! 工具调用的数据结构：ToolDefinition / ToolRequest / ToolResult

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// 工具参数与返回载荷都是 JSON 对象
pub type JsonMap = Map<String, Value>;

/// 工具定义：名称、描述、参数 JSON Schema（启动后只读）
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

/// 模型发出的一次工具请求；由 Decision Provider 创建，执行器消费一次
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ToolRequest {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub arguments: JsonMap,
}

impl ToolRequest {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: JsonMap) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }

    /// Provider 未给出 id 时使用
    pub fn generate_id() -> String {
        format!("call_{}", uuid::Uuid::new_v4().simple())
    }
}

/// 工具执行结果；创建后不可变，追加进对话后由对话持有
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ToolResult {
    pub request_id: String,
    pub success: bool,
    #[serde(default)]
    pub payload: JsonMap,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolResult {
    pub fn ok(request_id: impl Into<String>, payload: JsonMap) -> Self {
        Self {
            request_id: request_id.into(),
            success: true,
            payload,
            error: None,
        }
    }

    pub fn failed(request_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            success: false,
            payload: JsonMap::new(),
            error: Some(error.into()),
        }
    }

    /// 写回 LLM 时使用的文本形式
    pub fn to_content(&self) -> String {
        let mut body = JsonMap::new();
        body.insert("success".into(), Value::Bool(self.success));
        for (k, v) in &self.payload {
            if k != "success" {
                body.insert(k.clone(), v.clone());
            }
        }
        if let Some(e) = &self.error {
            body.insert("error".into(), Value::String(e.clone()));
        }
        Value::Object(body).to_string()
    }
}
