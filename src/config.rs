//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：旧版环境变量（OLLAMA_MODEL、EMAIL_USER 等）作为最低优先级默认值，
//! 再读 TOML 文件，最后用环境变量 `CALBEE__*` 覆盖（双下划线表示嵌套，如 `CALBEE__LLM__PROVIDER=openai`）。

use std::path::PathBuf;

use serde::Deserialize;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub app: AppSection,
    pub llm: LlmSection,
    pub agent: AgentSection,
    pub tools: ToolsSection,
    pub email: EmailSection,
    pub google: GoogleSection,
}

/// [app] 段：服务名、监听地址、CORS 白名单
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppSection {
    pub name: Option<String>,
    pub bind_addr: String,
    /// 允许跨域的前端地址；包含 "*" 时放开全部
    pub cors_origins: Vec<String>,
}

impl Default for AppSection {
    fn default() -> Self {
        Self {
            name: None,
            bind_addr: "0.0.0.0:8000".to_string(),
            cors_origins: vec![
                "http://localhost:3000".into(),
                "http://localhost:5173".into(),
                "http://localhost:5174".into(),
            ],
        }
    }
}

/// [llm] 段：后端选择（ollama / openai / mock）与超时
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    pub provider: String,
    pub model: String,
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub timeouts: LlmTimeoutsSection,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: "ollama".to_string(),
            model: "gpt-oss".to_string(),
            base_url: None,
            api_key: None,
            timeouts: LlmTimeoutsSection::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmTimeoutsSection {
    /// 单次模型调用超时（秒）；本地模型首轮加载可能很慢
    pub request: u64,
}

impl Default for LlmTimeoutsSection {
    fn default() -> Self {
        Self { request: 120 }
    }
}

/// [agent] 段：ReAct 循环步数上限、工具并发、prompt 路径
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AgentSection {
    pub max_iterations: usize,
    pub max_concurrent_tools: usize,
    pub system_prompt_path: Option<PathBuf>,
}

impl Default for AgentSection {
    fn default() -> Self {
        Self {
            max_iterations: 25,
            max_concurrent_tools: 3,
            system_prompt_path: None,
        }
    }
}

/// [tools] 段
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ToolsSection {
    /// 单次工具调用超时（秒）
    pub tool_timeout_secs: u64,
}

impl Default for ToolsSection {
    fn default() -> Self {
        Self {
            tool_timeout_secs: 30,
        }
    }
}

/// [email] 段：SMTP 服务器与账号；user/password 未配置时只记日志不发信
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EmailSection {
    pub smtp_server: String,
    pub smtp_port: u16,
    pub user: Option<String>,
    pub password: Option<String>,
}

impl Default for EmailSection {
    fn default() -> Self {
        Self {
            smtp_server: "smtp.gmail.com".to_string(),
            smtp_port: 587,
            user: None,
            password: None,
        }
    }
}

impl EmailSection {
    pub fn is_configured(&self) -> bool {
        matches!((&self.user, &self.password), (Some(u), Some(p)) if !u.is_empty() && !p.is_empty())
    }
}

/// [google] 段：OAuth 文件、日历 id、默认时区
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GoogleSection {
    pub enabled: bool,
    pub token_path: PathBuf,
    pub credentials_path: PathBuf,
    pub calendar_id: String,
    pub time_zone: String,
}

impl Default for GoogleSection {
    fn default() -> Self {
        Self {
            enabled: true,
            token_path: PathBuf::from("token.json"),
            credentials_path: PathBuf::from("credentials.json"),
            calendar_id: "primary".to_string(),
            time_zone: "America/Chicago".to_string(),
        }
    }
}

/// 旧版部署使用的环境变量 -> 配置键
const LEGACY_ENV: &[(&str, &str)] = &[
    ("OLLAMA_MODEL", "llm.model"),
    ("OLLAMA_BASE_URL", "llm.base_url"),
    ("SMTP_SERVER", "email.smtp_server"),
    ("SMTP_PORT", "email.smtp_port"),
    ("EMAIL_USER", "email.user"),
    ("EMAIL_PASSWORD", "email.password"),
];

/// 从 config 目录加载配置，环境变量 CALBEE__* 可覆盖
///
/// 1. 旧版环境变量作为默认值
/// 2. 按顺序查找 config/default.toml、../config/default.toml，找到则作为第一个文件源
/// 3. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 4. 最后叠加环境变量 CALBEE__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    for (var, key) in LEGACY_ENV {
        if let Ok(value) = std::env::var(var) {
            if !value.is_empty() {
                builder = builder.set_default(*key, value)?;
            }
        }
    }

    for name in ["config/default", "../config/default"] {
        if std::path::Path::new(&format!("{}.toml", name)).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("CALBEE")
            .separator("__")
            .try_parsing(true),
    );

    builder.build()?.try_deserialize()
}
