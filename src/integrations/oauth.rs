//! Google OAuth 凭据：client secrets 读取、授权码交换、token.json 持久化与刷新
//!
//! token.json 使用 authorized-user 格式（token / refresh_token / token_uri / client_id / client_secret / scopes / expiry），
//! 与 Google 官方客户端库写出的文件兼容。

use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::integrations::GoogleError;

pub const CALENDAR_SCOPE: &str = "https://www.googleapis.com/auth/calendar";
pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
pub const DEFAULT_AUTH_URI: &str = "https://accounts.google.com/o/oauth2/auth";
/// 提前多少秒视为过期
const EXPIRY_SKEW_SECS: i64 = 60;

/// credentials.json 中的应用凭据（installed 或 web 段）
#[derive(Debug, Clone, Deserialize)]
pub struct ClientSecrets {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default = "default_auth_uri")]
    pub auth_uri: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
    #[serde(default)]
    pub redirect_uris: Vec<String>,
}

#[derive(Deserialize)]
struct ClientSecretsFile {
    installed: Option<ClientSecrets>,
    web: Option<ClientSecrets>,
}

impl ClientSecrets {
    pub async fn load(path: &Path) -> Result<Self, GoogleError> {
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| GoogleError::Auth(format!("read {}: {e}", path.display())))?;
        let file: ClientSecretsFile = serde_json::from_str(&raw)
            .map_err(|e| GoogleError::Auth(format!("parse {}: {e}", path.display())))?;
        file.installed
            .or(file.web)
            .ok_or_else(|| GoogleError::Auth("credentials file has no 'installed' or 'web' section".into()))
    }

    /// 用户授权页地址（离线访问，强制 consent 以拿到 refresh_token）
    pub fn authorization_url(&self, redirect_uri: &str) -> Result<String, GoogleError> {
        let url = reqwest::Url::parse_with_params(
            &self.auth_uri,
            &[
                ("client_id", self.client_id.as_str()),
                ("redirect_uri", redirect_uri),
                ("response_type", "code"),
                ("scope", CALENDAR_SCOPE),
                ("access_type", "offline"),
                ("prompt", "consent"),
            ],
        )
        .map_err(|e| GoogleError::Auth(format!("invalid auth_uri: {e}")))?;
        Ok(url.to_string())
    }

    /// 用授权码换取 token
    pub async fn exchange_code(
        &self,
        http: &reqwest::Client,
        code: &str,
        redirect_uri: &str,
    ) -> Result<StoredToken, GoogleError> {
        let resp = http
            .post(&self.token_uri)
            .form(&[
                ("code", code),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("redirect_uri", redirect_uri),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await?;
        let grant: TokenResponse = parse_token_response(resp).await?;
        Ok(StoredToken {
            token: grant.access_token,
            refresh_token: grant.refresh_token,
            token_uri: self.token_uri.clone(),
            client_id: self.client_id.clone(),
            client_secret: self.client_secret.clone(),
            scopes: vec![CALENDAR_SCOPE.to_string()],
            expiry: grant.expires_in.map(|s| Utc::now() + Duration::seconds(s)),
        })
    }
}

fn default_auth_uri() -> String {
    DEFAULT_AUTH_URI.to_string()
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

/// token.json 内容
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoredToken {
    pub token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
    pub client_id: String,
    pub client_secret: String,
    #[serde(default)]
    pub scopes: Vec<String>,
    #[serde(default)]
    pub expiry: Option<DateTime<Utc>>,
}

impl StoredToken {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expiry
            .map_or(false, |exp| exp <= now + Duration::seconds(EXPIRY_SKEW_SECS))
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
}

async fn parse_token_response(resp: reqwest::Response) -> Result<TokenResponse, GoogleError> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(GoogleError::Auth(format!("token endpoint returned {status}: {body}")));
    }
    resp.json()
        .await
        .map_err(|e| GoogleError::InvalidResponse(e.to_string()))
}

/// token.json 存取；过期时用 refresh_token 刷新并写回文件
pub struct TokenStore {
    path: PathBuf,
    http: reqwest::Client,
    cached: Mutex<Option<StoredToken>>,
}

impl TokenStore {
    pub fn new(path: impl Into<PathBuf>, http: reqwest::Client) -> Self {
        Self {
            path: path.into(),
            http,
            cached: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn load(&self) -> Result<StoredToken, GoogleError> {
        let raw = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            GoogleError::Auth(format!(
                "read {} (run calbee-oauth first): {e}",
                self.path.display()
            ))
        })?;
        serde_json::from_str(&raw)
            .map_err(|e| GoogleError::Auth(format!("parse {}: {e}", self.path.display())))
    }

    pub async fn save(&self, token: &StoredToken) -> Result<(), GoogleError> {
        let raw = serde_json::to_string_pretty(token)
            .map_err(|e| GoogleError::Auth(e.to_string()))?;
        tokio::fs::write(&self.path, raw)
            .await
            .map_err(|e| GoogleError::Auth(format!("write {}: {e}", self.path.display())))?;
        *self.cached.lock().await = Some(token.clone());
        Ok(())
    }

    /// 当前可用的 access token
    pub async fn access_token(&self) -> Result<String, GoogleError> {
        let mut cached = self.cached.lock().await;
        let token = match cached.take() {
            Some(t) => t,
            None => self.load().await?,
        };
        let token = if token.is_expired(Utc::now()) {
            let refreshed = self.refresh(token).await?;
            let raw = serde_json::to_string_pretty(&refreshed)
                .map_err(|e| GoogleError::Auth(e.to_string()))?;
            if let Err(e) = tokio::fs::write(&self.path, raw).await {
                tracing::warn!(path = %self.path.display(), error = %e, "failed to persist refreshed token");
            }
            refreshed
        } else {
            token
        };
        let access = token.token.clone();
        *cached = Some(token);
        Ok(access)
    }

    async fn refresh(&self, token: StoredToken) -> Result<StoredToken, GoogleError> {
        let refresh_token = token
            .refresh_token
            .clone()
            .ok_or_else(|| GoogleError::Auth("token expired and no refresh_token".into()))?;
        tracing::info!("refreshing Google access token");
        let resp = self
            .http
            .post(&token.token_uri)
            .form(&[
                ("client_id", token.client_id.as_str()),
                ("client_secret", token.client_secret.as_str()),
                ("refresh_token", refresh_token.as_str()),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await?;
        let grant = parse_token_response(resp).await?;
        Ok(StoredToken {
            token: grant.access_token,
            refresh_token: grant.refresh_token.or(Some(refresh_token)),
            expiry: grant.expires_in.map(|s| Utc::now() + Duration::seconds(s)),
            ..token
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn token(token_uri: &str, expiry: Option<DateTime<Utc>>) -> StoredToken {
        StoredToken {
            token: "old-access".into(),
            refresh_token: Some("refresh-1".into()),
            token_uri: token_uri.into(),
            client_id: "cid".into(),
            client_secret: "secret".into(),
            scopes: vec![CALENDAR_SCOPE.into()],
            expiry,
        }
    }

    #[tokio::test]
    async fn test_token_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = TokenStore::new(dir.path().join("token.json"), reqwest::Client::new());
        let t = token(DEFAULT_TOKEN_URI, Some(Utc::now() + Duration::hours(1)));
        store.save(&t).await.unwrap();
        assert_eq!(store.load().await.unwrap(), t);
        assert_eq!(store.access_token().await.unwrap(), "old-access");
    }

    #[tokio::test]
    async fn test_missing_token_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = TokenStore::new(dir.path().join("token.json"), reqwest::Client::new());
        assert!(matches!(store.access_token().await, Err(GoogleError::Auth(_))));
    }

    #[tokio::test]
    async fn test_expired_token_is_refreshed_and_persisted() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("grant_type=refresh_token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "new-access",
                "expires_in": 3600,
                "token_type": "Bearer"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("token.json");
        let expired = token(&format!("{}/token", server.uri()), Some(Utc::now() - Duration::minutes(5)));
        std::fs::write(&file, serde_json::to_string(&expired).unwrap()).unwrap();

        let store = TokenStore::new(&file, reqwest::Client::new());
        assert_eq!(store.access_token().await.unwrap(), "new-access");
        // 第二次走缓存，不再请求
        assert_eq!(store.access_token().await.unwrap(), "new-access");

        let on_disk = store.load().await.unwrap();
        assert_eq!(on_disk.token, "new-access");
        assert_eq!(on_disk.refresh_token.as_deref(), Some("refresh-1"));
    }

    #[tokio::test]
    async fn test_client_secrets_and_auth_url() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("credentials.json");
        std::fs::write(
            &file,
            r#"{"installed":{"client_id":"cid.apps","client_secret":"s","redirect_uris":["http://localhost"]}}"#,
        )
        .unwrap();
        let secrets = ClientSecrets::load(&file).await.unwrap();
        assert_eq!(secrets.token_uri, DEFAULT_TOKEN_URI);
        let url = secrets.authorization_url("http://localhost").unwrap();
        assert!(url.starts_with(DEFAULT_AUTH_URI));
        assert!(url.contains("client_id=cid.apps"));
        assert!(url.contains("access_type=offline"));
    }
}
