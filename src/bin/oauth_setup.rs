//! Google Calendar 授权工具
//!
//! 已有可用（或可刷新）的 token.json 时直接校验并退出；否则打印授权地址，
//! 从标准输入读取授权码，换取 token 并写入 [google].token_path。
//! 启动: cargo run --bin calbee-oauth

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, BufReader};

use calbee::config::load_config;
use calbee::integrations::{ClientSecrets, TokenStore};
use calbee::observability;

/// 回环地址：授权后浏览器跳转到 http://localhost/?code=...，从地址栏复制 code
const REDIRECT_URI: &str = "http://localhost";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    observability::init();

    let cfg = load_config(None).context("Failed to load config")?;
    let http = reqwest::Client::new();
    let tokens = TokenStore::new(cfg.google.token_path.clone(), http.clone());

    if tokens.path().exists() {
        match tokens.access_token().await {
            Ok(_) => {
                println!(
                    "Google Calendar token is valid: {}",
                    tokens.path().display()
                );
                return Ok(());
            }
            Err(e) => tracing::warn!(error = %e, "existing token unusable, starting a new consent flow"),
        }
    }

    let secrets = ClientSecrets::load(&cfg.google.credentials_path)
        .await
        .with_context(|| {
            format!(
                "credentials file not found or invalid at {}",
                cfg.google.credentials_path.display()
            )
        })?;
    let redirect_uri = secrets
        .redirect_uris
        .first()
        .cloned()
        .unwrap_or_else(|| REDIRECT_URI.to_string());

    let url = secrets.authorization_url(&redirect_uri)?;
    println!("Open this URL in your browser and grant calendar access:\n\n{url}\n");
    println!("Paste the `code` parameter from the redirected URL and press Enter:");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let code = lines
        .next_line()
        .await
        .context("Failed to read authorization code")?
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .context("No authorization code entered")?;

    let token = secrets
        .exchange_code(&http, &code, &redirect_uri)
        .await
        .context("Failed to exchange authorization code")?;
    if token.refresh_token.is_none() {
        tracing::warn!("no refresh_token returned; the token will stop working when it expires");
    }
    tokens.save(&token).await.context("Failed to write token file")?;

    println!(
        "Google Calendar OAuth setup complete. Token written to {}",
        tokens.path().display()
    );
    Ok(())
}
