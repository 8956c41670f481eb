use std::time::Duration;

use coffee_auth::{Algorithm, VerifierConfig};
use serde::Deserialize;

/// Application configuration for catalog server.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub app: AppConfig,
    pub server: ServerConfig,
    pub auth: AuthConfig,
}

impl Config {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let cfg: Config = serde_yaml::from_str(&content)?;
        Ok(cfg)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub name: String,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default = "default_environment")]
    pub environment: String,
}

fn default_version() -> String {
    "0.1.0".to_string()
}

fn default_environment() -> String {
    "dev".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5000
}

/// AuthConfig は JWT 認可の設定を表す。
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    pub issuer: String,
    pub audience: String,
    #[serde(default = "default_algorithm")]
    pub algorithm: Algorithm,
    /// 省略時は発行者の well-known パスから導出する
    #[serde(default)]
    pub jwks_url: Option<String>,
    #[serde(default = "default_jwks_cache_ttl_secs")]
    pub jwks_cache_ttl_secs: u64,
    #[serde(default = "default_jwks_fetch_timeout_secs")]
    pub jwks_fetch_timeout_secs: u64,
    #[serde(default)]
    pub serve_stale_on_error: bool,
    #[serde(default)]
    pub leeway_secs: u64,
}

fn default_algorithm() -> Algorithm {
    Algorithm::RS256
}

fn default_jwks_cache_ttl_secs() -> u64 {
    3600
}

fn default_jwks_fetch_timeout_secs() -> u64 {
    5
}

impl AuthConfig {
    /// JWKS エンドポイントの URL を返す。
    pub fn jwks_url(&self) -> String {
        match self.jwks_url {
            Some(ref url) => url.clone(),
            None => format!(
                "{}/.well-known/jwks.json",
                self.issuer.trim_end_matches('/')
            ),
        }
    }

    pub fn jwks_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.jwks_cache_ttl_secs)
    }

    pub fn jwks_fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.jwks_fetch_timeout_secs)
    }

    /// トークン検証器の設定に変換する。
    pub fn verifier_config(&self) -> VerifierConfig {
        VerifierConfig::new(&self.issuer, &self.audience)
            .with_algorithm(self.algorithm)
            .with_leeway_secs(self.leeway_secs)
    }
}
