use crate::error::{Error, Result};
use dotenvy::dotenv;
use std::env;
use std::path::PathBuf;
use std::sync::OnceLock;
use url::Url;

#[derive(Debug, Clone)]
pub struct Config {
    pub server_address: String,
    pub openai_api_key: Option<String>,
    pub openai_model: String,
    pub openai_base_url: String,
    pub summary_timeout_secs: u64,
    pub summary_max_tokens: u32,
    pub public_rps: u32,
    pub survey_dir: Option<PathBuf>,
    pub session_ttl_secs: u64,
    pub max_sessions: usize,
}

pub static CONFIG: OnceLock<Config> = OnceLock::new();

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        let openai_base_url = get_env_or("OPENAI_BASE_URL", "https://api.openai.com/v1");
        validate_base_url(&openai_base_url)?;

        Ok(Self {
            server_address: get_env("SERVER_ADDRESS")?,
            openai_api_key: env::var("OPENAI_API_KEY").ok().filter(|k| !k.trim().is_empty()),
            openai_model: get_env_or("OPENAI_MODEL", "gpt-4o-mini"),
            openai_base_url,
            summary_timeout_secs: get_env_parse_or("SUMMARY_TIMEOUT_SECS", 60)?,
            summary_max_tokens: get_env_parse_or("SUMMARY_MAX_TOKENS", 1000)?,
            public_rps: get_env_parse_or("PUBLIC_RPS", 50)?,
            survey_dir: env::var("SURVEY_DIR").ok().map(PathBuf::from),
            session_ttl_secs: get_env_parse_or("SESSION_TTL_SECS", 3600)?,
            max_sessions: get_env_parse_or("MAX_SESSIONS", 10_000)?,
        })
    }

    /// Offline configuration: no API key, builtin surveys only.
    pub fn local(server_address: &str) -> Self {
        Self {
            server_address: server_address.to_string(),
            openai_api_key: None,
            openai_model: "gpt-4o-mini".to_string(),
            openai_base_url: "https://api.openai.com/v1".to_string(),
            summary_timeout_secs: 60,
            summary_max_tokens: 1000,
            public_rps: 50,
            survey_dir: None,
            session_ttl_secs: 3600,
            max_sessions: 10_000,
        }
    }
}

fn get_env(name: &str) -> Result<String> {
    env::var(name).map_err(|_| Error::Config(format!("Missing environment variable: {}", name)))
}

fn get_env_or(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn get_env_parse_or<T>(name: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .parse()
            .map_err(|e| Error::Config(format!("Invalid value for {}: {}", name, e))),
        Err(_) => Ok(default),
    }
}

fn validate_base_url(raw: &str) -> Result<()> {
    let url = Url::parse(raw)
        .map_err(|e| Error::Config(format!("Invalid value for OPENAI_BASE_URL: {}", e)))?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(Error::Config(
            "OPENAI_BASE_URL must use http or https".to_string(),
        ));
    }
    Ok(())
}

pub fn init_config() -> Result<()> {
    let config = Config::from_env()?;
    CONFIG
        .set(config)
        .map_err(|_| Error::Config("Configuration has already been initialized".to_string()))?;
    Ok(())
}

pub fn get_config() -> Result<&'static Config> {
    CONFIG
        .get()
        .ok_or_else(|| Error::Config("Configuration has not been initialized".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_must_be_http() {
        assert!(validate_base_url("https://api.openai.com/v1").is_ok());
        assert!(validate_base_url("http://localhost:11434/v1").is_ok());
        assert!(matches!(
            validate_base_url("ftp://example.com"),
            Err(Error::Config(_))
        ));
        assert!(matches!(validate_base_url("not a url"), Err(Error::Config(_))));
    }

    #[test]
    fn local_config_has_no_api_key() {
        let config = Config::local("127.0.0.1:0");
        assert!(config.openai_api_key.is_none());
        assert_eq!(config.public_rps, 50);
        assert_eq!(config.session_ttl_secs, 3600);
        assert_eq!(config.max_sessions, 10_000);
    }
}
