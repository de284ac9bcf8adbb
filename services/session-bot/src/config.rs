//! Configuration types and loading
//!
//! Precedence: env vars > config file > defaults. The config file is
//! optional; a deployment can be driven entirely from the environment.
//! `BOT_TOKEN` and `API_HASH` are held as [`Secret`]s and never logged.

use std::path::{Path, PathBuf};
use std::time::Duration;

use auth_backend::ApiCredentials;
use common::{Error, Secret};
use login_flow::{LoginSettings, RemoteErrorPolicy};
use serde::Deserialize;

/// Root configuration
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub bot: BotConfig,
    pub http: HttpConfig,
    pub gateway: GatewayConfig,
    pub api: ApiConfig,
    pub login: LoginConfig,
}

/// Chat transport settings
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    pub token: Option<Secret<String>>,
    pub api_url: String,
    /// Telegram user ids allowed to drive a login.
    pub operators: Vec<i64>,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            token: None,
            api_url: "https://api.telegram.org".into(),
            operators: Vec::new(),
        }
    }
}

/// Health/metrics listener
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self { port: 8080 }
    }
}

/// Auth gateway connection
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub url: Option<String>,
    pub timeout_secs: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            url: None,
            timeout_secs: auth_gateway::DEFAULT_TIMEOUT_SECS,
        }
    }
}

/// Process-wide API credentials. Both or neither.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub id: Option<i32>,
    pub hash: Option<Secret<String>>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoginConfig {
    pub idle_timeout_secs: u64,
    pub on_remote_error: String,
}

impl Default for LoginConfig {
    fn default() -> Self {
        Self {
            idle_timeout_secs: login_flow::DEFAULT_IDLE_TIMEOUT.as_secs(),
            on_remote_error: "abort".into(),
        }
    }
}

impl Config {
    /// Load the optional TOML file, overlay the process environment and
    /// validate the result.
    pub fn load(path: Option<&Path>) -> common::Result<Self> {
        let mut config = match path {
            Some(path) => toml::from_str(&std::fs::read_to_string(path)?)?,
            None => Config::default(),
        };
        config.overlay_env(|var| std::env::var(var).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides read through `lookup`.
    fn overlay_env(
        &mut self,
        lookup: impl Fn(&'static str) -> Option<String>,
    ) -> common::Result<()> {
        if let Some(token) = lookup("BOT_TOKEN") {
            self.bot.token = Some(Secret::new(token));
        }
        if let Some(url) = lookup("BOT_API_URL") {
            self.bot.api_url = url;
        }
        if let Some(admin) = lookup("ADMIN_ID") {
            let id = parse_env("ADMIN_ID", &admin)?;
            if !self.bot.operators.contains(&id) {
                self.bot.operators.push(id);
            }
        }
        if let Some(port) = lookup("PORT") {
            self.http.port = parse_env("PORT", &port)?;
        }
        if let Some(url) = lookup("AUTH_GATEWAY_URL") {
            self.gateway.url = Some(url);
        }
        if let Some(id) = lookup("API_ID") {
            self.api.id = Some(parse_env("API_ID", &id)?);
        }
        if let Some(hash) = lookup("API_HASH") {
            self.api.hash = Some(Secret::new(hash));
        }
        if let Some(secs) = lookup("LOGIN_IDLE_TIMEOUT_SECS") {
            self.login.idle_timeout_secs = parse_env("LOGIN_IDLE_TIMEOUT_SECS", &secs)?;
        }
        if let Some(policy) = lookup("LOGIN_ON_REMOTE_ERROR") {
            self.login.on_remote_error = policy;
        }
        Ok(())
    }

    fn validate(&self) -> common::Result<()> {
        match &self.bot.token {
            Some(token) if !token.is_blank() => {}
            _ => return Err(Error::Missing("BOT_TOKEN")),
        }

        if self.bot.operators.is_empty() {
            return Err(Error::Missing("ADMIN_ID"));
        }

        let url = self
            .gateway
            .url
            .as_deref()
            .ok_or(Error::Missing("AUTH_GATEWAY_URL"))?;
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(Error::Config(format!(
                "gateway url must start with http:// or https://, got: {url}"
            )));
        }

        if self.gateway.timeout_secs == 0 {
            return Err(Error::Config(
                "gateway timeout_secs must be greater than 0".into(),
            ));
        }

        if self.login.idle_timeout_secs == 0 {
            return Err(Error::InvalidEnv {
                var: "LOGIN_IDLE_TIMEOUT_SECS",
                message: "must be greater than 0".into(),
            });
        }

        self.remote_error_policy()?;

        match (&self.api.id, &self.api.hash) {
            (None, None) => {}
            (Some(id), Some(hash)) => {
                if *id <= 0 {
                    return Err(Error::InvalidEnv {
                        var: "API_ID",
                        message: "must be a positive number".into(),
                    });
                }
                if hash.is_blank() {
                    return Err(Error::InvalidEnv {
                        var: "API_HASH",
                        message: "must not be empty".into(),
                    });
                }
            }
            _ => {
                return Err(Error::Config(
                    "API_ID and API_HASH must be set together".into(),
                ));
            }
        }

        Ok(())
    }

    fn remote_error_policy(&self) -> common::Result<RemoteErrorPolicy> {
        self.login
            .on_remote_error
            .parse::<RemoteErrorPolicy>()
            .map_err(|message| Error::InvalidEnv {
                var: "LOGIN_ON_REMOTE_ERROR",
                message,
            })
    }

    pub fn bot_token(&self) -> &str {
        self.bot.token.as_ref().map_or("", |t| t.expose().as_str())
    }

    pub fn gateway_url(&self) -> &str {
        self.gateway.url.as_deref().unwrap_or_default()
    }

    pub fn gateway_timeout(&self) -> Duration {
        Duration::from_secs(self.gateway.timeout_secs)
    }

    pub fn api_credentials(&self) -> Option<ApiCredentials> {
        match (self.api.id, &self.api.hash) {
            (Some(id), Some(hash)) => Some(ApiCredentials::new(id, hash.expose().clone())),
            _ => None,
        }
    }

    /// Settings for the login coordinator. Call only on a validated config.
    pub fn login_settings(&self) -> LoginSettings {
        LoginSettings {
            api_credentials: self.api_credentials(),
            on_remote_error: self.remote_error_policy().unwrap_or_default(),
            idle_timeout: Duration::from_secs(self.login.idle_timeout_secs),
        }
    }

    /// Resolve config file path from CLI arg or CONFIG_PATH env var.
    pub fn resolve_path(cli_path: Option<&str>) -> Option<PathBuf> {
        cli_path
            .map(PathBuf::from)
            .or_else(|| std::env::var("CONFIG_PATH").ok().map(PathBuf::from))
    }
}

fn parse_env<T: std::str::FromStr>(var: &'static str, value: &str) -> common::Result<T>
where
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| Error::InvalidEnv {
        var,
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Serializes tests that mutate process environment variables.
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    const ENV_VARS: &[&str] = &[
        "BOT_TOKEN",
        "BOT_API_URL",
        "ADMIN_ID",
        "PORT",
        "AUTH_GATEWAY_URL",
        "API_ID",
        "API_HASH",
        "LOGIN_IDLE_TIMEOUT_SECS",
        "LOGIN_ON_REMOTE_ERROR",
        "CONFIG_PATH",
    ];

    /// SAFETY: callers must hold ENV_MUTEX.
    unsafe fn clear_env() {
        for var in ENV_VARS {
            unsafe { std::env::remove_var(var) };
        }
    }

    fn env(pairs: &[(&'static str, &str)]) -> impl Fn(&'static str) -> Option<String> {
        let map: HashMap<&'static str, String> =
            pairs.iter().map(|(k, v)| (*k, v.to_string())).collect();
        move |var| map.get(var).cloned()
    }

    fn required() -> Vec<(&'static str, &'static str)> {
        vec![
            ("BOT_TOKEN", "123456:ABC-DEF"),
            ("ADMIN_ID", "1001"),
            ("AUTH_GATEWAY_URL", "http://127.0.0.1:9000"),
        ]
    }

    fn from_env(pairs: &[(&'static str, &str)]) -> common::Result<Config> {
        let mut config = Config::default();
        config.overlay_env(env(pairs))?;
        config.validate()?;
        Ok(config)
    }

    #[test]
    fn env_only_config_uses_defaults() {
        let config = from_env(&required()).unwrap();

        assert_eq!(config.bot_token(), "123456:ABC-DEF");
        assert_eq!(config.bot.api_url, "https://api.telegram.org");
        assert_eq!(config.bot.operators, vec![1001]);
        assert_eq!(config.http.port, 8080);
        assert_eq!(config.gateway_timeout(), Duration::from_secs(30));

        let settings = config.login_settings();
        assert!(settings.interactive_credentials());
        assert_eq!(settings.on_remote_error, RemoteErrorPolicy::Abort);
        assert_eq!(settings.idle_timeout, Duration::from_secs(600));
    }

    #[test]
    fn missing_required_values_are_reported() {
        for var in ["BOT_TOKEN", "ADMIN_ID", "AUTH_GATEWAY_URL"] {
            let pairs: Vec<_> = required().into_iter().filter(|(k, _)| *k != var).collect();
            let err = from_env(&pairs).unwrap_err();
            assert!(
                matches!(err, Error::Missing(name) if name == var),
                "expected Missing({var}), got {err}"
            );
        }
    }

    #[test]
    fn blank_token_counts_as_missing() {
        let mut pairs = required();
        pairs[0] = ("BOT_TOKEN", "   ");
        assert!(matches!(
            from_env(&pairs).unwrap_err(),
            Error::Missing("BOT_TOKEN")
        ));
    }

    #[test]
    fn non_numeric_admin_id_is_rejected() {
        let mut pairs = required();
        pairs[1] = ("ADMIN_ID", "alice");
        assert!(matches!(
            from_env(&pairs).unwrap_err(),
            Error::InvalidEnv { var: "ADMIN_ID", .. }
        ));
    }

    #[test]
    fn api_credentials_must_come_in_pairs() {
        let mut pairs = required();
        pairs.push(("API_ID", "611335"));
        let err = from_env(&pairs).unwrap_err();
        assert!(err.to_string().contains("API_ID and API_HASH"));

        pairs.push(("API_HASH", "d524b414d21f4d37f08684c1df41ac9c"));
        let config = from_env(&pairs).unwrap();
        let creds = config.api_credentials().unwrap();
        assert_eq!(creds.api_id, 611335);
        assert!(!config.login_settings().interactive_credentials());
    }

    #[test]
    fn zero_idle_timeout_is_rejected() {
        let mut pairs = required();
        pairs.push(("LOGIN_IDLE_TIMEOUT_SECS", "0"));
        assert!(matches!(
            from_env(&pairs).unwrap_err(),
            Error::InvalidEnv {
                var: "LOGIN_IDLE_TIMEOUT_SECS",
                ..
            }
        ));
    }

    #[test]
    fn remote_error_policy_is_parsed() {
        let mut pairs = required();
        pairs.push(("LOGIN_ON_REMOTE_ERROR", "retry_in_place"));
        let config = from_env(&pairs).unwrap();
        assert_eq!(
            config.login_settings().on_remote_error,
            RemoteErrorPolicy::RetryInPlace
        );

        pairs.pop();
        pairs.push(("LOGIN_ON_REMOTE_ERROR", "sometimes"));
        assert!(matches!(
            from_env(&pairs).unwrap_err(),
            Error::InvalidEnv {
                var: "LOGIN_ON_REMOTE_ERROR",
                ..
            }
        ));
    }

    #[test]
    fn gateway_url_needs_http_scheme() {
        let mut pairs = required();
        pairs[2] = ("AUTH_GATEWAY_URL", "gateway.internal:9000");
        assert!(matches!(from_env(&pairs).unwrap_err(), Error::Config(_)));
    }

    #[test]
    fn file_values_are_overridden_by_env() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session-bot.toml");
        std::fs::write(
            &path,
            r#"
[bot]
token = "file-token"
operators = [1001, 2002]

[http]
port = 9090

[gateway]
url = "http://gateway.internal:9000"
timeout_secs = 10

[login]
idle_timeout_secs = 120
on_remote_error = "retry_in_place"
"#,
        )
        .unwrap();

        unsafe {
            clear_env();
            std::env::set_var("BOT_TOKEN", "env-token");
            std::env::set_var("ADMIN_ID", "3003");
        }
        let config = Config::load(Some(&path)).unwrap();
        unsafe { clear_env() };

        assert_eq!(config.bot_token(), "env-token");
        assert_eq!(config.bot.operators, vec![1001, 2002, 3003]);
        assert_eq!(config.http.port, 9090);
        assert_eq!(config.gateway_url(), "http://gateway.internal:9000");
        assert_eq!(config.gateway_timeout(), Duration::from_secs(10));
        let settings = config.login_settings();
        assert_eq!(settings.idle_timeout, Duration::from_secs(120));
        assert_eq!(settings.on_remote_error, RemoteErrorPolicy::RetryInPlace);
    }

    #[test]
    fn missing_file_is_an_error() {
        let result = Config::load(Some(Path::new("/nonexistent/session-bot.toml")));
        assert!(matches!(result, Err(Error::Io(_))));
    }

    #[test]
    fn invalid_toml_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "not valid {{{{ toml").unwrap();

        assert!(matches!(Config::load(Some(&path)), Err(Error::Toml(_))));
    }

    #[test]
    fn resolve_path_prefers_cli_flag() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe {
            clear_env();
            std::env::set_var("CONFIG_PATH", "/etc/session-bot.toml");
        }

        assert_eq!(
            Config::resolve_path(Some("/tmp/cli.toml")),
            Some(PathBuf::from("/tmp/cli.toml"))
        );
        assert_eq!(
            Config::resolve_path(None),
            Some(PathBuf::from("/etc/session-bot.toml"))
        );

        unsafe { clear_env() };
        assert_eq!(Config::resolve_path(None), None);
    }

    #[test]
    fn debug_output_redacts_secrets() {
        let mut pairs = required();
        pairs.push(("API_ID", "611335"));
        pairs.push(("API_HASH", "d524b414d21f4d37f08684c1df41ac9c"));
        let config = from_env(&pairs).unwrap();

        let debug = format!("{config:?}");
        assert!(!debug.contains("ABC-DEF"));
        assert!(!debug.contains("d524b414"));
    }
}
