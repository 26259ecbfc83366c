use std::env;
use std::str::FromStr;
use std::time::Duration;

use devmatch_api::ApiConfig;
use devmatch_api::ApiError;
use devmatch_api::config::{Scheme, parse_base_url};
use url::Url;

use crate::protocol::HeartBeat;
use crate::session::{
    DEFAULT_HANDSHAKE_TIMEOUT, DEFAULT_HEARTBEAT, DEFAULT_HISTORY_LIMIT, ReconnectPolicy,
    SessionOptions,
};

pub const DEFAULT_API_URL: &str = "127.0.0.1:8080";
const WEBSOCKET_PATH: &str = "ws";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {var}: {reason}")]
    InvalidValue {
        var: &'static str,
        value: String,
        reason: String,
    },
    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Client configuration, read from `DEVMATCH_*` environment variables and
/// overridable from the command line.
#[derive(Debug, Clone)]
pub struct Config {
    pub api_url: String,
    /// Explicit STOMP endpoint; derived from `api_url` when unset.
    pub ws_url: Option<String>,
    pub session_cookie: Option<String>,
    pub history_limit: usize,
    pub reconnect: ReconnectPolicy,
    pub heartbeat: Duration,
    pub handshake_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            ws_url: None,
            session_cookie: None,
            history_limit: DEFAULT_HISTORY_LIMIT,
            reconnect: ReconnectPolicy::default(),
            heartbeat: DEFAULT_HEARTBEAT,
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let text = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let defaults = Self::default();
        let millis = |name: &'static str, fallback: Duration| -> Result<Duration, ConfigError> {
            Ok(parse_var::<u64>(name, text(name))?
                .map(Duration::from_millis)
                .unwrap_or(fallback))
        };

        let reconnect = ReconnectPolicy {
            base_delay: millis("DEVMATCH_RECONNECT_BASE_MS", defaults.reconnect.base_delay)?,
            max_delay: millis("DEVMATCH_RECONNECT_MAX_MS", defaults.reconnect.max_delay)?,
            max_attempts: parse_var(
                "DEVMATCH_RECONNECT_ATTEMPTS",
                text("DEVMATCH_RECONNECT_ATTEMPTS"),
            )?
            .unwrap_or(defaults.reconnect.max_attempts),
        };

        Ok(Self {
            api_url: text("DEVMATCH_API_URL").unwrap_or(defaults.api_url),
            ws_url: text("DEVMATCH_WS_URL"),
            session_cookie: text("DEVMATCH_SESSION_COOKIE"),
            history_limit: parse_var("DEVMATCH_HISTORY_LIMIT", text("DEVMATCH_HISTORY_LIMIT"))?
                .unwrap_or(defaults.history_limit),
            reconnect,
            heartbeat: millis("DEVMATCH_HEARTBEAT_MS", defaults.heartbeat)?,
            handshake_timeout: millis(
                "DEVMATCH_HANDSHAKE_TIMEOUT_MS",
                defaults.handshake_timeout,
            )?,
        })
    }

    pub fn api_config(&self) -> Result<ApiConfig, ConfigError> {
        Ok(ApiConfig::new(&self.api_url)?.with_session_cookie(self.session_cookie.clone()))
    }

    /// The STOMP endpoint. An explicit URL is used as given (with `/ws`
    /// appended only when it has no path); otherwise the API URL is switched to
    /// `ws`/`wss` and `/ws` is appended.
    pub fn websocket_url(&self) -> Result<Url, ConfigError> {
        match &self.ws_url {
            Some(raw) => {
                let mut url = parse_base_url(raw, Scheme::WebSocket)?;
                if url.path() == "/" {
                    url.set_path(WEBSOCKET_PATH);
                } else {
                    let trimmed = url.path().trim_end_matches('/').to_string();
                    url.set_path(&trimmed);
                }
                Ok(url)
            }
            None => {
                let base = self.api_config()?.base_url().clone();
                let scheme = match base.scheme() {
                    "https" => "wss",
                    _ => "ws",
                };
                let mut url = base
                    .join(WEBSOCKET_PATH)
                    .map_err(|err| invalid("DEVMATCH_API_URL", &self.api_url, err))?;
                url.set_scheme(scheme).map_err(|_| {
                    invalid("DEVMATCH_API_URL", &self.api_url, "no websocket equivalent")
                })?;
                Ok(url)
            }
        }
    }

    pub fn session_options(&self) -> Result<SessionOptions, ConfigError> {
        let stomp_host = self.websocket_url()?.host_str().map(str::to_string);
        Ok(SessionOptions {
            history_limit: self.history_limit,
            reconnect: self.reconnect,
            heart_beat: HeartBeat::new(self.heartbeat, self.heartbeat),
            handshake_timeout: self.handshake_timeout,
            stomp_host,
        })
    }
}

fn invalid(var: &'static str, value: &str, reason: impl ToString) -> ConfigError {
    ConfigError::InvalidValue {
        var,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn parse_var<T>(var: &'static str, value: Option<String>) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: ToString,
{
    value
        .map(|raw| raw.parse::<T>().map_err(|err| invalid(var, &raw, err)))
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::{LazyLock, Mutex};

    static ENV_MUTEX: LazyLock<Mutex<()>> = LazyLock::new(|| Mutex::new(()));

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn defaults_point_at_local_backend() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.api_config().unwrap().base_url().as_str(), "http://127.0.0.1:8080/");
        assert_eq!(config.websocket_url().unwrap().as_str(), "ws://127.0.0.1:8080/ws");
        assert_eq!(config.history_limit, 100);
        assert_eq!(config.reconnect, ReconnectPolicy::default());
    }

    #[test]
    fn websocket_url_follows_https_api() {
        let config = Config::from_lookup(lookup(&[("DEVMATCH_API_URL", "devmatch.dev/backend")]))
            .unwrap();
        assert_eq!(
            config.websocket_url().unwrap().as_str(),
            "wss://devmatch.dev/backend/ws"
        );
        let options = config.session_options().unwrap();
        assert_eq!(options.stomp_host.as_deref(), Some("devmatch.dev"));
    }

    #[test]
    fn explicit_websocket_url_is_kept() {
        let config = Config::from_lookup(lookup(&[
            ("DEVMATCH_WS_URL", "wss://chat.devmatch.dev/stomp/"),
        ]))
        .unwrap();
        assert_eq!(
            config.websocket_url().unwrap().as_str(),
            "wss://chat.devmatch.dev/stomp"
        );

        let bare = Config::from_lookup(lookup(&[("DEVMATCH_WS_URL", "localhost:9000")])).unwrap();
        assert_eq!(bare.websocket_url().unwrap().as_str(), "ws://127.0.0.1:9000/ws");
    }

    #[test]
    fn numeric_overrides_are_parsed() {
        let config = Config::from_lookup(lookup(&[
            ("DEVMATCH_RECONNECT_BASE_MS", "250"),
            ("DEVMATCH_RECONNECT_MAX_MS", "4000"),
            ("DEVMATCH_RECONNECT_ATTEMPTS", "3"),
            ("DEVMATCH_HEARTBEAT_MS", "0"),
            ("DEVMATCH_HISTORY_LIMIT", "20"),
        ]))
        .unwrap();
        assert_eq!(config.reconnect.base_delay, Duration::from_millis(250));
        assert_eq!(config.reconnect.max_delay, Duration::from_millis(4000));
        assert_eq!(config.reconnect.max_attempts, 3);
        assert_eq!(config.history_limit, 20);
        let options = config.session_options().unwrap();
        assert_eq!(options.heart_beat, HeartBeat::disabled());
    }

    #[test]
    fn garbage_numbers_are_reported() {
        let err = Config::from_lookup(lookup(&[("DEVMATCH_RECONNECT_ATTEMPTS", "many")]))
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                var: "DEVMATCH_RECONNECT_ATTEMPTS",
                ..
            }
        ));
    }

    #[test]
    fn from_env_reads_process_environment() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let original = env::var("DEVMATCH_SESSION_COOKIE").ok();
        unsafe {
            env::set_var("DEVMATCH_SESSION_COOKIE", "SESSION=xyz");
        }
        let config = Config::from_env().unwrap();
        assert_eq!(config.session_cookie.as_deref(), Some("SESSION=xyz"));
        unsafe {
            match original {
                Some(value) => env::set_var("DEVMATCH_SESSION_COOKIE", value),
                None => env::remove_var("DEVMATCH_SESSION_COOKIE"),
            }
        }
    }
}
