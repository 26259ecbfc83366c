use url::Url;

use crate::error::ApiError;

#[derive(Clone, Debug)]
pub struct ApiConfig {
    base_url: Url,
    session_cookie: Option<String>,
}

impl ApiConfig {
    /// Parses the backend base URL. Bare hosts get `http://` when they look
    /// local or private and `https://` otherwise.
    pub fn new(server_base_url: impl AsRef<str>) -> Result<Self, ApiError> {
        let base_url = parse_base_url(server_base_url.as_ref(), Scheme::Http)?;
        Ok(Self {
            base_url,
            session_cookie: None,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn with_session_cookie(mut self, cookie: Option<String>) -> Self {
        self.session_cookie = cookie
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty());
        self
    }

    pub fn session_cookie(&self) -> Option<&str> {
        self.session_cookie.as_deref()
    }

    /// Builds an endpoint URL from path segments. Segments are percent-encoded,
    /// so opaque ids can be passed through untouched.
    pub fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                ApiError::InvalidConfig(format!("base url {} cannot carry a path", self.base_url))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

/// Which pair of schemes to infer for a bare host.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Scheme {
    Http,
    WebSocket,
}

impl Scheme {
    fn prefix(self, local: bool) -> &'static str {
        match (self, local) {
            (Scheme::Http, true) => "http://",
            (Scheme::Http, false) => "https://",
            (Scheme::WebSocket, true) => "ws://",
            (Scheme::WebSocket, false) => "wss://",
        }
    }
}

/// Normalizes a user supplied base URL: infers a scheme for bare hosts,
/// rewrites `localhost` to `127.0.0.1` and guarantees a trailing slash.
pub fn parse_base_url(raw: &str, scheme: Scheme) -> Result<Url, ApiError> {
    let mut base = raw.trim().to_string();
    if base.is_empty() {
        return Err(ApiError::InvalidConfig("base url cannot be empty".into()));
    }
    if !base.contains("://") {
        base = format!("{}{base}", infer_scheme(&base, scheme));
    }
    let mut parsed = Url::parse(&base)
        .map_err(|err| ApiError::InvalidConfig(format!("invalid base url {base}: {err}")))?;
    // Avoid the IPv6 (::1) preference some resolvers give localhost.
    if parsed.host_str() == Some("localhost") {
        parsed
            .set_host(Some("127.0.0.1"))
            .map_err(|err| ApiError::InvalidConfig(format!("invalid base url {base}: {err}")))?;
    }
    if !parsed.path().ends_with('/') {
        let path = format!("{}/", parsed.path());
        parsed.set_path(&path);
    }
    Ok(parsed)
}

pub fn infer_scheme(base: &str, scheme: Scheme) -> &'static str {
    let host_part = base
        .split('/')
        .next()
        .unwrap_or(base)
        .trim_start_matches('[')
        .split(']')
        .next()
        .unwrap_or(base);
    scheme.prefix(is_local_host(host_part))
}

pub fn is_local_host(host: &str) -> bool {
    let host_lower = host.to_ascii_lowercase();
    host_lower.starts_with("localhost")
        || host_lower.starts_with("0.0.0.0")
        || host_lower.starts_with("127.")
        || host_lower == "::1"
        || host_lower.starts_with("10.")
        || host_lower.starts_with("192.168.")
        || host_lower
            .strip_prefix("172.")
            .and_then(|rest| rest.split('.').next())
            .and_then(|octet| octet.parse::<u8>().ok())
            .map(|octet| (16..32).contains(&octet))
            .unwrap_or(false)
}
