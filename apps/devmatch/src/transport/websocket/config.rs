use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::http::header::COOKIE;
use url::Url;

use crate::transport::TransportError;

/// Where the STOMP endpoint lives and which ambient credential rides along
/// on the upgrade request.
#[derive(Debug, Clone)]
pub struct WebSocketConfig {
    pub url: Url,
    pub cookie: Option<String>,
}

impl WebSocketConfig {
    pub fn new(url: Url) -> Self {
        Self { url, cookie: None }
    }

    /// Attaches a `Cookie` header value. Blank values are ignored.
    pub fn with_cookie(mut self, cookie: Option<String>) -> Self {
        self.cookie = cookie
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty());
        self
    }

    pub fn build_request(&self) -> Result<Request, TransportError> {
        match self.url.scheme() {
            "ws" | "wss" => {}
            other => {
                return Err(TransportError::InvalidEndpoint(format!(
                    "unsupported scheme {other:?} in {}",
                    self.url
                )));
            }
        }
        let mut request = self
            .url
            .as_str()
            .into_client_request()
            .map_err(|err| TransportError::InvalidEndpoint(err.to_string()))?;
        if let Some(cookie) = &self.cookie {
            let value = HeaderValue::from_str(cookie)
                .map_err(|err| TransportError::InvalidEndpoint(format!("cookie: {err}")))?;
            request.headers_mut().insert(COOKIE, value);
        }
        Ok(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attaches_cookie_to_upgrade_request() {
        let config = WebSocketConfig::new(Url::parse("ws://127.0.0.1:8080/ws").unwrap())
            .with_cookie(Some(" SESSION=abc ".into()));
        let request = config.build_request().unwrap();
        assert_eq!(request.headers().get(COOKIE).unwrap(), "SESSION=abc");
        assert_eq!(request.uri().path(), "/ws");
    }

    #[test]
    fn blank_cookie_is_dropped() {
        let config = WebSocketConfig::new(Url::parse("wss://chat.devmatch.dev/ws").unwrap())
            .with_cookie(Some("   ".into()));
        assert!(config.cookie.is_none());
        assert!(config.build_request().unwrap().headers().get(COOKIE).is_none());
    }

    #[test]
    fn rejects_http_scheme() {
        let config = WebSocketConfig::new(Url::parse("http://127.0.0.1:8080/ws").unwrap());
        assert!(matches!(
            config.build_request(),
            Err(TransportError::InvalidEndpoint(_))
        ));
    }
}
