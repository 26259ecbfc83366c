use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use super::{CloseReason, Transport, TransportError, TransportEvent, TransportLink};

pub mod config;
pub use config::WebSocketConfig;

/// STOMP-over-WebSocket transport. Each connect performs a fresh upgrade.
#[derive(Debug, Clone)]
pub struct WebSocketTransport {
    config: WebSocketConfig,
}

impl WebSocketTransport {
    pub fn new(config: WebSocketConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn connect(&self) -> Result<TransportLink, TransportError> {
        let request = self.config.build_request()?;
        tracing::debug!(target: "devmatch::transport", url = %self.config.url, "opening websocket");

        let (ws_stream, response) = connect_async(request).await.map_err(map_connect_error)?;
        tracing::debug!(
            target: "devmatch::transport",
            status = response.status().as_u16(),
            "websocket upgraded"
        );

        let (tx_out, rx_out) = mpsc::unbounded_channel::<String>();
        let (tx_in, rx_in) = mpsc::unbounded_channel::<TransportEvent>();
        let pump = tokio::spawn(async move {
            handle_websocket(ws_stream, rx_out, tx_in).await;
        });

        Ok(TransportLink::new(tx_out, rx_in, Some(pump)))
    }
}

fn map_connect_error(err: tungstenite::Error) -> TransportError {
    match err {
        tungstenite::Error::Http(response) => TransportError::Rejected(response.status().as_u16()),
        tungstenite::Error::Url(err) => TransportError::InvalidEndpoint(err.to_string()),
        other => TransportError::WebSocket(other.to_string()),
    }
}

/// Pumps frames between the socket and the link's channels until either side
/// goes away. The last event forwarded is always a close.
async fn handle_websocket(
    ws_stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    mut rx_out: mpsc::UnboundedReceiver<String>,
    tx_in: mpsc::UnboundedSender<TransportEvent>,
) {
    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    let send_task = tokio::spawn(async move {
        while let Some(text) = rx_out.recv().await {
            if let Err(err) = ws_sender.send(Message::Text(text)).await {
                tracing::debug!(target: "devmatch::transport", error = %err, "websocket send failed");
                return;
            }
        }
        // Link closed locally: start the closing handshake.
        let _ = ws_sender.send(Message::Close(None)).await;
    });

    let mut close = CloseReason::default();
    while let Some(msg) = ws_receiver.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                if tx_in.send(TransportEvent::Text(text)).is_err() {
                    break;
                }
            }
            Ok(Message::Binary(data)) => match String::from_utf8(data) {
                Ok(text) => {
                    if tx_in.send(TransportEvent::Text(text)).is_err() {
                        break;
                    }
                }
                Err(_) => {
                    tracing::warn!(target: "devmatch::transport", "dropping non-utf8 binary frame");
                }
            },
            Ok(Message::Close(frame)) => {
                if let Some(frame) = frame {
                    close = CloseReason::new(u16::from(frame.code), frame.reason.into_owned());
                }
                break;
            }
            Ok(_) => {}
            Err(err) => {
                tracing::debug!(target: "devmatch::transport", error = %err, "websocket receive failed");
                close.reason = err.to_string();
                break;
            }
        }
    }

    tracing::debug!(
        target: "devmatch::transport",
        code = ?close.code,
        reason = %close.reason,
        "websocket closed"
    );
    let _ = tx_in.send(TransportEvent::Closed(close));

    send_task.abort();
    let _ = send_task.await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_tungstenite::tungstenite::http::{Response, StatusCode};

    #[test]
    fn upgrade_status_becomes_rejection() {
        let response = Response::builder()
            .status(StatusCode::FORBIDDEN)
            .body(None)
            .unwrap();
        assert_eq!(
            map_connect_error(tungstenite::Error::Http(response)),
            TransportError::Rejected(403)
        );
        assert!(matches!(
            map_connect_error(tungstenite::Error::ConnectionClosed),
            TransportError::WebSocket(_)
        ));
    }
}
