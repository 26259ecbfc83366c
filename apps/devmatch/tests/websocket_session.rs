//! Drives the real WebSocket transport against a small in-process STOMP broker.

use std::borrow::Cow;
use std::net::SocketAddr;
use std::time::Duration;

use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use devmatch_client_core::protocol::stomp::{self, Command, Frame};
use devmatch_client_core::session::{ChatError, ChatView, SessionState};
use devmatch_client_core::{ChatClient, ChatSession, Config};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

const COOKIE: &str = "SESSION=abc123";
const KICKED: &str = "kicked";

#[derive(Clone)]
struct Broker {
    seen: mpsc::UnboundedSender<Command>,
}

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get(header::COOKIE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value == COOKIE)
}

async fn history(Path(conversation): Path<String>, headers: HeaderMap) -> Response {
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    Json(json!([{
        "id": "h1",
        "conversationId": conversation,
        "senderId": "u2",
        "senderDisplayName": "Grace",
        "content": "welcome",
        "createdAt": "2024-05-01T12:00:00Z",
    }]))
    .into_response()
}

async fn upgrade(
    ws: WebSocketUpgrade,
    headers: HeaderMap,
    State(broker): State<Broker>,
) -> Response {
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    ws.on_upgrade(move |socket| serve_stomp(socket, broker))
}

async fn serve_stomp(mut socket: WebSocket, broker: Broker) {
    let mut subscription = None;
    let mut topic = String::new();
    let mut delivered = 0;
    while let Some(Ok(message)) = socket.recv().await {
        let Message::Text(text) = message else {
            continue;
        };
        for frame in stomp::decode(&text).into_iter().flatten() {
            let _ = broker.seen.send(frame.command);
            let reply = match frame.command {
                Command::Connect | Command::Stomp => Frame::new(Command::Connected)
                    .header("version", "1.2")
                    .header("heart-beat", "0,0"),
                Command::Subscribe => {
                    subscription = frame.get("id").map(str::to_string);
                    topic = frame.get("destination").unwrap_or_default().to_string();
                    if topic.ends_with(KICKED) {
                        let close = CloseFrame {
                            code: 1008,
                            reason: Cow::from("session expired"),
                        };
                        let _ = socket.send(Message::Close(Some(close))).await;
                        return;
                    }
                    continue;
                }
                Command::Send => {
                    let Ok(body) = serde_json::from_str::<Value>(&frame.body) else {
                        continue;
                    };
                    delivered += 1;
                    let echo = json!({
                        "id": format!("live-{delivered}"),
                        "conversationId": body["conversationId"],
                        "senderId": "u1",
                        "senderDisplayName": "Ada",
                        "content": body["content"],
                        "createdAt": "2024-05-01T12:05:00Z",
                    });
                    Frame::new(Command::Message)
                        .header("destination", topic.as_str())
                        .header("subscription", subscription.clone().unwrap_or_default())
                        .header("message-id", format!("m-{delivered}"))
                        .header("content-type", "application/json")
                        .with_body(echo.to_string())
                }
                Command::Disconnect => return,
                _ => continue,
            };
            if socket.send(Message::Text(reply.encode())).await.is_err() {
                return;
            }
        }
    }
}

async fn start_broker() -> (SocketAddr, mpsc::UnboundedReceiver<Command>) {
    let (seen, frames) = mpsc::unbounded_channel();
    let app = Router::new()
        .route("/ws", get(upgrade))
        .route("/api/chat/:conversation/messages", get(history))
        .with_state(Broker { seen });
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, frames)
}

fn client(addr: SocketAddr, cookie: Option<&str>) -> ChatClient {
    let config = Config {
        api_url: format!("http://{addr}"),
        session_cookie: cookie.map(str::to_string),
        heartbeat: Duration::ZERO,
        ..Config::default()
    };
    ChatClient::from_config(&config).unwrap()
}

async fn wait_until(session: &ChatSession, check: impl Fn(&ChatView) -> bool) -> ChatView {
    let mut updates = session.watch();
    let view = updates.wait_for(|view| check(view)).await.expect("driver ended");
    view.clone()
}

#[test_timeout::tokio_timeout_test(20)]
async fn chat_round_trip_over_websocket() {
    let (addr, mut frames) = start_broker().await;
    let session = client(addr, Some(COOKIE)).activate("m-42");

    let view = wait_until(&session, |view| {
        view.state == SessionState::Active && !view.loading_history
    })
    .await;
    assert_eq!(view.messages.len(), 1);
    assert_eq!(view.messages[0].id, "h1");
    assert_eq!(view.error, None);

    session.send("hello there");
    let view = wait_until(&session, |view| view.messages.len() == 2).await;
    assert_eq!(view.messages[1].id, "live-1");
    assert_eq!(view.messages[1].content, "hello there");
    assert_eq!(view.messages[1].conversation_id, "m-42");

    session.deactivate().await;
    let mut commands = Vec::new();
    while let Some(command) = frames.recv().await {
        commands.push(command);
        if command == Command::Disconnect {
            break;
        }
    }
    assert_eq!(
        commands,
        vec![
            Command::Connect,
            Command::Subscribe,
            Command::Send,
            Command::Disconnect,
        ]
    );
}

#[test_timeout::tokio_timeout_test(20)]
async fn rejected_upgrade_expires_the_session() {
    let (addr, _frames) = start_broker().await;
    let session = client(addr, None).activate("m-42");

    let view = wait_until(&session, |view| {
        view.state == SessionState::FailedPermanent && !view.loading_history
    })
    .await;
    assert_eq!(view.error, Some(ChatError::SessionExpired));
    assert!(view.messages.is_empty());
    session.deactivate().await;
}

#[test_timeout::tokio_timeout_test(20)]
async fn policy_close_from_broker_expires_the_session() {
    let (addr, _frames) = start_broker().await;
    let session = client(addr, Some(COOKIE)).activate(KICKED);

    let view = wait_until(&session, |view| view.state == SessionState::FailedPermanent).await;
    assert_eq!(view.error, Some(ChatError::SessionExpired));
    session.deactivate().await;
}
