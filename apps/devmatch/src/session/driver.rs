//! The task that owns one chat activation. Every event for the activation
//! (caller commands, the history fetch, transport traffic, timers) is handled
//! by one `select!` loop, so the state below needs no locking.

use std::future::{Future, pending};
use std::sync::Arc;
use std::time::Duration;

use devmatch_api::ChatMessage;
use futures_util::future::BoxFuture;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::history::{DEFAULT_HISTORY_LIMIT, FetchError, HistorySource};
use super::reconciler::MessageLog;
use super::reconnect::{
    FailureKind, ReconnectPolicy, classify_close, classify_connect_error, classify_error_frame,
};
use super::state::{ConnectionMachine, Transition};
use super::view::{ChatError, ChatView};
use crate::protocol::chat::{self, DeliveryError};
use crate::protocol::heartbeat::{HeartBeat, HeartbeatMonitor};
use crate::protocol::stomp::{self, Command, Frame};
use crate::transport::{Transport, TransportError, TransportEvent, TransportLink};

pub const DEFAULT_HEARTBEAT: Duration = Duration::from_millis(10_000);
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Tunables for every session a client activates.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub history_limit: usize,
    pub reconnect: ReconnectPolicy,
    pub heart_beat: HeartBeat,
    pub handshake_timeout: Duration,
    /// Virtual host named in the STOMP `CONNECT` frame.
    pub stomp_host: Option<String>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            history_limit: DEFAULT_HISTORY_LIMIT,
            reconnect: ReconnectPolicy::default(),
            heart_beat: HeartBeat::new(DEFAULT_HEARTBEAT, DEFAULT_HEARTBEAT),
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            stomp_host: None,
        }
    }
}

#[derive(Debug)]
pub(crate) enum SessionCommand {
    Send(String),
    Shutdown,
}

enum Wakeup {
    Command(Option<SessionCommand>),
    History(Result<Vec<ChatMessage>, FetchError>),
    Connected(Result<TransportLink, TransportError>),
    Transport(TransportEvent),
    RetryDue,
    HandshakeExpired,
    HeartbeatDue,
}

pub(crate) struct SessionDriver {
    conversation_id: String,
    subscription_id: String,
    transport: Arc<dyn Transport>,
    history_source: Arc<dyn HistorySource>,
    options: SessionOptions,
    machine: ConnectionMachine,
    log: MessageLog,
    view: watch::Sender<ChatView>,
    commands: mpsc::UnboundedReceiver<SessionCommand>,
    history: Option<BoxFuture<'static, Result<Vec<ChatMessage>, FetchError>>>,
    connecting: Option<BoxFuture<'static, Result<TransportLink, TransportError>>>,
    link: Option<TransportLink>,
    /// Close of the previous link, still finishing its closing handshake.
    closing: Option<JoinHandle<()>>,
    retry_at: Option<Instant>,
    handshake_deadline: Option<Instant>,
    heartbeat: Option<HeartbeatMonitor>,
}

impl SessionDriver {
    pub(crate) fn new(
        conversation_id: String,
        transport: Arc<dyn Transport>,
        history_source: Arc<dyn HistorySource>,
        options: SessionOptions,
        view: watch::Sender<ChatView>,
        commands: mpsc::UnboundedReceiver<SessionCommand>,
    ) -> Self {
        let machine = ConnectionMachine::new(options.reconnect);
        Self {
            subscription_id: format!("sub-{}", Uuid::new_v4().simple()),
            conversation_id,
            transport,
            history_source,
            options,
            machine,
            log: MessageLog::new(),
            view,
            commands,
            history: None,
            connecting: None,
            link: None,
            closing: None,
            retry_at: None,
            handshake_deadline: None,
            heartbeat: None,
        }
    }

    pub(crate) async fn run(mut self) {
        self.start();
        loop {
            let heartbeat_due = self.heartbeat.as_ref().and_then(HeartbeatMonitor::next_due);
            let wakeup = tokio::select! {
                command = self.commands.recv() => Wakeup::Command(command),
                result = poll_slot(&mut self.history) => Wakeup::History(result),
                result = poll_slot(&mut self.connecting) => Wakeup::Connected(result),
                event = next_link_event(&mut self.link) => Wakeup::Transport(event),
                _ = sleep_until_opt(self.retry_at) => Wakeup::RetryDue,
                _ = sleep_until_opt(self.handshake_deadline) => Wakeup::HandshakeExpired,
                _ = sleep_until_opt(heartbeat_due) => Wakeup::HeartbeatDue,
            };

            match wakeup {
                Wakeup::Command(Some(SessionCommand::Send(content))) => self.publish(&content),
                Wakeup::Command(Some(SessionCommand::Shutdown)) | Wakeup::Command(None) => {
                    self.shutdown().await;
                    break;
                }
                Wakeup::History(result) => self.on_history(result),
                Wakeup::Connected(result) => self.on_connected(result),
                Wakeup::Transport(event) => self.on_transport(event),
                Wakeup::RetryDue => {
                    self.retry_at = None;
                    self.finish_closing().await;
                    self.connect();
                }
                Wakeup::HandshakeExpired => {
                    warn!(
                        target: "devmatch::session",
                        conversation = %self.conversation_id,
                        timeout_ms = self.options.handshake_timeout.as_millis() as u64,
                        "handshake did not complete in time"
                    );
                    self.fail(FailureKind::Transient);
                }
                Wakeup::HeartbeatDue => self.on_heartbeat(),
            }
        }
    }

    fn start(&mut self) {
        info!(
            target: "devmatch::session",
            conversation = %self.conversation_id,
            "activating chat session"
        );
        let source = self.history_source.clone();
        let conversation_id = self.conversation_id.clone();
        let limit = self.options.history_limit;
        self.history = Some(Box::pin(async move {
            source.load_history(&conversation_id, limit).await
        }));
        self.view.send_modify(|view| {
            view.conversation_id = Some(self.conversation_id.clone());
            view.loading_history = true;
        });
        self.connect();
    }

    fn connect(&mut self) {
        if !self.machine.begin_connect() {
            return;
        }
        debug!(
            target: "devmatch::session",
            conversation = %self.conversation_id,
            attempt = self.machine.attempts(),
            "connecting"
        );
        let transport = self.transport.clone();
        self.connecting = Some(Box::pin(async move { transport.connect().await }));
        self.handshake_deadline = Some(Instant::now() + self.options.handshake_timeout);
        self.publish_state();
    }

    fn on_history(&mut self, result: Result<Vec<ChatMessage>, FetchError>) {
        match result {
            Ok(batch) => {
                let fetched = batch.len();
                let added = self.log.merge_history(batch).to_vec();
                debug!(
                    target: "devmatch::history",
                    conversation = %self.conversation_id,
                    fetched,
                    added = added.len(),
                    "history merged"
                );
                self.view.send_modify(|view| {
                    view.messages.extend(added);
                    view.loading_history = false;
                });
            }
            Err(err) => {
                warn!(
                    target: "devmatch::history",
                    conversation = %self.conversation_id,
                    error = %err,
                    "history fetch failed"
                );
                // A permanent session failure outranks a history error.
                self.view.send_modify(|view| {
                    view.loading_history = false;
                    if view.error.is_none() {
                        view.error = Some(ChatError::History(err.to_string()));
                    }
                });
            }
        }
    }

    fn on_connected(&mut self, result: Result<TransportLink, TransportError>) {
        match result {
            Ok(link) => {
                let connect = chat::connect_frame(
                    self.options.stomp_host.as_deref(),
                    self.options.heart_beat,
                );
                if let Err(err) = link.send(connect.encode()) {
                    warn!(target: "devmatch::session", error = %err, "could not send CONNECT");
                    self.fail(FailureKind::Transient);
                    return;
                }
                debug!(target: "devmatch::session", "transport open; CONNECT sent");
                self.link = Some(link);
            }
            Err(err) => {
                let kind = classify_connect_error(&err);
                warn!(
                    target: "devmatch::session",
                    conversation = %self.conversation_id,
                    error = %err,
                    ?kind,
                    "transport connect failed"
                );
                self.fail(kind);
            }
        }
    }

    fn on_transport(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Text(text) => {
                if let Some(monitor) = self.heartbeat.as_mut() {
                    monitor.saw_inbound(Instant::now());
                }
                for decoded in stomp::decode(&text) {
                    match decoded {
                        Ok(frame) => self.on_frame(frame),
                        Err(err) => {
                            warn!(target: "devmatch::session", error = %err, "dropping malformed frame");
                        }
                    }
                    if self.link.is_none() {
                        break;
                    }
                }
            }
            TransportEvent::Closed(reason) => {
                let kind = classify_close(&reason);
                info!(
                    target: "devmatch::session",
                    conversation = %self.conversation_id,
                    code = ?reason.code,
                    reason = %reason.reason,
                    ?kind,
                    "transport closed"
                );
                self.fail(kind);
            }
        }
    }

    fn on_frame(&mut self, frame: Frame) {
        match frame.command {
            Command::Connected => self.on_handshake(&frame),
            Command::Message => self.on_delivery(&frame),
            Command::Error => {
                let kind = classify_error_frame(&frame);
                warn!(
                    target: "devmatch::session",
                    conversation = %self.conversation_id,
                    message = frame.get("message").unwrap_or_default(),
                    ?kind,
                    "broker sent ERROR"
                );
                self.fail(kind);
            }
            Command::Receipt => {
                debug!(target: "devmatch::session", receipt = ?frame.get("receipt-id"), "receipt");
            }
            other => {
                debug!(target: "devmatch::session", command = %other, "ignoring unexpected frame");
            }
        }
    }

    fn on_handshake(&mut self, frame: &Frame) {
        if self.machine.is_active() {
            debug!(target: "devmatch::session", "duplicate CONNECTED ignored");
            return;
        }
        self.machine.handshake_accepted();
        self.handshake_deadline = None;

        let server_beat = match frame.get("heart-beat").map(HeartBeat::parse).transpose() {
            Ok(beat) => beat.unwrap_or_else(HeartBeat::disabled),
            Err(err) => {
                warn!(target: "devmatch::session", error = %err, "ignoring server heart-beat");
                HeartBeat::disabled()
            }
        };
        let negotiated = HeartBeat::negotiate(self.options.heart_beat, server_beat);
        self.heartbeat = Some(HeartbeatMonitor::new(negotiated, Instant::now()));

        let subscribe = chat::subscribe_frame(&self.conversation_id, &self.subscription_id);
        if let Some(link) = &self.link {
            if let Err(err) = link.send(subscribe.encode()) {
                warn!(target: "devmatch::session", error = %err, "could not send SUBSCRIBE");
            }
        }
        info!(
            target: "devmatch::session",
            conversation = %self.conversation_id,
            version = frame.get("version").unwrap_or("1.0"),
            send_every_ms = negotiated.send_every.map(|d| d.as_millis() as u64),
            expect_every_ms = negotiated.expect_every.map(|d| d.as_millis() as u64),
            "chat session active"
        );
        self.publish_state();
    }

    fn on_delivery(&mut self, frame: &Frame) {
        match chat::parse_delivery(frame, &self.conversation_id, &self.subscription_id) {
            Ok(message) => {
                if let Some(appended) = self.log.append(message) {
                    let appended = appended.clone();
                    self.view.send_modify(|view| view.messages.push(appended));
                } else {
                    debug!(target: "devmatch::session", "duplicate delivery dropped");
                }
            }
            Err(DeliveryError::ForeignSubscription(subscription)) => {
                debug!(target: "devmatch::session", %subscription, "delivery for another subscription");
            }
            Err(err) => {
                warn!(
                    target: "devmatch::session",
                    conversation = %self.conversation_id,
                    error = %err,
                    "dropping malformed delivery"
                );
            }
        }
    }

    fn on_heartbeat(&mut self) {
        let Some(monitor) = self.heartbeat.as_mut() else {
            return;
        };
        let due = monitor.poll(Instant::now());
        if due.expired {
            warn!(
                target: "devmatch::session",
                conversation = %self.conversation_id,
                "no traffic from broker within heart-beat tolerance"
            );
            self.fail(FailureKind::Transient);
            return;
        }
        if due.send {
            if let Some(link) = &self.link {
                if let Err(err) = link.send(stomp::HEARTBEAT.to_string()) {
                    debug!(target: "devmatch::session", error = %err, "heart-beat not sent");
                }
            }
        }
    }

    fn publish(&mut self, content: &str) {
        let link = match &self.link {
            Some(link) if self.machine.is_active() => link,
            _ => {
                info!(
                    target: "devmatch::session",
                    conversation = %self.conversation_id,
                    state = %self.machine.state(),
                    "session not active; message not sent"
                );
                return;
            }
        };
        let frame = match chat::send_frame(&self.conversation_id, content) {
            Ok(frame) => frame,
            Err(err) => {
                warn!(target: "devmatch::session", error = %err, "could not encode message");
                return;
            }
        };
        if let Err(err) = link.send(frame.encode()) {
            warn!(target: "devmatch::session", error = %err, "message not sent");
        }
    }

    /// Tears down the current connection and records the failure.
    fn fail(&mut self, kind: FailureKind) {
        self.drop_connection();
        match self.machine.fail(kind) {
            Some(Transition::Retry { attempt, delay }) => {
                info!(
                    target: "devmatch::session",
                    conversation = %self.conversation_id,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "scheduling reconnect"
                );
                self.retry_at = Some(Instant::now() + delay);
            }
            Some(Transition::Permanent(cause)) => {
                warn!(
                    target: "devmatch::session",
                    conversation = %self.conversation_id,
                    ?cause,
                    "chat session failed permanently"
                );
                self.retry_at = None;
                self.view
                    .send_modify(|view| view.error = Some(ChatError::from(cause)));
            }
            None => {}
        }
        self.publish_state();
    }

    fn drop_connection(&mut self) {
        self.connecting = None;
        self.handshake_deadline = None;
        self.heartbeat = None;
        if let Some(link) = self.link.take() {
            self.closing = Some(tokio::spawn(link.close()));
        }
    }

    /// Waits out the previous link's close so two connections never overlap.
    async fn finish_closing(&mut self) {
        if let Some(closing) = self.closing.take() {
            let _ = closing.await;
        }
    }

    async fn shutdown(&mut self) {
        info!(
            target: "devmatch::session",
            conversation = %self.conversation_id,
            "deactivating chat session"
        );
        self.retry_at = None;
        self.history = None;
        self.connecting = None;
        self.handshake_deadline = None;
        self.heartbeat = None;
        self.finish_closing().await;
        if let Some(link) = self.link.take() {
            if self.machine.is_active() {
                let _ = link.send(chat::disconnect_frame().encode());
            }
            link.close().await;
        }
        self.machine.deactivate();
        self.log = MessageLog::new();
        self.view.send_replace(ChatView::default());
    }

    fn publish_state(&self) {
        let state = self.machine.state();
        self.view.send_if_modified(|view| {
            let changed = view.state != state;
            view.state = state;
            changed
        });
    }
}

async fn poll_slot<T>(slot: &mut Option<BoxFuture<'static, T>>) -> T {
    match slot.as_mut() {
        Some(fut) => {
            let output = fut.await;
            *slot = None;
            output
        }
        None => pending().await,
    }
}

async fn next_link_event(link: &mut Option<TransportLink>) -> TransportEvent {
    match link {
        Some(link) => link.next_event().await,
        None => pending().await,
    }
}

fn sleep_until_opt(deadline: Option<Instant>) -> impl Future<Output = ()> {
    async move {
        match deadline {
            Some(at) => tokio::time::sleep_until(at).await,
            None => pending().await,
        }
    }
}
