//! Caller-facing handles: a [`ChatClient`] activates sessions, a
//! [`ChatSession`] is one running activation, and a [`ChatController`]
//! follows the conversation the user is currently looking at.

use std::sync::Arc;

use devmatch_api::ApiClient;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::config::{Config, ConfigError};
use crate::session::driver::{SessionCommand, SessionDriver};
use crate::session::{ChatView, HistorySource, SessionOptions};
use crate::transport::{Transport, WebSocketConfig, WebSocketTransport};

#[derive(Clone)]
pub struct ChatClient {
    transport: Arc<dyn Transport>,
    history: Arc<dyn HistorySource>,
    options: SessionOptions,
}

impl ChatClient {
    pub fn new(
        transport: Arc<dyn Transport>,
        history: Arc<dyn HistorySource>,
        options: SessionOptions,
    ) -> Self {
        Self {
            transport,
            history,
            options,
        }
    }

    /// WebSocket transport and HTTP history, both carrying the configured
    /// session cookie.
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let api = ApiClient::new(config.api_config()?)?;
        let websocket = WebSocketConfig::new(config.websocket_url()?)
            .with_cookie(config.session_cookie.clone());
        Ok(Self::new(
            Arc::new(WebSocketTransport::new(websocket)),
            Arc::new(api),
            config.session_options()?,
        ))
    }

    /// Starts a fresh activation for `conversation_id`. Must be called from
    /// within a tokio runtime.
    pub fn activate(&self, conversation_id: impl Into<String>) -> ChatSession {
        let conversation_id = conversation_id.into();
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (view_tx, view_rx) = watch::channel(ChatView {
            conversation_id: Some(conversation_id.clone()),
            loading_history: true,
            ..ChatView::default()
        });
        let driver = SessionDriver::new(
            conversation_id.clone(),
            self.transport.clone(),
            self.history.clone(),
            self.options.clone(),
            view_tx,
            commands_rx,
        );
        let task = tokio::spawn(driver.run());
        ChatSession {
            conversation_id,
            commands: commands_tx,
            view: view_rx,
            task: Some(task),
        }
    }
}

/// A running activation. Dropping it deactivates the session in the
/// background; [`deactivate`](Self::deactivate) waits for the teardown.
pub struct ChatSession {
    conversation_id: String,
    commands: mpsc::UnboundedSender<SessionCommand>,
    view: watch::Receiver<ChatView>,
    task: Option<JoinHandle<()>>,
}

impl ChatSession {
    pub fn conversation_id(&self) -> &str {
        &self.conversation_id
    }

    /// Publishes `content` if the session is active; otherwise does nothing.
    pub fn send(&self, content: impl Into<String>) {
        if self
            .commands
            .send(SessionCommand::Send(content.into()))
            .is_err()
        {
            debug!(target: "devmatch::session", "send after session ended ignored");
        }
    }

    pub fn view(&self) -> ChatView {
        self.view.borrow().clone()
    }

    pub fn is_connected(&self) -> bool {
        self.view.borrow().is_connected()
    }

    /// A receiver that is notified whenever the view changes.
    pub fn watch(&self) -> watch::Receiver<ChatView> {
        self.view.clone()
    }

    pub async fn deactivate(mut self) {
        let _ = self.commands.send(SessionCommand::Shutdown);
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

/// Keeps exactly one session alive for the conversation currently selected.
pub struct ChatController {
    client: ChatClient,
    session: Option<ChatSession>,
}

impl ChatController {
    pub fn new(client: ChatClient) -> Self {
        Self {
            client,
            session: None,
        }
    }

    /// Switches to `conversation_id`. The previous session is fully torn
    /// down before the next one starts; selecting the current conversation
    /// again changes nothing.
    pub async fn set_conversation(&mut self, conversation_id: Option<&str>) {
        let current = self.session.as_ref().map(ChatSession::conversation_id);
        if current == conversation_id {
            return;
        }
        if let Some(session) = self.session.take() {
            session.deactivate().await;
        }
        self.session = conversation_id.map(|id| self.client.activate(id));
    }

    pub fn session(&self) -> Option<&ChatSession> {
        self.session.as_ref()
    }

    pub fn send(&self, content: impl Into<String>) {
        match &self.session {
            Some(session) => session.send(content),
            None => debug!(target: "devmatch::session", "no conversation selected; send ignored"),
        }
    }

    pub fn view(&self) -> ChatView {
        self.session
            .as_ref()
            .map(ChatSession::view)
            .unwrap_or_default()
    }
}
