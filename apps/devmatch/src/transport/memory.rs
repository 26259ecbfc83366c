//! In-process transport whose far end is driven by hand. Each successful
//! connect hands a [`RemoteEnd`] to the paired [`MemoryServer`].

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::{CloseReason, Transport, TransportError, TransportEvent, TransportLink};
use crate::protocol::stomp::{self, Frame};

#[derive(Debug)]
struct Shared {
    accepted: mpsc::UnboundedSender<RemoteEnd>,
    refusals: Mutex<VecDeque<TransportError>>,
    attempts: AtomicUsize,
    linger: Mutex<Duration>,
}

#[derive(Debug, Clone)]
pub struct MemoryTransport {
    shared: Arc<Shared>,
}

/// Accepting side of a [`MemoryTransport`].
#[derive(Debug)]
pub struct MemoryServer {
    incoming: mpsc::UnboundedReceiver<RemoteEnd>,
    shared: Arc<Shared>,
}

impl MemoryTransport {
    pub fn pair() -> (MemoryTransport, MemoryServer) {
        let (accepted, incoming) = mpsc::unbounded_channel();
        let shared = Arc::new(Shared {
            accepted,
            refusals: Mutex::new(VecDeque::new()),
            attempts: AtomicUsize::new(0),
            linger: Mutex::new(Duration::ZERO),
        });
        (
            MemoryTransport {
                shared: shared.clone(),
            },
            MemoryServer { incoming, shared },
        )
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn connect(&self) -> Result<TransportLink, TransportError> {
        self.shared.attempts.fetch_add(1, Ordering::SeqCst);
        let refusal = self
            .shared
            .refusals
            .lock()
            .ok()
            .and_then(|mut refusals| refusals.pop_front());
        if let Some(err) = refusal {
            return Err(err);
        }

        let (outbound, mut pending) = mpsc::unbounded_channel::<String>();
        let (to_server, from_client) = mpsc::unbounded_channel();
        let (to_client, from_server) = mpsc::unbounded_channel();
        self.shared
            .accepted
            .send(RemoteEnd {
                from_client,
                to_client,
            })
            .map_err(|_| TransportError::Closed)?;

        // The remote sees the client go away only once this pump ends.
        let linger = self
            .shared
            .linger
            .lock()
            .map(|linger| *linger)
            .unwrap_or_default();
        let pump = tokio::spawn(async move {
            while let Some(text) = pending.recv().await {
                if to_server.send(text).is_err() {
                    break;
                }
            }
            tokio::time::sleep(linger).await;
        });
        Ok(TransportLink::new(outbound, from_server, Some(pump)))
    }
}

impl MemoryServer {
    /// Waits for the next connection the client opens.
    pub async fn accept(&mut self) -> Option<RemoteEnd> {
        self.incoming.recv().await
    }

    pub fn try_accept(&mut self) -> Option<RemoteEnd> {
        self.incoming.try_recv().ok()
    }

    /// Makes the next connect attempt fail with `err`.
    pub fn refuse_next(&self, err: TransportError) {
        if let Ok(mut refusals) = self.shared.refusals.lock() {
            refusals.push_back(err);
        }
    }

    /// Keeps every later connection alive for `linger` after the client
    /// starts closing it, like a slow closing handshake.
    pub fn linger_on_close(&self, linger: Duration) {
        if let Ok(mut current) = self.shared.linger.lock() {
            *current = linger;
        }
    }

    pub fn connect_attempts(&self) -> usize {
        self.shared.attempts.load(Ordering::SeqCst)
    }
}

/// The server side of one memory connection.
#[derive(Debug)]
pub struct RemoteEnd {
    from_client: mpsc::UnboundedReceiver<String>,
    to_client: mpsc::UnboundedSender<TransportEvent>,
}

impl RemoteEnd {
    /// Next text the client wrote, or `None` once the client closed.
    pub async fn recv(&mut self) -> Option<String> {
        self.from_client.recv().await
    }

    pub fn try_recv(&mut self) -> Option<String> {
        self.from_client.try_recv().ok()
    }

    /// Next STOMP frame the client wrote, skipping heart-beats and
    /// undecodable text.
    pub async fn recv_frame(&mut self) -> Option<Frame> {
        loop {
            let text = self.recv().await?;
            if let Some(Ok(frame)) = stomp::decode(&text).into_iter().next() {
                return Some(frame);
            }
        }
    }

    pub fn send(&self, text: impl Into<String>) -> bool {
        self.to_client
            .send(TransportEvent::Text(text.into()))
            .is_ok()
    }

    pub fn send_frame(&self, frame: &Frame) -> bool {
        self.send(frame.encode())
    }

    pub fn close(self, reason: CloseReason) {
        let _ = self.to_client.send(TransportEvent::Closed(reason));
    }

    /// True once the client has dropped or closed its side.
    pub fn is_closed(&self) -> bool {
        self.to_client.is_closed()
    }
}
