/*
[INPUT]:  Out-of-band signals raised by the HTTP transport collaborator
[OUTPUT]: Broadcast transport events consumed by the session facade
[POS]:    Session layer - event bridge between transport and session state
[UPDATE]: When the transport raises new signals or changes their payload
*/

use tokio::sync::broadcast;
use tracing::debug;

use crate::types::TokenTriad;

const DEFAULT_CAPACITY: usize = 32;

/// Signals the transport raises independently of the session's own calls
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// The transport renewed the credentials itself after a failed call
    TokensRefreshed(TokenTriad),
    /// Authentication failed beyond recovery. Informational unless `should_logout`.
    AuthenticationFailed { should_logout: bool, reason: String },
}

/// Anything the session can subscribe to for transport events
pub trait AuthEventSource: Send + Sync {
    fn subscribe(&self) -> broadcast::Receiver<TransportEvent>;
}

/// Broadcast hub owned by the transport layer
#[derive(Debug, Clone)]
pub struct TransportEvents {
    tx: broadcast::Sender<TransportEvent>,
}

impl TransportEvents {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Publish an event; returns how many subscribers received it
    pub fn publish(&self, event: TransportEvent) -> usize {
        match self.tx.send(event) {
            Ok(receivers) => receivers,
            Err(_) => {
                debug!("transport event dropped, no subscribers");
                0
            }
        }
    }

    pub fn tokens_refreshed(&self, tokens: TokenTriad) -> usize {
        self.publish(TransportEvent::TokensRefreshed(tokens))
    }

    pub fn authentication_failed(&self, should_logout: bool, reason: impl Into<String>) -> usize {
        self.publish(TransportEvent::AuthenticationFailed {
            should_logout,
            reason: reason.into(),
        })
    }
}

impl Default for TransportEvents {
    fn default() -> Self {
        Self::new()
    }
}

impl AuthEventSource for TransportEvents {
    fn subscribe(&self) -> broadcast::Receiver<TransportEvent> {
        self.tx.subscribe()
    }
}
