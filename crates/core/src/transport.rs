use std::fmt::Display;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

use crate::{ComposedMessage, DeliveryReceipt};

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// Boxed future type for transport operations, enabling object safety.
pub type TransportFuture<'a> =
    Pin<Box<dyn Future<Output = TransportResult<DeliveryReceipt>> + Send + 'a>>;

/// Errors that can occur while handing a message to the outbound transport.
#[derive(Debug)]
pub enum TransportError {
    /// An envelope address is not acceptable to the transport.
    Envelope(String),
    /// The transport could not be reached or dropped the connection.
    Connection(String),
    /// The transport refused the message.
    Rejected(String),
    /// An I/O error occurred.
    Io(std::io::Error),
}

impl Display for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportError::Envelope(msg) => write!(f, "Envelope error: {msg}"),
            TransportError::Connection(msg) => write!(f, "Connection error: {msg}"),
            TransportError::Rejected(msg) => write!(f, "Message rejected: {msg}"),
            TransportError::Io(e) => write!(f, "I/O error: {e}"),
        }
    }
}

impl std::error::Error for TransportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TransportError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for TransportError {
    fn from(e: std::io::Error) -> Self {
        TransportError::Io(e)
    }
}

/// Outbound delivery of already composed messages.
pub trait MailTransport: Send + Sync {
    /// Sends the raw message to its envelope recipients.
    fn send_raw<'a>(&'a self, message: &'a ComposedMessage) -> TransportFuture<'a>;

    /// Returns the name of this transport.
    fn name(&self) -> &str;
}

/// Transport that keeps every message in memory.
///
/// Useful for testing, it can also be switched to refuse messages.
#[derive(Debug, Default)]
pub struct MemoryTransport {
    sent: RwLock<Vec<ComposedMessage>>,
    reject: AtomicBool,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every following send fail with [`TransportError::Rejected`].
    pub fn reject_all(&self, reject: bool) {
        self.reject.store(reject, Ordering::SeqCst);
    }

    /// Returns a copy of the messages accepted so far.
    pub fn sent(&self) -> Vec<ComposedMessage> {
        self.sent.read().unwrap().clone()
    }

    pub fn sent_count(&self) -> usize {
        self.sent.read().unwrap().len()
    }
}

impl MailTransport for MemoryTransport {
    fn send_raw<'a>(&'a self, message: &'a ComposedMessage) -> TransportFuture<'a> {
        Box::pin(async move {
            if self.reject.load(Ordering::SeqCst) {
                return Err(TransportError::Rejected("554 Transaction failed".to_string()));
            }
            let mut sent = self.sent.write().unwrap();
            sent.push(message.clone());
            Ok(DeliveryReceipt {
                id: format!("memory-{}", sent.len()),
            })
        })
    }

    fn name(&self) -> &str {
        "memory"
    }
}
