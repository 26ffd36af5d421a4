//! The forwarding pipeline.
//!
//! A [`Forwarder`] takes one triggering event and runs it through every
//! stage: envelope extraction, recipient resolution, storage fetch, MIME
//! parsing, banner injection, composition and delivery. Each stage failure
//! maps to one [`ForwardError`] variant and ends the operation.

use std::{error::Error, fmt::Display, future::Future, path::PathBuf, sync::Arc};

use tracing::{debug, error, info, warn};

use crate::{
    AddressMapping, AddressRouter, ComposeError, Config, ConfigError, DirectoryMapping,
    EventError, FileObjectStore, FileTransport, InboundEnvelope, InboundEvent, LettreComposer,
    MailParseParser, MailTransport, MessageTransformer, MimeComposer,
    MimeParser, ObjectStore, ParseError, SmtpRelayTransport, StorageConfig, StorageError,
    TransformError, TransportConfig, TransportError,
};

/// Result type for forwarding operations.
pub type ForwardResult<T> = Result<T, ForwardError>;

/// Errors that end a forwarding operation.
#[derive(Debug)]
pub enum ForwardError {
    /// The triggering event is unreadable or carries no record.
    InvalidEvent(EventError),
    /// None of the original recipients has a destination.
    RoutingExhausted { addresses: Vec<String> },
    /// The operation was cancelled before the raw message was fetched.
    Cancelled,
    /// The raw message could not be fetched.
    StorageFetchFailed { key: String, source: StorageError },
    /// The raw message is not a readable MIME message.
    ParseFailed { key: String, source: ParseError },
    /// The parsed message is inconsistent.
    TransformFailed(TransformError),
    /// The outbound message could not be composed.
    ComposeFailed(ComposeError),
    /// The outbound transport did not accept the message.
    TransportFailed(TransportError),
}

impl Display for ForwardError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ForwardError::InvalidEvent(e) => write!(f, "Invalid event: {e}"),
            ForwardError::RoutingExhausted { addresses } => write!(
                f,
                "None of the mails has a mapping: {}",
                addresses.join(", ")
            ),
            ForwardError::Cancelled => write!(f, "Forwarding cancelled"),
            ForwardError::StorageFetchFailed { key, source } => {
                write!(f, "Failed to fetch {key}: {source}")
            }
            ForwardError::ParseFailed { key, source } => {
                write!(f, "Failed to parse {key}: {source}")
            }
            ForwardError::TransformFailed(e) => write!(f, "Malformed message: {e}"),
            ForwardError::ComposeFailed(e) => write!(f, "Failed to compose message: {e}"),
            ForwardError::TransportFailed(e) => write!(f, "Failed to send message: {e}"),
        }
    }
}

impl Error for ForwardError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ForwardError::InvalidEvent(e) => Some(e),
            ForwardError::RoutingExhausted { .. } | ForwardError::Cancelled => None,
            ForwardError::StorageFetchFailed { source, .. } => Some(source),
            ForwardError::ParseFailed { source, .. } => Some(source),
            ForwardError::TransformFailed(e) => Some(e),
            ForwardError::ComposeFailed(e) => Some(e),
            ForwardError::TransportFailed(e) => Some(e),
        }
    }
}

impl From<EventError> for ForwardError {
    fn from(e: EventError) -> Self {
        ForwardError::InvalidEvent(e)
    }
}

/// Forwards stored inbound messages to their translated recipients.
///
/// Holds only immutable state and shared collaborators, so a single
/// instance can serve concurrent operations.
pub struct Forwarder {
    bucket: String,
    router: AddressRouter,
    directories: DirectoryMapping,
    transformer: MessageTransformer,
    store: Arc<dyn ObjectStore>,
    transport: Arc<dyn MailTransport>,
    parser: Arc<dyn MimeParser>,
    composer: Arc<dyn MimeComposer>,
}

impl Forwarder {
    /// Creates a new [`Forwarder`] with the default MIME parser and
    /// composer and no storage directories.
    pub fn new(
        from: String,
        bucket: String,
        mapping: &AddressMapping,
        store: Arc<dyn ObjectStore>,
        transport: Arc<dyn MailTransport>,
    ) -> Self {
        let router = AddressRouter::new(mapping);
        info!(
            bucket = %bucket,
            rules = router.rules().len(),
            store = store.name(),
            transport = transport.name(),
            "Forwarder initialized"
        );
        Self {
            bucket,
            router,
            directories: DirectoryMapping::default(),
            transformer: MessageTransformer::new(from),
            store,
            transport,
            parser: Arc::new(MailParseParser),
            composer: Arc::new(LettreComposer),
        }
    }

    /// Builds the forwarder and its collaborators from configuration.
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let store: Arc<dyn ObjectStore> = match &config.storage {
            StorageConfig::File { path } => Arc::new(FileObjectStore::new(PathBuf::from(path))),
        };
        let transport: Arc<dyn MailTransport> = match &config.transport {
            TransportConfig::Smtp {
                host,
                port,
                starttls,
                username,
                password,
            } => {
                let credentials = username.clone().zip(password.clone());
                let transport = SmtpRelayTransport::new(host, *port, *starttls, credentials)
                    .map_err(|e| ConfigError::Invalid(format!("transport: {e}")))?;
                Arc::new(transport)
            }
            TransportConfig::File { path } => Arc::new(FileTransport::new(PathBuf::from(path))),
        };
        Ok(Self::new(
            config.forward.from.clone(),
            config.forward.bucket.clone(),
            &config.mappings,
            store,
            transport,
        )
        .with_directories(config.directories.clone()))
    }

    /// Sets the mailbox to storage directory table.
    pub fn with_directories(mut self, directories: DirectoryMapping) -> Self {
        self.directories = directories;
        self
    }

    /// Replaces the MIME parser.
    pub fn with_parser(mut self, parser: Arc<dyn MimeParser>) -> Self {
        self.parser = parser;
        self
    }

    /// Replaces the MIME composer.
    pub fn with_composer(mut self, composer: Arc<dyn MimeComposer>) -> Self {
        self.composer = composer;
        self
    }

    pub fn router(&self) -> &AddressRouter {
        &self.router
    }

    /// Parses a JSON event and forwards the message it refers to.
    pub async fn handle_event(&self, payload: &str) -> ForwardResult<String> {
        self.handle_event_until(payload, std::future::pending()).await
    }

    /// Same as [`Forwarder::handle_event`] but gives up when `cancel`
    /// completes before the raw message is fetched.
    pub async fn handle_event_until<C>(&self, payload: &str, cancel: C) -> ForwardResult<String>
    where
        C: Future<Output = ()>,
    {
        let event = InboundEvent::from_json(payload).map_err(|e| {
            error!(error = %e, "Unreadable event");
            ForwardError::InvalidEvent(e)
        })?;
        self.forward_until(&event, cancel).await
    }

    /// Forwards the message the event refers to.
    ///
    /// Returns a confirmation naming the original and the resolved
    /// recipients.
    pub async fn forward(&self, event: &InboundEvent) -> ForwardResult<String> {
        self.forward_until(event, std::future::pending()).await
    }

    /// Forwards the message, aborting with [`ForwardError::Cancelled`] when
    /// `cancel` completes before the storage fetch does.
    ///
    /// Recipients are resolved before storage is touched, an unroutable
    /// message never causes a fetch.
    pub async fn forward_until<C>(&self, event: &InboundEvent, cancel: C) -> ForwardResult<String>
    where
        C: Future<Output = ()>,
    {
        let envelope = event.envelope()?;
        let recipients = self.router.resolve_all(&envelope);
        if recipients.is_empty() {
            let addresses = envelope.addresses();
            warn!(
                message_id = %envelope.message_id,
                addresses = %addresses.join(", "),
                "None of the mails has a mapping"
            );
            return Err(ForwardError::RoutingExhausted { addresses });
        }

        let key = self
            .directories
            .key_for(envelope.destination.as_deref(), &envelope.message_id);
        debug!(bucket = %self.bucket, key = %key, "Fetching raw message");
        let raw = tokio::select! {
            biased;
            _ = cancel => {
                warn!(key = %key, "Forwarding cancelled before fetch completed");
                return Err(ForwardError::Cancelled);
            }
            result = self.store.get(&self.bucket, &key) => result.map_err(|e| {
                error!(bucket = %self.bucket, key = %key, error = %e, "Failed to fetch raw message");
                ForwardError::StorageFetchFailed { key: key.clone(), source: e }
            })?,
        };

        let parsed = self.parser.parse(&raw).map_err(|e| {
            error!(key = %key, error = %e, "Failed to parse raw message");
            ForwardError::ParseFailed {
                key: key.clone(),
                source: e,
            }
        })?;

        let confirmation = confirmation(&envelope, &recipients.all());
        let outbound = self
            .transformer
            .transform(parsed, recipients, &envelope)
            .map_err(|e| {
                error!(key = %key, error = %e, "Malformed parsed message");
                ForwardError::TransformFailed(e)
            })?;

        let composed = self.composer.compose(&outbound).map_err(|e| {
            error!(key = %key, error = %e, "Failed to compose message");
            ForwardError::ComposeFailed(e)
        })?;

        let receipt = self.transport.send_raw(&composed).await.map_err(|e| {
            error!(key = %key, error = %e, "Failed to send message");
            ForwardError::TransportFailed(e)
        })?;

        info!(
            key = %key,
            receipt = %receipt.id,
            recipients = composed.envelope_to.len(),
            "Forwarded message"
        );
        Ok(confirmation)
    }
}

impl std::fmt::Debug for Forwarder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Forwarder")
            .field("bucket", &self.bucket)
            .field("router", &self.router)
            .field("store", &self.store.name())
            .field("transport", &self.transport.name())
            .field("parser", &self.parser.name())
            .field("composer", &self.composer.name())
            .finish()
    }
}

fn confirmation(envelope: &InboundEnvelope, resolved: &[&str]) -> String {
    format!(
        "Forwarded e-mail for {} to {}",
        envelope.to.join(", "),
        resolved.join(", ")
    )
}
