//! SMTP relay transport.
//!
//! Provides [`SmtpRelayTransport`], a [`MailTransport`](crate::MailTransport)
//! that hands composed messages to an upstream SMTP server through
//! `lettre`'s async transport.

use lettre::address::{Address, Envelope};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Tokio1Executor};
use tracing::{debug, error, info};

use crate::{
    transport::{MailTransport, TransportError, TransportFuture, TransportResult},
    ComposedMessage, DeliveryReceipt,
};

/// Mail transport relaying through an SMTP server.
pub struct SmtpRelayTransport {
    host: String,
    port: u16,
    mailer: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpRelayTransport {
    /// Creates a new [`SmtpRelayTransport`] for `host:port`.
    ///
    /// With `starttls` the connection is upgraded before any credentials
    /// are sent, otherwise the relay is used in plain text.
    pub fn new(
        host: &str,
        port: u16,
        starttls: bool,
        credentials: Option<(String, String)>,
    ) -> TransportResult<Self> {
        let mut builder = if starttls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
                .map_err(|e| TransportError::Connection(e.to_string()))?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host)
        };
        builder = builder.port(port);
        let authenticated = credentials.is_some();
        if let Some((username, password)) = credentials {
            builder = builder.credentials(Credentials::new(username, password));
        }
        info!(
            host = %host,
            port = port,
            starttls = starttls,
            authenticated = authenticated,
            "SMTP relay transport initialized"
        );
        Ok(Self {
            host: host.to_string(),
            port,
            mailer: builder.build(),
        })
    }

    /// Returns the relay host.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Returns the relay port.
    pub fn port(&self) -> u16 {
        self.port
    }
}

impl std::fmt::Debug for SmtpRelayTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpRelayTransport")
            .field("host", &self.host)
            .field("port", &self.port)
            .finish()
    }
}

impl MailTransport for SmtpRelayTransport {
    fn send_raw<'a>(&'a self, message: &'a ComposedMessage) -> TransportFuture<'a> {
        Box::pin(async move {
            let envelope = smtp_envelope(message)?;
            debug!(
                host = %self.host,
                from = %message.envelope_from,
                recipients = message.envelope_to.len(),
                size = message.raw.len(),
                "Relaying message"
            );
            let response = self
                .mailer
                .send_raw(&envelope, &message.raw)
                .await
                .map_err(|e| {
                    error!(host = %self.host, error = %e, "Failed to relay message");
                    if e.is_permanent() {
                        TransportError::Rejected(e.to_string())
                    } else {
                        TransportError::Connection(e.to_string())
                    }
                })?;
            let id = response.message().collect::<Vec<_>>().join(" ");
            Ok(DeliveryReceipt {
                id: if id.is_empty() {
                    response.code().to_string()
                } else {
                    id
                },
            })
        })
    }

    fn name(&self) -> &str {
        "smtp"
    }
}

/// Builds the SMTP envelope from the composed message addresses.
fn smtp_envelope(message: &ComposedMessage) -> TransportResult<Envelope> {
    let parse = |address: &str| {
        address
            .parse::<Address>()
            .map_err(|e| TransportError::Envelope(format!("{address}: {e}")))
    };
    let from = parse(message.envelope_from.as_str())?;
    let to = message
        .envelope_to
        .iter()
        .map(|address| parse(address.as_str()))
        .collect::<TransportResult<Vec<_>>>()?;
    Envelope::new(Some(from), to).map_err(|e| TransportError::Envelope(e.to_string()))
}
