//! Outbox directory transport.
//!
//! Provides [`FileTransport`], which writes each composed message as an
//! `.eml` file instead of delivering it. Handy for dry runs and for
//! inspecting forwarded output.

use std::path::PathBuf;

use tokio::fs;
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    transport::{MailTransport, TransportFuture},
    ComposedMessage, DeliveryReceipt,
};

/// Mail transport storing messages as `{outbox}/{uuid}.eml`.
#[derive(Debug, Clone)]
pub struct FileTransport {
    outbox: PathBuf,
}

impl FileTransport {
    /// Creates a new [`FileTransport`] writing into `outbox`.
    pub fn new(outbox: PathBuf) -> Self {
        info!(path = %outbox.display(), "File transport initialized");
        Self { outbox }
    }

    /// Returns the path of the message file for a receipt id.
    pub fn message_path(&self, id: &str) -> PathBuf {
        self.outbox.join(format!("{id}.eml"))
    }
}

impl Default for FileTransport {
    fn default() -> Self {
        Self::new(PathBuf::from("outbox"))
    }
}

impl MailTransport for FileTransport {
    fn send_raw<'a>(&'a self, message: &'a ComposedMessage) -> TransportFuture<'a> {
        Box::pin(async move {
            fs::create_dir_all(&self.outbox).await?;
            let id = Uuid::new_v4().to_string();
            let path = self.message_path(&id);
            debug!(
                path = %path.display(),
                recipients = %message.envelope_to.join(", "),
                "Writing message to outbox"
            );
            fs::write(&path, &message.raw).await?;
            Ok(DeliveryReceipt { id })
        })
    }

    fn name(&self) -> &str {
        "file"
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[tokio::test]
    async fn test_file_transport_writes_outbox() {
        let temp_dir = TempDir::new().unwrap();
        let outbox = temp_dir.path().join("outbox");
        let transport = FileTransport::new(outbox.clone());
        let message = ComposedMessage {
            raw: b"Subject: Hi\r\n\r\nHello".to_vec(),
            envelope_from: "forward@unit.com".to_string(),
            envelope_to: vec!["santa@north.pole".to_string()],
        };

        let receipt = transport.send_raw(&message).await.unwrap();

        let written = std::fs::read(transport.message_path(&receipt.id)).unwrap();
        assert_eq!(written, message.raw);
        assert_eq!(std::fs::read_dir(outbox).unwrap().count(), 1);
        assert_eq!(transport.name(), "file");
    }
}
