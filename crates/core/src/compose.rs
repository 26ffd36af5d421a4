//! [`MimeComposer`] implementation backed by `lettre`'s message builder.

use lettre::message::header::{ContentDisposition, ContentId, ContentTransferEncoding, ContentType};
use lettre::message::{Body, Mailbox, MultiPart, SinglePart};
use lettre::Message;
use tracing::debug;

use crate::{
    mime::{ComposeError, ComposeResult, MimeComposer},
    Attachment, ComposedMessage, OutboundMessage,
};

/// Composes outbound messages as RFC 5322 bytes.
///
/// Bodies become a `multipart/alternative` when both text and HTML are
/// present, attachments wrap everything in a `multipart/mixed`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LettreComposer;

impl MimeComposer for LettreComposer {
    fn compose(&self, message: &OutboundMessage) -> ComposeResult<ComposedMessage> {
        let mut builder = Message::builder()
            .from(mailbox(&message.from)?)
            .subject(message.subject.clone());
        for to in &message.to {
            builder = builder.to(mailbox(to)?);
        }
        for cc in &message.cc {
            builder = builder.cc(mailbox(cc)?);
        }

        let email = match body_part(message) {
            BodyPart::Single(part) if message.attachments.is_empty() => builder.singlepart(part),
            BodyPart::Multi(part) if message.attachments.is_empty() => builder.multipart(part),
            body => {
                let mut mixed = match body {
                    BodyPart::Single(part) => MultiPart::mixed().singlepart(part),
                    BodyPart::Multi(part) => MultiPart::mixed().multipart(part),
                };
                for attachment in &message.attachments {
                    mixed = mixed.singlepart(attachment_part(attachment)?);
                }
                builder.multipart(mixed)
            }
        }
        .map_err(|e| ComposeError::Build(e.to_string()))?;

        let envelope = email.envelope();
        let envelope_from = envelope
            .from()
            .map(|address| address.to_string())
            .unwrap_or_default();
        let envelope_to = envelope.to().iter().map(|a| a.to_string()).collect();
        let raw = email.formatted();
        debug!(
            size = raw.len(),
            attachments = message.attachments.len(),
            "Composed outbound message"
        );

        Ok(ComposedMessage {
            raw,
            envelope_from,
            envelope_to,
        })
    }

    fn name(&self) -> &str {
        "lettre"
    }
}

enum BodyPart {
    Single(SinglePart),
    Multi(MultiPart),
}

fn body_part(message: &OutboundMessage) -> BodyPart {
    match (&message.text, &message.html) {
        (Some(text), Some(html)) => {
            BodyPart::Multi(MultiPart::alternative_plain_html(text.clone(), html.clone()))
        }
        (None, Some(html)) => BodyPart::Single(SinglePart::html(html.clone())),
        (Some(text), None) => BodyPart::Single(SinglePart::plain(text.clone())),
        (None, None) => BodyPart::Single(SinglePart::plain(String::new())),
    }
}

fn mailbox(address: &str) -> ComposeResult<Mailbox> {
    address.parse::<Mailbox>().map_err(|e| ComposeError::Address {
        address: address.to_string(),
        reason: e.to_string(),
    })
}

fn attachment_part(attachment: &Attachment) -> ComposeResult<SinglePart> {
    let full_content_type = attachment.full_content_type();
    let content_type = ContentType::parse(&full_content_type)
        .map_err(|_| ComposeError::ContentType(full_content_type.clone()))?;

    // keep the original transfer encoding when it can carry the content
    let content = attachment.content.clone();
    let body = match attachment.transfer_encoding.as_deref().and_then(transfer_encoding) {
        Some(encoding) => Body::new_with_encoding(content, encoding).unwrap_or_else(Body::new),
        None => Body::new(content),
    };

    let disposition = if attachment.is_inline() {
        ContentDisposition::inline_with_name(&attachment.filename)
    } else {
        ContentDisposition::attachment(&attachment.filename)
    };
    let mut part = SinglePart::builder().header(content_type).header(disposition);
    if let Some(content_id) = &attachment.content_id {
        part = part.header(ContentId::from(format!("<{content_id}>")));
    }
    Ok(part.body(body))
}

fn transfer_encoding(name: &str) -> Option<ContentTransferEncoding> {
    match name.to_ascii_lowercase().as_str() {
        "7bit" => Some(ContentTransferEncoding::SevenBit),
        "8bit" => Some(ContentTransferEncoding::EightBit),
        "quoted-printable" => Some(ContentTransferEncoding::QuotedPrintable),
        "base64" => Some(ContentTransferEncoding::Base64),
        "binary" => Some(ContentTransferEncoding::Binary),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MailParseParser, MimeParser};

    fn outbound() -> OutboundMessage {
        let mut receipt =
            Attachment::new("receipt1.txt", "text/plain", b"crocodile steak $30".to_vec());
        receipt.transfer_encoding = Some("base64".to_string());
        OutboundMessage {
            from: "Unit <forward@unit.com>".to_string(),
            to: vec!["santa@north.pole".to_string(), "hello@world.com".to_string()],
            cc: vec!["apple@red.com".to_string()],
            subject: "Hi".to_string(),
            text: Some("Hello world!".to_string()),
            html: Some("<html><body><span>Hello world!</span></body></html>".to_string()),
            attachments: vec![
                receipt,
                Attachment::new("data.bin", "application/octet-stream", vec![0, 159, 146, 150]),
            ],
        }
    }

    #[test]
    fn test_compose_envelope() {
        let composed = LettreComposer.compose(&outbound()).unwrap();

        assert_eq!(composed.envelope_from, "forward@unit.com");
        assert_eq!(
            composed.envelope_to,
            vec!["santa@north.pole", "hello@world.com", "apple@red.com"]
        );
    }

    #[test]
    fn test_compose_parses_back() {
        let composed = LettreComposer.compose(&outbound()).unwrap();
        let parsed = MailParseParser.parse(&composed.raw).unwrap();

        assert_eq!(parsed.text.as_deref().map(str::trim_end), Some("Hello world!"));
        assert!(parsed
            .html
            .as_deref()
            .unwrap()
            .contains("<span>Hello world!</span>"));
        assert_eq!(parsed.attachments.len(), 2);
        assert_eq!(parsed.attachments[0].filename, "receipt1.txt");
        assert_eq!(parsed.attachments[0].content, b"crocodile steak $30");
        assert_eq!(parsed.attachments[1].filename, "data.bin");
        assert_eq!(parsed.attachments[1].content, vec![0, 159, 146, 150]);
    }

    #[test]
    fn test_compose_keeps_dispositions() {
        let mut logo = Attachment::new("logo.png", "image/png", vec![0x89, 0x50, 0x4e, 0x47]);
        logo.content_disposition = "inline".to_string();
        logo.content_id = Some("logo@example.com".to_string());
        let mut badge = Attachment::new("badge.png", "image/png", vec![1, 2, 3]);
        badge.content_disposition = "inline".to_string();
        let mut message = outbound();
        message.attachments.push(logo);
        message.attachments.push(badge);

        let composed = LettreComposer.compose(&message).unwrap();
        let parsed = MailParseParser.parse(&composed.raw).unwrap();

        assert_eq!(parsed.attachments.len(), 4);
        let receipt = &parsed.attachments[0];
        assert_eq!(receipt.content_disposition, "attachment");
        assert!(receipt.content_id.is_none());

        let logo = &parsed.attachments[2];
        assert_eq!(logo.filename, "logo.png");
        assert_eq!(logo.content_disposition, "inline");
        assert_eq!(logo.content_id.as_deref(), Some("logo@example.com"));
        assert_eq!(logo.content, vec![0x89, 0x50, 0x4e, 0x47]);

        let badge = &parsed.attachments[3];
        assert_eq!(badge.filename, "badge.png");
        assert_eq!(badge.content_disposition, "inline");
        assert!(badge.content_id.is_none());
        assert_eq!(badge.content, vec![1, 2, 3]);
    }

    #[test]
    fn test_compose_headers() {
        let composed = LettreComposer.compose(&outbound()).unwrap();
        let raw = String::from_utf8_lossy(&composed.raw);

        let header = |name: &str| {
            raw.lines()
                .find(|line| line.starts_with(name))
                .map(str::to_string)
                .unwrap_or_default()
        };

        assert!(header("From:").contains("<forward@unit.com>"));
        assert!(header("To:").contains("santa@north.pole"));
        assert!(header("To:").contains("hello@world.com"));
        assert!(header("Cc:").contains("apple@red.com"));
        assert_eq!(header("Subject:"), "Subject: Hi");
    }

    #[test]
    fn test_compose_text_only() {
        let message = OutboundMessage {
            html: None,
            attachments: vec![],
            ..outbound()
        };
        let composed = LettreComposer.compose(&message).unwrap();
        let parsed = MailParseParser.parse(&composed.raw).unwrap();

        assert!(parsed.html.is_none());
        assert!(parsed.text.unwrap().starts_with("Hello world!"));
    }

    #[test]
    fn test_compose_invalid_sender() {
        let message = OutboundMessage {
            from: "not an email".to_string(),
            ..outbound()
        };
        assert!(matches!(
            LettreComposer.compose(&message),
            Err(ComposeError::Address { .. })
        ));
    }

    #[test]
    fn test_compose_invalid_content_type() {
        let mut message = outbound();
        message.attachments[0].content_type = "not a type".to_string();
        assert!(matches!(
            LettreComposer.compose(&message),
            Err(ComposeError::ContentType(_))
        ));
    }

    #[test]
    fn test_transfer_encoding_names() {
        assert!(matches!(
            transfer_encoding("BASE64"),
            Some(ContentTransferEncoding::Base64)
        ));
        assert!(transfer_encoding("x-uuencode").is_none());
    }
}
