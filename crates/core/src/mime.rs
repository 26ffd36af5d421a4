//! MIME parser and composer seams.
//!
//! The forwarding core never reads or writes MIME itself, it goes through
//! a [`MimeParser`] to turn raw bytes into a [`ParsedMessage`] and a
//! [`MimeComposer`] to turn an [`OutboundMessage`] back into raw bytes.
//! [`MailParseParser`] is the default parser, backed by `mailparse`, the
//! default composer lives in [`compose`](crate::compose).

use std::fmt::Display;

use mailparse::{parse_mail, MailHeaderMap, ParsedMail};
use tracing::debug;

use crate::{Attachment, ComposedMessage, OutboundMessage, ParsedMessage};

/// Result type for parse operations.
pub type ParseResult<T> = Result<T, ParseError>;

/// Result type for compose operations.
pub type ComposeResult<T> = Result<T, ComposeError>;

/// Errors that can occur while parsing a raw message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// The message structure or headers could not be parsed.
    Malformed(String),
    /// A part body could not be decoded.
    Body { content_type: String, reason: String },
}

impl Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseError::Malformed(msg) => write!(f, "Malformed message: {msg}"),
            ParseError::Body {
                content_type,
                reason,
            } => write!(f, "Undecodable {content_type} part: {reason}"),
        }
    }
}

impl std::error::Error for ParseError {}

/// Errors that can occur while composing an outbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComposeError {
    /// An address could not be parsed as a mailbox.
    Address { address: String, reason: String },
    /// An attachment content type is not a valid MIME type.
    ContentType(String),
    /// The message could not be assembled.
    Build(String),
}

impl Display for ComposeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ComposeError::Address { address, reason } => {
                write!(f, "Invalid address {address}: {reason}")
            }
            ComposeError::ContentType(content_type) => {
                write!(f, "Invalid content type: {content_type}")
            }
            ComposeError::Build(msg) => write!(f, "Build error: {msg}"),
        }
    }
}

impl std::error::Error for ComposeError {}

/// Turns a complete raw message into its structured form.
pub trait MimeParser: Send + Sync {
    /// Parses the full byte buffer of a single message.
    fn parse(&self, raw: &[u8]) -> ParseResult<ParsedMessage>;

    /// Returns the name of this parser.
    fn name(&self) -> &str;
}

/// Turns outbound send options into a raw message.
pub trait MimeComposer: Send + Sync {
    /// Composes the message, returning its raw bytes and envelope.
    fn compose(&self, message: &OutboundMessage) -> ComposeResult<ComposedMessage>;

    /// Returns the name of this composer.
    fn name(&self) -> &str;
}

/// [`MimeParser`] backed by the `mailparse` crate.
///
/// The first inline `text/plain` and `text/html` leaves become the bodies,
/// every other leaf (named parts, explicit attachments, non-text inline
/// parts) becomes an [`Attachment`].
#[derive(Debug, Clone, Copy, Default)]
pub struct MailParseParser;

impl MimeParser for MailParseParser {
    fn parse(&self, raw: &[u8]) -> ParseResult<ParsedMessage> {
        let mail = parse_mail(raw).map_err(|e| ParseError::Malformed(e.to_string()))?;
        let mut message = ParsedMessage::default();
        collect_part(&mail, &mut message)?;
        debug!(
            text = message.text.is_some(),
            html = message.html.is_some(),
            attachments = message.attachments.len(),
            "Parsed message"
        );
        Ok(message)
    }

    fn name(&self) -> &str {
        "mailparse"
    }
}

fn collect_part(part: &ParsedMail, message: &mut ParsedMessage) -> ParseResult<()> {
    if !part.subparts.is_empty() {
        for subpart in &part.subparts {
            collect_part(subpart, message)?;
        }
        return Ok(());
    }

    let mimetype = part.ctype.mimetype.to_ascii_lowercase();
    let disposition = part
        .headers
        .get_first_value("Content-Disposition")
        .and_then(|value| value.split(';').next().map(|d| d.trim().to_ascii_lowercase()))
        .filter(|d| !d.is_empty());
    let filename = part
        .get_content_disposition()
        .params
        .get("filename")
        .or_else(|| part.ctype.params.get("name"))
        .cloned();
    let is_attachment = disposition.as_deref() == Some("attachment") || filename.is_some();

    if !is_attachment {
        if mimetype == "text/plain" && message.text.is_none() {
            message.text = Some(part.get_body().map_err(|e| body_error(&mimetype, e))?);
            return Ok(());
        }
        if mimetype == "text/html" && message.html.is_none() {
            message.html = Some(part.get_body().map_err(|e| body_error(&mimetype, e))?);
            return Ok(());
        }
    }

    let content = part.get_body_raw().map_err(|e| body_error(&mimetype, e))?;
    let content_id = part
        .headers
        .get_first_value("Content-ID")
        .map(|id| id.trim().trim_start_matches('<').trim_end_matches('>').to_string());
    let content_disposition = disposition.unwrap_or_else(|| match content_id {
        Some(_) => "inline".to_string(),
        None => "attachment".to_string(),
    });
    let filename =
        filename.unwrap_or_else(|| format!("attachment-{}", message.attachments.len() + 1));
    let charset = declared_charset(part);
    let transfer_encoding = part
        .headers
        .get_first_value("Content-Transfer-Encoding")
        .map(|encoding| encoding.trim().to_ascii_lowercase());

    message.attachments.push(Attachment {
        filename,
        length: content.len(),
        content,
        content_disposition,
        charset,
        content_type: mimetype,
        transfer_encoding,
        content_id,
    });
    Ok(())
}

/// Charset named by the part's own `Content-Type` header.
///
/// mailparse fills in `us-ascii` when the header has none and drops the
/// parameter from `ctype.params`, so the raw header is checked instead.
fn declared_charset(part: &ParsedMail) -> Option<String> {
    let declared = part
        .headers
        .get_first_value("Content-Type")?
        .split(';')
        .skip(1)
        .any(|param| param.trim().to_ascii_lowercase().starts_with("charset"));
    declared.then(|| part.ctype.charset.clone())
}

fn body_error(content_type: &str, error: mailparse::MailParseError) -> ParseError {
    ParseError::Body {
        content_type: content_type.to_string(),
        reason: error.to_string(),
    }
}
