//! Transformation of an inbound parsed message into the forwarded one.
//!
//! The [`MessageTransformer`] prepends the forwarding banner to the text and
//! HTML bodies and assembles the [`OutboundMessage`] send options. All
//! operations are synchronous, in-memory transformations.

use std::fmt::Display;

use tracing::{debug, info};

use crate::{ForwardBanner, InboundEnvelope, OutboundMessage, ParsedMessage, ResolvedRecipients};

/// Result type for transformer operations.
pub type TransformResult<T> = Result<T, TransformError>;

/// Errors raised when the parsed message is malformed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransformError {
    /// An attachment carries a different number of bytes than it declares.
    AttachmentLength {
        filename: String,
        declared: usize,
        actual: usize,
    },
}

impl Display for TransformError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransformError::AttachmentLength {
                filename,
                declared,
                actual,
            } => write!(
                f,
                "Attachment {filename} declares {declared} bytes but carries {actual}"
            ),
        }
    }
}

impl std::error::Error for TransformError {}

/// Builds forwarded messages on behalf of a fixed sender identity.
///
/// Forwarded mail originates from the service's own address rather than
/// the original sender, so that sender verification at the outbound
/// transport succeeds.
#[derive(Debug, Clone)]
pub struct MessageTransformer {
    from: String,
}

impl MessageTransformer {
    /// Creates a new [`MessageTransformer`] sending as `from`.
    pub fn new(from: String) -> Self {
        info!(from = %from, "Message transformer initialized");
        Self { from }
    }

    /// Returns the forwarding sender address.
    pub fn from(&self) -> &str {
        &self.from
    }

    /// Injects the banner and builds the send options in one step.
    pub fn transform(
        &self,
        mut message: ParsedMessage,
        recipients: ResolvedRecipients,
        envelope: &InboundEnvelope,
    ) -> TransformResult<OutboundMessage> {
        let banner = ForwardBanner::from_envelope(envelope);
        Self::inject_banner(&mut message, &banner);
        self.build_outbound(message, recipients, envelope)
    }

    /// Prepends the banner to the text and HTML bodies of the message.
    ///
    /// When the HTML has a `<body>` element the escaped banner becomes its
    /// first child, every byte after the opening tag is kept as is.
    /// Otherwise the banner block is prepended followed by a newline. A
    /// message without bodies is left untouched.
    pub fn inject_banner(message: &mut ParsedMessage, banner: &ForwardBanner) {
        if let Some(text) = message.text.as_mut() {
            text.insert_str(0, &format!("{}\n", banner.text()));
        }

        if let Some(html) = message.html.as_mut() {
            let block = banner.html_block();
            match body_content_offset(html) {
                Some(offset) => {
                    debug!(offset = offset, "Injecting banner into HTML body element");
                    html.insert_str(offset, &block);
                }
                None => {
                    debug!("No HTML body element, prepending banner block");
                    html.insert_str(0, &format!("{block}\n"));
                }
            }
        }
    }

    /// Assembles the send options from an already banner-injected message.
    ///
    /// Attachments are carried through unchanged; one whose declared length
    /// disagrees with its content makes the whole message malformed.
    pub fn build_outbound(
        &self,
        message: ParsedMessage,
        recipients: ResolvedRecipients,
        envelope: &InboundEnvelope,
    ) -> TransformResult<OutboundMessage> {
        for attachment in &message.attachments {
            if attachment.length != attachment.content.len() {
                return Err(TransformError::AttachmentLength {
                    filename: attachment.filename.clone(),
                    declared: attachment.length,
                    actual: attachment.content.len(),
                });
            }
        }

        Ok(OutboundMessage {
            from: self.from.clone(),
            to: recipients.to,
            cc: recipients.cc,
            subject: envelope.subject.clone(),
            text: message.text,
            html: message.html,
            attachments: message.attachments,
        })
    }
}

/// Returns the byte offset right after the `<body ...>` opening tag.
///
/// ASCII lowercasing keeps byte offsets, so positions found in the
/// lowercased copy are valid in the original.
fn body_content_offset(html: &str) -> Option<usize> {
    let lower = html.to_ascii_lowercase();
    let mut search = 0;
    while let Some(found) = lower[search..].find("<body") {
        let start = search + found;
        let after = start + "<body".len();
        match lower[after..].chars().next() {
            Some(c) if c == '>' || c == '/' || c.is_ascii_whitespace() => {
                return tag_end(&lower[after..]).map(|end| after + end + 1);
            }
            _ => search = after,
        }
    }
    None
}

/// Index of the `>` closing a tag, skipping quoted attribute values.
fn tag_end(tag: &str) -> Option<usize> {
    let mut quote = None;
    for (index, byte) in tag.bytes().enumerate() {
        match (quote, byte) {
            (None, b'"' | b'\'') => quote = Some(byte),
            (Some(open), _) if open == byte => quote = None,
            (None, b'>') => return Some(index),
            _ => {}
        }
    }
    None
}
