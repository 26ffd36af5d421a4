//! Message types flowing through the forwarding pipeline.
//!
//! This module defines [`ParsedMessage`], the structured form of an inbound
//! message as produced by a [`MimeParser`](crate::MimeParser),
//! [`OutboundMessage`], the send options handed to a
//! [`MimeComposer`](crate::MimeComposer), and [`ComposedMessage`], the raw
//! [RFC 5322](https://www.rfc-editor.org/rfc/rfc5322) bytes plus the SMTP
//! envelope handed to a [`MailTransport`](crate::MailTransport).

/// A single attachment, carried through forwarding without re-encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    /// File name, as declared by the part or generated by the parser.
    pub filename: String,

    /// Decoded content bytes.
    pub content: Vec<u8>,

    /// Content disposition type (e.g. "attachment" or "inline").
    pub content_disposition: String,

    /// Charset declared for the part, if any.
    pub charset: Option<String>,

    /// Declared byte length of the decoded content.
    pub length: usize,

    /// MIME type without parameters (e.g. "text/plain").
    pub content_type: String,

    /// Transfer encoding the part used (e.g. "base64").
    pub transfer_encoding: Option<String>,

    /// Content-ID without angle brackets, referenced by `cid:` URLs.
    pub content_id: Option<String>,
}

impl Attachment {
    /// Creates a regular attachment whose length is taken from the content.
    pub fn new(filename: &str, content_type: &str, content: Vec<u8>) -> Self {
        Self {
            filename: filename.to_string(),
            length: content.len(),
            content,
            content_disposition: "attachment".to_string(),
            charset: None,
            content_type: content_type.to_string(),
            transfer_encoding: None,
            content_id: None,
        }
    }

    /// Returns whether the attachment is displayed inline.
    pub fn is_inline(&self) -> bool {
        self.content_disposition.eq_ignore_ascii_case("inline")
    }

    /// Returns the content type with its charset parameter, if any.
    ///
    /// # Examples
    ///
    /// ```rust
    /// let mut attachment = relaymail_core::Attachment::new("a.txt", "text/plain", b"hi".to_vec());
    /// attachment.charset = Some("utf-8".to_string());
    /// assert_eq!(attachment.full_content_type(), "text/plain; charset=utf-8");
    /// ```
    pub fn full_content_type(&self) -> String {
        match &self.charset {
            Some(charset) => format!("{}; charset={charset}", self.content_type),
            None => self.content_type.clone(),
        }
    }
}

/// Structured inbound message, owned by the transformer while forwarding.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedMessage {
    /// Plain-text body, if the message has one.
    pub text: Option<String>,

    /// HTML body, if the message has one.
    pub html: Option<String>,

    /// Attachments in the order they appear in the message.
    pub attachments: Vec<Attachment>,
}

/// Send options for the forwarded message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutboundMessage {
    /// The service's own forwarding identity.
    pub from: String,

    pub to: Vec<String>,

    pub cc: Vec<String>,

    pub subject: String,

    /// Banner-prefixed plain-text body.
    pub text: Option<String>,

    /// Banner-prefixed HTML body.
    pub html: Option<String>,

    pub attachments: Vec<Attachment>,
}

impl OutboundMessage {
    /// Returns all recipients, "to" entries first.
    pub fn recipients(&self) -> impl Iterator<Item = &str> {
        self.to.iter().chain(self.cc.iter()).map(String::as_str)
    }
}

/// Raw composed message ready to be handed to a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposedMessage {
    /// Full RFC 5322 serialization (headers + blank line + body).
    pub raw: Vec<u8>,

    /// Envelope sender address.
    pub envelope_from: String,

    /// Envelope recipient addresses, bare `local@domain` form.
    pub envelope_to: Vec<String>,
}

/// Acknowledgement returned by a transport for an accepted message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryReceipt {
    /// Transport specific identifier of the accepted message.
    pub id: String,
}
