//! The "Forwarded Message" block prepended to forwarded bodies.
//!
//! Both the plain-text and the HTML renderings come from the same text, the
//! HTML one only differs by entity escaping.

use crate::InboundEnvelope;

/// First line of every banner.
pub const BANNER_TITLE: &str = "-------- Forwarded Message --------";

/// Width of the label column, values start right after it.
const LABEL_WIDTH: usize = 12;

/// Rendered forwarding banner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForwardBanner {
    text: String,
}

impl ForwardBanner {
    /// Builds the banner from the original message metadata.
    ///
    /// The `Cc` line is only present when `ccs` is non-empty.
    pub fn new(subject: &str, date: &str, from: &str, tos: &[String], ccs: &[String]) -> Self {
        let mut lines = vec![
            BANNER_TITLE.to_string(),
            banner_line("Subject:", subject),
            banner_line("Date:", date),
            banner_line("From:", from),
            banner_line("To:", &tos.join(", ")),
        ];
        if !ccs.is_empty() {
            lines.push(banner_line("Cc:", &ccs.join(", ")));
        }
        Self {
            text: lines.join("\n"),
        }
    }

    /// Builds the banner for the original (untranslated) envelope.
    pub fn from_envelope(envelope: &InboundEnvelope) -> Self {
        Self::new(
            &envelope.subject,
            &envelope.date,
            &envelope.sender,
            &envelope.to,
            &envelope.cc,
        )
    }

    /// Returns the plain-text rendering, without a trailing newline.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Returns the HTML-escaped rendering of the same text.
    pub fn html(&self) -> String {
        escape_html(&self.text)
    }

    /// Returns the escaped banner wrapped in an inline element.
    pub fn html_block(&self) -> String {
        format!("<span>{}</span>", self.html())
    }
}

fn banner_line(label: &str, value: &str) -> String {
    format!("{label:<width$}{value}", width = LABEL_WIDTH)
}

/// Escapes the characters with a meaning in HTML text and attributes.
///
/// # Examples
///
/// ```rust
/// assert_eq!(
///     relaymail_core::escape_html("Jane <jane@example.com> & co"),
///     "Jane &lt;jane@example.com&gt; &amp; co"
/// );
/// ```
pub fn escape_html(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
