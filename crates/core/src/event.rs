//! Triggering event and the envelope metadata read from it.
//!
//! The event follows the shape of an SES receipt notification: a list of
//! records, each carrying the stored message id and the original
//! `commonHeaders` of the received mail.

use std::fmt::Display;

use serde::Deserialize;

/// Result type for event operations.
pub type EventResult<T> = Result<T, EventError>;

/// Errors that can occur while reading a triggering event.
#[derive(Debug)]
pub enum EventError {
    /// The payload is not a valid event document.
    Parse(serde_json::Error),
    /// The event carries no record to forward.
    MissingRecord,
}

impl Display for EventError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventError::Parse(e) => write!(f, "Event parse error: {e}"),
            EventError::MissingRecord => write!(f, "Event has no record"),
        }
    }
}

impl std::error::Error for EventError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EventError::Parse(e) => Some(e),
            EventError::MissingRecord => None,
        }
    }
}

/// Notification that a message has been received and stored.
#[derive(Debug, Clone, Deserialize)]
pub struct InboundEvent {
    #[serde(rename = "Records", default)]
    pub records: Vec<EventRecord>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventRecord {
    pub ses: SesRecord,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SesRecord {
    pub mail: SesMail,

    #[serde(default)]
    pub receipt: Option<SesReceipt>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SesMail {
    /// Identifier of the raw message in object storage.
    pub message_id: String,

    /// Envelope recipients of the received message.
    #[serde(default)]
    pub destination: Vec<String>,

    pub common_headers: CommonHeaders,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CommonHeaders {
    #[serde(default)]
    pub from: Vec<String>,

    #[serde(default)]
    pub to: Vec<String>,

    #[serde(default)]
    pub cc: Vec<String>,

    #[serde(default)]
    pub subject: String,

    #[serde(default)]
    pub date: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SesReceipt {
    #[serde(default)]
    pub recipients: Vec<String>,
}

impl InboundEvent {
    /// Parses an event from its JSON representation.
    pub fn from_json(payload: &str) -> EventResult<Self> {
        serde_json::from_str(payload).map_err(EventError::Parse)
    }

    /// Extracts the envelope of the first record.
    pub fn envelope(&self) -> EventResult<InboundEnvelope> {
        let record = self.records.first().ok_or(EventError::MissingRecord)?;
        let mail = &record.ses.mail;
        let headers = &mail.common_headers;
        let destination = record
            .ses
            .receipt
            .as_ref()
            .and_then(|receipt| receipt.recipients.first())
            .or_else(|| mail.destination.first())
            .cloned();
        Ok(InboundEnvelope {
            message_id: mail.message_id.clone(),
            subject: headers.subject.clone(),
            sender: headers.from.join(", "),
            date: headers.date.clone(),
            to: headers.to.clone(),
            cc: headers.cc.clone(),
            destination,
        })
    }
}

/// Header metadata of the original message, immutable once read.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InboundEnvelope {
    /// Storage key identifying the raw message bytes.
    pub message_id: String,

    pub subject: String,

    /// Original sender, as shown in the `From` header.
    pub sender: String,

    /// Original `Date` header value.
    pub date: String,

    pub to: Vec<String>,

    pub cc: Vec<String>,

    /// Mailbox the message was delivered to, used to choose the storage
    /// sub-path.
    pub destination: Option<String>,
}

impl InboundEnvelope {
    /// Returns every original "to" and "cc" address, "to" entries first.
    pub fn addresses(&self) -> Vec<String> {
        self.to.iter().chain(self.cc.iter()).cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EVENT: &str = r#"{
        "Records": [{
            "eventSource": "aws:ses",
            "ses": {
                "mail": {
                    "messageId": "o3vrnil0e2ic28trm7dfhrc2v0clambda4nbp0g1",
                    "destination": ["sint@castle.es"],
                    "commonHeaders": {
                        "from": ["Jane Doe <janedoe@example.com>"],
                        "to": ["sint@castle.es", "goodbye@world.com"],
                        "cc": ["apple@blue.com"],
                        "subject": "Hi",
                        "date": "Mon, 1 Jan 2000 00:00:00 -0000"
                    }
                },
                "receipt": {
                    "recipients": ["inbox@castle.es"]
                }
            }
        }]
    }"#;

    #[test]
    fn test_envelope_from_event() {
        let event = InboundEvent::from_json(EVENT).unwrap();
        let envelope = event.envelope().unwrap();

        assert_eq!(envelope.message_id, "o3vrnil0e2ic28trm7dfhrc2v0clambda4nbp0g1");
        assert_eq!(envelope.subject, "Hi");
        assert_eq!(envelope.sender, "Jane Doe <janedoe@example.com>");
        assert_eq!(envelope.date, "Mon, 1 Jan 2000 00:00:00 -0000");
        assert_eq!(envelope.to, vec!["sint@castle.es", "goodbye@world.com"]);
        assert_eq!(envelope.cc, vec!["apple@blue.com"]);
        assert_eq!(envelope.destination.as_deref(), Some("inbox@castle.es"));
        assert_eq!(
            envelope.addresses(),
            vec!["sint@castle.es", "goodbye@world.com", "apple@blue.com"]
        );
    }

    #[test]
    fn test_envelope_missing_lists_default_to_empty() {
        let event = InboundEvent::from_json(
            r#"{"Records": [{"ses": {"mail": {
                "messageId": "abc",
                "destination": ["box@castle.es"],
                "commonHeaders": {"subject": "Hi"}
            }}}]}"#,
        )
        .unwrap();
        let envelope = event.envelope().unwrap();

        assert!(envelope.to.is_empty());
        assert!(envelope.cc.is_empty());
        assert_eq!(envelope.sender, "");
        assert_eq!(envelope.destination.as_deref(), Some("box@castle.es"));
    }

    #[test]
    fn test_envelope_without_records() {
        let event = InboundEvent::from_json(r#"{"Records": []}"#).unwrap();
        assert!(matches!(event.envelope(), Err(EventError::MissingRecord)));
    }

    #[test]
    fn test_invalid_event_payload() {
        assert!(matches!(
            InboundEvent::from_json("not json"),
            Err(EventError::Parse(_))
        ));
    }

    #[test]
    fn test_event_error_display() {
        assert_eq!(EventError::MissingRecord.to_string(), "Event has no record");
    }
}
