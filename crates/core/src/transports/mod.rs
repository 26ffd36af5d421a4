//! Concrete [`MailTransport`](crate::MailTransport) implementations.
//!
//! Contains [`SmtpRelayTransport`] for relaying through an SMTP server and
//! [`FileTransport`] for dropping messages as `.eml` files into an outbox.

pub mod file;
pub mod smtp;

pub use file::*;
pub use smtp::*;
