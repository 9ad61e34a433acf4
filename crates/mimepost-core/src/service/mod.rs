//! Delivery services.
//!
//! The dispatcher builds messages with `mimepost-mime` and hands the raw
//! bytes to a [`Transport`].

pub mod dispatcher;
pub mod transport;

pub use dispatcher::Dispatcher;
pub use transport::{Credentials, Endpoint, Envelope, SmtpTransport, Transport, TransportError};
