//! Message vocabulary shared by the control and execution processes.
//!
//! The two processes talk over a named-message channel. This crate pins
//! down every name that crosses it (the forwardable [`Method`] whitelist,
//! the forwarded [`EventKind`] set, the logon handshake) together with the
//! payload shapes and the domain types they carry.

pub mod constants;
pub mod envelope;
pub mod event;
pub mod messages;
pub mod method;
pub mod types;

pub use envelope::{Envelope, RemoteError};
pub use event::{EventKind, ForwardedEvent};
pub use method::Method;
