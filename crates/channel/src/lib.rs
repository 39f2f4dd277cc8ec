//! Ordered named-message channel between the two process contexts.
//!
//! An [`Endpoint`] is one side of a link. Messages are fire-and-forget
//! [`Envelope`](chattray_protocol::Envelope)s delivered in send order; the
//! receiving side routes each one to the handlers registered on its
//! [`Router`] under the message name, one message at a time.
//!
//! Two transports are provided:
//! - [`pair`] links two endpoints inside one process.
//! - [`Endpoint::over_io`] speaks newline-delimited JSON over any async
//!   byte stream, typically a child process's stdio.
//!
//! There is no acknowledgement and no flow control. When the link goes
//! down, in-flight messages are dropped and every registered listener is
//! released, so callers waiting on a one-shot reply observe the closure.

mod endpoint;
mod error;
mod pumps;
mod router;

pub use endpoint::{ChannelSender, Endpoint, pair};
pub use error::ChannelError;
pub use router::{ListenerId, Router};

/// Longest accepted line on a stream transport.
pub const MAX_LINE_LENGTH: usize = 16 * 1024 * 1024;
