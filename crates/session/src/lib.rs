//! Control-process side of the session.
//!
//! [`SessionProxy`] is the facade the tray talks to: it runs the logon
//! recovery loop, owns the execution window, forwards whitelisted calls
//! through a [`Correlator`] and re-emits remote events on an [`EventBus`].

pub mod correlator;
pub mod error;
pub mod events;
pub mod host;
pub mod proxy;
pub mod session;

pub use correlator::Correlator;
pub use error::{HostError, ProxyError};
pub use events::{EventBus, ProxyEvent, SubscriptionId, Topic};
pub use host::{ExecutionHost, ExecutionWindow, HostFuture, ProcessHost};
pub use proxy::{ProxyConfig, RetryPolicy, SessionProxy};
pub use session::Session;
