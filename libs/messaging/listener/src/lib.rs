//! # mqlink Listener
//!
//! ## Purpose
//!
//! Polls middleware consumers and hands each message, decoded into an
//! [`Envelope`](types::Envelope), to a user service. Within one consumer processing is
//! strictly serialized: the next message is not fetched until the handler for the current
//! one has returned.
//!
//! ## Architecture Role
//!
//! ```text
//! Connection ──┬── Session ── MessageConsumer ── Dispatcher ── Service.onMessage
//!              │                                     └───────── Service.onError
//!              └── Session ── MessageConsumer ── Dispatcher ── ...
//!
//! Listener: attach → start → graceful_stop / immediate_stop
//! QueueEndpoint: Envelope ⇄ encode/decode ⇄ Destination.put/get
//! ```
//!
//! ## Example
//!
//! ```rust,no_run
//! use listener::test_utils::MemoryConnection;
//! use listener::{Listener, Service};
//! use mqlink_config::{ConsumerConfig, ListenerConfig};
//!
//! # async fn run() -> listener::ListenerResult<()> {
//! let listener = Listener::new(MemoryConnection::new(), ListenerConfig::default())?;
//! let service = Service::new("orders")
//!     .on_message(|envelope| async move {
//!         println!("{}", envelope.payload_text());
//!         Ok(())
//!     })
//!     .on_error(|error| async move {
//!         eprintln!("{error}");
//!         Ok(())
//!     });
//! listener.attach(service, &ConsumerConfig::queue("ORDERS.IN")).await?;
//! listener.start().await?;
//! listener.graceful_stop().await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## What This Crate Does NOT Contain
//! - Wire encoding (belongs in `codec`)
//! - A client library binding: connections are supplied through [`transport`] traits

pub mod caller;
pub mod dispatcher;
pub mod endpoint;
pub mod error;
pub mod lifecycle;
pub mod push;
pub mod service;
pub mod test_utils;
pub mod transport;

pub use caller::Caller;
pub use dispatcher::{DispatchSettings, Dispatcher, DispatcherHandle, DispatcherState};
pub use endpoint::{Destination, GetMessageOptions, MatchOptions, PutMessageOptions, QueueEndpoint};
pub use error::{HandlerCause, ListenerError, ListenerResult};
pub use lifecycle::{Listener, ListenerStatus};
pub use push::{push_channel, PushConsumer, PushHandle};
pub use service::{
    ErrorHandler, MessageHandler, Param, RemoteHandler, RemoteMethod, Service, ValidatedService,
    ON_ERROR, ON_MESSAGE,
};
pub use transport::{
    Connection, ExceptionListener, LoggingExceptionListener, MessageConsumer, Session,
};
