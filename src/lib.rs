// This file is part of asio-tcp.
// Licensed under the Apache License, Version 2.0.

#![forbid(unsafe_code)]

//! A framed, bi-directional TCP messaging core.
//!
//! Peers exchange discrete application messages over a persistent TCP
//! connection: a [`client::TcpClient`] may initiate, a [`server::TcpServer`]
//! accepts many clients, and either side may send header-only messages, raw
//! byte-buffer payloads, or typed payloads serialized through a pluggable
//! [`archive::Archive`]. Every received message reaches the application
//! through a user-supplied dispatcher closure.

#[macro_use]
extern crate tracing;

pub mod address;
pub mod archive;
pub mod builder;
pub mod client;
pub mod connection;
pub mod error;
pub mod handler;
pub mod header;
pub mod options;
pub mod pool;
pub mod runtime;
pub mod server;
pub mod typed;

pub use address::ConnectionAddress;
pub use archive::ArchiveTag;
pub use builder::{DefaultMessageBuilder, MessageBuilder};
pub use client::TcpClient;
pub use connection::Connection;
pub use error::{ArchiveError, Error, FramingError};
pub use handler::{DefaultMessageHandler, MessageHandler, ReceivedMessage};
pub use header::MessageHeader;
pub use options::{Config, SendOption};
pub use pool::SimpleTcpClientList;
pub use runtime::IoRuntime;
pub use server::TcpServer;
pub use typed::{TypedTcpClient, TypedTcpServer};

/// Dispatcher callback invoked once per fully-received frame on a
/// connection. Must never be allowed to unwind past the read loop; see
/// [`connection::Connection`] for the `catch_unwind` boundary.
pub type Dispatcher = std::sync::Arc<dyn Fn(ReceivedMessage) + Send + Sync>;
