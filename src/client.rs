// This file is part of asio-tcp.
// Licensed under the Apache License, Version 2.0.

//! A connect-on-demand client: a single outstanding connection to one
//! server, dialed lazily and redialed transparently after it drops.

use crate::{
    address::ConnectionAddress,
    archive::Archive,
    builder::{DefaultMessageBuilder, MessageBuilder},
    connection::{Connection, PeerRegistry},
    error::Error,
    handler::MessageHandler,
    options::Config,
    runtime::IoRuntime,
    Dispatcher,
};

use std::sync::{Arc, Weak};

use bytes::Bytes;
use tokio::{net::TcpStream, sync::Mutex};

/// A client's single connection slot never needs to deregister itself from
/// a shared table, so it gets a no-op [`PeerRegistry`].
struct NoRegistry;
impl PeerRegistry for NoRegistry {
    fn deregister(&self, _address: &ConnectionAddress) {}
}

/// Talks to one server. The underlying connection is dialed the first time
/// a send is attempted and redialed automatically if it has dropped.
pub struct TcpClient {
    server: ConnectionAddress,
    handler: Arc<dyn MessageHandler>,
    config: Config,
    runtime: IoRuntime,
    builder: DefaultMessageBuilder,
    connection: Mutex<Option<Arc<Connection>>>,
}

impl TcpClient {
    pub fn new(server: ConnectionAddress, dispatcher: Dispatcher, config: Config, runtime: IoRuntime) -> Self {
        Self {
            server,
            handler: Arc::new(crate::handler::DefaultMessageHandler::new(dispatcher)),
            config,
            runtime,
            builder: DefaultMessageBuilder,
            connection: Mutex::new(None),
        }
    }

    pub fn server(&self) -> &ConnectionAddress {
        &self.server
    }

    pub async fn connected(&self) -> bool {
        matches!(self.connection.lock().await.as_ref(), Some(conn) if conn.is_connected())
    }

    /// The local address this client presents as, once connected; the null
    /// address otherwise.
    pub async fn get_client_details_for_server(&self) -> ConnectionAddress {
        match self.connection.lock().await.as_ref() {
            Some(conn) if conn.is_connected() => conn.local().clone(),
            _ => ConnectionAddress::null(),
        }
    }

    pub async fn close_connection(&self) {
        if let Some(conn) = self.connection.lock().await.take() {
            conn.close().await;
        }
    }

    async fn ensure_connected(&self) -> Result<Arc<Connection>, Error> {
        let mut guard = self.connection.lock().await;
        if let Some(conn) = guard.as_ref() {
            if conn.is_connected() {
                return Ok(conn.clone());
            }
        }

        let socket_addr = self.server.to_socket_addr()?;
        let stream = TcpStream::connect(socket_addr)
            .await
            .map_err(|e| Error::Connect(self.server.clone(), e))?;
        let local = ConnectionAddress::from(stream.local_addr()?);

        let registry: Weak<dyn PeerRegistry> = Weak::<NoRegistry>::new();
        let connection = Connection::spawn(
            stream,
            local,
            self.server.clone(),
            self.handler.clone(),
            &self.config,
            registry,
            &self.runtime,
        )?;

        *guard = Some(connection.clone());
        Ok(connection)
    }

    pub async fn send_body_async(&self, body: &[u8]) -> bool {
        let Ok(conn) = self.ensure_connected().await else { return false };
        let Ok(frame) = self.builder.build_with_body(conn.local().clone(), ConnectionAddress::null(), conn.next_message_id(), body) else {
            return false;
        };
        conn.send_async(frame)
    }

    pub async fn send_body_sync(&self, body: &[u8]) -> Result<bool, Error> {
        let conn = self.ensure_connected().await?;
        let frame = self.builder.build_with_body(conn.local().clone(), ConnectionAddress::null(), conn.next_message_id(), body)?;
        conn.send_sync(frame).await
    }

    pub async fn send_typed_async<A: Archive<T>, T>(&self, value: &T) -> bool {
        let Ok(conn) = self.ensure_connected().await else { return false };
        let Ok(frame) = self.builder.build_with_typed::<A, T>(conn.local().clone(), ConnectionAddress::null(), conn.next_message_id(), value) else {
            return false;
        };
        conn.send_async(frame)
    }

    /// Serialization failures are folded into `Ok(false)` rather than
    /// propagated, matching [`TcpClient::send_typed_async`]: only I/O
    /// failures on an already-established connection are reported as `Err`.
    pub async fn send_typed_sync<A: Archive<T>, T>(&self, value: &T) -> Result<bool, Error> {
        let conn = self.ensure_connected().await?;
        let Ok(frame) = self.builder.build_with_typed::<A, T>(conn.local().clone(), ConnectionAddress::null(), conn.next_message_id(), value) else {
            return Ok(false);
        };
        conn.send_sync(frame).await
    }

    /// Sends a pre-built frame (e.g. header-only) as produced by a caller's
    /// own [`MessageBuilder`] call.
    pub async fn send_frame_async(&self, frame: Bytes) -> bool {
        let Ok(conn) = self.ensure_connected().await else { return false };
        conn.send_async(frame)
    }

    pub async fn send_frame_sync(&self, frame: Bytes) -> Result<bool, Error> {
        let conn = self.ensure_connected().await?;
        conn.send_sync(frame).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{archive::Json, handler::ReceivedMessage, options::Config};
    use serde::{Deserialize, Serialize};
    use tokio::net::TcpListener;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Ping {
        seq: u32,
    }

    async fn spawn_echo_server() -> ConnectionAddress {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = ConnectionAddress::from(listener.local_addr().unwrap());
        let runtime = IoRuntime::from_current();

        tokio::spawn(async move {
            loop {
                let Ok((stream, peer_addr)) = listener.accept().await else { break };
                let dispatcher: Dispatcher = Arc::new(|_msg: ReceivedMessage| {});
                let handler = Arc::new(crate::handler::DefaultMessageHandler::new(dispatcher));
                let registry: Weak<dyn PeerRegistry> = Weak::<NoRegistry>::new();
                let _ = Connection::spawn(
                    stream,
                    ConnectionAddress::from(peer_addr),
                    ConnectionAddress::from(peer_addr),
                    handler,
                    &Config::default(),
                    registry,
                    &runtime,
                );
            }
        });

        addr
    }

    #[tokio::test]
    async fn lazily_dials_on_first_send() {
        let server_addr = spawn_echo_server().await;
        let dispatcher: Dispatcher = Arc::new(|_msg: ReceivedMessage| {});
        let client = TcpClient::new(server_addr, dispatcher, Config::default(), IoRuntime::from_current());

        assert!(!client.connected().await);
        assert!(client.send_typed_async::<Json, _>(&Ping { seq: 1 }).await);
        assert!(client.connected().await);
    }

    #[tokio::test]
    async fn sync_send_reports_success() {
        let server_addr = spawn_echo_server().await;
        let dispatcher: Dispatcher = Arc::new(|_msg: ReceivedMessage| {});
        let client = TcpClient::new(server_addr, dispatcher, Config::default(), IoRuntime::from_current());

        let delivered = client.send_typed_sync::<Json, _>(&Ping { seq: 2 }).await.unwrap();
        assert!(delivered);
    }

    #[tokio::test]
    async fn close_then_reconnect_on_next_send() {
        let server_addr = spawn_echo_server().await;
        let dispatcher: Dispatcher = Arc::new(|_msg: ReceivedMessage| {});
        let client = TcpClient::new(server_addr, dispatcher, Config::default(), IoRuntime::from_current());

        assert!(client.send_body_async(b"hello").await);
        client.close_connection().await;
        assert!(!client.connected().await);

        assert!(client.send_body_async(b"hello again").await);
        assert!(client.connected().await);
    }

    #[tokio::test]
    async fn connect_failure_is_reported_as_refusal_for_async_sends() {
        // Nothing is listening on this port.
        let dead = ConnectionAddress::new("127.0.0.1", 1);
        let dispatcher: Dispatcher = Arc::new(|_msg: ReceivedMessage| {});
        let client = TcpClient::new(dead, dispatcher, Config::default(), IoRuntime::from_current());
        assert!(!client.send_body_async(b"x").await);
    }
}
