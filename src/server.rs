// This file is part of asio-tcp.
// Licensed under the Apache License, Version 2.0.

//! Accepts inbound connections and tracks the resulting peers so a caller
//! can address them by [`ConnectionAddress`] after the fact.

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

use std::{
    collections::HashMap,
    net::SocketAddr,
    sync::{
        atomic::{AtomicU16, Ordering},
        Arc, Weak,
    },
};

use bytes::Bytes;
use parking_lot::Mutex as SyncMutex;
use tokio::{net::TcpListener, sync::Mutex as AsyncMutex, task::JoinHandle};

/// Tracks every currently-connected peer by the address it connected from.
///
/// Wrapped in `parking_lot::Mutex` rather than `tokio::sync::Mutex`: every
/// access here is a short, non-blocking map operation, never held across an
/// `.await`.
#[derive(Default)]
pub struct PeerMap {
    peers: SyncMutex<HashMap<ConnectionAddress, Arc<Connection>>>,
}

impl PeerMap {
    fn insert(&self, connection: Arc<Connection>) {
        self.peers.lock().insert(connection.peer().clone(), connection);
    }

    fn get(&self, address: &ConnectionAddress) -> Option<Arc<Connection>> {
        self.peers.lock().get(address).cloned()
    }

    fn len(&self) -> usize {
        self.peers.lock().len()
    }

    fn all(&self) -> Vec<Arc<Connection>> {
        self.peers.lock().values().cloned().collect()
    }
}

impl PeerRegistry for PeerMap {
    fn deregister(&self, address: &ConnectionAddress) {
        self.peers.lock().remove(address);
    }
}

/// Listens for inbound connections on a bound address and fans out sends to
/// the accepted peers.
pub struct TcpServer {
    bind_addr: ConnectionAddress,
    handler: Arc<dyn MessageHandler>,
    config: Config,
    runtime: IoRuntime,
    builder: DefaultMessageBuilder,
    peers: Arc<PeerMap>,
    acceptor: AsyncMutex<Option<Acceptor>>,
    /// The bound listen port, readable without awaiting the acceptor's
    /// mutex. Kept alongside `acceptor` rather than inside it so a sync
    /// lookup like [`TcpServer::get_server_details_for_client`] can report
    /// the listen port even while the acceptor lock is held elsewhere.
    listen_port: AtomicU16,
}

struct Acceptor {
    local_addr: SocketAddr,
    task: JoinHandle<()>,
}

impl TcpServer {
    pub fn new(bind_addr: ConnectionAddress, dispatcher: Dispatcher, config: Config, runtime: IoRuntime) -> Self {
        Self {
            bind_addr,
            handler: Arc::new(crate::handler::DefaultMessageHandler::new(dispatcher)),
            config,
            runtime,
            builder: DefaultMessageBuilder,
            peers: Arc::new(PeerMap::default()),
            acceptor: AsyncMutex::new(None),
            listen_port: AtomicU16::new(0),
        }
    }

    /// Binds and starts accepting connections. A no-op, returning the
    /// already-bound port, if an acceptor is already running.
    pub async fn open_acceptor(&self) -> Result<u16, Error> {
        let mut guard = self.acceptor.lock().await;
        if let Some(acceptor) = guard.as_ref() {
            return Ok(acceptor.local_addr.port());
        }

        let socket_addr = self.bind_addr.to_socket_addr()?;
        let listener = TcpListener::bind(socket_addr).await?;
        let local_addr = listener.local_addr()?;

        let peers = self.peers.clone();
        let handler = self.handler.clone();
        let config = self.config.clone();
        let runtime = self.runtime.clone();

        let task = self.runtime.spawn(async move {
            loop {
                let (stream, peer_addr) = match listener.accept().await {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        warn!("accept loop stopping: {e}");
                        break;
                    }
                };

                let registry: Weak<dyn PeerRegistry> = Arc::downgrade(&peers) as Weak<dyn PeerRegistry>;
                let connection = match Connection::spawn(
                    stream,
                    ConnectionAddress::from(local_addr),
                    ConnectionAddress::from(peer_addr),
                    handler.clone(),
                    &config,
                    registry,
                    &runtime,
                ) {
                    Ok(connection) => connection,
                    Err(e) => {
                        warn!("failed to accept connection from {peer_addr}: {e}");
                        continue;
                    }
                };

                peers.insert(connection);
            }
        });

        self.listen_port.store(local_addr.port(), Ordering::SeqCst);
        *guard = Some(Acceptor { local_addr, task });
        Ok(local_addr.port())
    }

    /// Stops accepting new connections. Already-accepted peers are
    /// unaffected.
    pub async fn close_acceptor(&self) {
        if let Some(acceptor) = self.acceptor.lock().await.take() {
            acceptor.task.abort();
        }
    }

    pub async fn listen_port(&self) -> Option<u16> {
        self.acceptor.lock().await.as_ref().map(|a| a.local_addr.port())
    }

    pub fn number_of_clients(&self) -> usize {
        self.peers.len()
    }

    /// The local address the server presented to `client`, or
    /// `{"0.0.0.0", listen_port}` if no such peer is currently connected.
    pub fn get_server_details_for_client(&self, client: &ConnectionAddress) -> ConnectionAddress {
        self.peers
            .get(client)
            .map(|c| c.local().clone())
            .unwrap_or_else(|| ConnectionAddress::new("0.0.0.0", self.listen_port.load(Ordering::SeqCst)))
    }

    pub fn send_to_client_async(&self, client: &ConnectionAddress, frame: Bytes) -> bool {
        self.peers.get(client).map(|c| c.send_async(frame)).unwrap_or(false)
    }

    pub async fn send_to_client_sync(&self, client: &ConnectionAddress, frame: Bytes) -> Result<bool, Error> {
        match self.peers.get(client) {
            Some(conn) => conn.send_sync(frame).await,
            None => Err(Error::UnknownConnection(client.clone())),
        }
    }

    pub async fn send_typed_to_client_async<A: Archive<T>, T>(&self, client: &ConnectionAddress, value: &T) -> bool {
        let Some(conn) = self.peers.get(client) else { return false };
        let Ok(frame) = self.builder.build_with_typed::<A, T>(conn.local().clone(), ConnectionAddress::null(), conn.next_message_id(), value) else {
            return false;
        };
        conn.send_async(frame)
    }

    /// Serialization failures are folded into `Ok(false)` rather than
    /// propagated, matching [`TcpServer::send_typed_to_client_async`]: only
    /// an unknown peer or an I/O failure on the write is reported as `Err`.
    pub async fn send_typed_to_client_sync<A: Archive<T>, T>(&self, client: &ConnectionAddress, value: &T) -> Result<bool, Error> {
        let Some(conn) = self.peers.get(client) else { return Err(Error::UnknownConnection(client.clone())) };
        let Ok(frame) = self.builder.build_with_typed::<A, T>(conn.local().clone(), ConnectionAddress::null(), conn.next_message_id(), value) else {
            return Ok(false);
        };
        conn.send_sync(frame).await
    }

    /// Queues `frame` on every currently-connected peer, returning how many
    /// accepted it onto their send queue.
    pub fn send_to_all(&self, frame: Bytes) -> usize {
        self.peers.all().into_iter().filter(|conn| conn.send_async(frame.clone())).count()
    }
}
