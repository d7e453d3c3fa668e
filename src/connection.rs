// This file is part of asio-tcp.
// Licensed under the Apache License, Version 2.0.

//! A single, already-established TCP connection: one task draining frames
//! off the wire into a [`MessageHandler`], one task draining queued
//! asynchronous sends onto the wire, and a shared write half both that pump
//! and synchronous callers serialize against.

use crate::{
    address::ConnectionAddress,
    error::Error,
    handler::{FrameCodec, MessageHandler, ReceivedMessage},
    header::split_frame,
    options::Config,
    runtime::IoRuntime,
};

use std::sync::{
    atomic::{AtomicBool, AtomicI32, Ordering},
    Arc, Weak,
};

use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use tokio::{
    net::{
        tcp::{OwnedReadHalf, OwnedWriteHalf},
        TcpStream,
    },
    sync::{mpsc, Mutex},
};
use tokio_util::codec::{FramedRead, FramedWrite};

/// Lets a [`Connection`] remove itself from whatever table is tracking it
/// once its read loop ends, without the connection module depending on the
/// concrete registry type (which would make `connection` and `server`
/// mutually dependent).
pub trait PeerRegistry: Send + Sync {
    fn deregister(&self, address: &ConnectionAddress);
}

/// A live, bidirectional connection to one peer.
///
/// Held as an `Arc` by its owner (a [`crate::client::TcpClient`] or the
/// server's peer map) — never by its own background tasks, which instead
/// hold only the pieces they need, so the connection's tasks never keep it
/// alive past its owner dropping it.
pub struct Connection {
    local: ConnectionAddress,
    peer: ConnectionAddress,
    write_half: Arc<Mutex<FramedWrite<OwnedWriteHalf, FrameCodec>>>,
    async_tx: mpsc::Sender<Bytes>,
    connected: Arc<AtomicBool>,
    next_message_id: AtomicI32,
    registry: Weak<dyn PeerRegistry>,
}

impl Connection {
    /// Takes ownership of an already-connected socket and starts its read
    /// loop and write pump on `runtime`.
    pub fn spawn(
        stream: TcpStream,
        local: ConnectionAddress,
        peer: ConnectionAddress,
        handler: Arc<dyn MessageHandler>,
        config: &Config,
        registry: Weak<dyn PeerRegistry>,
        runtime: &IoRuntime,
    ) -> std::io::Result<Arc<Connection>> {
        stream.set_nodelay(config.send_option.nodelay())?;
        let (read_half, write_half) = stream.into_split();
        let write_half = Arc::new(Mutex::new(FramedWrite::new(write_half, FrameCodec::new())));
        let (async_tx, async_rx) = mpsc::channel(config.max_unsent_async.max(1));
        let connected = Arc::new(AtomicBool::new(true));

        let connection = Arc::new(Connection {
            local,
            peer: peer.clone(),
            write_half: write_half.clone(),
            async_tx,
            connected: connected.clone(),
            next_message_id: AtomicI32::new(0),
            registry: registry.clone(),
        });

        #[cfg(feature = "metrics")]
        metrics::gauge!("asio_tcp_connected_peers").increment(1.0);

        runtime.spawn(Self::write_pump(write_half, async_rx, connected.clone()));
        runtime.spawn(Self::read_loop(read_half, peer, handler, connected, registry));

        Ok(connection)
    }

    async fn write_pump(
        write_half: Arc<Mutex<FramedWrite<OwnedWriteHalf, FrameCodec>>>,
        mut async_rx: mpsc::Receiver<Bytes>,
        connected: Arc<AtomicBool>,
    ) {
        while let Some(frame) = async_rx.recv().await {
            let mut guard = write_half.lock().await;
            if let Err(e) = guard.send(frame).await {
                debug!("async write pump stopping: {e}");
                connected.store(false, Ordering::SeqCst);
                break;
            }
        }
    }

    async fn read_loop(
        read_half: OwnedReadHalf,
        peer: ConnectionAddress,
        handler: Arc<dyn MessageHandler>,
        connected: Arc<AtomicBool>,
        registry: Weak<dyn PeerRegistry>,
    ) {
        let mut reader = FramedRead::new(read_half, FrameCodec::new());
        while let Some(frame) = reader.next().await {
            let bytes = match frame {
                Ok(bytes) => bytes,
                Err(e) => {
                    debug!("connection to {peer} closed: {e}");
                    break;
                }
            };
            let (header, body) = match split_frame(bytes) {
                Ok(parts) => parts,
                Err(e) => {
                    warn!("dropping connection to {peer}: {e}");
                    break;
                }
            };
            #[cfg(feature = "metrics")]
            metrics::counter!("asio_tcp_messages_received_total").increment(1);

            let message = ReceivedMessage::from_frame(header, body);
            let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                handler.on_message_received(message)
            }));
            if let Err(payload) = outcome {
                error!("message handler for {peer} panicked: {payload:?}");
            }
        }

        connected.store(false, Ordering::SeqCst);
        #[cfg(feature = "metrics")]
        metrics::gauge!("asio_tcp_connected_peers").decrement(1.0);
        if let Some(registry) = registry.upgrade() {
            registry.deregister(&peer);
        }
    }

    pub fn local(&self) -> &ConnectionAddress {
        &self.local
    }

    pub fn peer(&self) -> &ConnectionAddress {
        &self.peer
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Monotonically increasing per-connection message id, starting at 0.
    pub fn next_message_id(&self) -> i32 {
        self.next_message_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Queues `frame` for the write pump. Returns `false` without blocking
    /// if the connection is closed or the outstanding-send queue is full.
    pub fn send_async(&self, frame: Bytes) -> bool {
        if !self.is_connected() {
            return false;
        }
        self.async_tx.try_send(frame).is_ok()
    }

    /// Writes `frame` directly, serialized against the write pump through
    /// the same write-half lock. `Ok(false)` means the connection was
    /// already closed; `Err` means the write itself failed.
    pub async fn send_sync(&self, frame: Bytes) -> Result<bool, Error> {
        if !self.is_connected() {
            return Ok(false);
        }
        let mut guard = self.write_half.lock().await;
        match guard.send(frame).await {
            Ok(()) => Ok(true),
            Err(e) => {
                self.connected.store(false, Ordering::SeqCst);
                Err(e)
            }
        }
    }

    /// Marks the connection closed and shuts down the write half. The read
    /// loop observes the resulting EOF (or a failed peer write) and
    /// deregisters on its own.
    pub async fn close(&self) {
        self.connected.store(false, Ordering::SeqCst);
        let mut guard = self.write_half.lock().await;
        let _ = guard.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        archive::Json,
        builder::{DefaultMessageBuilder, MessageBuilder},
        handler::MessageHandler,
        header::split_frame,
    };
    use serde::{Deserialize, Serialize};
    use std::sync::Mutex as StdMutex;
    use tokio::net::TcpListener;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Ping {
        seq: u32,
    }

    struct CollectingHandler {
        received: Arc<StdMutex<Vec<ReceivedMessage>>>,
        notify: Arc<tokio::sync::Notify>,
    }

    impl MessageHandler for CollectingHandler {
        fn on_message_received(&self, message: ReceivedMessage) {
            self.received.lock().unwrap().push(message);
            self.notify.notify_one();
        }
    }

    struct NullRegistry;
    impl PeerRegistry for NullRegistry {
        fn deregister(&self, _address: &ConnectionAddress) {}
    }

    /// The two connections share one handler, so `received` accumulates
    /// whichever side's read loop actually sees traffic.
    async fn connected_pair() -> (Arc<Connection>, Arc<Connection>, Arc<StdMutex<Vec<ReceivedMessage>>>, Arc<tokio::sync::Notify>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let local_addr = listener.local_addr().unwrap();

        let accept = tokio::spawn(async move { listener.accept().await.unwrap().0 });
        let client_stream = TcpStream::connect(local_addr).await.unwrap();
        let server_stream = accept.await.unwrap();

        let runtime = IoRuntime::from_current();
        let registry: Weak<dyn PeerRegistry> = Weak::<NullRegistry>::new();
        let config = Config::default();

        let received = Arc::new(StdMutex::new(Vec::new()));
        let notify = Arc::new(tokio::sync::Notify::new());
        let handler: Arc<dyn MessageHandler> =
            Arc::new(CollectingHandler { received: received.clone(), notify: notify.clone() });

        let client = Connection::spawn(
            client_stream,
            ConnectionAddress::new("127.0.0.1", 0),
            ConnectionAddress::from(local_addr),
            handler.clone(),
            &config,
            registry.clone(),
            &runtime,
        )
        .unwrap();

        let server = Connection::spawn(
            server_stream,
            ConnectionAddress::from(local_addr),
            ConnectionAddress::new("127.0.0.1", 0),
            handler,
            &config,
            registry,
            &runtime,
        )
        .unwrap();

        (client, server, received, notify)
    }

    #[tokio::test]
    async fn async_send_is_delivered_and_decodable() {
        let (client, _server, _received, _notify) = connected_pair().await;
        let builder = DefaultMessageBuilder;
        let value = Ping { seq: 9 };
        let frame = builder
            .build_with_typed::<Json, _>(client.local().clone(), ConnectionAddress::null(), client.next_message_id(), &value)
            .unwrap();

        assert!(client.send_async(frame));
        // Delivery happens on the peer's read loop; give the scheduler a turn.
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    }

    #[tokio::test]
    async fn sync_send_reports_delivery() {
        let (client, _server, _received, _notify) = connected_pair().await;
        let builder = DefaultMessageBuilder;
        let frame = builder
            .build_header_only(client.local().clone(), ConnectionAddress::null(), client.next_message_id())
            .unwrap();

        let delivered = client.send_sync(frame).await.unwrap();
        assert!(delivered);
    }

    #[tokio::test]
    async fn closing_stops_further_sync_sends() {
        let (client, _server, _received, _notify) = connected_pair().await;
        client.close().await;
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        let builder = DefaultMessageBuilder;
        let frame = builder.build_header_only(client.local().clone(), ConnectionAddress::null(), 0).unwrap();
        let delivered = client.send_sync(frame).await.unwrap();
        assert!(!delivered);
    }

    #[tokio::test]
    async fn async_sends_from_one_thread_are_delivered_in_issue_order() {
        let (client, _server, received, notify) = connected_pair().await;
        let builder = DefaultMessageBuilder;

        const COUNT: i32 = 20;
        for seq in 0..COUNT {
            let value = Ping { seq: seq as u32 };
            let frame = builder
                .build_with_typed::<Json, _>(client.local().clone(), ConnectionAddress::null(), seq, &value)
                .unwrap();
            assert!(client.send_async(frame));
        }

        while (received.lock().unwrap().len() as i32) < COUNT {
            tokio::time::timeout(std::time::Duration::from_secs(2), notify.notified()).await.unwrap();
        }

        let message_ids: Vec<i32> = received.lock().unwrap().iter().map(|m| m.message_id).collect();
        let expected: Vec<i32> = (0..COUNT).collect();
        assert_eq!(message_ids, expected);
    }

    /// Pins the literal queue-bound scenario: with a 4-deep queue, issuing
    /// five async sends back-to-back (no `.await` in between, so the write
    /// pump — spawned on this same current-thread test runtime — never gets
    /// a chance to drain any of them first) accepts exactly the first four.
    #[tokio::test]
    async fn queue_bound_refuses_only_the_send_past_capacity() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let local_addr = listener.local_addr().unwrap();
        let accept = tokio::spawn(async move { listener.accept().await.unwrap().0 });
        let client_stream = TcpStream::connect(local_addr).await.unwrap();
        let _server_stream = accept.await.unwrap();

        let runtime = IoRuntime::from_current();
        let registry: Weak<dyn PeerRegistry> = Weak::<NullRegistry>::new();
        let config = Config { max_unsent_async: 4, ..Config::default() };
        let handler: Arc<dyn MessageHandler> =
            Arc::new(CollectingHandler { received: Arc::new(StdMutex::new(Vec::new())), notify: Arc::new(tokio::sync::Notify::new()) });

        let client = Connection::spawn(
            client_stream,
            ConnectionAddress::new("127.0.0.1", 0),
            ConnectionAddress::from(local_addr),
            handler,
            &config,
            registry,
            &runtime,
        )
        .unwrap();

        let builder = DefaultMessageBuilder;
        let mut accepted = Vec::new();
        for seq in 0..5 {
            let frame = builder.build_header_only(client.local().clone(), ConnectionAddress::null(), seq).unwrap();
            accepted.push(client.send_async(frame));
        }

        assert_eq!(accepted, vec![true, true, true, true, false]);
    }

    #[test]
    fn split_frame_from_header_only_has_empty_body() {
        let builder = DefaultMessageBuilder;
        let frame = builder
            .build_header_only(ConnectionAddress::new("a", 1), ConnectionAddress::null(), 0)
            .unwrap();
        let (_, body) = split_frame(frame).unwrap();
        assert!(body.is_empty());
    }
}
