// This file is part of asio-tcp.
// Licensed under the Apache License, Version 2.0.

//! A keyed pool of [`TcpClient`]s, one per distinct server address, created
//! on first use and reused afterward.

use crate::{address::ConnectionAddress, client::TcpClient, options::Config, runtime::IoRuntime, Dispatcher};

use std::{collections::HashMap, sync::Arc};

use tokio::sync::Mutex;

/// Hands out one [`TcpClient`] per server address, creating it lazily.
///
/// Every client in the pool shares the same dispatcher, config, and
/// runtime; callers who need per-server handlers should build their own map
/// of [`TcpClient`]s instead.
pub struct SimpleTcpClientList {
    dispatcher: Dispatcher,
    config: Config,
    runtime: IoRuntime,
    clients: Mutex<HashMap<ConnectionAddress, Arc<TcpClient>>>,
}

impl SimpleTcpClientList {
    pub fn new(dispatcher: Dispatcher, config: Config, runtime: IoRuntime) -> Self {
        Self { dispatcher, config, runtime, clients: Mutex::new(HashMap::new()) }
    }

    /// Returns the pooled client for `server`, creating one if this is the
    /// first request for that address.
    pub async fn client_for(&self, server: ConnectionAddress) -> Arc<TcpClient> {
        let mut guard = self.clients.lock().await;
        guard
            .entry(server.clone())
            .or_insert_with(|| Arc::new(TcpClient::new(server, self.dispatcher.clone(), self.config.clone(), self.runtime.clone())))
            .clone()
    }

    /// Closes and drops the pooled client for `server`, if any.
    pub async fn remove(&self, server: &ConnectionAddress) {
        let removed = self.clients.lock().await.remove(server);
        if let Some(client) = removed {
            client.close_connection().await;
        }
    }

    pub async fn len(&self) -> usize {
        self.clients.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::ReceivedMessage;

    fn null_dispatcher() -> Dispatcher {
        Arc::new(|_msg: ReceivedMessage| {})
    }

    #[tokio::test]
    async fn reuses_the_same_client_for_the_same_address() {
        let pool = SimpleTcpClientList::new(null_dispatcher(), Config::default(), IoRuntime::from_current());
        let addr = ConnectionAddress::new("127.0.0.1", 9999);

        let first = pool.client_for(addr.clone()).await;
        let second = pool.client_for(addr).await;
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(pool.len().await, 1);
    }

    #[tokio::test]
    async fn distinct_addresses_get_distinct_clients() {
        let pool = SimpleTcpClientList::new(null_dispatcher(), Config::default(), IoRuntime::from_current());
        pool.client_for(ConnectionAddress::new("127.0.0.1", 1)).await;
        pool.client_for(ConnectionAddress::new("127.0.0.1", 2)).await;
        assert_eq!(pool.len().await, 2);
    }

    #[tokio::test]
    async fn remove_drops_the_pooled_client() {
        let pool = SimpleTcpClientList::new(null_dispatcher(), Config::default(), IoRuntime::from_current());
        let addr = ConnectionAddress::new("127.0.0.1", 3);
        pool.client_for(addr.clone()).await;
        assert!(!pool.is_empty().await);

        pool.remove(&addr).await;
        assert!(pool.is_empty().await);
    }
}
