// This file is part of asio-tcp.
// Licensed under the Apache License, Version 2.0.

use crate::{address::ConnectionAddress, archive::Archive, error::Error, server::TcpServer};

use std::marker::PhantomData;

/// A [`TcpServer`] fixed to one archive `A` and payload type `T`.
pub struct TypedTcpServer<A, T> {
    inner: TcpServer,
    _marker: PhantomData<(A, T)>,
}

impl<A: Archive<T>, T> TypedTcpServer<A, T> {
    pub fn new(inner: TcpServer) -> Self {
        Self { inner, _marker: PhantomData }
    }

    pub fn inner(&self) -> &TcpServer {
        &self.inner
    }

    pub async fn open_acceptor(&self) -> Result<u16, Error> {
        self.inner.open_acceptor().await
    }

    pub async fn close_acceptor(&self) {
        self.inner.close_acceptor().await
    }

    pub fn number_of_clients(&self) -> usize {
        self.inner.number_of_clients()
    }

    pub async fn send_async(&self, client: &ConnectionAddress, value: &T) -> bool {
        self.inner.send_typed_to_client_async::<A, T>(client, value).await
    }

    pub async fn send_sync(&self, client: &ConnectionAddress, value: &T) -> Result<bool, Error> {
        self.inner.send_typed_to_client_sync::<A, T>(client, value).await
    }
}
