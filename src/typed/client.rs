// This file is part of asio-tcp.
// Licensed under the Apache License, Version 2.0.

use crate::{archive::Archive, client::TcpClient, error::Error};

use std::marker::PhantomData;

/// A [`TcpClient`] fixed to one archive `A` and payload type `T`.
pub struct TypedTcpClient<A, T> {
    inner: TcpClient,
    _marker: PhantomData<(A, T)>,
}

impl<A: Archive<T>, T> TypedTcpClient<A, T> {
    pub fn new(inner: TcpClient) -> Self {
        Self { inner, _marker: PhantomData }
    }

    pub fn inner(&self) -> &TcpClient {
        &self.inner
    }

    pub async fn connected(&self) -> bool {
        self.inner.connected().await
    }

    pub async fn send_async(&self, value: &T) -> bool {
        self.inner.send_typed_async::<A, T>(value).await
    }

    pub async fn send_sync(&self, value: &T) -> Result<bool, Error> {
        self.inner.send_typed_sync::<A, T>(value).await
    }

    pub async fn close(&self) {
        self.inner.close_connection().await
    }
}
