// This file is part of asio-tcp.
// Licensed under the Apache License, Version 2.0.

//! The Tokio runtime a client or server drives its background tasks on,
//! either borrowed from the embedding application ("default mode") or
//! created and owned outright ("standalone mode").

use std::sync::Arc;

use tokio::runtime::{Handle, Runtime};

/// Either a handle into a runtime the caller already owns, or a runtime this
/// value owns outright.
///
/// Cloning is cheap in both cases: [`Handle`] is already a cheap handle, and
/// the owned variant is wrapped in an [`Arc`].
#[derive(Clone)]
pub enum IoRuntime {
    Shared(Handle),
    Owned(Arc<Runtime>),
}

impl IoRuntime {
    /// Borrows the calling context's runtime. Panics outside of a Tokio
    /// runtime, same as [`Handle::current`].
    pub fn from_current() -> Self {
        IoRuntime::Shared(Handle::current())
    }

    /// Borrows a specific runtime handle.
    pub fn from_handle(handle: Handle) -> Self {
        IoRuntime::Shared(handle)
    }

    /// Builds and owns a fresh multi-threaded runtime for standalone use
    /// (no ambient Tokio context required).
    pub fn standalone() -> std::io::Result<Self> {
        let runtime = Runtime::new()?;
        Ok(IoRuntime::Owned(Arc::new(runtime)))
    }

    pub fn handle(&self) -> Handle {
        match self {
            IoRuntime::Shared(handle) => handle.clone(),
            IoRuntime::Owned(runtime) => runtime.handle().clone(),
        }
    }

    pub fn spawn<F>(&self, future: F) -> tokio::task::JoinHandle<F::Output>
    where
        F: std::future::Future + Send + 'static,
        F::Output: Send + 'static,
    {
        self.handle().spawn(future)
    }
}
