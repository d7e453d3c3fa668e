// This file is part of asio-tcp.
// Licensed under the Apache License, Version 2.0.

//! Send options and the tunable constants the distilled spec calls out as
//! "implementation-defined".

/// Nagle's algorithm policy, applied once via `TcpStream::set_nodelay`
/// before a connection's first write.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SendOption {
    NagleOn,
    NagleOff,
}

impl SendOption {
    /// `true` means `set_nodelay(true)`, i.e. Nagle disabled.
    pub(crate) fn nodelay(self) -> bool {
        matches!(self, SendOption::NagleOff)
    }
}

impl Default for SendOption {
    fn default() -> Self {
        SendOption::NagleOff
    }
}

/// The magic byte string written at the start of every header, used to
/// detect framing desynchronization.
pub const DEFAULT_MAGIC: &[u8] = b"_BEGIN_MESSAGE_";

/// Fixed width, in bytes, of the null-padded ASCII host fields in the wire
/// header.
pub const HOST_FIELD_WIDTH: usize = 64;

/// Default bound on a connection's outstanding async send queue.
pub const MAX_UNSENT_ASYNC_MSG_COUNT: usize = 32;

/// Per-connection/client/server tunables.
#[derive(Clone, Debug)]
pub struct Config {
    pub max_unsent_async: usize,
    pub send_option: SendOption,
}

impl Default for Config {
    fn default() -> Self {
        Self { max_unsent_async: MAX_UNSENT_ASYNC_MSG_COUNT, send_option: SendOption::default() }
    }
}
