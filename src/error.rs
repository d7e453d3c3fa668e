// This file is part of asio-tcp.
// Licensed under the Apache License, Version 2.0.

use crate::{address::ConnectionAddress, archive::ArchiveTag};

use std::fmt;

/// Top-level error type returned by the synchronous, lookup, and connect
/// APIs. Asynchronous sends never return this — a refused async send is
/// reported as plain `false` (see distilled spec §7).
#[derive(Debug)]
pub enum Error {
    Io(std::io::Error),
    Framing(FramingError),
    UnknownConnection(ConnectionAddress),
    Connect(ConnectionAddress, std::io::Error),
    HostTooLong(String),
    Archive(ArchiveError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "I/O failure: {e}"),
            Error::Framing(e) => write!(f, "framing violation: {e}"),
            Error::UnknownConnection(addr) => write!(f, "no such client: {addr}"),
            Error::Connect(addr, e) => write!(f, "failed to connect to {addr}: {e}"),
            Error::HostTooLong(host) => write!(f, "host '{host}' exceeds the fixed header field width"),
            Error::Archive(e) => write!(f, "archive failure: {e}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            Error::Framing(e) => Some(e),
            Error::Connect(_, e) => Some(e),
            Error::Archive(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(error: std::io::Error) -> Self {
        Error::Io(error)
    }
}

impl From<FramingError> for Error {
    fn from(error: FramingError) -> Self {
        Error::Framing(error)
    }
}

impl From<ArchiveError> for Error {
    fn from(error: ArchiveError) -> Self {
        Error::Archive(error)
    }
}

/// Errors raised while parsing or validating a frame's header.
///
/// Every variant is non-recoverable: the distilled spec requires the
/// connection to close without retry once one of these occurs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FramingError {
    BadMagic,
    BadChecksum,
    ImplausibleLength { total_length: u32, header_size: usize },
}

impl fmt::Display for FramingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FramingError::BadMagic => write!(f, "magic tag mismatch"),
            FramingError::BadChecksum => write!(f, "header checksum mismatch"),
            FramingError::ImplausibleLength { total_length, header_size } => {
                write!(f, "total length {total_length} is smaller than the header size {header_size}")
            }
        }
    }
}

impl std::error::Error for FramingError {}

/// Errors raised by a typed payload's archive encode/decode step.
#[derive(Debug)]
pub enum ArchiveError {
    Encode(String),
    Decode(String),
    Unsupported(ArchiveTag),
}

impl fmt::Display for ArchiveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArchiveError::Encode(msg) => write!(f, "encode failed: {msg}"),
            ArchiveError::Decode(msg) => write!(f, "decode failed: {msg}"),
            ArchiveError::Unsupported(tag) => write!(f, "archive {tag:?} does not support this payload type"),
        }
    }
}

impl std::error::Error for ArchiveError {}
