// This file is part of asio-tcp.
// Licensed under the Apache License, Version 2.0.

//! Assembles outbound frames: a [`crate::header::MessageHeader`] followed by
//! a body, ready to hand to a connection's write path.

use crate::{
    address::ConnectionAddress,
    archive::{Archive, ArchiveTag},
    error::Error,
    header::{MessageHeader, HEADER_SIZE},
};

use bytes::Bytes;

/// Builds complete, checksummed frames.
///
/// `build_with_typed` is generic rather than a `build_with_archive(tag, ...)`
/// taking a runtime tag, so the archive is picked (and its bound checked) at
/// compile time — see [`crate::archive`].
pub trait MessageBuilder {
    fn build_header_only(
        &self,
        source: ConnectionAddress,
        response: ConnectionAddress,
        message_id: i32,
    ) -> Result<Bytes, Error>;

    fn build_with_body(
        &self,
        source: ConnectionAddress,
        response: ConnectionAddress,
        message_id: i32,
        body: &[u8],
    ) -> Result<Bytes, Error>;

    fn build_with_typed<A: Archive<T>, T>(
        &self,
        source: ConnectionAddress,
        response: ConnectionAddress,
        message_id: i32,
        value: &T,
    ) -> Result<Bytes, Error>;
}

/// The builder used by every connection, client, and server unless a caller
/// swaps in a different one.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultMessageBuilder;

impl DefaultMessageBuilder {
    fn assemble(
        source: ConnectionAddress,
        response: ConnectionAddress,
        message_id: i32,
        archive_tag: ArchiveTag,
        body: &[u8],
    ) -> Result<Bytes, Error> {
        let total_length = (HEADER_SIZE + body.len()) as u32;
        let header = MessageHeader { source, response, message_id, archive_tag, total_length };
        let mut buf = header.to_bytes()?;
        buf.extend_from_slice(body);
        Ok(buf.freeze())
    }
}

impl MessageBuilder for DefaultMessageBuilder {
    fn build_header_only(
        &self,
        source: ConnectionAddress,
        response: ConnectionAddress,
        message_id: i32,
    ) -> Result<Bytes, Error> {
        Self::assemble(source, response, message_id, ArchiveTag::RawBinary, &[])
    }

    fn build_with_body(
        &self,
        source: ConnectionAddress,
        response: ConnectionAddress,
        message_id: i32,
        body: &[u8],
    ) -> Result<Bytes, Error> {
        Self::assemble(source, response, message_id, ArchiveTag::RawBinary, body)
    }

    fn build_with_typed<A: Archive<T>, T>(
        &self,
        source: ConnectionAddress,
        response: ConnectionAddress,
        message_id: i32,
        value: &T,
    ) -> Result<Bytes, Error> {
        let body = A::encode(value)?;
        Self::assemble(source, response, message_id, A::TAG, &body)
    }
}
