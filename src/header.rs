// This file is part of asio-tcp.
// Licensed under the Apache License, Version 2.0.

//! The fixed-size, field-ordered binary record that prefixes every frame.

use crate::{address::ConnectionAddress, archive::ArchiveTag, error::{Error, FramingError}, options};

use bytes::{Buf, BufMut, Bytes, BytesMut};

/// Total size, in bytes, of an encoded [`MessageHeader`].
pub const HEADER_SIZE: usize = options::DEFAULT_MAGIC.len()
    + options::HOST_FIELD_WIDTH + 2 // source host + port
    + options::HOST_FIELD_WIDTH + 2 // response host + port
    + 4 // message id
    + 2 // archive tag
    + 4 // total length
    + 4; // checksum

/// A parsed message header. `total_length` always includes [`HEADER_SIZE`]
/// itself; the body occupies `total_length - HEADER_SIZE` bytes following
/// the header on the wire.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MessageHeader {
    pub source: ConnectionAddress,
    pub response: ConnectionAddress,
    pub message_id: i32,
    pub archive_tag: ArchiveTag,
    pub total_length: u32,
}

impl MessageHeader {
    pub fn body_len(&self) -> usize {
        self.total_length as usize - HEADER_SIZE
    }

    /// Encodes this header (without a body) to its wire representation.
    pub fn to_bytes(&self) -> Result<BytesMut, Error> {
        let mut buf = BytesMut::with_capacity(HEADER_SIZE);
        buf.extend_from_slice(options::DEFAULT_MAGIC);
        write_host_field(&mut buf, &self.source.host)?;
        buf.put_u16_le(self.source.port);
        write_host_field(&mut buf, &self.response.host)?;
        buf.put_u16_le(self.response.port);
        buf.put_i32_le(self.message_id);
        buf.put_u16_le(self.archive_tag.as_u16());
        buf.put_u32_le(self.total_length);

        let checksum = fnv1a32(&buf);
        buf.put_u32_le(checksum);

        debug_assert_eq!(buf.len(), HEADER_SIZE);
        Ok(buf)
    }

    /// Parses and validates a header from the first [`HEADER_SIZE`] bytes of
    /// `bytes`. Extra trailing bytes (body data) are ignored.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, FramingError> {
        debug_assert!(bytes.len() >= HEADER_SIZE);

        let magic = &bytes[..options::DEFAULT_MAGIC.len()];
        if magic != options::DEFAULT_MAGIC {
            return Err(FramingError::BadMagic);
        }

        let claimed_checksum = u32::from_le_bytes(bytes[HEADER_SIZE - 4..HEADER_SIZE].try_into().unwrap());
        let computed_checksum = fnv1a32(&bytes[..HEADER_SIZE - 4]);
        if claimed_checksum != computed_checksum {
            return Err(FramingError::BadChecksum);
        }

        let mut cursor = &bytes[options::DEFAULT_MAGIC.len()..];

        let source_host = read_host_field(&mut cursor);
        let source_port = cursor.get_u16_le();
        let response_host = read_host_field(&mut cursor);
        let response_port = cursor.get_u16_le();
        let message_id = cursor.get_i32_le();
        let archive_tag = ArchiveTag::from_u16(cursor.get_u16_le());
        let total_length = cursor.get_u32_le();

        if (total_length as usize) < HEADER_SIZE {
            return Err(FramingError::ImplausibleLength { total_length, header_size: HEADER_SIZE });
        }

        Ok(MessageHeader {
            source: ConnectionAddress::new(source_host, source_port),
            response: ConnectionAddress::new(response_host, response_port),
            message_id,
            archive_tag,
            total_length,
        })
    }
}

fn write_host_field(buf: &mut BytesMut, host: &str) -> Result<(), Error> {
    if host.len() > options::HOST_FIELD_WIDTH {
        return Err(Error::HostTooLong(host.to_owned()));
    }
    let start = buf.len();
    buf.resize(start + options::HOST_FIELD_WIDTH, 0);
    buf[start..start + host.len()].copy_from_slice(host.as_bytes());
    Ok(())
}

fn read_host_field(cursor: &mut &[u8]) -> String {
    let field = &cursor[..options::HOST_FIELD_WIDTH];
    cursor.advance(options::HOST_FIELD_WIDTH);
    let nul = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    String::from_utf8_lossy(&field[..nul]).into_owned()
}

/// FNV-1a, 32-bit variant. A small, dependency-free checksum; the wire
/// format does not mandate a specific algorithm, only that both peers agree
/// (see distilled spec §6).
fn fnv1a32(bytes: &[u8]) -> u32 {
    const OFFSET_BASIS: u32 = 0x811c_9dc5;
    const PRIME: u32 = 0x0100_0193;

    let mut hash = OFFSET_BASIS;
    for &byte in bytes {
        hash ^= byte as u32;
        hash = hash.wrapping_mul(PRIME);
    }
    hash
}

/// Splits a complete frame into its header and body.
pub fn split_frame(frame: Bytes) -> Result<(MessageHeader, Bytes), FramingError> {
    let header = MessageHeader::from_bytes(&frame[..HEADER_SIZE])?;
    let body_len = header.body_len();
    let body = frame.slice(HEADER_SIZE..HEADER_SIZE + body_len);
    Ok((header, body))
}
