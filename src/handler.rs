// This file is part of asio-tcp.
// Licensed under the Apache License, Version 2.0.

//! Frame decoding and the callback surface a received message is delivered
//! through.

use crate::{
    address::ConnectionAddress,
    archive::{Archive, ArchiveTag},
    error::{ArchiveError, Error, FramingError},
    header::{MessageHeader, HEADER_SIZE},
    options, Dispatcher,
};

use bytes::{Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

/// Offset, within an encoded header, of the little-endian `total_length`
/// field. Lets the decoder learn a frame's size without fully parsing (and
/// checksumming) a header it may not have buffered all of yet.
const TOTAL_LENGTH_OFFSET: usize =
    options::DEFAULT_MAGIC.len() + (options::HOST_FIELD_WIDTH + 2) * 2 + 4 + 2;

/// A fully decoded, checksum-verified message handed to application code.
#[derive(Clone, Debug)]
pub struct ReceivedMessage {
    pub source: ConnectionAddress,
    pub response: ConnectionAddress,
    pub message_id: i32,
    pub archive_tag: ArchiveTag,
    pub body: Bytes,
}

impl ReceivedMessage {
    pub(crate) fn from_frame(header: MessageHeader, body: Bytes) -> Self {
        Self { source: header.source, response: header.response, message_id: header.message_id, archive_tag: header.archive_tag, body }
    }

    /// Decodes this message's body with a specific archive, verifying that
    /// the tag it actually arrived with matches the one requested.
    pub fn decode<A: Archive<T>, T>(&self) -> Result<T, Error> {
        if self.archive_tag != A::TAG {
            return Err(ArchiveError::Unsupported(self.archive_tag).into());
        }
        A::decode(&self.body).map_err(Error::from)
    }
}

/// Delivers decoded messages to application code.
///
/// `bytes_left_to_read` is consulted once a header has been parsed and lets
/// a handler second-guess the header's own declared length; the default
/// trusts it, which is correct for every archive this crate ships.
pub trait MessageHandler: Send + Sync {
    fn bytes_left_to_read(&self, header: &MessageHeader) -> usize {
        header.body_len()
    }

    fn on_message_received(&self, message: ReceivedMessage);
}

/// The handler every connection uses unless the owner supplies its own:
/// forwards every message to a single dispatcher closure.
pub struct DefaultMessageHandler {
    dispatcher: Dispatcher,
}

impl DefaultMessageHandler {
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self { dispatcher }
    }
}

impl MessageHandler for DefaultMessageHandler {
    fn on_message_received(&self, message: ReceivedMessage) {
        (self.dispatcher)(message);
    }
}

/// Decodes the length-prefixed wire format frame by frame.
///
/// Unlike a generic `LengthDelimitedCodec`, the length field sits partway
/// through a fixed-size header rather than at a known fixed offset from the
/// start of the stream, so decoding happens in two steps: peek the declared
/// total length once [`HEADER_SIZE`] bytes are buffered, then wait for the
/// rest of the frame before parsing (and checksumming) the header for real.
#[derive(Default)]
pub struct FrameCodec {
    /// Declared length of the frame currently being assembled, once known.
    current_frame_len: Option<usize>,
}

impl FrameCodec {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Decoder for FrameCodec {
    type Item = Bytes;
    type Error = Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let frame_len = match self.current_frame_len {
            Some(len) => len,
            None => {
                if src.len() < HEADER_SIZE {
                    src.reserve(HEADER_SIZE - src.len());
                    return Ok(None);
                }
                let total_length = u32::from_le_bytes(
                    src[TOTAL_LENGTH_OFFSET..TOTAL_LENGTH_OFFSET + 4].try_into().unwrap(),
                ) as usize;
                if total_length < HEADER_SIZE {
                    return Err(FramingError::ImplausibleLength {
                        total_length: total_length as u32,
                        header_size: HEADER_SIZE,
                    }
                    .into());
                }
                self.current_frame_len = Some(total_length);
                total_length
            }
        };

        if src.len() < frame_len {
            src.reserve(frame_len - src.len());
            return Ok(None);
        }

        let frame = src.split_to(frame_len).freeze();
        self.current_frame_len = None;

        // Parsing the header here (rather than only peeking its length
        // field above) is what actually verifies the checksum.
        MessageHeader::from_bytes(&frame[..HEADER_SIZE])?;
        Ok(Some(frame))
    }
}

impl Encoder<Bytes> for FrameCodec {
    type Error = Error;

    fn encode(&mut self, item: Bytes, dst: &mut BytesMut) -> Result<(), Self::Error> {
        dst.extend_from_slice(&item);
        Ok(())
    }
}
