// This file is part of asio-tcp.
// Licensed under the Apache License, Version 2.0.

//! The archive registry: maps an in-band archive tag to an encode/decode
//! implementation for typed payloads.
//!
//! The distilled spec describes this as a runtime map from tag to
//! encode/decode function. Rust's trait system lets the same contract be
//! expressed at compile time instead: each archive is a zero-sized marker
//! type implementing [`Archive<T>`] for whichever payload types it can
//! handle, and [`crate::builder::MessageBuilder::build_with_typed`] is
//! generic over the marker. This avoids a `Box<dyn Any>` + downcast dance
//! while keeping the same "tag identifies an encoding" contract — see
//! DESIGN.md for the full rationale.

use crate::error::ArchiveError;

use serde::{de::DeserializeOwned, Serialize};

/// In-band enumeration identifying a body's serialization format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ArchiveTag {
    RawBinary,
    PortableBinary,
    Text,
    Xml,
    Json,
    Protobuf,
}

impl ArchiveTag {
    pub(crate) fn as_u16(self) -> u16 {
        match self {
            ArchiveTag::RawBinary => 0,
            ArchiveTag::PortableBinary => 1,
            ArchiveTag::Text => 2,
            ArchiveTag::Xml => 3,
            ArchiveTag::Json => 4,
            ArchiveTag::Protobuf => 5,
        }
    }

    pub(crate) fn from_u16(tag: u16) -> Self {
        match tag {
            1 => ArchiveTag::PortableBinary,
            2 => ArchiveTag::Text,
            3 => ArchiveTag::Xml,
            4 => ArchiveTag::Json,
            5 => ArchiveTag::Protobuf,
            _ => ArchiveTag::RawBinary,
        }
    }
}

/// An archive capable of encoding/decoding values of type `T`.
///
/// Implemented by the zero-sized marker types below; callers name one as a
/// type parameter (e.g. `builder.build_with_typed::<Json, _>(...)`) rather
/// than passing an [`ArchiveTag`] value, so the encoding is picked at
/// compile time and the header's tag field is derived from [`Archive::TAG`].
pub trait Archive<T> {
    const TAG: ArchiveTag;

    fn encode(value: &T) -> Result<Vec<u8>, ArchiveError>;
    fn decode(bytes: &[u8]) -> Result<T, ArchiveError>;
}

/// Opaque bytes, carried without any further encoding.
pub struct RawBinary;

impl Archive<Vec<u8>> for RawBinary {
    const TAG: ArchiveTag = ArchiveTag::RawBinary;

    fn encode(value: &Vec<u8>) -> Result<Vec<u8>, ArchiveError> {
        Ok(value.clone())
    }

    fn decode(bytes: &[u8]) -> Result<Vec<u8>, ArchiveError> {
        Ok(bytes.to_vec())
    }
}

/// Compact binary encoding, via `bincode`. The closest equivalent of the
/// original's "portable binary archive".
pub struct PortableBinary;

impl<T: Serialize + DeserializeOwned> Archive<T> for PortableBinary {
    const TAG: ArchiveTag = ArchiveTag::PortableBinary;

    fn encode(value: &T) -> Result<Vec<u8>, ArchiveError> {
        bincode::serialize(value).map_err(|e| ArchiveError::Encode(e.to_string()))
    }

    fn decode(bytes: &[u8]) -> Result<T, ArchiveError> {
        bincode::deserialize(bytes).map_err(|e| ArchiveError::Decode(e.to_string()))
    }
}

/// Human-readable text encoding, via `toml`.
pub struct Text;

impl<T: Serialize + DeserializeOwned> Archive<T> for Text {
    const TAG: ArchiveTag = ArchiveTag::Text;

    fn encode(value: &T) -> Result<Vec<u8>, ArchiveError> {
        toml::to_string(value).map(String::into_bytes).map_err(|e| ArchiveError::Encode(e.to_string()))
    }

    fn decode(bytes: &[u8]) -> Result<T, ArchiveError> {
        let text = std::str::from_utf8(bytes).map_err(|e| ArchiveError::Decode(e.to_string()))?;
        toml::from_str(text).map_err(|e| ArchiveError::Decode(e.to_string()))
    }
}

/// XML encoding, via `quick-xml`'s serde support.
pub struct Xml;

impl<T: Serialize + DeserializeOwned> Archive<T> for Xml {
    const TAG: ArchiveTag = ArchiveTag::Xml;

    fn encode(value: &T) -> Result<Vec<u8>, ArchiveError> {
        quick_xml::se::to_string(value).map(String::into_bytes).map_err(|e| ArchiveError::Encode(e.to_string()))
    }

    fn decode(bytes: &[u8]) -> Result<T, ArchiveError> {
        let text = std::str::from_utf8(bytes).map_err(|e| ArchiveError::Decode(e.to_string()))?;
        quick_xml::de::from_str(text).map_err(|e| ArchiveError::Decode(e.to_string()))
    }
}

/// JSON encoding, via `serde_json`.
pub struct Json;

impl<T: Serialize + DeserializeOwned> Archive<T> for Json {
    const TAG: ArchiveTag = ArchiveTag::Json;

    fn encode(value: &T) -> Result<Vec<u8>, ArchiveError> {
        serde_json::to_vec(value).map_err(|e| ArchiveError::Encode(e.to_string()))
    }

    fn decode(bytes: &[u8]) -> Result<T, ArchiveError> {
        serde_json::from_slice(bytes).map_err(|e| ArchiveError::Decode(e.to_string()))
    }
}

/// Protocol Buffers encoding, via `prost`. `T` is expected to be a
/// `#[derive(prost::Message)]` type (hand-annotated with `#[prost(..)]`
/// field tags rather than generated from a `.proto` file, since this crate
/// has no build-time codegen step).
pub struct Protobuf;

impl<T: prost::Message + Default> Archive<T> for Protobuf {
    const TAG: ArchiveTag = ArchiveTag::Protobuf;

    fn encode(value: &T) -> Result<Vec<u8>, ArchiveError> {
        Ok(value.encode_to_vec())
    }

    fn decode(bytes: &[u8]) -> Result<T, ArchiveError> {
        T::decode(bytes).map_err(|e| ArchiveError::Decode(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Sample {
        name: String,
        counter: u32,
    }

    #[test]
    fn json_round_trip() {
        let value = Sample { name: "a".into(), counter: 7 };
        let bytes = Json::encode(&value).unwrap();
        assert_eq!(<Json as Archive<Sample>>::decode(&bytes).unwrap(), value);
    }

    #[test]
    fn portable_binary_round_trip() {
        let value = Sample { name: "b".into(), counter: 9 };
        let bytes = PortableBinary::encode(&value).unwrap();
        assert_eq!(<PortableBinary as Archive<Sample>>::decode(&bytes).unwrap(), value);
    }

    #[test]
    fn text_round_trip() {
        let value = Sample { name: "c".into(), counter: 3 };
        let bytes = Text::encode(&value).unwrap();
        assert_eq!(<Text as Archive<Sample>>::decode(&bytes).unwrap(), value);
    }

    #[test]
    fn xml_round_trip() {
        let value = Sample { name: "d".into(), counter: 11 };
        let bytes = Xml::encode(&value).unwrap();
        assert_eq!(<Xml as Archive<Sample>>::decode(&bytes).unwrap(), value);
    }

    #[test]
    fn raw_binary_is_passthrough() {
        let value = vec![1u8, 2, 3, 4];
        let bytes = RawBinary::encode(&value).unwrap();
        assert_eq!(bytes, value);
        assert_eq!(RawBinary::decode(&bytes).unwrap(), value);
    }

    #[test]
    fn tag_round_trips_through_u16() {
        for tag in [
            ArchiveTag::RawBinary,
            ArchiveTag::PortableBinary,
            ArchiveTag::Text,
            ArchiveTag::Xml,
            ArchiveTag::Json,
            ArchiveTag::Protobuf,
        ] {
            assert_eq!(ArchiveTag::from_u16(tag.as_u16()), tag);
        }
    }
}
