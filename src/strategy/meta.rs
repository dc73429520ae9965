//! Order metadata envelope
//!
//! Layout: optional 8-byte magic, then a CBOR map. Key 0 holds the payload
//! bytes, key 3 optionally names the content encoding. The payload is the
//! program source, zlib-compressed (raw deflate is accepted too).

use crate::error::MetaError;
use flate2::read::{DeflateDecoder, ZlibDecoder};
use minicbor::data::Type;
use minicbor::Decoder;
use std::io::Read;
use tracing::debug;

/// Prefix marking a metadata document
pub const META_MAGIC: [u8; 8] = [0xff, 0x0a, 0x89, 0xc6, 0x74, 0xee, 0x78, 0x74];

const KEY_PAYLOAD: u64 = 0;
const KEY_CONTENT_ENCODING: u64 = 3;

/// Payload item of the envelope, still compressed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub payload: Vec<u8>,
    pub content_encoding: Option<String>,
}

/// Metadata given as `0x`-prefixed or bare hex
pub fn decode_hex(input: &str) -> Result<Vec<u8>, MetaError> {
    let trimmed = input.trim();
    let digits = trimmed.strip_prefix("0x").unwrap_or(trimmed);
    alloy::primitives::hex::decode(digits).map_err(|e| MetaError::Hex(e.to_string()))
}

fn is_unsigned(ty: Type) -> bool {
    matches!(ty, Type::U8 | Type::U16 | Type::U32 | Type::U64)
}

/// Parse the first CBOR item (a map) of a metadata document
pub fn parse_envelope(meta: &[u8]) -> Result<Envelope, MetaError> {
    if meta.is_empty() {
        return Err(MetaError::Empty);
    }
    let body = meta.strip_prefix(&META_MAGIC[..]).unwrap_or(meta);
    if body.is_empty() {
        return Err(MetaError::Empty);
    }

    let mut decoder = Decoder::new(body);
    let entries = decoder
        .map()?
        .ok_or_else(|| MetaError::Cbor("indefinite-length map".to_string()))?;

    let mut payload = None;
    let mut content_encoding = None;
    for _ in 0..entries {
        if !is_unsigned(decoder.datatype()?) {
            decoder.skip()?;
            decoder.skip()?;
            continue;
        }
        match decoder.u64()? {
            KEY_PAYLOAD => payload = Some(decoder.bytes()?.to_vec()),
            KEY_CONTENT_ENCODING => content_encoding = Some(decoder.str()?.to_string()),
            _ => decoder.skip()?,
        }
    }

    Ok(Envelope {
        payload: payload.ok_or(MetaError::MissingPayload)?,
        content_encoding,
    })
}

/// Inflate a zlib stream, falling back to raw deflate
pub fn inflate(payload: &[u8]) -> Result<Vec<u8>, MetaError> {
    let mut out = Vec::new();
    if ZlibDecoder::new(payload).read_to_end(&mut out).is_ok() {
        return Ok(out);
    }

    out.clear();
    DeflateDecoder::new(payload)
        .read_to_end(&mut out)
        .map_err(|e| MetaError::Inflate(e.to_string()))?;
    Ok(out)
}

/// Decompressed program source carried by the metadata
pub fn program_source(meta: &[u8]) -> Result<String, MetaError> {
    let envelope = parse_envelope(meta)?;
    if let Some(encoding) = &envelope.content_encoding {
        debug!("Metadata content encoding: {}", encoding);
    }
    let raw = inflate(&envelope.payload)?;
    String::from_utf8(raw).map_err(|_| MetaError::Utf8)
}
