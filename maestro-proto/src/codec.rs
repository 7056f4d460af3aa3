//! Serialization and deserialization for the Maestro wire protocol.
//!
//! Provides encode/decode functions using postcard, along with
//! length-prefix framing variants for stream-based transports. The
//! WebSocket transport uses the unframed form since frame boundaries are
//! preserved by the transport itself.

use serde::Serialize;
use serde::de::DeserializeOwned;

/// Error type for codec encode/decode operations.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// Serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),
    /// Frame is incomplete or has an invalid length prefix.
    #[error("invalid frame: {0}")]
    InvalidFrame(String),
}

/// Encodes an event into a byte vector using postcard.
///
/// # Errors
///
/// Returns `CodecError::Serialization` if the value cannot be serialized.
pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, CodecError> {
    postcard::to_allocvec(value).map_err(|e| CodecError::Serialization(e.to_string()))
}

/// Decodes an event from a byte slice using postcard.
///
/// # Errors
///
/// Returns `CodecError::Serialization` if the bytes cannot be deserialized.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, CodecError> {
    postcard::from_bytes(bytes).map_err(|e| CodecError::Serialization(e.to_string()))
}

/// Encodes an event with a 4-byte little-endian length prefix.
///
/// Wire format: `[u32 length (LE)][payload bytes]`
///
/// Suitable for stream-based transports (TCP) where message boundaries
/// are not preserved by the transport layer.
///
/// # Errors
///
/// Returns `CodecError::Serialization` if the value cannot be serialized,
/// or `CodecError::InvalidFrame` if the payload exceeds `u32::MAX` bytes.
pub fn encode_framed<T: Serialize>(value: &T) -> Result<Vec<u8>, CodecError> {
    let payload = encode(value)?;
    let len = u32::try_from(payload.len()).map_err(|_| {
        CodecError::InvalidFrame(format!(
            "payload too large for framing: {} bytes",
            payload.len()
        ))
    })?;
    let mut frame = Vec::with_capacity(4 + payload.len());
    frame.extend_from_slice(&len.to_le_bytes());
    frame.extend_from_slice(&payload);
    Ok(frame)
}

/// Decodes a length-prefixed frame back into an event.
///
/// Expects the wire format: `[u32 length (LE)][payload bytes]`
///
/// Returns the decoded value and the total number of bytes consumed from
/// the input (including the 4-byte length prefix).
///
/// # Errors
///
/// Returns `CodecError::InvalidFrame` if the input is too short or the
/// length prefix indicates more data than available, or
/// `CodecError::Serialization` if the payload cannot be deserialized.
pub fn decode_framed<T: DeserializeOwned>(bytes: &[u8]) -> Result<(T, usize), CodecError> {
    if bytes.len() < 4 {
        return Err(CodecError::InvalidFrame(format!(
            "need at least 4 bytes for length prefix, got {}",
            bytes.len()
        )));
    }
    let len_bytes: [u8; 4] = bytes[..4]
        .try_into()
        .map_err(|_| CodecError::InvalidFrame("failed to read length prefix".into()))?;
    let payload_len = u32::from_le_bytes(len_bytes) as usize;

    let total_len = 4 + payload_len;
    if bytes.len() < total_len {
        return Err(CodecError::InvalidFrame(format!(
            "frame indicates {} bytes but only {} available",
            payload_len,
            bytes.len() - 4
        )));
    }

    let value = decode(&bytes[4..total_len])?;
    Ok((value, total_len))
}
