//! Field Extractor
//!
//! Locates the `MOVE: ` and `FEN: ` values in an email body and encodes them
//! as circuit field elements.
//!
//! Two encodings exist because two circuit variants exist:
//! - packed: bytes grouped into 31-byte little-endian integers, one per field
//!   element (31 bytes always fit below the BN254 scalar modulus)
//! - padded: one field element per byte, zero-padded to a fixed length, plus
//!   the true byte count

use num_bigint::BigUint;
use thiserror::Error;
use tracing::{debug, warn};

use crate::types::{ChessFields, ExtractedField};

/// Bytes that fit into a single field element
pub const MAX_BYTES_IN_FIELD: usize = 31;

pub const MOVE_LABEL: &str = "MOVE: ";
pub const FEN_LABEL: &str = "FEN: ";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractError {
    #[error("Field not found: label {0:?} does not appear in the email body")]
    LabelNotFound(String),
    #[error("Field {0:?} is not terminated by a newline")]
    Unterminated(String),
    #[error("Field {0:?} is not valid UTF-8")]
    InvalidUtf8(String),
    #[error("Field {0:?} is empty")]
    EmptyValue(String),
}

/// Offset of the first byte after the first occurrence of `label`.
pub fn find_label(body: &[u8], label: &str) -> Result<usize, ExtractError> {
    let needle = label.as_bytes();
    if needle.is_empty() {
        return Ok(0);
    }

    body.windows(needle.len())
        .position(|window| window == needle)
        .map(|pos| pos + needle.len())
        .ok_or_else(|| ExtractError::LabelNotFound(label.to_string()))
}

/// Extract the value following `label` up to the next `\n`, trimmed.
pub fn extract_field(body: &[u8], label: &str) -> Result<ExtractedField, ExtractError> {
    let index = find_label(body, label)?;

    let end = body[index..]
        .iter()
        .position(|&b| b == b'\n')
        .map(|len| index + len)
        .ok_or_else(|| ExtractError::Unterminated(label.to_string()))?;

    let raw = std::str::from_utf8(&body[index..end])
        .map_err(|_| ExtractError::InvalidUtf8(label.to_string()))?;

    let value = raw.trim();
    if value.is_empty() {
        return Err(ExtractError::EmptyValue(label.to_string()));
    }

    debug!(label, index, value, "Extracted field");

    Ok(ExtractedField {
        index,
        value: value.to_string(),
    })
}

/// Extract both the move and the FEN position from an email body.
pub fn extract_move_and_fen(body: &[u8]) -> Result<ChessFields, ExtractError> {
    Ok(ChessFields {
        chess_move: extract_field(body, MOVE_LABEL)?,
        fen: extract_field(body, FEN_LABEL)?,
    })
}

/// Pack bytes into field elements, 31 bytes per element, little-endian.
pub fn pack_bytes(bytes: &[u8]) -> Vec<BigUint> {
    bytes
        .chunks(MAX_BYTES_IN_FIELD)
        .map(BigUint::from_bytes_le)
        .collect()
}

/// Inverse of [`pack_bytes`].
///
/// `len` is the original byte length; it is needed because trailing zero
/// bytes of a chunk do not survive as an integer.
pub fn unpack_bytes(chunks: &[BigUint], len: usize) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(len);

    for chunk in chunks {
        let take = len.saturating_sub(bytes.len()).min(MAX_BYTES_IN_FIELD);
        let mut le = chunk.to_bytes_le();
        le.resize(take, 0);
        bytes.extend_from_slice(&le);
    }

    bytes
}

/// Fixed-length byte array plus the true length of the source bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaddedBytes {
    pub bytes: Vec<u8>,
    /// Byte count before truncation and padding
    pub length: usize,
}

/// Truncate or zero-pad `bytes` to exactly `max_length`.
///
/// Truncation is lossy but not an error.
pub fn pad_bytes(bytes: &[u8], max_length: usize) -> PaddedBytes {
    if bytes.len() > max_length {
        warn!(
            length = bytes.len(),
            max_length, "Field exceeds maximum length, truncating"
        );
    }

    let mut padded = bytes[..bytes.len().min(max_length)].to_vec();
    padded.resize(max_length, 0);

    PaddedBytes {
        bytes: padded,
        length: bytes.len(),
    }
}

/// How extracted fields are laid out as circuit signals
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldEncoding {
    Packed,
    Padded { max_length: usize },
}

impl FieldEncoding {
    pub fn encode(&self, bytes: &[u8]) -> EncodedField {
        match self {
            FieldEncoding::Packed => EncodedField::Packed(pack_bytes(bytes)),
            FieldEncoding::Padded { max_length } => {
                EncodedField::Padded(pad_bytes(bytes, *max_length))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncodedField {
    Packed(Vec<BigUint>),
    Padded(PaddedBytes),
}

impl EncodedField {
    /// Signal values as decimal strings
    pub fn values(&self) -> Vec<String> {
        match self {
            EncodedField::Packed(chunks) => chunks.iter().map(|c| c.to_string()).collect(),
            EncodedField::Padded(padded) => padded.bytes.iter().map(|b| b.to_string()).collect(),
        }
    }

    /// True byte count, only carried by the padded encoding
    pub fn length(&self) -> Option<usize> {
        match self {
            EncodedField::Packed(_) => None,
            EncodedField::Padded(padded) => Some(padded.length),
        }
    }
}
