//! Record encoding and identity keys.
//!
//! Each feed and group is stored as one self-describing JSON blob. The
//! record's filename is derived from its identity (feed link or group title)
//! so the same entity always lands in the same file.

use serde::de::DeserializeOwned;
use serde::Serialize;
use sha2::{Digest, Sha256};
use thiserror::Error;

use super::types::{Feed, Group, RecordKind};

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("Failed to encode {kind} record: {source}")]
    Encode {
        kind: RecordKind,
        source: serde_json::Error,
    },

    #[error("Failed to decode {kind} record: {source}")]
    Decode {
        kind: RecordKind,
        source: serde_json::Error,
    },
}

/// An entity that is persisted as one record file.
pub trait Record: Serialize + DeserializeOwned + Default {
    const KIND: RecordKind;

    /// The value the record is keyed by.
    fn identity(&self) -> &str;
}

impl Record for Feed {
    const KIND: RecordKind = RecordKind::Feed;

    fn identity(&self) -> &str {
        &self.link
    }
}

impl Record for Group {
    const KIND: RecordKind = RecordKind::Group;

    fn identity(&self) -> &str {
        &self.title
    }
}

pub fn encode<R: Record>(record: &R) -> Result<Vec<u8>, CodecError> {
    serde_json::to_vec(record).map_err(|source| CodecError::Encode {
        kind: R::KIND,
        source,
    })
}

pub fn try_decode<R: Record>(bytes: &[u8]) -> Result<R, CodecError> {
    serde_json::from_slice(bytes).map_err(|source| CodecError::Decode {
        kind: R::KIND,
        source,
    })
}

/// Decode a record, falling back to the zero value on malformed input.
///
/// A corrupt record must not stop the rest of the store from loading. The
/// failure is logged so it stays distinguishable from a legitimately empty
/// entity in the logs.
pub fn decode<R: Record>(bytes: &[u8]) -> R {
    match try_decode(bytes) {
        Ok(record) => record,
        Err(e) => {
            tracing::warn!(error = %e, bytes = bytes.len(), "Corrupt record, using empty value");
            R::default()
        }
    }
}

/// Hex SHA-256 of an identity string.
pub fn hash_identity(identity: &str) -> String {
    format!("{:x}", Sha256::digest(identity.as_bytes()))
}

pub fn identity_key<R: Record>(record: &R) -> String {
    hash_identity(record.identity())
}

/// Filename of the record for an entity of `kind` with the given identity.
pub fn file_name(kind: RecordKind, identity: &str) -> String {
    format!("{}{}", kind.prefix(), hash_identity(identity))
}
