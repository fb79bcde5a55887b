//! Decode Error Types

use crate::observability::mask::mask_addresses;
use std::num::ParseIntError;

/// Raw bytes of a record that failed to decode.
///
/// May contain mail addresses. `Debug` and `Display` never print the bytes
/// verbatim; use [`RawRecord::masked`] for log output.
#[derive(Clone, PartialEq, Eq)]
pub struct RawRecord(Vec<u8>);

impl RawRecord {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        RawRecord(bytes.into())
    }

    /// Unredacted bytes, field separators included
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Record text with NULs shown as spaces and addresses redacted
    pub fn masked(&self) -> String {
        let text = String::from_utf8_lossy(&self.0).replace('\0', " ");
        mask_addresses(&text)
    }
}

impl std::fmt::Debug for RawRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "RawRecord({} bytes)", self.0.len())
    }
}

/// A field value that could not be converted to its expected type
#[derive(Debug, thiserror::Error)]
pub enum ValueError {
    #[error(transparent)]
    Integer(#[from] ParseIntError),

    #[error("invalid boolean literal `{0}`")]
    Boolean(String),
}

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("malformed showq record: odd number of fields ({fields})")]
    OddFieldCount { fields: usize, record: RawRecord },

    #[error("malformed showq record: `reason` appears before any `recipient`")]
    OrphanReason { record: RawRecord },

    #[error(
        "unrecognized showq key `{key}` (expected one of queue_name, queue_id, time, size, \
         sender, forced_expire, recipient, reason)"
    )]
    UnknownKey { key: String, record: RawRecord },

    #[error("invalid value for showq key `{key}`: {source}")]
    InvalidValue {
        key: &'static str,
        #[source]
        source: ValueError,
        record: RawRecord,
    },

    /// The transport failed while reading, or closed inside a record
    #[error("showq read failed: {0}")]
    Io(#[from] std::io::Error),
}

impl DecodeError {
    /// The offending record, for every error that concerns record content
    pub fn record(&self) -> Option<&RawRecord> {
        match self {
            DecodeError::OddFieldCount { record, .. }
            | DecodeError::OrphanReason { record }
            | DecodeError::UnknownKey { record, .. }
            | DecodeError::InvalidValue { record, .. } => Some(record),
            DecodeError::Io(_) => None,
        }
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, DecodeError::Io(_))
    }
}
