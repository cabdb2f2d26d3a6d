// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Error types for every codec layer, plus the semantic [`ErrorKind`] the
//! CLI uses to choose an exit code and a user-visible diagnostic line.

use thiserror::Error;

/// The semantic category a [`RivError`] falls into, independent of which
/// layer raised it. Mirrors the kinds a caller needs to distinguish:
/// recoverable warnings, strict-mode structural failures, and fatal errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Magic missing, varuint unterminated, length past EOF, invalid UTF-8
    /// under strict mode.
    Malformed,
    /// A property key used in the stream is absent from the header table.
    SchemaViolation,
    /// An exact-mode requirement was not met by the input or the output.
    ExactContractBroken,
    /// A `parentId` or catalog id resolves to nothing.
    ReferenceUnresolved,
    /// The format version is newer than the compiled catalog understands.
    Unsupported,
}

impl BitstreamError {
    /// The byte offset at which this failure occurred.
    #[must_use]
    pub fn offset(&self) -> u64 {
        match self {
            Self::UnexpectedEof { at, .. }
            | Self::VaruintOverflow { at }
            | Self::InvalidUtf8 { at } => *at,
        }
    }
}

/// Errors raised by the [`crate::bitstream`] primitives.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BitstreamError {
    /// The cursor ran out of bytes before satisfying a read.
    #[error("unexpected EOF at offset {at}, wanted {wanted} more byte(s)")]
    UnexpectedEof {
        /// Offset at which the read was attempted.
        at: u64,
        /// Number of bytes the read needed.
        wanted: usize,
    },
    /// A varuint ran past the maximum width for a 64-bit value.
    #[error("varuint at offset {at} exceeds maximum encoded width")]
    VaruintOverflow {
        /// Offset at which the varuint began.
        at: u64,
    },
    /// A string payload was not valid UTF-8 under strict decoding.
    #[error("invalid UTF-8 at offset {at}")]
    InvalidUtf8 {
        /// Offset of the invalid string payload.
        at: u64,
    },
}

/// Errors raised decoding the header, object stream, or chunk framing.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Lower-level bitstream failure.
    #[error(transparent)]
    Bitstream(#[from] BitstreamError),
    /// Magic bytes did not match `"RIVE"`.
    #[error("invalid magic: expected {expected:?}, got {actual:?}")]
    InvalidMagic {
        /// Expected magic bytes.
        expected: [u8; 4],
        /// Actual magic bytes found.
        actual: [u8; 4],
    },
    /// A property key appeared in a record but not in the header's
    /// property table, under strict decoding.
    #[error("property key {key} used by type {type_key} is absent from the header table")]
    SchemaViolation {
        /// The offending property key.
        key: u32,
        /// The type key of the record that used it.
        type_key: u32,
    },
    /// EOF occurred partway through a record's property list, under strict
    /// decoding.
    #[error("unexpected EOF mid-record (type key {type_key})")]
    UnexpectedEofMidRecord {
        /// The type key of the truncated record.
        type_key: u32,
    },
    /// The file declares a format version newer than this catalog knows.
    #[error("unsupported format version {major}.{minor}")]
    Unsupported {
        /// Major version from the header.
        major: u64,
        /// Minor version from the header.
        minor: u64,
    },
}

impl DecodeError {
    /// Semantic kind, for CLI exit-code and diagnostic mapping.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Bitstream(_)
            | Self::InvalidMagic { .. }
            | Self::UnexpectedEofMidRecord { .. } => ErrorKind::Malformed,
            Self::SchemaViolation { .. } => ErrorKind::SchemaViolation,
            Self::Unsupported { .. } => ErrorKind::Unsupported,
        }
    }

    /// The record's type key, when the error is attributable to one.
    #[must_use]
    pub fn type_key(&self) -> Option<u32> {
        match self {
            Self::SchemaViolation { type_key, .. } | Self::UnexpectedEofMidRecord { type_key } => {
                Some(*type_key)
            }
            _ => None,
        }
    }

    /// The byte offset at which this failure occurred, when known.
    #[must_use]
    pub fn offset(&self) -> Option<u64> {
        match self {
            Self::Bitstream(b) => Some(b.offset()),
            _ => None,
        }
    }
}

/// Errors raised encoding the header, object stream, or chunk framing.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EncodeError {
    /// Lower-level bitstream failure (practically unreachable on write).
    #[error(transparent)]
    Bitstream(#[from] BitstreamError),
    /// A graph record uses a property key absent from the header table;
    /// the encoder refuses to write a file the reader could not parse back.
    #[error("property key {key} used by type {type_key} is absent from the header table")]
    SchemaViolation {
        /// The offending property key.
        key: u32,
        /// The type key of the record that used it.
        type_key: u32,
    },
    /// Exact-mode output diverged from the source buffer.
    #[error("exact-mode output first diverges from source at offset {offset}")]
    ExactDriftAt {
        /// First byte offset at which the produced buffer differs.
        offset: u64,
    },
    /// Exact-mode requirements were not satisfiable from the given JSON.
    #[error("exact contract broken: {reason}")]
    ExactContractBroken {
        /// Human-readable explanation.
        reason: String,
    },
}

impl EncodeError {
    /// Semantic kind, for CLI exit-code and diagnostic mapping.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Bitstream(_) => ErrorKind::Malformed,
            Self::SchemaViolation { .. } => ErrorKind::SchemaViolation,
            Self::ExactDriftAt { .. } | Self::ExactContractBroken { .. } => {
                ErrorKind::ExactContractBroken
            }
        }
    }
}

/// Top-level error returned by [`crate::container`] decode/encode entry
/// points.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RivError {
    /// Failure while decoding a container.
    #[error(transparent)]
    Decode(#[from] DecodeError),
    /// Failure while encoding a container.
    #[error(transparent)]
    Encode(#[from] EncodeError),
}

impl RivError {
    /// Semantic kind, for CLI exit-code and diagnostic mapping.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Decode(e) => e.kind(),
            Self::Encode(e) => e.kind(),
        }
    }

    /// The enclosing record's type key, when known.
    #[must_use]
    pub fn type_key(&self) -> Option<u32> {
        match self {
            Self::Decode(e) => e.type_key(),
            Self::Encode(_) => None,
        }
    }

    /// The byte offset at which this failure occurred, when known.
    #[must_use]
    pub fn offset(&self) -> Option<u64> {
        match self {
            Self::Decode(e) => e.offset(),
            Self::Encode(EncodeError::Bitstream(b)) => Some(b.offset()),
            Self::Encode(_) => None,
        }
    }
}

/// Library-wide result alias.
pub type Result<T> = std::result::Result<T, RivError>;
