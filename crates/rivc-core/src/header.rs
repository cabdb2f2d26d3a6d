// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Header layout: magic, version, file id, property-key table, and the
//! 2-bit-per-key type bitmap.

use std::collections::HashMap;

use crate::bitstream::{Cursor, Writer};
use crate::error::DecodeError;
use crate::schema::PropertyType;

/// Magic bytes every container begins with.
pub const MAGIC: [u8; 4] = *b"RIVE";

/// Highest major format version this catalog knows how to interpret.
/// A header declaring a newer major version may use stream features this
/// build can't decode correctly, so decoding refuses it up front rather
/// than misreading the property table or bitmap.
pub const CATALOG_MAJOR: u64 = 7;

/// Decoded header: version, file id, and the property table's resolved
/// bitmap type per key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    /// Major format version.
    pub major: u64,
    /// Minor format version.
    pub minor: u64,
    /// File identifier.
    pub file_id: u64,
    /// Property keys in table order.
    pub property_table: Vec<u32>,
    /// Bitmap-declared type per table position, parallel to
    /// `property_table`.
    pub bitmap: Vec<PropertyType>,
}

impl Header {
    /// Builds a header from an explicit ordered property list, computing
    /// the bitmap from each key's resolved wire type.
    #[must_use]
    pub fn new(major: u64, minor: u64, file_id: u64, properties: Vec<(u32, PropertyType)>) -> Self {
        let property_table = properties.iter().map(|(k, _)| *k).collect();
        let bitmap = properties.into_iter().map(|(_, ty)| ty).collect();
        Self {
            major,
            minor,
            file_id,
            property_table,
            bitmap,
        }
    }

    /// The bitmap-declared type for a property key, if it appears in the
    /// table.
    #[must_use]
    pub fn bitmap_type(&self, key: u32) -> Option<PropertyType> {
        self.property_table
            .iter()
            .position(|k| *k == key)
            .map(|pos| self.bitmap[pos])
    }

    /// Whether `key` is declared in the property table, per the schema
    /// completeness invariant.
    #[must_use]
    pub fn declares(&self, key: u32) -> bool {
        self.property_table.contains(&key)
    }

    fn index_word_count(n: usize) -> usize {
        n.div_ceil(4)
    }

    /// Decodes a header from the start of `cursor`.
    #[allow(clippy::cast_possible_truncation)] // property keys are defined as 32-bit in the format
    pub fn decode(cursor: &mut Cursor<'_>) -> Result<Self, DecodeError> {
        let magic_bytes = cursor.read_raw(4).map_err(DecodeError::Bitstream)?;
        let mut actual = [0u8; 4];
        actual.copy_from_slice(magic_bytes);
        if actual != MAGIC {
            return Err(DecodeError::InvalidMagic {
                expected: MAGIC,
                actual,
            });
        }

        let major = cursor.read_varuint()?;
        let minor = cursor.read_varuint()?;
        if major > CATALOG_MAJOR {
            return Err(DecodeError::Unsupported { major, minor });
        }
        let file_id = cursor.read_varuint()?;

        let mut property_table = Vec::new();
        loop {
            let key = cursor.read_varuint()?;
            if key == 0 {
                break;
            }
            property_table.push(key as u32);
        }

        let word_count = Self::index_word_count(property_table.len());
        let mut codes = Vec::with_capacity(property_table.len());
        for word_index in 0..word_count {
            let bytes = cursor.read_raw(4).map_err(DecodeError::Bitstream)?;
            let mut buf = [0u8; 4];
            buf.copy_from_slice(bytes);
            let word = u32::from_le_bytes(buf);
            for slot in 0..4 {
                let global_index = word_index * 4 + slot;
                if global_index >= property_table.len() {
                    break;
                }
                let code = ((word >> (slot * 2)) & 0b11) as u8;
                codes.push(PropertyType::from_bitmap_code(code));
            }
        }

        Ok(Self {
            major,
            minor,
            file_id,
            property_table,
            bitmap: codes,
        })
    }

    /// Encodes the header, including a freshly computed bitmap.
    pub fn encode(&self, writer: &mut Writer) {
        writer.write_raw(&MAGIC);
        writer.write_varuint(self.major);
        writer.write_varuint(self.minor);
        writer.write_varuint(self.file_id);
        for &key in &self.property_table {
            writer.write_varuint(u64::from(key));
        }
        writer.write_varuint(0);

        let word_count = Self::index_word_count(self.property_table.len());
        for word_index in 0..word_count {
            let mut word: u32 = 0;
            for slot in 0..4 {
                let global_index = word_index * 4 + slot;
                if global_index >= self.bitmap.len() {
                    break;
                }
                word |= u32::from(self.bitmap[global_index].bitmap_code()) << (slot * 2);
            }
            writer.write_raw(&word.to_le_bytes());
        }
    }

    /// A key→bitmap-type map, convenient for the object stream resolver.
    #[must_use]
    pub fn bitmap_map(&self) -> HashMap<u32, PropertyType> {
        self.property_table
            .iter()
            .copied()
            .zip(self.bitmap.iter().copied())
            .collect()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn header_round_trips() {
        let header = Header::new(
            7,
            0,
            0,
            vec![
                (3, PropertyType::Uint),
                (5, PropertyType::Uint),
                (7, PropertyType::Double),
                (8, PropertyType::Double),
            ],
        );
        let mut w = Writer::new();
        header.encode(&mut w);
        let bytes = w.into_bytes();

        let mut c = Cursor::new(&bytes);
        let decoded = Header::decode(&mut c).unwrap();
        assert_eq!(decoded, header);
    }

    #[test]
    fn decode_rejects_bad_magic() {
        let bytes = b"NOPE\x07\x00\x00\x00".to_vec();
        let mut c = Cursor::new(&bytes);
        let err = Header::decode(&mut c).unwrap_err();
        assert!(matches!(err, DecodeError::InvalidMagic { .. }));
    }

    #[test]
    fn decode_rejects_major_version_newer_than_catalog() {
        let header = Header::new(CATALOG_MAJOR + 1, 0, 0, vec![(3, PropertyType::Uint)]);
        let mut w = Writer::new();
        header.encode(&mut w);
        let bytes = w.into_bytes();

        let mut c = Cursor::new(&bytes);
        let err = Header::decode(&mut c).unwrap_err();
        assert!(matches!(
            err,
            DecodeError::Unsupported { major, .. } if major == CATALOG_MAJOR + 1
        ));
    }

    #[test]
    fn decode_accepts_major_version_equal_to_catalog() {
        let header = Header::new(CATALOG_MAJOR, 0, 0, vec![(3, PropertyType::Uint)]);
        let mut w = Writer::new();
        header.encode(&mut w);
        let bytes = w.into_bytes();

        let mut c = Cursor::new(&bytes);
        assert!(Header::decode(&mut c).is_ok());
    }

    #[test]
    fn bitmap_word_count_matches_spec_formula() {
        let header = Header::new(
            7,
            0,
            0,
            vec![
                (1, PropertyType::Uint),
                (2, PropertyType::Uint),
                (3, PropertyType::Uint),
                (4, PropertyType::Uint),
                (5, PropertyType::Uint),
            ],
        );
        let mut w = Writer::new();
        header.encode(&mut w);
        let bytes = w.into_bytes();
        // magic(4) + major(1) + minor(1) + file_id(1) + 6 keys incl. terminator(6) + 2 words(8)
        assert_eq!(bytes.len(), 4 + 1 + 1 + 1 + 6 + 8);
    }
}
