// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Auxiliary chunks that follow the primary object stream: asset-byte
//! packs, the artboard catalog, and anything the codec doesn't recognize
//! but must still round-trip.

use std::collections::HashMap;

use crate::bitstream::Cursor;
use crate::context::Context;
use crate::object_stream::{self, Record};
use crate::schema::PropertyType;

/// First-type-key marker for an asset payload chunk.
pub const ASSET_PAYLOAD_MARKER: u32 = 105;
/// First-type-key marker for the artboard catalog chunk.
pub const ARTBOARD_CATALOG_MARKER: u32 = 8726;
/// Type key of each artboard catalog entry.
pub const ARTBOARD_CATALOG_ENTRY: u32 = 8776;

/// Which of the recognized auxiliary chunk kinds a [`Chunk`] is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkKind {
    /// The primary object stream (not produced by [`read_chunks`] itself;
    /// used by [`crate::container`] to describe the whole file uniformly).
    Objects,
    /// Records carrying opaque asset bytes (property key `212`).
    AssetPayload,
    /// The artboard id catalog.
    ArtboardCatalog,
    /// A chunk kind this codec does not interpret; preserved verbatim.
    Unknown,
}

/// One record sequence bounded by a type-key terminator.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    /// The chunk's recognized kind.
    pub kind: ChunkKind,
    /// Records in stream order.
    pub records: Vec<Record>,
    /// Consecutive terminators observed at this chunk's boundary, including
    /// the one that ends the record sequence itself. Producers sometimes
    /// emit extra trailing zeros as padding; exact mode must reproduce the
    /// count.
    pub terminator_count: u32,
}

fn classify(first_type_key: Option<u32>) -> ChunkKind {
    match first_type_key {
        Some(ASSET_PAYLOAD_MARKER) => ChunkKind::AssetPayload,
        Some(ARTBOARD_CATALOG_MARKER) => ChunkKind::ArtboardCatalog,
        _ => ChunkKind::Unknown,
    }
}

/// Reads every auxiliary chunk following the primary stream's terminator,
/// stopping as soon as the remaining bytes no longer parse as a clean
/// record sequence (the rest is the opaque trailer; see
/// [`crate::container`]).
#[allow(clippy::implicit_hasher)]
pub fn read_chunks(
    cursor: &mut Cursor<'_>,
    bitmap: &HashMap<u32, PropertyType>,
    declared_keys: &dyn Fn(u32) -> bool,
    ctx: &Context,
) -> Vec<Chunk> {
    let mut chunks = Vec::new();
    loop {
        if cursor.is_eof() {
            break;
        }
        let checkpoint = cursor.checkpoint();
        match object_stream::read_records(cursor, bitmap, declared_keys, ctx) {
            Ok(records) if !records.is_empty() => {
                let mut terminator_count = 1u32;
                loop {
                    if cursor.is_eof() {
                        break;
                    }
                    let peek = cursor.checkpoint();
                    if cursor.read_varuint() == Ok(0) {
                        terminator_count += 1;
                    } else {
                        cursor.restore(peek);
                        break;
                    }
                }
                let kind = classify(records.first().map(|r| r.type_key.0));
                chunks.push(Chunk {
                    kind,
                    records,
                    terminator_count,
                });
            }
            _ => {
                cursor.restore(checkpoint);
                break;
            }
        }
    }
    chunks
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::bitstream::Writer;
    use crate::schema::{PropertyKey, Value};

    fn declared(k: u32) -> bool {
        k == 212
    }

    #[test]
    fn recognizes_asset_payload_chunk() {
        let mut record = Record::new(ASSET_PAYLOAD_MARKER);
        record
            .properties
            .push((PropertyKey(212), Value::Bytes(vec![])));
        let mut w = Writer::new();
        object_stream::write_records(&mut w, &[record], &declared).unwrap();
        let bytes = w.into_bytes();

        let bitmap = HashMap::from([(212, PropertyType::Bytes)]);
        let mut c = Cursor::new(&bytes);
        let ctx = Context::default();
        let chunks = read_chunks(&mut c, &bitmap, &declared, &ctx);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].kind, ChunkKind::AssetPayload);
        assert_eq!(chunks[0].terminator_count, 1);
    }

    #[test]
    fn counts_extra_terminator_padding() {
        let mut record = Record::new(ASSET_PAYLOAD_MARKER);
        record
            .properties
            .push((PropertyKey(212), Value::Bytes(vec![])));
        let mut w = Writer::new();
        object_stream::write_records(&mut w, &[record], &declared).unwrap();
        w.write_varuint(0);
        w.write_varuint(0);
        let bytes = w.into_bytes();

        let bitmap = HashMap::from([(212, PropertyType::Bytes)]);
        let mut c = Cursor::new(&bytes);
        let ctx = Context::default();
        let chunks = read_chunks(&mut c, &bitmap, &declared, &ctx);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].terminator_count, 3);
    }

    #[test]
    fn unrecognized_first_type_key_is_unknown() {
        let mut record = Record::new(9);
        record
            .properties
            .push((PropertyKey(212), Value::Bytes(vec![1, 2, 3])));
        let mut w = Writer::new();
        object_stream::write_records(&mut w, &[record], &declared).unwrap();
        let bytes = w.into_bytes();

        let bitmap = HashMap::from([(212, PropertyType::Bytes)]);
        let mut c = Cursor::new(&bytes);
        let ctx = Context::default();
        let chunks = read_chunks(&mut c, &bitmap, &declared, &ctx);
        assert_eq!(chunks[0].kind, ChunkKind::Unknown);
    }
}
