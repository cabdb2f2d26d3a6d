// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Top-level container orchestration: header, primary object stream,
//! auxiliary chunks, and the opaque trailer, tied together behind a single
//! decode/encode entry point.

use crate::bitstream::{Cursor, Writer};
use crate::chunk::{self, Chunk};
use crate::context::Context;
use crate::error::{DecodeError, EncodeError};
use crate::graph::GraphModel;
use crate::header::Header;
use crate::object_stream;

/// A fully decoded container: header, primary object graph, auxiliary
/// chunks, and whatever trailing bytes follow them unparsed.
#[derive(Debug, Clone, PartialEq)]
pub struct RivFile {
    /// Decoded header.
    pub header: Header,
    /// Primary object stream, as a graph.
    pub graph: GraphModel,
    /// Auxiliary chunks following the primary stream.
    pub chunks: Vec<Chunk>,
    /// Bytes left over after the last recognized chunk.
    pub trailer: Vec<u8>,
}

/// Per-varuint encoding widths captured during an exact-mode decode, replayed
/// verbatim on encode so non-minimal source encodings round-trip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExactMeta {
    /// Varuint widths in read order, spanning header, stream, and chunks.
    pub widths: Vec<u8>,
}

fn declared_fn(table: Vec<u32>) -> impl Fn(u32) -> bool {
    move |key| table.contains(&key)
}

/// Decodes a full container.
pub fn decode(data: &[u8], ctx: &Context) -> Result<RivFile, DecodeError> {
    let mut cursor = Cursor::new(data);
    decode_with(&mut cursor, ctx)
}

/// Decodes a full container while tracking exact-mode varuint widths.
pub fn decode_exact(data: &[u8], ctx: &Context) -> Result<(RivFile, ExactMeta), DecodeError> {
    let mut cursor = Cursor::new_tracked(data);
    let file = decode_with(&mut cursor, ctx)?;
    Ok((
        file,
        ExactMeta {
            widths: cursor.take_widths(),
        },
    ))
}

fn decode_with(cursor: &mut Cursor<'_>, ctx: &Context) -> Result<RivFile, DecodeError> {
    let header = Header::decode(cursor)?;
    let bitmap = header.bitmap_map();
    let declared = declared_fn(header.property_table.clone());

    let records = object_stream::read_records(cursor, &bitmap, &declared, ctx)?;
    let graph = GraphModel::from_records(records);
    let chunks = chunk::read_chunks(cursor, &bitmap, &declared, ctx);

    let trailer = cursor
        .read_raw(cursor.remaining())
        .map_err(DecodeError::Bitstream)?
        .to_vec();

    Ok(RivFile {
        header,
        graph,
        chunks,
        trailer,
    })
}

/// Encodes a container, always using minimal varuint widths.
pub fn encode(file: &RivFile) -> Result<Vec<u8>, EncodeError> {
    let mut writer = Writer::new();
    encode_with(&mut writer, file)?;
    Ok(writer.into_bytes())
}

/// Encodes a container using previously captured exact-mode varuint widths,
/// then verifies the result is byte-identical to `source`.
pub fn encode_exact(
    file: &RivFile,
    meta: &ExactMeta,
    source: &[u8],
) -> Result<Vec<u8>, EncodeError> {
    let mut writer = Writer::new_tracked(meta.widths.clone());
    encode_with(&mut writer, file)?;
    let produced = writer.into_bytes();

    if let Some(offset) = first_divergence(&produced, source) {
        return Err(EncodeError::ExactDriftAt { offset });
    }
    Ok(produced)
}

fn first_divergence(a: &[u8], b: &[u8]) -> Option<u64> {
    let mismatch = a.iter().zip(b.iter()).position(|(x, y)| x != y);
    match mismatch {
        Some(i) => Some(i as u64),
        None if a.len() != b.len() => Some(a.len().min(b.len()) as u64),
        None => None,
    }
}

fn encode_with(writer: &mut Writer, file: &RivFile) -> Result<(), EncodeError> {
    file.header.encode(writer);
    let declared = declared_fn(file.header.property_table.clone());

    let records: Vec<_> = file.graph.records().map(|(_, r)| r.clone()).collect();
    object_stream::write_records(writer, &records, &declared)?;

    for chunk in &file.chunks {
        object_stream::write_records(writer, &chunk.records, &declared)?;
        for _ in 1..chunk.terminator_count {
            writer.write_varuint(0);
        }
    }

    writer.write_raw(&file.trailer);
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::header::Header;
    use crate::object_stream::Record;
    use crate::schema::{PropertyKey, PropertyType, Value};

    fn minimal_file() -> (RivFile, Vec<u8>) {
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
        let mut backboard = Record::new(23);
        backboard.properties.push((PropertyKey(3), Value::Uint(0)));
        let mut artboard = Record::new(1);
        artboard.properties.push((PropertyKey(3), Value::Uint(2)));
        artboard.properties.push((PropertyKey(5), Value::Uint(0)));
        artboard
            .properties
            .push((PropertyKey(7), Value::Double(500.0)));
        artboard
            .properties
            .push((PropertyKey(8), Value::Double(400.0)));

        let mut writer = Writer::new();
        header.encode(&mut writer);
        let declared = declared_fn(header.property_table.clone());
        object_stream::write_records(&mut writer, &[backboard, artboard], &declared).unwrap();
        let bytes = writer.into_bytes();

        let ctx = Context::default();
        let file = decode(&bytes, &ctx).unwrap();
        (file, bytes)
    }

    #[test]
    fn decode_then_encode_round_trips() {
        let (file, original) = minimal_file();
        let encoded = encode(&file).unwrap();
        assert_eq!(encoded, original);
    }

    #[test]
    fn exact_round_trip_reproduces_non_minimal_widths() {
        let header = Header::new(7, 0, 0, vec![(3, PropertyType::Uint)]);
        let mut record = Record::new(23);
        record.properties.push((PropertyKey(3), Value::Uint(3)));

        let mut writer = Writer::new();
        header.encode(&mut writer);
        // hand-craft a non-minimal encoding for the id value: type key 23,
        // property key 3, then 0x83 0x00 for the value 3, then terminators.
        writer.write_varuint(23);
        writer.write_varuint(3);
        writer.write_raw(&[0x83, 0x00]);
        writer.write_varuint(0);
        writer.write_varuint(0);
        let bytes = writer.into_bytes();

        let ctx = Context::default();
        let (file, meta) = decode_exact(&bytes, &ctx).unwrap();
        let produced = encode_exact(&file, &meta, &bytes).unwrap();
        assert_eq!(produced, bytes);
    }

    #[test]
    fn exact_mode_flags_drift() {
        let (mut file, original) = minimal_file();
        file.header.file_id = 999;
        let meta = ExactMeta { widths: vec![] };
        let err = encode_exact(&file, &meta, &original).unwrap_err();
        assert!(matches!(err, EncodeError::ExactDriftAt { .. }));
    }
}
