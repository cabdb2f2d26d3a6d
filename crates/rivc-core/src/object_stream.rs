// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Typed records: `varuint(type_key), (varuint(key), value)*, varuint(0)`,
//! terminated by a top-level `varuint(0)` where a type key would be
//! expected.

use std::collections::HashMap;

use crate::bitstream::{Cursor, Writer};
use crate::context::Context;
use crate::error::{DecodeError, EncodeError};
use crate::schema::{PropertyKey, PropertyType, SchemaCatalog, TypeKey, Value};

/// A type-keyed, property-bearing element of the object stream.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    /// The record's class.
    pub type_key: TypeKey,
    /// Properties in stream order; duplicates are preserved, not rejected.
    pub properties: Vec<(PropertyKey, Value)>,
}

impl Record {
    /// Creates an empty record of the given type.
    #[must_use]
    pub fn new(type_key: u32) -> Self {
        Self {
            type_key: TypeKey(type_key),
            properties: Vec::new(),
        }
    }

    /// First value stored under `key`, if present.
    #[must_use]
    pub fn get(&self, key: u32) -> Option<&Value> {
        self.properties
            .iter()
            .find(|(k, _)| k.0 == key)
            .map(|(_, v)| v)
    }

    /// The record's local id (property key `3`), if present and numeric.
    #[must_use]
    pub fn id(&self) -> Option<u64> {
        match self.get(3) {
            Some(Value::Uint(n)) => Some(*n),
            _ => None,
        }
    }

    /// The record's `parentId` (property key `5`), if present and numeric.
    #[must_use]
    pub fn parent_id(&self) -> Option<u64> {
        match self.get(5) {
            Some(Value::Uint(n)) => Some(*n),
            _ => None,
        }
    }
}

fn read_value(
    cursor: &mut Cursor<'_>,
    ty: PropertyType,
    strict: bool,
) -> Result<Value, DecodeError> {
    Ok(match ty {
        PropertyType::Uint => Value::Uint(cursor.read_varuint()?),
        PropertyType::Bool => Value::Bool(cursor.read_varuint()? != 0),
        PropertyType::Callback => Value::Callback(cursor.read_varuint()?),
        PropertyType::String => Value::String(cursor.read_string(strict)?),
        PropertyType::Double => Value::Double(cursor.read_f32()?),
        PropertyType::Color => Value::Color(cursor.read_color()?),
        PropertyType::Bytes => Value::Bytes(cursor.read_bytes()?),
    })
}

fn write_value(writer: &mut Writer, value: &Value) {
    match value {
        Value::Uint(n) | Value::Callback(n) => writer.write_varuint(*n),
        Value::Bool(b) => writer.write_varuint(u64::from(*b)),
        Value::String(s) => writer.write_string(s),
        Value::Double(f) => writer.write_f32(*f),
        Value::Color(c) => writer.write_color(*c),
        Value::Bytes(b) => writer.write_bytes(b),
    }
}

/// Reads records from `cursor` until a top-level terminator (`0` where a
/// type key is expected) is consumed. Returns the records read.
///
/// `bitmap` supplies the header's declared type per property key, used
/// when the catalog has no override (§4.2's tie-break rule).
#[allow(clippy::implicit_hasher, clippy::cast_possible_truncation)] // type/property keys are wire-defined as 32-bit
pub fn read_records(
    cursor: &mut Cursor<'_>,
    bitmap: &HashMap<u32, PropertyType>,
    declared_keys: &dyn Fn(u32) -> bool,
    ctx: &Context,
) -> Result<Vec<Record>, DecodeError> {
    let mut records = Vec::new();
    loop {
        if cursor.is_eof() {
            tracing::info!("object stream ended at EOF without explicit terminator");
            break;
        }
        let type_key = cursor.read_varuint()?;
        if type_key == 0 {
            break;
        }
        let mut record = Record::new(type_key as u32);
        let result = read_properties(cursor, bitmap, declared_keys, ctx, &mut record);
        match result {
            Ok(()) => {}
            Err(PropertyReadOutcome::Eof) => {
                if record.properties.is_empty() {
                    tracing::warn!(type_key, "EOF mid-record with no properties read");
                } else {
                    tracing::warn!(type_key, "EOF mid-record; keeping partial record");
                }
                if ctx.strict {
                    return Err(DecodeError::UnexpectedEofMidRecord {
                        type_key: type_key as u32,
                    });
                }
                records.push(record);
                break;
            }
            Err(PropertyReadOutcome::Fatal(err)) => return Err(err),
        }
        records.push(record);
    }
    Ok(records)
}

enum PropertyReadOutcome {
    Eof,
    Fatal(DecodeError),
}

#[allow(clippy::implicit_hasher, clippy::cast_possible_truncation)]
fn read_properties(
    cursor: &mut Cursor<'_>,
    bitmap: &HashMap<u32, PropertyType>,
    declared_keys: &dyn Fn(u32) -> bool,
    ctx: &Context,
    record: &mut Record,
) -> Result<(), PropertyReadOutcome> {
    loop {
        if cursor.is_eof() {
            return Err(PropertyReadOutcome::Eof);
        }
        let key = cursor
            .read_varuint()
            .map_err(|e| PropertyReadOutcome::Fatal(e.into()))?;
        if key == 0 {
            return Ok(());
        }
        let key = key as u32;

        if !declared_keys(key) {
            let kind_err = DecodeError::SchemaViolation {
                key,
                type_key: record.type_key.0,
            };
            if ctx.strict {
                return Err(PropertyReadOutcome::Fatal(kind_err));
            }
            tracing::warn!(key, type_key = record.type_key.0, "undeclared property key");
        }

        let (ty, warn) = SchemaCatalog::resolve(PropertyKey(key), bitmap.get(&key).copied());
        if warn {
            tracing::warn!(key, "property key has no bitmap slot; defaulting to uint");
        }

        let value = read_value(cursor, ty, ctx.strict).map_err(PropertyReadOutcome::Fatal)?;
        record.properties.push((PropertyKey(key), value));
    }
}

/// Writes `records` followed by a single top-level terminator.
///
/// Returns [`EncodeError::SchemaViolation`] if a record uses a property key
/// the header does not declare — the encoder refuses to produce a file the
/// reader could not parse back.
pub fn write_records(
    writer: &mut Writer,
    records: &[Record],
    declared_keys: &dyn Fn(u32) -> bool,
) -> Result<(), EncodeError> {
    for record in records {
        writer.write_varuint(u64::from(record.type_key.0));
        for (key, value) in &record.properties {
            if !declared_keys(key.0) {
                return Err(EncodeError::SchemaViolation {
                    key: key.0,
                    type_key: record.type_key.0,
                });
            }
            writer.write_varuint(u64::from(key.0));
            write_value(writer, value);
        }
        writer.write_varuint(0);
    }
    writer.write_varuint(0);
    Ok(())
}
