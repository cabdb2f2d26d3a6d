// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! The "universal" JSON bridge: a stable, named projection of the object
//! graph that can be edited as text and lowered back.

use base64::Engine as _;
use serde::{Deserialize, Serialize};

use crate::chunk::Chunk;
use crate::error::EncodeError;
use crate::graph::{GraphModel, ARTBOARD_TYPE, BACKBOARD_TYPE};
use crate::header::Header;
use crate::object_stream::Record;
use crate::schema::{PropertyKey, PropertyType, SchemaCatalog, Value};

const FORMAT: &str = "universal";
const VERSION: &str = "1.0";

/// Top-level universal JSON document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UniversalFile {
    /// Always `"universal"`.
    pub format: String,
    /// Bridge schema version, always `"1.0"`.
    pub version: String,
    /// When `true`, the encoder must reproduce the source bytes exactly.
    #[serde(rename = "__riv_exact__", skip_serializing_if = "Option::is_none")]
    pub exact: Option<bool>,
    /// Header metadata, required when `exact` is set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub header: Option<UniversalHeader>,
    /// Promoted artboards, each with its descendant objects.
    pub artboards: Vec<UniversalArtboard>,
    /// Preserved raw auxiliary chunks, required when `exact` is set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunks: Option<Vec<serde_json::Value>>,
}

/// Header metadata surfaced in the universal JSON document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UniversalHeader {
    /// `"major.minor"`.
    pub version: String,
    /// File identifier.
    #[serde(rename = "fileId")]
    pub file_id: u64,
    /// Header property-key table, in order.
    #[serde(rename = "propertyKeys")]
    pub property_keys: Vec<u32>,
}

/// One promoted artboard and its descendant objects.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UniversalArtboard {
    /// The artboard's original local id, carried so descendants' `parentId`
    /// references still resolve after a round trip. Assigned fresh on lower
    /// when absent (e.g. a hand-authored artboard).
    #[serde(rename = "localId", skip_serializing_if = "Option::is_none")]
    pub local_id: Option<u64>,
    /// Artboard name, when the catalog resolves a `name` property.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Artboard width, when present.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<f32>,
    /// Artboard height, when present.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<f32>,
    /// Descendant records, in original stream order.
    pub objects: Vec<UniversalObject>,
}

/// One non-artboard record, projected generically.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UniversalObject {
    /// The record's class.
    #[serde(rename = "typeKey")]
    pub type_key: u32,
    /// The record's local id.
    #[serde(rename = "localId")]
    pub local_id: u64,
    /// The record's parent id, when present.
    #[serde(rename = "parentId", skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<u64>,
    /// Remaining properties, humanized where the catalog provides a name.
    pub properties: serde_json::Map<String, serde_json::Value>,
}

fn color_to_string(color: u32) -> String {
    let r = color & 0xff;
    let g = (color >> 8) & 0xff;
    let b = (color >> 16) & 0xff;
    let a = (color >> 24) & 0xff;
    format!("#{r:02X}{g:02X}{b:02X}{a:02X}")
}

fn color_from_str(s: &str) -> Option<u32> {
    let hex = s.strip_prefix('#')?;
    let (r, g, b, a) = match hex.len() {
        3 => {
            let mut chars = hex.chars();
            let r = chars.next()?;
            let g = chars.next()?;
            let b = chars.next()?;
            (
                u8::from_str_radix(&r.to_string().repeat(2), 16).ok()?,
                u8::from_str_radix(&g.to_string().repeat(2), 16).ok()?,
                u8::from_str_radix(&b.to_string().repeat(2), 16).ok()?,
                0xff,
            )
        }
        6 => (
            u8::from_str_radix(&hex[0..2], 16).ok()?,
            u8::from_str_radix(&hex[2..4], 16).ok()?,
            u8::from_str_radix(&hex[4..6], 16).ok()?,
            0xff,
        ),
        8 => (
            u8::from_str_radix(&hex[0..2], 16).ok()?,
            u8::from_str_radix(&hex[2..4], 16).ok()?,
            u8::from_str_radix(&hex[4..6], 16).ok()?,
            u8::from_str_radix(&hex[6..8], 16).ok()?,
        ),
        _ => return None,
    };
    Some(u32::from(r) | (u32::from(g) << 8) | (u32::from(b) << 16) | (u32::from(a) << 24))
}

fn value_to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Uint(n) | Value::Callback(n) => serde_json::json!(n),
        Value::Bool(b) => serde_json::json!(b),
        Value::String(s) => serde_json::json!(s),
        Value::Double(f) => serde_json::json!(f),
        Value::Color(c) => serde_json::json!(color_to_string(*c)),
        Value::Bytes(b) => {
            let encoded = base64::engine::general_purpose::STANDARD.encode(b);
            serde_json::json!({ "$bytes": encoded })
        }
    }
}

/// Converts a humanized JSON value back into a tagged [`Value`].
///
/// `ty` is the property's resolved catalog type, when known. A bare JSON
/// string is only read as a [`Value::Color`] when the property is actually
/// catalog-typed `Color` — otherwise a string that happens to look like a
/// hex color (e.g. a user tag `"#deadbeef"`) stays a `Value::String`, so
/// this never silently changes a property's wire representation.
#[allow(clippy::cast_possible_truncation)] // scene properties are single-precision in the wire format
fn json_to_value(json: &serde_json::Value, ty: Option<PropertyType>) -> Option<Value> {
    match json {
        serde_json::Value::Bool(b) => Some(Value::Bool(*b)),
        serde_json::Value::String(s) => {
            if ty == Some(PropertyType::Color) {
                color_from_str(s).map(Value::Color)
            } else {
                Some(Value::String(s.clone()))
            }
        }
        serde_json::Value::Number(n) => {
            if let Some(f) = n.as_f64() {
                if f.fract() != 0.0 {
                    return Some(Value::Double(f as f32));
                }
            }
            n.as_u64().map(Value::Uint)
        }
        serde_json::Value::Object(map) => map
            .get("$bytes")
            .and_then(serde_json::Value::as_str)
            .and_then(|s| base64::engine::general_purpose::STANDARD.decode(s).ok())
            .map(Value::Bytes),
        _ => None,
    }
}

fn owning_artboard_id(graph: &GraphModel, index: usize) -> Option<u64> {
    let mut current = index;
    let mut visited = std::collections::HashSet::new();
    loop {
        if !visited.insert(current) {
            return None; // parentId cycle; no artboard owns this record
        }
        let record = graph.record(current)?;
        if record.type_key.0 == ARTBOARD_TYPE {
            return record.id();
        }
        let parent_id = record.parent_id()?;
        current = graph.resolve(parent_id)?;
    }
}

fn humanize_properties(record: &Record) -> serde_json::Map<String, serde_json::Value> {
    let mut map = serde_json::Map::new();
    for (key, value) in &record.properties {
        if key.0 == 3 || key.0 == 5 {
            continue;
        }
        let name = SchemaCatalog::property_name(*key)
            .map_or_else(|| format!("_p{}", key.0), str::to_owned);
        map.insert(name, value_to_json(value));
    }
    map
}

fn property_by_name<'a>(record: &'a Record, name: &str) -> Option<&'a Value> {
    record
        .properties
        .iter()
        .find_map(|(k, v)| (SchemaCatalog::property_name(*k) == Some(name)).then_some(v))
}

/// Lifts a decoded container into its universal JSON projection.
#[must_use]
#[allow(clippy::expect_used)] // indices come from graph.artboards(), which only returns valid ones
pub fn lift(header: &Header, graph: &GraphModel, chunks: &[Chunk], exact: bool) -> UniversalFile {
    let catalog = chunks
        .iter()
        .find(|c| c.kind == crate::chunk::ChunkKind::ArtboardCatalog)
        .map(|c| {
            c.records
                .iter()
                .filter(|r| r.type_key.0 == crate::chunk::ARTBOARD_CATALOG_ENTRY)
                .filter_map(Record::id)
                .collect::<Vec<_>>()
        });

    let artboard_indices = graph.artboards(catalog.as_deref());
    let artboard_index_set: std::collections::HashSet<usize> =
        artboard_indices.iter().copied().collect();
    let artboard_ids: Vec<u64> = artboard_indices
        .iter()
        .filter_map(|&i| graph.record(i).and_then(Record::id))
        .collect();

    let mut artboards: Vec<UniversalArtboard> = artboard_indices
        .iter()
        .map(|&i| {
            let record = graph.record(i).expect("artboard index is valid");
            let name = match property_by_name(record, "name") {
                Some(Value::String(s)) => Some(s.clone()),
                _ => None,
            };
            let width = match property_by_name(record, "width") {
                Some(Value::Double(f)) => Some(*f),
                _ => None,
            };
            let height = match property_by_name(record, "height") {
                Some(Value::Double(f)) => Some(*f),
                _ => None,
            };
            UniversalArtboard {
                local_id: record.id(),
                name,
                width,
                height,
                objects: Vec::new(),
            }
        })
        .collect();

    for (index, record) in graph.records() {
        if artboard_index_set.contains(&index) {
            continue;
        }
        let Some(owner_id) = owning_artboard_id(graph, index) else {
            continue;
        };
        let Some(bucket) = artboard_ids.iter().position(|id| *id == owner_id) else {
            continue;
        };
        artboards[bucket].objects.push(UniversalObject {
            type_key: record.type_key.0,
            local_id: record.id().unwrap_or(index as u64),
            parent_id: record.parent_id(),
            properties: humanize_properties(record),
        });
    }

    let chunks_json = if exact {
        Some(
            chunks
                .iter()
                .map(|c| {
                    serde_json::json!({
                        "kind": format!("{:?}", c.kind),
                        "terminatorCount": c.terminator_count,
                        "objectCount": c.records.len(),
                    })
                })
                .collect(),
        )
    } else {
        None
    };

    UniversalFile {
        format: FORMAT.to_owned(),
        version: VERSION.to_owned(),
        exact: exact.then_some(true),
        header: Some(UniversalHeader {
            version: format!("{}.{}", header.major, header.minor),
            file_id: header.file_id,
            property_keys: header.property_table.clone(),
        }),
        artboards,
        chunks: chunks_json,
    }
}

/// Lowers a universal JSON document back into a flat record list.
///
/// # Errors
///
/// Returns [`EncodeError::ExactContractBroken`] if `__riv_exact__` is set
/// but `header` or `chunks` are absent.
pub fn lower(file: &UniversalFile) -> Result<Vec<Record>, EncodeError> {
    if file.exact == Some(true) && (file.header.is_none() || file.chunks.is_none()) {
        return Err(EncodeError::ExactContractBroken {
            reason: "__riv_exact__ requires header and chunks to be present".to_owned(),
        });
    }

    let mut next_id = file
        .artboards
        .iter()
        .flat_map(|a| {
            a.local_id
                .into_iter()
                .chain(a.objects.iter().map(|o| o.local_id))
        })
        .max()
        .map_or(0, |max| max + 1);
    let mut fresh_id = || {
        let id = next_id;
        next_id += 1;
        id
    };

    let backboard_id = fresh_id();
    let mut backboard_record = Record::new(BACKBOARD_TYPE);
    backboard_record
        .properties
        .push((PropertyKey(3), Value::Uint(backboard_id)));

    let mut records = vec![backboard_record];
    for artboard in &file.artboards {
        let artboard_id = artboard.local_id.unwrap_or_else(&mut fresh_id);
        let mut artboard_record = Record::new(ARTBOARD_TYPE);
        artboard_record
            .properties
            .push((PropertyKey(3), Value::Uint(artboard_id)));
        artboard_record
            .properties
            .push((PropertyKey(5), Value::Uint(backboard_id)));
        if let Some(width) = artboard.width {
            artboard_record
                .properties
                .push((PropertyKey(7), Value::Double(width)));
        }
        if let Some(height) = artboard.height {
            artboard_record
                .properties
                .push((PropertyKey(8), Value::Double(height)));
        }
        records.push(artboard_record);

        for object in &artboard.objects {
            let mut record = Record::new(object.type_key);
            record
                .properties
                .push((PropertyKey(3), Value::Uint(object.local_id)));
            if let Some(parent_id) = object.parent_id {
                record
                    .properties
                    .push((PropertyKey(5), Value::Uint(parent_id)));
            }
            for (name, json_value) in &object.properties {
                let key = name
                    .strip_prefix("_p")
                    .and_then(|n| n.parse::<u32>().ok())
                    .or_else(|| SchemaCatalog::property_key_by_name(name));
                let Some(key) = key else { continue };
                let ty = SchemaCatalog::property(PropertyKey(key)).map(|info| info.ty);
                let Some(value) = json_to_value(json_value, ty) else {
                    continue;
                };
                record.properties.push((PropertyKey(key), value));
            }
            records.push(record);
        }
    }
    Ok(records)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::header::Header;
    use crate::object_stream::Record as Rec;
    use crate::schema::PropertyType;

    fn artboard_record(id: u64, parent: u64) -> Rec {
        let mut r = Rec::new(ARTBOARD_TYPE);
        r.properties.push((PropertyKey(3), Value::Uint(id)));
        r.properties.push((PropertyKey(5), Value::Uint(parent)));
        r.properties.push((PropertyKey(7), Value::Double(500.0)));
        r.properties.push((PropertyKey(8), Value::Double(400.0)));
        r
    }

    #[test]
    fn lift_promotes_artboard_width_and_height() {
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
        let graph = GraphModel::from_records(vec![backboard, artboard_record(2, 0)]);
        let universal = lift(&header, &graph, &[], false);
        assert_eq!(universal.artboards.len(), 1);
        assert_eq!(universal.artboards[0].width, Some(500.0));
        assert_eq!(universal.artboards[0].height, Some(400.0));
    }

    #[test]
    fn lower_synthesizes_a_backboard_and_preserves_artboard_linkage() {
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
        let graph = GraphModel::from_records(vec![backboard, artboard_record(2, 0)]);
        let universal = lift(&header, &graph, &[], false);

        let records = lower(&universal).unwrap();
        assert_eq!(records.len(), 2, "backboard plus one artboard");
        assert_eq!(records[0].type_key.0, crate::graph::BACKBOARD_TYPE);
        let backboard_id = records[0].id().unwrap();
        assert_eq!(records[1].type_key.0, ARTBOARD_TYPE);
        assert_eq!(records[1].parent_id(), Some(backboard_id));
        assert_eq!(records[1].id(), Some(2));
    }

    #[test]
    fn lower_keeps_hex_like_strings_as_strings_for_non_color_properties() {
        let mut file = UniversalFile {
            format: FORMAT.to_owned(),
            version: VERSION.to_owned(),
            exact: None,
            header: None,
            artboards: vec![UniversalArtboard {
                local_id: Some(2),
                name: None,
                width: None,
                height: None,
                objects: vec![],
            }],
            chunks: None,
        };
        let mut props = serde_json::Map::new();
        props.insert("_p900".to_owned(), serde_json::json!("#deadbeef"));
        file.artboards[0].objects.push(UniversalObject {
            type_key: 14,
            local_id: 5,
            parent_id: Some(2),
            properties: props,
        });

        let records = lower(&file).unwrap();
        let tag_record = records.iter().find(|r| r.type_key.0 == 14).unwrap();
        assert_eq!(
            tag_record
                .properties
                .iter()
                .find(|(k, _)| k.0 == 900)
                .map(|(_, v)| v.clone()),
            Some(Value::String("#deadbeef".to_owned()))
        );
    }

    #[test]
    fn owning_artboard_id_returns_none_on_parent_id_cycle() {
        let mut a = Record::new(14);
        a.properties.push((PropertyKey(3), Value::Uint(1)));
        a.properties.push((PropertyKey(5), Value::Uint(2)));
        let mut b = Record::new(14);
        b.properties.push((PropertyKey(3), Value::Uint(2)));
        b.properties.push((PropertyKey(5), Value::Uint(1)));
        let graph = GraphModel::from_records(vec![a, b]);
        assert_eq!(owning_artboard_id(&graph, 0), None);
    }

    #[test]
    fn lower_rejects_exact_without_header_and_chunks() {
        let file = UniversalFile {
            format: FORMAT.to_owned(),
            version: VERSION.to_owned(),
            exact: Some(true),
            header: None,
            artboards: vec![],
            chunks: None,
        };
        let err = lower(&file).unwrap_err();
        assert!(matches!(err, EncodeError::ExactContractBroken { .. }));
    }

    #[test]
    fn color_string_round_trips_through_all_three_forms() {
        for s in ["#F00", "#FF0000", "#FF0000FF"] {
            let color = color_from_str(s).unwrap();
            assert_eq!(color & 0xff, 0xff, "red channel for {s}");
            assert_eq!((color >> 8) & 0xff, 0, "green channel for {s}");
            assert_eq!((color >> 16) & 0xff, 0, "blue channel for {s}");
            assert_eq!((color >> 24) & 0xff, 0xff, "alpha channel for {s}");
        }
        assert_eq!(
            color_to_string(color_from_str("#FF0000FF").unwrap()),
            "#FF0000FF"
        );
    }
}
