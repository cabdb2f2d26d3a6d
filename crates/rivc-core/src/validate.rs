// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Structural invariant checks over a decoded container.
//!
//! The validator never short-circuits: every check runs and its result is
//! aggregated into a [`ValidationReport`]. Whether a given issue counts as
//! a warning or an error depends on `--strict`; [`ValidationReport::ok`]
//! reflects that policy.

use thiserror::Error;

use crate::chunk::{Chunk, ChunkKind, ARTBOARD_CATALOG_ENTRY};
use crate::context::Context;
use crate::error::ErrorKind;
use crate::graph::{GraphModel, ARTBOARD_TYPE};
use crate::header::Header;

/// One structural issue found by the validator.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidateError {
    /// The property table contains a key more than once.
    #[error("duplicate property key {key} in header table")]
    DuplicatePropertyKey {
        /// The repeated key.
        key: u32,
    },
    /// A record uses a property key absent from the header table.
    #[error("property key {key} used by type {type_key} is absent from the header table")]
    UndeclaredPropertyKey {
        /// The offending key.
        key: u32,
        /// Type key of the record that used it.
        type_key: u32,
    },
    /// A record's `parentId` does not resolve to any record in the file.
    #[error("record {record_id} has parentId {parent_id} with no matching record")]
    DanglingParentId {
        /// The record claiming the parent.
        record_id: u64,
        /// The unresolved parent id.
        parent_id: u64,
    },
    /// An artboard catalog entry's id does not resolve to any record.
    #[error("artboard catalog entry {id} does not resolve to any record")]
    DanglingCatalogId {
        /// The unresolved id.
        id: u64,
    },
    /// An artboard catalog entry resolves to a record that is not an
    /// Artboard (type key 1).
    #[error("artboard catalog entry {id} resolves to non-artboard type {type_key}")]
    CatalogEntryNotArtboard {
        /// The catalog entry's id.
        id: u64,
        /// The resolved record's actual type key.
        type_key: u32,
    },
    /// No artboard catalog chunk is present.
    #[error("no artboard catalog chunk present")]
    MissingArtboardCatalog,
}

impl ValidateError {
    /// Semantic kind, for CLI exit-code and diagnostic mapping.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::DuplicatePropertyKey { .. } => ErrorKind::Malformed,
            Self::UndeclaredPropertyKey { .. } => ErrorKind::SchemaViolation,
            Self::DanglingParentId { .. }
            | Self::DanglingCatalogId { .. }
            | Self::CatalogEntryNotArtboard { .. }
            | Self::MissingArtboardCatalog => ErrorKind::ReferenceUnresolved,
        }
    }
}

/// One informational observation that is never promoted to a warning or
/// error, even under `--strict` (e.g. terminator padding).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidateInfo(pub String);

/// Aggregated result of a full validation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    /// Issues that fail validation regardless of mode.
    pub errors: Vec<ValidateError>,
    /// Issues that fail validation only under `--strict`.
    pub warnings: Vec<ValidateError>,
    /// Non-failing observations (e.g. terminator padding counts).
    pub info: Vec<ValidateInfo>,
}

impl ValidationReport {
    /// Whether the file passes validation under the given context.
    #[must_use]
    pub fn ok(&self, ctx: &Context) -> bool {
        self.errors.is_empty() && (!ctx.strict || self.warnings.is_empty())
    }
}

/// Runs every structural check over a decoded container.
#[must_use]
pub fn validate(header: &Header, graph: &GraphModel, chunks: &[Chunk]) -> ValidationReport {
    let mut report = ValidationReport::default();

    check_property_table(header, &mut report);
    check_stream_keys_declared(header, graph, &mut report);
    check_parent_ids(graph, &mut report);
    check_artboard_catalog(graph, chunks, &mut report);
    check_terminator_padding(chunks, &mut report);

    report
}

fn check_property_table(header: &Header, report: &mut ValidationReport) {
    let mut seen = std::collections::HashSet::new();
    for &key in &header.property_table {
        if key == 0 {
            continue;
        }
        if !seen.insert(key) {
            report
                .errors
                .push(ValidateError::DuplicatePropertyKey { key });
        }
    }
}

fn check_stream_keys_declared(header: &Header, graph: &GraphModel, report: &mut ValidationReport) {
    for (_, record) in graph.records() {
        for (key, _) in &record.properties {
            if !header.declares(key.0) {
                report.warnings.push(ValidateError::UndeclaredPropertyKey {
                    key: key.0,
                    type_key: record.type_key.0,
                });
            }
        }
    }
}

fn check_parent_ids(graph: &GraphModel, report: &mut ValidationReport) {
    for (_, record) in graph.records() {
        if let (Some(record_id), Some(parent_id)) = (record.id(), record.parent_id()) {
            if graph.resolve(parent_id).is_none() {
                report.warnings.push(ValidateError::DanglingParentId {
                    record_id,
                    parent_id,
                });
            }
        }
    }
}

fn check_artboard_catalog(graph: &GraphModel, chunks: &[Chunk], report: &mut ValidationReport) {
    let Some(catalog) = chunks.iter().find(|c| c.kind == ChunkKind::ArtboardCatalog) else {
        report.warnings.push(ValidateError::MissingArtboardCatalog);
        return;
    };
    for entry in &catalog.records {
        if entry.type_key.0 != ARTBOARD_CATALOG_ENTRY {
            continue;
        }
        let Some(id) = entry.id() else { continue };
        match graph.resolve(id) {
            None => report
                .warnings
                .push(ValidateError::DanglingCatalogId { id }),
            Some(index) => {
                let type_key = graph.record(index).map_or(0, |r| r.type_key.0);
                if type_key != ARTBOARD_TYPE {
                    report
                        .warnings
                        .push(ValidateError::CatalogEntryNotArtboard { id, type_key });
                }
            }
        }
    }
}

#[allow(clippy::cast_possible_truncation)] // chunk record counts fit comfortably in a u32
fn check_terminator_padding(chunks: &[Chunk], report: &mut ValidationReport) {
    for (index, chunk) in chunks.iter().enumerate() {
        let expected = chunk.records.len() as u32 + 1;
        if chunk.terminator_count > expected {
            report.info.push(ValidateInfo(format!(
                "chunk {index}: {} extra trailing terminator(s)",
                chunk.terminator_count - expected
            )));
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::object_stream::Record;
    use crate::schema::{PropertyKey, PropertyType, Value};

    fn header_with(keys: &[u32]) -> Header {
        Header::new(
            7,
            0,
            0,
            keys.iter().map(|k| (*k, PropertyType::Uint)).collect(),
        )
    }

    #[test]
    fn dangling_parent_id_is_a_warning() {
        let header = header_with(&[3, 5]);
        let mut record = Record::new(14);
        record.properties.push((PropertyKey(3), Value::Uint(1)));
        record.properties.push((PropertyKey(5), Value::Uint(999)));
        let graph = GraphModel::from_records(vec![record]);
        let report = validate(&header, &graph, &[]);
        assert!(report
            .warnings
            .iter()
            .any(|w| matches!(w, ValidateError::DanglingParentId { .. })));
        assert!(report.errors.is_empty());
        assert!(!report.ok(&Context { strict: true }));
        assert!(report.ok(&Context::default()));
    }

    #[test]
    fn missing_catalog_is_a_warning_only() {
        let header = header_with(&[3]);
        let graph = GraphModel::from_records(vec![]);
        let report = validate(&header, &graph, &[]);
        assert!(report
            .warnings
            .contains(&ValidateError::MissingArtboardCatalog));
    }

    #[test]
    fn duplicate_property_key_in_table_is_an_error() {
        let header = Header {
            major: 7,
            minor: 0,
            file_id: 0,
            property_table: vec![3, 3],
            bitmap: vec![PropertyType::Uint, PropertyType::Uint],
        };
        let graph = GraphModel::from_records(vec![]);
        let report = validate(&header, &graph, &[]);
        assert!(report
            .errors
            .contains(&ValidateError::DuplicatePropertyKey { key: 3 }));
        assert!(!report.ok(&Context::default()));
    }
}
