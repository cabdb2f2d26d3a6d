// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Structural and byte-level comparison of two decoded containers. A pure
//! consumer of the codec: it never mutates either file.

use crate::container::RivFile;

/// Size-growth classification between a reference file and a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrowthVerdict {
    /// Growth under 5%.
    Pass,
    /// Growth between 5% and 10%.
    Warn,
    /// Growth over 10%.
    Fail,
}

impl GrowthVerdict {
    fn classify(pct: f64) -> Self {
        if pct.abs() < 5.0 {
            Self::Pass
        } else if pct.abs() <= 10.0 {
            Self::Warn
        } else {
            Self::Fail
        }
    }
}

/// Result of comparing two containers.
#[derive(Debug, Clone, PartialEq)]
pub struct DiffReport {
    /// `candidate.len() - reference.len()`, in bytes.
    pub size_delta: i64,
    /// Percentage size growth relative to the reference.
    pub size_growth_pct: f64,
    /// Growth classification.
    pub verdict: GrowthVerdict,
    /// `candidate object count - reference object count`.
    pub object_count_delta: i64,
    /// Index into the shared type-key sequence of the first mismatch, if
    /// the sequences diverge before either ends.
    pub first_type_mismatch: Option<usize>,
    /// Property keys declared in the reference header but not the
    /// candidate's.
    pub missing_header_keys: Vec<u32>,
    /// Property keys declared in the candidate header but not the
    /// reference's.
    pub extra_header_keys: Vec<u32>,
    /// Per-chunk `(kind, reference_len, candidate_len)`, for chunks present
    /// in either file, indexed by position.
    pub chunk_diffs: Vec<ChunkDiff>,
}

/// One position's chunk comparison.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkDiff {
    /// Chunk position.
    pub index: usize,
    /// `Some(kind)` when present in the reference.
    pub reference_kind: Option<&'static str>,
    /// `Some(kind)` when present in the candidate.
    pub candidate_kind: Option<&'static str>,
    /// Reference record count, if the chunk is present there.
    pub reference_len: Option<usize>,
    /// Candidate record count, if the chunk is present there.
    pub candidate_len: Option<usize>,
}

fn kind_name(kind: crate::chunk::ChunkKind) -> &'static str {
    match kind {
        crate::chunk::ChunkKind::Objects => "objects",
        crate::chunk::ChunkKind::AssetPayload => "asset_payload",
        crate::chunk::ChunkKind::ArtboardCatalog => "artboard_catalog",
        crate::chunk::ChunkKind::Unknown => "unknown",
    }
}

/// Compares a reference container's source bytes and decoded form against a
/// candidate's.
#[must_use]
#[allow(clippy::cast_precision_loss, clippy::cast_possible_wrap)] // file/object counts never approach f64/i64 limits
pub fn diff(
    reference_bytes: &[u8],
    reference: &RivFile,
    candidate_bytes: &[u8],
    candidate: &RivFile,
) -> DiffReport {
    let size_delta = candidate_bytes.len() as i64 - reference_bytes.len() as i64;
    let size_growth_pct = if reference_bytes.is_empty() {
        0.0
    } else {
        (size_delta as f64 / reference_bytes.len() as f64) * 100.0
    };
    let verdict = GrowthVerdict::classify(size_growth_pct);

    let object_count_delta = candidate.graph.len() as i64 - reference.graph.len() as i64;

    let reference_types: Vec<u32> = reference
        .graph
        .records()
        .map(|(_, r)| r.type_key.0)
        .collect();
    let candidate_types: Vec<u32> = candidate
        .graph
        .records()
        .map(|(_, r)| r.type_key.0)
        .collect();
    let first_type_mismatch = reference_types
        .iter()
        .zip(candidate_types.iter())
        .position(|(a, b)| a != b)
        .or_else(|| {
            (reference_types.len() != candidate_types.len())
                .then_some(reference_types.len().min(candidate_types.len()))
        });

    let ref_keys: std::collections::HashSet<u32> =
        reference.header.property_table.iter().copied().collect();
    let cand_keys: std::collections::HashSet<u32> =
        candidate.header.property_table.iter().copied().collect();
    let mut missing_header_keys: Vec<u32> = ref_keys.difference(&cand_keys).copied().collect();
    missing_header_keys.sort_unstable();
    let mut extra_header_keys: Vec<u32> = cand_keys.difference(&ref_keys).copied().collect();
    extra_header_keys.sort_unstable();

    let max_chunks = reference.chunks.len().max(candidate.chunks.len());
    let chunk_diffs = (0..max_chunks)
        .map(|index| ChunkDiff {
            index,
            reference_kind: reference.chunks.get(index).map(|c| kind_name(c.kind)),
            candidate_kind: candidate.chunks.get(index).map(|c| kind_name(c.kind)),
            reference_len: reference.chunks.get(index).map(|c| c.records.len()),
            candidate_len: candidate.chunks.get(index).map(|c| c.records.len()),
        })
        .collect();

    DiffReport {
        size_delta,
        size_growth_pct,
        verdict,
        object_count_delta,
        first_type_mismatch,
        missing_header_keys,
        extra_header_keys,
        chunk_diffs,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::context::Context;
    use crate::header::Header;
    use crate::object_stream::Record;
    use crate::schema::{PropertyKey, PropertyType, Value};

    fn build(extra_object: bool) -> (Vec<u8>, RivFile) {
        let header = Header::new(7, 0, 0, vec![(3, PropertyType::Uint)]);
        let mut backboard = Record::new(23);
        backboard.properties.push((PropertyKey(3), Value::Uint(0)));
        let mut records = vec![backboard];
        if extra_object {
            let mut artboard = Record::new(1);
            artboard.properties.push((PropertyKey(3), Value::Uint(1)));
            records.push(artboard);
        }

        let mut writer = crate::bitstream::Writer::new();
        header.encode(&mut writer);
        let declared = |k: u32| k == 3;
        crate::object_stream::write_records(&mut writer, &records, &declared).unwrap();
        let bytes = writer.into_bytes();

        let file = crate::container::decode(&bytes, &Context::default()).unwrap();
        (bytes, file)
    }

    #[test]
    fn growth_classification_matches_thresholds() {
        assert_eq!(GrowthVerdict::classify(0.0), GrowthVerdict::Pass);
        assert_eq!(GrowthVerdict::classify(7.0), GrowthVerdict::Warn);
        assert_eq!(GrowthVerdict::classify(20.0), GrowthVerdict::Fail);
    }

    #[test]
    fn detects_object_count_growth_and_type_mismatch() {
        let (ref_bytes, reference) = build(false);
        let (cand_bytes, candidate) = build(true);
        let report = diff(&ref_bytes, &reference, &cand_bytes, &candidate);
        assert_eq!(report.object_count_delta, 1);
        assert_eq!(report.first_type_mismatch, Some(1));
    }

    #[test]
    fn identical_files_report_no_drift() {
        let (bytes, file) = build(false);
        let report = diff(&bytes, &file, &bytes, &file);
        assert_eq!(report.size_delta, 0);
        assert_eq!(report.object_count_delta, 0);
        assert_eq!(report.first_type_mismatch, None);
        assert_eq!(report.verdict, GrowthVerdict::Pass);
    }
}
