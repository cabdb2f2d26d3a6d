// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! rivc-core: a round-trip binary codec for a Rive-like vector-animation
//! scene-graph container format.
//!
//! Decodes a container into a [`container::RivFile`] (header, object graph,
//! auxiliary chunks, opaque trailer), projects it to and from a stable
//! "universal" JSON document via [`json`], validates structural invariants
//! via [`validate`], and can reproduce a source buffer byte-for-byte in
//! exact mode via [`container::decode_exact`]/[`container::encode_exact`].
#![forbid(unsafe_code)]

/// LEB128 varuint / string / float / color primitives.
pub mod bitstream;
/// Auxiliary chunks following the primary object stream.
pub mod chunk;
/// Top-level container orchestration and exact-mode reconstruction.
pub mod container;
/// Explicit decode/encode context (`strict`, `exact`), replacing global state.
pub mod context;
/// Structural and byte-level comparison of two containers.
pub mod diff;
/// Error types for every codec layer.
pub mod error;
/// In-memory object graph: arena, parent/child index, artboard list.
pub mod graph;
/// Header: magic, version, file id, property table, type bitmap.
pub mod header;
/// The "universal" JSON bridge.
pub mod json;
/// Typed record read/write over the object stream.
pub mod object_stream;
/// Compiled-in property/type-key catalog and the tagged [`schema::Value`] union.
pub mod schema;
/// Non-short-circuiting structural invariant checks.
pub mod validate;

pub use container::{ExactMeta, RivFile};
pub use context::Context;
pub use error::{ErrorKind, RivError};
