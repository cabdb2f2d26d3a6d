// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Per-invocation configuration, threaded explicitly through the codec.
//!
//! No flag here is ever read from a global or thread-local; every function
//! that needs strict/exact behavior takes a `&Context` parameter.

/// Decode/encode configuration for one codec invocation.
///
/// Exact-mode tracking is chosen at the call site by which function a
/// caller invokes (`decode`/`decode_exact`, `encode`/`encode_exact`), not
/// by a flag threaded through here — this struct only carries the
/// validation-policy knob shared by both paths.
#[derive(Debug, Clone, Copy, Default)]
pub struct Context {
    /// Escalate warnings (undeclared property keys, dangling references,
    /// missing artboard catalog, mid-record EOF) to hard errors.
    pub strict: bool,
}
