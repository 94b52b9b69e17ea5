//! Bridge capability: the narrow interface the engine uses to ask the
//! host interpreter questions it cannot answer on its own.
//!
//! A capability object is passed to [`crate::Profiler::start`], not an
//! ambient dependency: this is what keeps the core testable without a
//! live interpreter. See `MockBridge` in `tests/` for the test double
//! stand-in.

use std::hash::Hash;

/// The kind of execution event delivered to [`crate::engine::Engine::on_event`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// Entering a method defined in the host language.
    Call,
    /// Entering a method defined in the host runtime itself.
    CCall,
    /// Returning from a host-language method.
    Return,
    /// Returning from a host-runtime method.
    CReturn,
    /// Source line advance within the current frame.
    Line,
}

/// One execution event, as delivered by the host bridge.
#[derive(Debug, Clone)]
pub struct Event<B: HostBridge> {
    pub kind: EventKind,
    /// Opaque reference compared against the profiler-module sentinel to
    /// filter the profiler's own calls out of the trace.
    pub self_ref: B::SelfRef,
    /// Opaque, hashable class handle; `0` is allowed.
    pub class_handle: u64,
    /// Opaque, hashable method identifier.
    pub method_id: u64,
    /// May be `None` for `CCall`/`CReturn` (host-side location isn't
    /// meaningful there).
    pub source_file: Option<String>,
    /// May be `0` for `CCall`/`CReturn`.
    pub source_line: u32,
    pub task_handle: B::TaskHandle,
}

/// Host-provided capabilities the engine needs but cannot implement
/// itself: identifying its own entry points, and resolving included-module
/// proxy classes to their real class.
pub trait HostBridge {
    /// Opaque handle identifying one of the host's cooperatively-scheduled
    /// tasks ("green threads"). No particular representation is mandated
    /// (pointer vs. integer id), only that it be hashable.
    type TaskHandle: Clone + Eq + Hash;

    /// Opaque reference compared against [`HostBridge::profiler_sentinel`]
    /// to filter self-events.
    type SelfRef: PartialEq + Clone;

    /// The sentinel value identifying the profiler's own module, so its
    /// public entry points never appear in the trace.
    fn profiler_sentinel(&self) -> Self::SelfRef;

    /// Whether `class_handle` is an included-module proxy that should be
    /// normalized to its real class before computing a method key.
    fn is_included_module_proxy(&self, class_handle: u64) -> bool;

    /// Resolve an included-module proxy to the real class it wraps.
    fn resolve_real_class(&self, class_handle: u64) -> u64;
}
