//! Event-driven call-graph accounting engine for a dynamic-language
//! interpreter profiler.
//!
//! This crate is the accounting core: the per-task call stack, the
//! method-and-edge table, recursion-depth bookkeeping, context-switch
//! wait-time attribution, and a pluggable measurement clock. It consumes
//! a serial stream of execution events delivered by a host interpreter
//! through the [`bridge::HostBridge`] capability and, on
//! [`Profiler::stop`], produces an immutable [`snapshot::Snapshot`].
//!
//! Installing the event hook into a real interpreter, resolving and
//! formatting method/class names, and printing flat or call-graph reports
//! are all out of scope here: they're host glue and report printers that
//! sit on top of this crate.

pub mod bridge;
pub mod edge;
pub mod engine;
pub mod error;
pub mod measurement;
pub mod method_table;
pub mod snapshot;
pub mod stack;
pub mod task;

pub use bridge::{Event, EventKind, HostBridge};
pub use edge::EdgeRecord;
pub use error::ProfilerError;
pub use measurement::{Measurement, MeasurementMode};
pub use method_table::MethodRecord;
pub use snapshot::{Snapshot, TaskSnapshot};

use engine::Engine;
use measurement::Dispatcher;

/// The public entry point: `start`/`stop` and measurement-mode
/// getters/setters. One `Profiler` is a process-wide handle: the host
/// owns its lifetime explicitly, there is no hidden process-scope static.
pub struct Profiler<B: HostBridge> {
    engine: Option<Engine<B>>,
    dispatcher: Dispatcher,
}

impl<B: HostBridge> Profiler<B> {
    #[must_use]
    pub fn new() -> Self {
        Self { engine: None, dispatcher: Dispatcher::new() }
    }

    /// Start a fresh profiling run with the given host capability object.
    ///
    /// # Errors
    /// [`ProfilerError::AlreadyRunning`] if a run is already in progress.
    pub fn start(&mut self, bridge: B) -> Result<(), ProfilerError> {
        if self.engine.is_some() {
            return Err(ProfilerError::AlreadyRunning);
        }
        self.engine = Some(Engine::new(bridge, self.dispatcher.measurement().clone()));
        Ok(())
    }

    /// Stop profiling and freeze the accumulated state into a [`Snapshot`].
    ///
    /// # Errors
    /// [`ProfilerError::NotRunning`] if no run is in progress.
    pub fn stop(&mut self) -> Result<Snapshot, ProfilerError> {
        let engine = self.engine.take().ok_or(ProfilerError::NotRunning)?;
        let (registry, _bridge, measurement) = engine.into_parts();
        Ok(Snapshot::from_registry(registry, measurement))
    }

    #[must_use]
    pub fn running(&self) -> bool {
        self.engine.is_some()
    }

    /// Deliver one execution event to the engine. A no-op if the profiler
    /// isn't running: the host is expected to detach its hook on
    /// [`Profiler::stop`], but a stray event arriving anyway is simply
    /// refused rather than raising an error.
    pub fn on_event(&mut self, event: Event<B>) {
        if let Some(engine) = self.engine.as_mut() {
            engine.on_event(event);
        }
    }

    /// Select the active measurement mode.
    ///
    /// # Errors
    /// [`ProfilerError::BusyError`] while running;
    /// [`ProfilerError::UnsupportedMode`] if unavailable on this build.
    pub fn set_measurement(&mut self, mode: MeasurementMode) -> Result<(), ProfilerError> {
        self.dispatcher.set_mode(mode, self.running())
    }

    /// Install a pre-built measurement directly (the only way to select
    /// `Allocations` mode, since it needs a host-supplied counter closure
    /// the mode enum alone can't carry).
    ///
    /// # Errors
    /// [`ProfilerError::BusyError`] while running.
    pub fn set_measurement_with(&mut self, measurement: Measurement) -> Result<(), ProfilerError> {
        self.dispatcher.set_measurement(measurement, self.running())
    }

    #[must_use]
    pub fn get_measurement(&self) -> MeasurementMode {
        self.dispatcher.mode()
    }

    /// # Errors
    /// [`ProfilerError::InvalidMode`] unless the active mode is `CpuTime`.
    pub fn set_cpu_frequency(&mut self, hz: f64) -> Result<(), ProfilerError> {
        self.dispatcher.set_cpu_frequency(hz)
    }

    #[must_use]
    pub fn get_cpu_frequency(&self) -> Option<f64> {
        self.dispatcher.cpu_frequency()
    }
}

impl<B: HostBridge> Default for Profiler<B> {
    fn default() -> Self {
        Self::new()
    }
}
