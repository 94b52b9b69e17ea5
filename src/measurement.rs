//! Pluggable measurement clock (C1) and mode dispatcher (C8).
//!
//! A [`Measurement`] is a tagged variant rather than a trait object: the
//! engine calls `now()`/`to_seconds()` on one predictable branch per event
//! instead of paying for dynamic dispatch.

use std::sync::Arc;
use std::time::Instant;

use crate::error::ProfilerError;

/// The unit the engine accumulates in method/edge/frame counters.
///
/// Opaque and only subtractable/additive from the engine's point of view:
/// only a [`Measurement`] knows how to turn it into seconds.
pub type Raw = u64;

/// Which clock backs the active [`Measurement`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum MeasurementMode {
    /// Coarse process CPU time.
    ProcessTime,
    /// Wall-clock time, microsecond resolution.
    WallTime,
    /// High-resolution cycle counter, requires frequency calibration.
    CpuTime,
    /// Host-reported allocation count.
    Allocations,
}

/// A pluggable clock: read a monotonic counter, convert it to seconds.
///
/// Variants carry whatever state their conversion needs (a calibrated
/// frequency for cycles, a host-supplied counter function for
/// allocations) so `to_seconds` never needs external context.
#[derive(Clone)]
pub enum Measurement {
    ProcessTime,
    WallTime { epoch: Instant },
    CpuTime { frequency_hz: f64 },
    Allocations { counter: Arc<dyn Fn() -> Raw + Send + Sync> },
}

impl std::fmt::Debug for Measurement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Measurement::ProcessTime => write!(f, "Measurement::ProcessTime"),
            Measurement::WallTime { .. } => write!(f, "Measurement::WallTime"),
            Measurement::CpuTime { frequency_hz } => {
                write!(f, "Measurement::CpuTime {{ frequency_hz: {frequency_hz} }}")
            }
            Measurement::Allocations { .. } => write!(f, "Measurement::Allocations"),
        }
    }
}

impl Measurement {
    /// Mode this measurement variant implements.
    #[must_use]
    pub fn mode(&self) -> MeasurementMode {
        match self {
            Measurement::ProcessTime => MeasurementMode::ProcessTime,
            Measurement::WallTime { .. } => MeasurementMode::WallTime,
            Measurement::CpuTime { .. } => MeasurementMode::CpuTime,
            Measurement::Allocations { .. } => MeasurementMode::Allocations,
        }
    }

    /// Construct the process-time measurement.
    #[must_use]
    pub fn process_time() -> Self {
        Measurement::ProcessTime
    }

    /// Construct the wall-time measurement, anchored to the current instant.
    #[must_use]
    pub fn wall_time() -> Self {
        Measurement::WallTime { epoch: Instant::now() }
    }

    /// Construct the cycle-counter measurement, calibrating the frequency
    /// by sleeping ~500ms and scaling the observed delta by 2.
    ///
    /// # Errors
    /// Returns [`ProfilerError::UnsupportedMode`] off `x86_64`/`aarch64`,
    /// where no cycle counter is read.
    #[allow(clippy::cast_precision_loss)]
    pub fn calibrate_cpu() -> Result<Self, ProfilerError> {
        if !cfg!(any(target_arch = "x86_64", target_arch = "aarch64")) {
            return Err(ProfilerError::UnsupportedMode(MeasurementMode::CpuTime));
        }
        let x = read_cycles();
        std::thread::sleep(std::time::Duration::from_millis(500));
        let y = read_cycles();
        let frequency_hz = (y.saturating_sub(x)) as f64 * 2.0;
        Ok(Measurement::CpuTime { frequency_hz })
    }

    /// Construct the cycle-counter measurement with an already-known
    /// frequency, skipping calibration.
    #[must_use]
    pub fn cpu_with_frequency(frequency_hz: f64) -> Self {
        Measurement::CpuTime { frequency_hz }
    }

    /// Construct the allocation-count measurement from a host-supplied
    /// counter.
    pub fn allocations(counter: impl Fn() -> Raw + Send + Sync + 'static) -> Self {
        Measurement::Allocations { counter: Arc::new(counter) }
    }

    /// Read the current raw counter value.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn now(&self) -> Raw {
        match self {
            Measurement::ProcessTime => process_time_ticks(),
            Measurement::WallTime { epoch } => epoch.elapsed().as_micros() as Raw,
            Measurement::CpuTime { .. } => read_cycles(),
            Measurement::Allocations { counter } => counter(),
        }
    }

    /// Get the calibrated cycle frequency, in Hz, if this is cycle mode.
    #[must_use]
    pub fn cpu_frequency(&self) -> Option<f64> {
        match self {
            Measurement::CpuTime { frequency_hz } => Some(*frequency_hz),
            _ => None,
        }
    }

    /// Replace the calibrated cycle frequency, if this is cycle mode.
    pub fn set_cpu_frequency(&mut self, hz: f64) {
        if let Measurement::CpuTime { frequency_hz } = self {
            *frequency_hz = hz;
        }
    }

    /// Convert a raw counter delta into seconds.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn to_seconds(&self, raw: Raw) -> f64 {
        match self {
            Measurement::ProcessTime => raw as f64 / ticks_per_second() as f64,
            Measurement::WallTime { .. } => raw as f64 / 1_000_000.0,
            Measurement::CpuTime { frequency_hz } => {
                if *frequency_hz > 0.0 {
                    raw as f64 / frequency_hz
                } else {
                    0.0
                }
            }
            Measurement::Allocations { .. } => raw as f64,
        }
    }
}

#[cfg(unix)]
fn ticks_per_second() -> i64 {
    // SAFETY: sysconf with a well-known name, no pointers involved.
    unsafe { libc::sysconf(libc::_SC_CLK_TCK) }
}

#[cfg(not(unix))]
fn ticks_per_second() -> i64 {
    100
}

#[cfg(unix)]
#[allow(clippy::cast_sign_loss)]
fn process_time_ticks() -> Raw {
    let mut buf = std::mem::MaybeUninit::<libc::tms>::uninit();
    // SAFETY: `times` only writes through a valid `tms` pointer we just allocated.
    unsafe {
        libc::times(buf.as_mut_ptr());
        let tms = buf.assume_init();
        (tms.tms_utime + tms.tms_stime) as Raw
    }
}

#[cfg(not(unix))]
#[allow(clippy::cast_possible_truncation)]
fn process_time_ticks() -> Raw {
    static START: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();
    START.get_or_init(Instant::now).elapsed().as_millis() as Raw
}

#[cfg(target_arch = "x86_64")]
fn read_cycles() -> Raw {
    // SAFETY: RDTSC is available on every x86_64 CPU we run on; it has no
    // side effects and no alignment/pointer requirements.
    unsafe { std::arch::x86_64::_rdtsc() }
}

#[cfg(all(target_arch = "aarch64", target_os = "linux"))]
fn read_cycles() -> Raw {
    let mut cntvct: u64;
    // SAFETY: reading a read-only system register, no memory access.
    unsafe {
        std::arch::asm!("mrs {0}, cntvct_el0", out(reg) cntvct);
    }
    cntvct
}

#[cfg(not(any(target_arch = "x86_64", all(target_arch = "aarch64", target_os = "linux"))))]
fn read_cycles() -> Raw {
    0
}

/// Selects and validates the active measurement mode (C8); mutation is
/// refused with [`ProfilerError::BusyError`] while profiling is live.
pub struct Dispatcher {
    active: Measurement,
}

impl Dispatcher {
    /// Construct a dispatcher defaulting to wall-time measurement.
    #[must_use]
    pub fn new() -> Self {
        Self { active: Measurement::wall_time() }
    }

    #[must_use]
    pub fn measurement(&self) -> &Measurement {
        &self.active
    }

    #[must_use]
    pub fn mode(&self) -> MeasurementMode {
        self.active.mode()
    }

    /// Replace the active measurement, refusing if `busy` (profiler running).
    ///
    /// # Errors
    /// [`ProfilerError::BusyError`] if `busy`; [`ProfilerError::UnsupportedMode`]
    /// if the requested mode can't be constructed on this build/target.
    pub fn set_mode(&mut self, mode: MeasurementMode, busy: bool) -> Result<(), ProfilerError> {
        if busy {
            return Err(ProfilerError::BusyError);
        }
        self.active = match mode {
            MeasurementMode::ProcessTime => Measurement::process_time(),
            MeasurementMode::WallTime => Measurement::wall_time(),
            MeasurementMode::CpuTime => Measurement::calibrate_cpu()?,
            MeasurementMode::Allocations => {
                return Err(ProfilerError::UnsupportedMode(MeasurementMode::Allocations))
            }
        };
        Ok(())
    }

    /// Install a pre-built measurement directly (used for `Allocations`,
    /// which needs a host-supplied counter the mode enum alone can't carry).
    ///
    /// # Errors
    /// [`ProfilerError::BusyError`] if `busy`.
    pub fn set_measurement(&mut self, measurement: Measurement, busy: bool) -> Result<(), ProfilerError> {
        if busy {
            return Err(ProfilerError::BusyError);
        }
        self.active = measurement;
        Ok(())
    }

    #[must_use]
    pub fn cpu_frequency(&self) -> Option<f64> {
        self.active.cpu_frequency()
    }

    /// Set the calibrated cycle frequency.
    ///
    /// # Errors
    /// [`ProfilerError::InvalidMode`] if the active mode isn't `CpuTime`.
    pub fn set_cpu_frequency(&mut self, hz: f64) -> Result<(), ProfilerError> {
        if self.active.cpu_frequency().is_none() {
            return Err(ProfilerError::InvalidMode("cpu_frequency requires CpuTime mode".into()));
        }
        self.active.set_cpu_frequency(hz);
        Ok(())
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}
