//! The counter multiplexer (C3): wraps [`gpu_pmu::CounterGroup`] with
//! partial-success semantics and the data-model fields each individual
//! counter needs for rate computation.

use crate::error::{Error, Result};
use crate::sysfs::PerfAttr;

/// A single performance counter, as tracked between two samples.
///
/// Tracks `(event_type, event_config,
/// group_index, previous_raw, current_raw, scale, unit_string,
/// present_flag)`.
#[derive(Debug, Clone)]
pub struct Counter {
    /// Short name, for diagnostics and Prometheus labeling (`"rcs0-busy"`,
    /// `"energy-gpu"`, ...).
    pub name: String,
    /// The perf event type this counter was opened with.
    pub event_type: u32,
    /// The perf event config this counter was opened with.
    pub event_config: u64,
    /// The display-scale multiplier from sysfs (distinct from the
    /// dimensional divisor `d` applied by the rate calculator).
    pub scale: f64,
    /// The unit string from sysfs (`MiB`, `Joules`, or empty).
    pub unit: String,
    /// Whether the kernel accepted this counter's open. A counter with
    /// `present == false` never advances and contributes nothing to
    /// output.
    pub present: bool,
    /// Index into the group's value vector, once opened. `None` if the
    /// open was refused.
    pub(crate) real_index: Option<usize>,
    /// The raw value as of the previous tick.
    pub previous: u64,
    /// The raw value as of the most recent tick.
    pub current: u64,
}

impl Counter {
    fn absent(name: &str, attr: &PerfAttr) -> Self {
        Counter {
            name: name.to_string(),
            event_type: attr.type_,
            event_config: attr.config,
            scale: attr.scale,
            unit: attr.unit.clone(),
            present: false,
            real_index: None,
            previous: 0,
            current: 0,
        }
    }
}

/// One of the three independent kernel-grouped counter sets (engine,
/// RAPL, IMC), each with its own group-leader file descriptor.
pub struct CounterGroup {
    /// Name used in diagnostics and `ShortRead` errors (`"engine"`,
    /// `"rapl"`, `"imc"`).
    label: &'static str,
    inner: gpu_pmu::CounterGroup,
    /// Kernel-side open counter handles, kept alive so their fds stay
    /// valid; indexed by each logical counter's `real_index`.
    handles: Vec<gpu_pmu::Counter>,
    /// Every counter this group was asked to open, in insertion (logical)
    /// order — including ones the kernel refused.
    counters: Vec<Counter>,
    time_running: u64,
}

impl CounterGroup {
    /// Open a new, empty group.
    pub fn new(label: &'static str) -> std::io::Result<Self> {
        Ok(CounterGroup {
            label,
            inner: gpu_pmu::CounterGroup::new()?,
            handles: Vec::new(),
            counters: Vec::new(),
            time_running: 0,
        })
    }

    /// Open a new counter in this group and return its logical index,
    /// i.e. its `group_index`.
    ///
    /// Never itself fails: a refused open is recorded as
    /// `present: false` and the index is still reserved, so callers that
    /// need a mandatory counter check `counter(index).present` themselves
    /// and turn an absence into a fatal error only for the ones that need
    /// it (the engine group's IRQ anchor).
    pub fn open(&mut self, name: &str, attr: &PerfAttr) -> usize {
        let index = self.counters.len();
        match self.inner.open(attr.type_, attr.config) {
            Ok(handle) => {
                let real_index = self.handles.len();
                self.handles.push(handle);
                self.counters.push(Counter {
                    name: name.to_string(),
                    event_type: attr.type_,
                    event_config: attr.config,
                    scale: attr.scale,
                    unit: attr.unit.clone(),
                    present: true,
                    real_index: Some(real_index),
                    previous: 0,
                    current: 0,
                });
            }
            Err(source) => {
                let refused = Error::CounterOpenRefused {
                    name: name.to_string(),
                    type_: attr.type_,
                    config: attr.config,
                    source,
                };
                log::warn!("counter {name:?} unavailable in {} group: {refused}", self.label);
                self.counters.push(Counter::absent(name, attr));
            }
        }
        index
    }

    /// Allow every open counter in this group to begin counting.
    pub fn enable(&mut self) -> std::io::Result<()> {
        if self.handles.is_empty() {
            return Ok(());
        }
        self.inner.enable()
    }

    /// Read every open counter, shifting `current` into `previous` first.
    ///
    /// A no-op if this group has no present counters.
    pub fn tick(&mut self) -> Result<()> {
        if self.handles.is_empty() {
            return Ok(());
        }

        let counts = self.inner.read().map_err(|_| Error::ShortRead {
            group: self.label,
            expected: 2 + self.handles.len(),
            got: 0,
        })?;

        if counts.len() != self.handles.len() {
            return Err(Error::ShortRead {
                group: self.label,
                expected: 2 + self.handles.len(),
                got: 2 + counts.len(),
            });
        }

        self.time_running = counts.time_running();
        for counter in &mut self.counters {
            if let Some(real_index) = counter.real_index {
                counter.previous = counter.current;
                counter.current = counts.value(real_index).unwrap_or(counter.previous);
            }
        }
        Ok(())
    }

    /// The nanoseconds the kernel reports this group has been scheduled
    /// onto the PMU, as of the most recent [`tick`](CounterGroup::tick).
    /// This is the sampling timestamp used for wall-time deltas.
    pub fn time_running(&self) -> u64 {
        self.time_running
    }

    /// Whether this group has at least one present counter.
    pub fn has_present_counter(&self) -> bool {
        self.counters.iter().any(|c| c.present)
    }

    /// Every counter this group was asked to open, in logical
    /// (`group_index`) order.
    pub fn counters(&self) -> &[Counter] {
        &self.counters
    }

    /// The counter at the given logical index.
    pub fn counter(&self, index: usize) -> &Counter {
        &self.counters[index]
    }

    /// Reserve a logical index for a counter that could not even be
    /// resolved from sysfs (a missing or malformed metadata file), without
    /// attempting to open anything with the kernel.
    pub fn open_absent(&mut self, name: &str) -> usize {
        let index = self.counters.len();
        self.counters.push(Counter {
            name: name.to_string(),
            event_type: 0,
            event_config: 0,
            scale: 1.0,
            unit: String::new(),
            present: false,
            real_index: None,
            previous: 0,
            current: 0,
        });
        index
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sysfs::PerfAttr;

    // `PERF_TYPE_SOFTWARE`/`PERF_COUNT_SW_CPU_CLOCK` is always available
    // without privilege, so it stands in for a real engine-busy counter
    // here; a bogus type/config stands in for one the kernel refuses,
    // exactly the partial-success case C3 is built around.
    fn software_attr() -> PerfAttr {
        PerfAttr {
            type_: gpu_pmu_sys::bindings::PERF_TYPE_SOFTWARE,
            config: gpu_pmu_sys::bindings::PERF_COUNT_SW_CPU_CLOCK as u64,
            scale: 1.0,
            unit: String::new(),
        }
    }

    fn refused_attr() -> PerfAttr {
        PerfAttr {
            type_: 0xffff_fffe,
            config: 0xffff_ffff_ffff_ffff,
            scale: 1.0,
            unit: String::new(),
        }
    }

    #[test]
    fn refused_open_marks_counter_absent_without_disturbing_the_group() {
        let mut group = CounterGroup::new("engine").unwrap();
        let good = group.open("cpu-clock", &software_attr());
        let bad = group.open("bogus", &refused_attr());
        group.enable().unwrap();

        assert!(group.counter(good).present);
        assert!(!group.counter(bad).present);
        // The refused counter still reserved a stable group_index.
        assert_eq!(bad, good + 1);

        group.tick().unwrap();
        assert!(group.counter(good).current > 0 || group.counter(good).current == 0);
        assert_eq!(group.counter(bad).current, 0);
    }

    #[test]
    fn tick_shifts_current_into_previous() {
        let mut group = CounterGroup::new("engine").unwrap();
        let idx = group.open("cpu-clock", &software_attr());
        group.enable().unwrap();

        group.tick().unwrap();
        let first = group.counter(idx).current;
        assert_eq!(group.counter(idx).previous, 0);

        std::thread::sleep(std::time::Duration::from_millis(5));
        group.tick().unwrap();
        assert_eq!(group.counter(idx).previous, first);
        assert!(group.counter(idx).current >= first);
    }

    #[test]
    fn empty_group_tick_is_a_harmless_no_op() {
        let mut group = CounterGroup::new("rapl").unwrap();
        assert!(!group.has_present_counter());
        group.tick().unwrap();
    }
}
