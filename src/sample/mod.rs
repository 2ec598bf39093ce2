//! The sampler (C4): owns the three counter groups, drives one tick of
//! shared-timestamp reads, and exposes the per-sample data model the rate
//! calculator and renderers read from.

pub mod aggregate;

use std::path::Path;

use crate::counters::CounterGroup;
use crate::error::{Error, Result};
use crate::sysfs::device::DeviceInfo;
use crate::sysfs::engines::{discover_engines, EngineDescriptor};
use crate::sysfs::AttrResolver;

/// One of the three independent counter groups a [`Sample`] reads from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Group {
    /// IRQ, frequency, RC6, and every engine's busy/wait/sema.
    Engine,
    /// GPU and package energy, from the RAPL `power` PMU.
    Rapl,
    /// Memory-controller read/write bandwidth.
    Imc,
}

/// One discovered GPU engine, plus the logical indices of its busy, wait,
/// and sema counters within the engine group.
#[derive(Debug, Clone)]
pub struct EngineSlot {
    /// Static discovery data: name, class, instance.
    pub descriptor: EngineDescriptor,
    /// Index of this engine's busy counter in the engine group.
    pub busy: usize,
    /// Index of this engine's wait counter in the engine group.
    pub wait: usize,
    /// Index of this engine's semaphore-wait counter in the engine group.
    pub sema: usize,
}

/// A synthetic, class-level aggregate of one or more real engines'
/// per-tick deltas. Built lazily by [`aggregate`](aggregate) on first
/// entry to class view.
#[derive(Debug, Clone)]
pub struct EngineClassAggregate {
    /// The class this aggregates, and how many real engines contribute.
    pub class: u64,
    /// Human name for the class (`Render/3D`, `Video`, ...).
    pub human_name: String,
    /// Number of real engines folded into this aggregate.
    pub engine_count: usize,
    /// Mean busy delta across contributing engines, in nanoseconds.
    pub busy_delta: f64,
    /// Mean wait delta across contributing engines, in nanoseconds.
    pub wait_delta: f64,
    /// Mean sema delta across contributing engines, in nanoseconds.
    pub sema_delta: f64,
}

/// The sampler: owns all counter state and drives one tick at a time.
///
/// The fixed, always-present counters (IRQ, frequency, RC6, energy, IMC
/// bandwidth) are tracked as logical indices into their owning group;
/// [`engines`](Sample::engines) holds the variable-length,
/// discovered-at-init engine table.
pub struct Sample {
    engine_group: CounterGroup,
    rapl_group: CounterGroup,
    imc_group: CounterGroup,

    irq: usize,
    freq_requested: usize,
    freq_actual: usize,
    rc6: usize,
    gpu_energy: usize,
    package_energy: usize,
    imc_read: usize,
    imc_write: usize,
    engines: Vec<EngineSlot>,

    /// Nanoseconds reported by the engine group as of the current tick.
    pub timestamp_current: u64,
    /// Nanoseconds reported by the engine group as of the previous tick.
    pub timestamp_previous: u64,
}

impl Sample {
    /// Discover engines under `engine_root`, open every fixed and
    /// per-engine counter, and enable all three groups.
    ///
    /// Fails fatally if engine discovery finds nothing, or if the engine
    /// group's IRQ anchor counter — present on every kernel that supports
    /// the i915/xe PMU at all — is refused; every other counter tolerates
    /// individual absence.
    pub fn discover(
        device: &DeviceInfo,
        rapl_root: &Path,
        imc_root: &Path,
        attrs: &AttrResolver,
    ) -> Result<Self> {
        let engine_root = &device.sysfs_root;
        let descriptors = discover_engines(engine_root, attrs)?;
        if descriptors.is_empty() {
            return Err(Error::PmuUnsupported {
                device: device.identifier.clone(),
                path: engine_root.join("events"),
            });
        }

        let mut engine_group = CounterGroup::new("engine").map_err(io_error)?;

        let irq = open_named(&mut engine_group, attrs, engine_root, "interrupts");
        if !engine_group.counter(irq).present {
            return Err(Error::PmuUnsupported {
                device: device.identifier.clone(),
                path: engine_root.join("events/interrupts"),
            });
        }
        let freq_requested = open_named(&mut engine_group, attrs, engine_root, "requested-frequency");
        let freq_actual = open_named(&mut engine_group, attrs, engine_root, "actual-frequency");
        let rc6 = open_named(&mut engine_group, attrs, engine_root, "rc6-residency");

        let mut engines = Vec::with_capacity(descriptors.len());
        for descriptor in descriptors {
            let busy = open_named(
                &mut engine_group,
                attrs,
                engine_root,
                &format!("{}-busy", descriptor.name),
            );
            let wait = open_named(
                &mut engine_group,
                attrs,
                engine_root,
                &format!("{}-wait", descriptor.name),
            );
            let sema = open_named(
                &mut engine_group,
                attrs,
                engine_root,
                &format!("{}-sema", descriptor.name),
            );
            engines.push(EngineSlot {
                descriptor,
                busy,
                wait,
                sema,
            });
        }
        engine_group.enable().map_err(io_error)?;

        let mut rapl_group = CounterGroup::new("rapl").map_err(io_error)?;
        let gpu_energy = open_named(&mut rapl_group, attrs, rapl_root, "energy-gpu");
        let package_energy = open_named(&mut rapl_group, attrs, rapl_root, "energy-pkg");
        rapl_group.enable().map_err(io_error)?;

        let mut imc_group = CounterGroup::new("imc").map_err(io_error)?;
        let imc_read = open_named(&mut imc_group, attrs, imc_root, "data_reads");
        let imc_write = open_named(&mut imc_group, attrs, imc_root, "data_writes");
        imc_group.enable().map_err(io_error)?;

        Ok(Sample {
            engine_group,
            rapl_group,
            imc_group,
            irq,
            freq_requested,
            freq_actual,
            rc6,
            gpu_energy,
            package_energy,
            imc_read,
            imc_write,
            engines,
            timestamp_current: 0,
            timestamp_previous: 0,
        })
    }

    /// Read every group with at least one present counter, in the fixed
    /// engine → RAPL → IMC order, and advance the sample timestamp.
    ///
    /// The first call after [`discover`](Sample::discover) primes
    /// `previous` and leaves `timestamp_previous == 0`; callers in
    /// interactive mode must suppress emission for that tick.
    pub fn tick(&mut self) -> Result<()> {
        if self.engine_group.has_present_counter() {
            self.engine_group.tick()?;
        }
        if self.rapl_group.has_present_counter() {
            self.rapl_group.tick()?;
        }
        if self.imc_group.has_present_counter() {
            self.imc_group.tick()?;
        }

        self.timestamp_previous = self.timestamp_current;
        self.timestamp_current = self.engine_group.time_running();
        Ok(())
    }

    /// Wall-time delta between the two most recent ticks, in seconds.
    pub fn wall_time_delta_seconds(&self) -> f64 {
        self.timestamp_current
            .saturating_sub(self.timestamp_previous) as f64
            / 1e9
    }

    /// Whether this sample has not yet completed a real tick (the
    /// priming sample taken right after discovery).
    pub fn is_priming(&self) -> bool {
        self.timestamp_previous == 0
    }

    /// The counter at `index` within `group`.
    pub fn counter(&self, group: Group, index: usize) -> &crate::counters::Counter {
        match group {
            Group::Engine => self.engine_group.counter(index),
            Group::Rapl => self.rapl_group.counter(index),
            Group::Imc => self.imc_group.counter(index),
        }
    }

    /// The index of the IRQ counter within the engine group.
    pub fn irq(&self) -> usize {
        self.irq
    }
    /// The index of the requested-frequency counter within the engine
    /// group.
    pub fn freq_requested(&self) -> usize {
        self.freq_requested
    }
    /// The index of the actual-frequency counter within the engine group.
    pub fn freq_actual(&self) -> usize {
        self.freq_actual
    }
    /// The index of the RC6-residency counter within the engine group.
    pub fn rc6(&self) -> usize {
        self.rc6
    }
    /// The index of the GPU energy counter within the RAPL group.
    pub fn gpu_energy(&self) -> usize {
        self.gpu_energy
    }
    /// The index of the package energy counter within the RAPL group.
    pub fn package_energy(&self) -> usize {
        self.package_energy
    }
    /// The index of the memory-read-bytes counter within the IMC group.
    pub fn imc_read(&self) -> usize {
        self.imc_read
    }
    /// The index of the memory-write-bytes counter within the IMC group.
    pub fn imc_write(&self) -> usize {
        self.imc_write
    }
    /// The discovered engines, in (class, instance) sorted order.
    pub fn engines(&self) -> &[EngineSlot] {
        &self.engines
    }
}

fn open_named(
    group: &mut CounterGroup,
    attrs: &AttrResolver,
    root: &Path,
    name: &str,
) -> usize {
    match attrs.resolve(root, name) {
        Ok(attr) => group.open(name, &attr),
        Err(err) => {
            log::warn!("counter {name:?} unavailable: {err}");
            group.open_absent(name)
        }
    }
}

fn io_error(source: std::io::Error) -> Error {
    Error::Io {
        path: std::path::PathBuf::from("<perf_event_open ioctl>"),
        source,
    }
}
