use std::ffi::c_int;
use std::ffi::c_ulong;
use std::fs::File;
use std::os::fd::AsRawFd;
use std::os::fd::FromRawFd;

use crate::check_errno_syscall;
use crate::flags::ReadFormat;
use crate::sys;
use crate::Counter;
use crate::CounterGroup;

/// A builder for [`Counter`]s.
///
/// Unlike a general-purpose `perf_event_open` wrapper, this builder does not
/// know about the kernel's built-in `Hardware`/`Software`/`Cache` event
/// kinds: the `(type, config)` pair it takes is whatever a PMU's sysfs
/// `type` file and `events/<name>` format string resolved to. That is the
/// only way to name an event exposed by a device-specific PMU (`i915`,
/// `xe`, `power`, `uncore_imc`) that isn't in the kernel headers.
///
/// A freshly built `Counter` is disabled. To begin counting events, call
/// [`enable`][Counter::enable] on the `Counter`, or on the [`CounterGroup`]
/// it belongs to.
pub struct Builder {
    type_: u32,
    config: u64,
    cpu: Option<usize>,
    group: Option<c_int>,
    read_format: ReadFormat,
}

impl Builder {
    /// Start building a counter for the given raw perf event `type` and
    /// `config` values, as resolved from sysfs.
    pub fn new(type_: u32, config: u64) -> Builder {
        Builder {
            type_,
            config,
            cpu: Some(0),
            group: None,
            read_format: ReadFormat::empty(),
        }
    }

    /// Observe only the given CPU core.
    ///
    /// Uncore PMUs (RAPL, the memory controller, the GPU's own PMU) expose a
    /// single logical counter regardless of which CPU is named; by
    /// convention that is CPU 0, which is also the default here.
    pub fn one_cpu(mut self, cpu: usize) -> Builder {
        self.cpu = Some(cpu);
        self
    }

    /// Place the counter in the given [`CounterGroup`]. Groups allow a set
    /// of counters to be enabled, disabled, or read as a single atomic
    /// operation.
    pub fn group(mut self, group: &CounterGroup) -> Builder {
        self.group = Some(group.as_raw_fd());
        self.read_format = ReadFormat::GROUP | ReadFormat::TOTAL_TIME_RUNNING;
        self
    }

    /// Set the fields to include when reading from the counter built from
    /// this `Builder`. Only meaningful for counters built outside a group;
    /// [`group`](Builder::group) always forces [`ReadFormat::GROUP`].
    pub fn read_format(mut self, read_format: ReadFormat) -> Builder {
        self.read_format = read_format;
        self
    }

    /// Construct a [`Counter`] according to the specifications made on this
    /// `Builder`.
    ///
    /// If the running kernel refuses to open this event — an unsupported
    /// PMU, insufficient privilege, or a config the hardware doesn't
    /// implement — this returns the `io::Error` the kernel reported. Callers
    /// that open many counters from the same group ("partial
    /// success") should catch this per-counter rather than propagate it.
    pub fn build(self) -> std::io::Result<Counter> {
        let mut attrs = sys::bindings::perf_event_attr {
            size: std::mem::size_of::<sys::bindings::perf_event_attr>() as u32,
            type_: self.type_,
            config: self.config,
            read_format: self.read_format.bits(),
            ..sys::bindings::perf_event_attr::default()
        };

        attrs.set_disabled((self.group.is_none()).into());

        let cpu = match self.cpu {
            Some(cpu) => cpu as c_int,
            None => -1,
        };
        let group_fd = self.group.unwrap_or(-1);

        let file = unsafe {
            File::from_raw_fd(check_errno_syscall(|| {
                sys::perf_event_open(&mut attrs, -1, cpu, group_fd, 0 as c_ulong)
            })?)
        };

        Counter::new(file, self.read_format)
    }
}
