use std::ffi::{c_int, c_uint};
use std::fs::File;
use std::io::{self, Read};
use std::os::unix::io::{AsRawFd, FromRawFd, IntoRawFd, RawFd};

use crate::flags::ReadFormat;
use crate::{check_errno_syscall, sys, Builder, Counter};

/// A group of counters that can be enabled, disabled, and read as a single
/// atomic operation.
///
/// A `CounterGroup` owns a group-leader file descriptor — a dummy
/// `PERF_TYPE_SOFTWARE`/`PERF_COUNT_SW_DUMMY` counter that never itself
/// counts anything — plus however many follower [`Counter`]s have been
/// opened against it with [`Builder::group`]. Reading the group returns the
/// values of every open follower in one `read(2)` call, which is the only
/// way to get counters that cover exactly the same window of time.
///
/// Unlike a general perf-event wrapper, this type fixes its read format to
/// `PERF_FORMAT_GROUP | PERF_FORMAT_TOTAL_TIME_RUNNING`: no per-value ids,
/// just a single kernel-reported running time alongside the values.
/// Counters here are always addressed by the caller's own insertion order
/// (their "group index"), not a kernel-assigned id — the running time
/// doubles as the shared timestamp every value in the read was captured
/// against, which is exactly what computing a wall-time delta between two
/// reads needs. That matches how a group of fixed, statically-known
/// counters — one per engine, one per RAPL domain — is naturally used: the
/// caller always knows which slot is which.
pub struct CounterGroup {
    file: File,
    max_members: usize,
}

impl CounterGroup {
    /// Construct a new, empty `CounterGroup`.
    pub fn new() -> io::Result<CounterGroup> {
        let mut attrs = sys::bindings::perf_event_attr {
            size: std::mem::size_of::<sys::bindings::perf_event_attr>() as u32,
            type_: sys::bindings::PERF_TYPE_SOFTWARE,
            config: sys::bindings::PERF_COUNT_SW_DUMMY as u64,
            read_format: (ReadFormat::GROUP | ReadFormat::TOTAL_TIME_RUNNING).bits(),
            ..sys::bindings::perf_event_attr::default()
        };
        attrs.set_disabled(1);

        let file = unsafe {
            File::from_raw_fd(check_errno_syscall(|| {
                sys::perf_event_open(&mut attrs, -1, 0, -1, 0)
            })?)
        };

        Ok(CounterGroup {
            file,
            max_members: 1,
        })
    }

    /// Open a new counter as a member of this group.
    ///
    /// On success, the counter's position among this group's members (its
    /// "group index", starting at 0) is whatever [`len`](CounterGroup::len)
    /// would have returned just before this call. On failure — the PMU
    /// doesn't support `config`, or the process lacks privilege — the group
    /// is left exactly as it was; the caller decides whether to record the
    /// counter as absent and carry on with the rest.
    pub fn open(&mut self, type_: u32, config: u64) -> io::Result<Counter> {
        let counter = Builder::new(type_, config).group(self).build()?;
        self.max_members += 1;
        Ok(counter)
    }

    /// Allow all `Counter`s in this group to begin counting their designated
    /// events, as a single atomic operation.
    pub fn enable(&mut self) -> io::Result<()> {
        self.generic_ioctl(sys::ioctls::ENABLE)
    }

    /// Make all `Counter`s in this group stop counting, as a single atomic
    /// operation. Their counts are unaffected.
    pub fn disable(&mut self) -> io::Result<()> {
        self.generic_ioctl(sys::ioctls::DISABLE)
    }

    /// Reset all `Counter`s in this group to zero, as a single atomic
    /// operation.
    pub fn reset(&mut self) -> io::Result<()> {
        self.generic_ioctl(sys::ioctls::RESET)
    }

    fn generic_ioctl(&mut self, f: unsafe fn(c_int, c_uint) -> c_int) -> io::Result<()> {
        check_errno_syscall(|| unsafe {
            f(self.file.as_raw_fd(), sys::bindings::PERF_IOC_FLAG_GROUP)
        })
        .map(|_| ())
    }

    /// Read the values of every member of this group at once, alongside the
    /// running time the kernel attaches to the read.
    ///
    /// Since this group's read format is `PERF_FORMAT_GROUP |
    /// PERF_FORMAT_TOTAL_TIME_RUNNING`, the kernel returns exactly
    /// `struct { u64 nr; u64 time_running; u64 values[nr]; }`: a count of
    /// members (including the dummy leader), the nanoseconds the group has
    /// spent scheduled onto the PMU since it was enabled, then that many raw
    /// values in the order they were opened. Two consecutive reads' running
    /// times give the wall-time window the intervening deltas cover.
    pub fn read(&mut self) -> io::Result<Counts> {
        let mut data = vec![0_u64; 2 + self.max_members];
        let bytes = self.file.read(crate::as_byte_slice_mut(&mut data))?;
        data.truncate(bytes / std::mem::size_of::<u64>());

        if data.len() < 2 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "short read from counter group",
            ));
        }

        let counts = Counts { data };
        self.max_members = counts.len();
        Ok(counts)
    }
}

impl std::fmt::Debug for CounterGroup {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> std::fmt::Result {
        fmt.debug_struct("CounterGroup")
            .field("fd", &self.file.as_raw_fd())
            .field("max_members", &self.max_members)
            .finish()
    }
}

impl AsRawFd for CounterGroup {
    fn as_raw_fd(&self) -> RawFd {
        self.file.as_raw_fd()
    }
}

impl IntoRawFd for CounterGroup {
    fn into_raw_fd(self) -> RawFd {
        self.file.into_raw_fd()
    }
}

/// The values read back from a [`CounterGroup`], alongside the running time
/// the kernel attached to the read.
///
/// Index 0 of the underlying values is always the dummy group leader and
/// carries no useful value; [`value`](Counts::value) and
/// [`iter`](Counts::iter) both skip it so that group index `0` names the
/// first counter a caller actually opened.
pub struct Counts {
    data: Vec<u64>,
}

impl Counts {
    /// The number of counters this holds values for, not counting the
    /// group's own dummy leader.
    pub fn len(&self) -> usize {
        self.data[0] as usize - 1
    }

    /// Whether this group had no open members besides its leader.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The nanoseconds this group has spent scheduled onto the PMU since it
    /// was enabled, as of this read. The caller subtracts two successive
    /// readings of this to get the wall-time window their deltas cover.
    pub fn time_running(&self) -> u64 {
        self.data[1]
    }

    /// The value recorded at the given group index, or `None` if that index
    /// is out of range (the counter was never opened, or the kernel's
    /// buffer came back short).
    ///
    /// Slot 0 of the values (`data[2]`) is always the dummy group leader;
    /// group index 0 names the first counter actually opened, so this
    /// looks one slot past that leader.
    pub fn value(&self, group_index: usize) -> Option<u64> {
        self.data.get(group_index + 3).copied()
    }

    /// Iterate over every value in this group, in group-index order,
    /// skipping the dummy group leader's own value at `data[2]`.
    pub fn iter(&self) -> impl Iterator<Item = u64> + '_ {
        self.data[3..].iter().copied()
    }
}

impl std::fmt::Debug for Counts {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> std::fmt::Result {
        fmt.debug_struct("Counts")
            .field("time_running", &self.time_running())
            .field("values", &self.iter().collect::<Vec<_>>())
            .finish()
    }
}
