use bitflags::bitflags;

use crate::sys::bindings;

bitflags! {
    /// Specifies which fields a [`Counter`](crate::Counter) or
    /// [`CounterGroup`](crate::CounterGroup) read returns.
    ///
    /// These values correspond to `PERF_FORMAT_x` values. See the
    /// [manpage] for documentation on what they mean.
    ///
    /// [manpage]: http://man7.org/linux/man-pages/man2/perf_event_open.2.html
    #[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
    pub struct ReadFormat : u64 {
        const TOTAL_TIME_ENABLED = bindings::PERF_FORMAT_TOTAL_TIME_ENABLED as _;
        const TOTAL_TIME_RUNNING = bindings::PERF_FORMAT_TOTAL_TIME_RUNNING as _;
        const ID = bindings::PERF_FORMAT_ID as _;
        const GROUP = bindings::PERF_FORMAT_GROUP as _;
        const LOST = bindings::PERF_FORMAT_LOST as _;
    }
}

impl ReadFormat {
    /// Upper bound on the number of `u64`s a single-counter read can
    /// produce: value, time_enabled, time_running, lost.
    pub(crate) const MAX_NON_GROUP_SIZE: usize = 4;
}
