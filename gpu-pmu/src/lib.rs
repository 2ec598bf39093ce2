//! A grouped performance-counter API for device PMUs discovered through
//! sysfs.
//!
//! This crate is a thin, safe wrapper around the Linux
//! [`perf_event_open`][man] system call, specialized for one thing: reading
//! several counters exposed by a single device-specific PMU (an `i915`/`xe`
//! GPU, `power` for RAPL, `uncore_imc` for memory bandwidth) as a single
//! atomic group. It does not know about the kernel's built-in
//! `Hardware`/`Software`/`Cache` event catalog — every counter here is
//! named by the raw `(type, config)` pair a PMU's own sysfs `type` file and
//! `events/<name>` format string resolve to.
//!
//! There are two main types:
//!
//! - A [`Counter`] is an individual counter, built with [`Builder`].
//! - A [`CounterGroup`] is a collection of counters that share a group
//!   leader, so they can be enabled, disabled, reset, and read as a single
//!   atomic operation — the only way to get values that cover exactly the
//!   same window of device activity.
//!
//! ```no_run
//! use gpu_pmu::CounterGroup;
//!
//! # fn main() -> std::io::Result<()> {
//! let mut group = CounterGroup::new()?;
//! let rcs0 = group.open(/* i915 PMU type */ 20, /* rcs0-busy config */ 0)?;
//! group.enable()?;
//! let counts = group.read()?;
//! println!(
//!     "rcs0 busy ns: {} (over {} ns)",
//!     counts.value(0).unwrap(),
//!     counts.time_running(),
//! );
//! let _ = rcs0;
//! # Ok(())
//! # }
//! ```
//!
//! [man]: http://man7.org/linux/man-pages/man2/perf_event_open.2.html

#![deny(missing_docs)]

#[cfg(feature = "hooks")]
pub mod hooks;

mod builder;
mod counter;
mod flags;
mod group;

// When the `"hooks"` feature is not enabled, call directly into
// `gpu-pmu-sys`.
#[cfg(not(feature = "hooks"))]
use gpu_pmu_sys as sys;

// When the `"hooks"` feature is enabled, `sys` functions allow for
// interposed functions that provide simulated results for testing.
#[cfg(feature = "hooks")]
use hooks::sys;

pub use crate::builder::Builder;
pub use crate::counter::Counter;
pub use crate::flags::ReadFormat;
pub use crate::group::{Counts, CounterGroup};

/// Produce an `io::Result` from an errno-style system call.
///
/// An 'errno-style' system call is one that reports failure by returning -1
/// and setting the C `errno` value when an error occurs.
fn check_errno_syscall<F, R>(f: F) -> std::io::Result<R>
where
    F: FnOnce() -> R,
    R: PartialOrd + Default,
{
    let result = f();
    if result < R::default() {
        Err(std::io::Error::last_os_error())
    } else {
        Ok(result)
    }
}

/// Reinterpret a `&mut [u64]` as a `&mut [u8]` of the same bytes, for
/// passing to `Read::read`.
fn as_byte_slice_mut(data: &mut [u64]) -> &mut [u8] {
    unsafe {
        std::slice::from_raw_parts_mut(data.as_mut_ptr() as *mut u8, std::mem::size_of_val(data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_build() {
        // CPU_CLOCK is a software event, always supported, and doesn't
        // require any particular hardware or privilege.
        Builder::new(
            sys::bindings::PERF_TYPE_SOFTWARE,
            sys::bindings::PERF_COUNT_SW_CPU_CLOCK as u64,
        )
        .build()
        .expect("couldn't build a software counter");
    }

    #[test]
    fn group_read_skips_leader() {
        let mut group = CounterGroup::new().expect("couldn't open a counter group");
        let a = group
            .open(
                sys::bindings::PERF_TYPE_SOFTWARE,
                sys::bindings::PERF_COUNT_SW_CPU_CLOCK as u64,
            )
            .expect("couldn't open first group member");
        let b = group
            .open(
                sys::bindings::PERF_TYPE_SOFTWARE,
                sys::bindings::PERF_COUNT_SW_CPU_CLOCK as u64,
            )
            .expect("couldn't open second group member");

        group.enable().expect("couldn't enable group");
        let counts = group.read().expect("couldn't read group");
        assert_eq!(counts.len(), 2);
        assert!(counts.value(0).is_some());
        assert!(counts.value(1).is_some());
        assert!(counts.value(2).is_none());
        // The group was just enabled, so little but nonzero time has
        // elapsed against the PMU.
        let _ = counts.time_running();

        drop(a);
        drop(b);
    }
}
