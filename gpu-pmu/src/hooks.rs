//! Intercepting perf-event system calls, for testing.
//!
//! Note: this module is only available when the `"hooks"` feature is
//! enabled.
//!
//! Counter behavior is inherently tied to real hardware and kernel
//! privilege, which makes it hard to write deterministic tests against it:
//! there may be no reliable way to provoke the Linux kernel into the
//! specific success, partial-success, or refusal behavior a test wants to
//! exercise, and doing so might require privileges a test runner shouldn't
//! need. This module lets tests interpose their own implementation of the
//! handful of system calls and ioctls this crate uses, so they can drive
//! [`CounterGroup`](crate::CounterGroup) and [`Counter`](crate::Counter)
//! through whatever success/failure sequence they need without touching a
//! real PMU.
//!
//! There are three pieces:
//!
//! - The [`Hooks`] trait has a method for every system call and ioctl this
//!   crate uses.
//! - [`set_thread_hooks`] installs a `Box<dyn Hooks>` that the calling
//!   thread's subsequent counter operations are routed through.
//! - [`clear_thread_hooks`] restores the real Linux system calls.
//!
//! ## Stability
//!
//! Using `set_thread_hooks`, a test can observe the exact sequence of
//! system calls this crate performs. That sequence is an implementation
//! detail and can change without notice, even across otherwise
//! backward-compatible releases.
use gpu_pmu_sys as real;
use gpu_pmu_sys::bindings;
use std::cell::RefCell;
use std::os::raw::{c_int, c_uint, c_ulong};

std::thread_local! {
    static HOOKS: RefCell<Box<dyn Hooks + 'static>> = RefCell::new(Box::new(RealHooks));
}

/// Direct all of this crate's system calls on this thread to `hooks`.
///
/// This affects only the calling thread. Any previously established hooks
/// on that thread are dropped.
///
/// # Safety
///
/// The specified `hooks` trait object intercepts calls provoked by
/// previously created [`Counter`](crate::Counter) and
/// [`CounterGroup`](crate::CounterGroup) objects, regardless of which hooks
/// were in effect when they were created.
pub unsafe fn set_thread_hooks(hooks: Box<dyn Hooks + 'static>) {
    HOOKS.with(|per_thread| {
        *per_thread.borrow_mut() = hooks;
    })
}

/// Direct all of this crate's system calls on this thread back to the real
/// Linux system calls.
///
/// # Safety
///
/// See [`set_thread_hooks`].
pub unsafe fn clear_thread_hooks() {
    HOOKS.with(|per_thread| {
        *per_thread.borrow_mut() = Box::new(RealHooks);
    })
}

/// List of ioctls this crate needs wrappers for.
macro_rules! define_ioctls {
    ( $expand:ident ) => {
        $expand ! { ENABLE, perf_event_ioctls_ENABLE, c_uint }
        $expand ! { DISABLE, perf_event_ioctls_DISABLE, c_uint }
        $expand ! { RESET, perf_event_ioctls_RESET, c_uint }
    }
}

macro_rules! expand_trait_method {
    ( $name:ident, $ioctl:ident, $arg_type:ty ) => {
        /// Wrapper for perf_event ioctl
        #[doc = stringify!($ioctl)]
        /// .
        #[allow(non_snake_case)]
        unsafe fn $name(&mut self, _fd: c_int, _arg: $arg_type) -> c_int {
            panic!(
                "unimplemented `gpu_pmu::hooks::Hooks` method: {}",
                stringify!($name)
            );
        }
    };
}

/// A trait with a method for every system call and ioctl used by this
/// crate.
///
/// Each method has a default definition that panics, so a test only needs
/// to provide the operations it actually exercises. [`RealHooks`]
/// implements this trait in terms of the real Linux system calls.
#[allow(dead_code)]
pub trait Hooks {
    /// See [`gpu_pmu_sys::perf_event_open`].
    #[allow(clippy::missing_safety_doc)]
    unsafe fn perf_event_open(
        &mut self,
        attrs: *mut bindings::perf_event_attr,
        pid: libc::pid_t,
        cpu: c_int,
        group_fd: c_int,
        flags: c_ulong,
    ) -> c_int;
    define_ioctls!(expand_trait_method);
}

macro_rules! expand_realhooks_impl {
    ( $name:ident, $ioctl_:ident, $arg_type:ty ) => {
        #[allow(clippy::missing_safety_doc)]
        unsafe fn $name(&mut self, fd: c_int, arg: $arg_type) -> c_int {
            real::ioctls::$name(fd, arg)
        }
    };
}

/// An implementation of [`Hooks`] in terms of the real Linux system calls.
pub struct RealHooks;
impl Hooks for RealHooks {
    unsafe fn perf_event_open(
        &mut self,
        attrs: *mut bindings::perf_event_attr,
        pid: libc::pid_t,
        cpu: c_int,
        group_fd: c_int,
        flags: c_ulong,
    ) -> c_int {
        real::perf_event_open(attrs, pid, cpu, group_fd, flags)
    }

    define_ioctls!(expand_realhooks_impl);
}

/// Wrapper around the `gpu_pmu_sys` crate that supports intercepting system
/// calls and returning simulated results, for testing.
pub mod sys {
    use super::HOOKS;
    use std::os::raw::{c_int, c_ulong};

    pub use gpu_pmu_sys::bindings;

    /// See [`gpu_pmu_sys::perf_event_open`].
    #[allow(clippy::missing_safety_doc)]
    pub unsafe fn perf_event_open(
        attrs: *mut bindings::perf_event_attr,
        pid: libc::pid_t,
        cpu: c_int,
        group_fd: c_int,
        flags: c_ulong,
    ) -> c_int {
        HOOKS.with(|hooks| {
            hooks
                .borrow_mut()
                .perf_event_open(attrs, pid, cpu, group_fd, flags)
        })
    }

    #[allow(dead_code, non_snake_case)]
    /// See the [`gpu_pmu_sys::ioctls`] module.
    pub mod ioctls {
        use super::HOOKS;
        use std::os::raw::{c_int, c_uint};

        macro_rules! expand_hooked_ioctl {
            ( $name:ident, $ioctl_:ident, $arg_type:ty ) => {
                pub unsafe fn $name(fd: c_int, arg: $arg_type) -> c_int {
                    HOOKS.with(|hooks| hooks.borrow_mut().$name(fd, arg))
                }
            };
        }

        define_ioctls!(expand_hooked_ioctl);
    }
}
