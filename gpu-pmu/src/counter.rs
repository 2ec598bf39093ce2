use std::fs::File;
use std::io::{self, Read};
use std::os::unix::io::{AsRawFd, IntoRawFd, RawFd};

use crate::{check_errno_syscall, sys, ReadFormat};

/// A single performance-monitoring counter.
///
/// A `Counter` is built from a [`Builder`](crate::Builder). It can be
/// enabled, disabled, reset, and read individually; if it was built with
/// [`Builder::group`](crate::Builder::group), its owning
/// [`CounterGroup`](crate::CounterGroup) can also act on it along with its
/// other members as a single atomic operation.
///
/// Internally, a `Counter` is just a wrapper around an event file
/// descriptor: dropping it closes the descriptor and the kernel releases
/// the counter along with it.
pub struct Counter {
    file: File,
    read_format: ReadFormat,
}

impl Counter {
    pub(crate) fn new(file: File, read_format: ReadFormat) -> io::Result<Self> {
        Ok(Self { file, read_format })
    }

    /// Allow this counter to begin counting its designated event.
    pub fn enable(&mut self) -> io::Result<()> {
        check_errno_syscall(|| unsafe { sys::ioctls::ENABLE(self.as_raw_fd(), 0) }).map(|_| ())
    }

    /// Make this counter stop counting. Its value is unaffected.
    pub fn disable(&mut self) -> io::Result<()> {
        check_errno_syscall(|| unsafe { sys::ioctls::DISABLE(self.as_raw_fd(), 0) }).map(|_| ())
    }

    /// Reset this counter's value to zero.
    pub fn reset(&mut self) -> io::Result<()> {
        check_errno_syscall(|| unsafe { sys::ioctls::RESET(self.as_raw_fd(), 0) }).map(|_| ())
    }

    /// Read this counter's current value.
    ///
    /// This is only meaningful for a counter that was not built with
    /// [`Builder::group`](crate::Builder::group) — a grouped counter's value
    /// comes back through [`CounterGroup::read`](crate::CounterGroup::read)
    /// instead, since only the group knows how many members it has.
    pub fn read(&mut self) -> io::Result<u64> {
        debug_assert!(!self.read_format.contains(ReadFormat::GROUP));

        let mut data = [0u64; ReadFormat::MAX_NON_GROUP_SIZE];
        self.file.read(crate::as_byte_slice_mut(&mut data))?;
        Ok(data[0])
    }
}

impl std::fmt::Debug for Counter {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(fmt, "Counter {{ fd: {} }}", self.file.as_raw_fd())
    }
}

impl AsRawFd for Counter {
    fn as_raw_fd(&self) -> RawFd {
        self.file.as_raw_fd()
    }
}

impl IntoRawFd for Counter {
    fn into_raw_fd(self) -> RawFd {
        self.file.into_raw_fd()
    }
}
