//! The error kinds this crate can produce, and what each means for the
//! caller.
//!
//! Most variants here are fatal: the process reports them and exits
//! nonzero. `CounterOpenRefused`, `ParseFailure`, and `BadScale` are the
//! exceptions — they are only ever attached to a single optional counter
//! during discovery, and the caller that sees one marks that counter
//! `present: false` rather than propagating it.

use std::path::PathBuf;

use thiserror::Error;

/// The result type used throughout this crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Everything that can go wrong resolving, opening, or sampling GPU
/// counters.
#[derive(Debug, Error)]
pub enum Error {
    /// The device filter given on the command line matched no GPU.
    #[error("Requested device {0} not found!")]
    DeviceNotFound(String),

    /// The `-d` argument itself didn't parse as a filter expression.
    #[error("invalid device filter: {0}")]
    InvalidDeviceFilter(String),

    /// The chosen device's sysfs `events` directory is missing or empty —
    /// the kernel driver doesn't expose a PMU for it.
    #[error(
        "no PMU events found for device {device} under {path}; a kernel with \
         i915 or xe PMU support (5.x or newer) is required"
    )]
    PmuUnsupported {
        /// The device identifier (`i915`, `xe_0000:03:00.0`, ...).
        device: String,
        /// The sysfs path that was expected to contain events.
        path: PathBuf,
    },

    /// The kernel refused to open an individual counter.
    #[error("perf_event_open refused for {name} ({type_}, {config:#x}): {source}")]
    CounterOpenRefused {
        /// The counter's short name, for diagnostics.
        name: String,
        /// The perf event type that was requested.
        type_: u32,
        /// The perf event config that was requested.
        config: u64,
        /// The underlying OS error.
        #[source]
        source: std::io::Error,
    },

    /// A grouped read returned a byte count that didn't match `2 + N`
    /// 64-bit words.
    #[error("short read from counter group {group}: expected {expected} words, got {got}")]
    ShortRead {
        /// Which group (`engine`, `rapl`, `imc`) produced the short read.
        group: &'static str,
        /// The number of 64-bit words the group's member count implied.
        expected: usize,
        /// The number of 64-bit words actually read.
        got: usize,
    },

    /// A sysfs metadata file existed but didn't parse as expected.
    #[error("couldn't parse {path}: {reason}")]
    ParseFailure {
        /// The file that failed to parse.
        path: PathBuf,
        /// A short description of what was expected.
        reason: String,
    },

    /// A counter's `scale` file parsed but was not a usable multiplier.
    #[error("bad scale in {path}: {value} is not finite and nonzero")]
    BadScale {
        /// The `events/<name>.scale` file in question.
        path: PathBuf,
        /// The value that was read.
        value: f64,
    },

    /// Raw-mode terminal setup or restoration failed.
    #[error("terminal I/O error: {0}")]
    TerminalIOError(#[source] std::io::Error),

    /// Writing a rendered sample to its output stream failed (a closed
    /// pipe, a full disk, ...).
    #[error("error writing output: {0}")]
    Output(#[from] std::io::Error),

    /// A sysfs file required for discovery or resolution couldn't be read.
    #[error("couldn't read {path}: {source}")]
    Io {
        /// The file that couldn't be read.
        path: PathBuf,
        /// The underlying OS error.
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    /// Whether this error should end the process, as opposed to being
    /// swallowed locally and the affected counter marked absent.
    ///
    /// Per the propagation policy, only counter-level metadata and open
    /// failures are recoverable; everything else — including a short read
    /// during steady-state sampling — is fatal.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::CounterOpenRefused { .. } | Error::ParseFailure { .. } | Error::BadScale { .. }
        )
    }
}
