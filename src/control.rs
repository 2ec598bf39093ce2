//! The control loop (C7): signal handling, raw terminal mode, stdin
//! polling, and the fixed per-mode tick sequence that drives the sampler
//! and a chosen renderer until told to stop.

use std::io;
use std::os::unix::io::RawFd;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crate::cli::OutputMode;
use crate::error::{Error, Result};
use crate::render::interactive::InteractiveRenderer;
use crate::render::json::JsonRenderer;
use crate::render::prometheus::PrometheusRenderer;
use crate::render::text::TextRenderer;
use crate::render::Renderer;
use crate::sample::Sample;

static SHUTDOWN: AtomicBool = AtomicBool::new(false);

extern "C" fn handle_shutdown_signal(_signum: libc::c_int) {
    SHUTDOWN.store(true, Ordering::SeqCst);
}

/// Install handlers for `SIGINT` and `SIGTERM` that set a process-wide
/// shutdown flag, checked by [`run`] between ticks rather than acted on
/// asynchronously — the control loop is single-threaded and synchronous,
/// so there is no mid-tick cancellation.
pub fn install_signal_handlers() {
    unsafe {
        let mut action: libc::sigaction = std::mem::zeroed();
        action.sa_sigaction = handle_shutdown_signal as usize;
        libc::sigemptyset(&mut action.sa_mask);
        libc::sigaction(libc::SIGINT, &action, std::ptr::null_mut());
        libc::sigaction(libc::SIGTERM, &action, std::ptr::null_mut());
    }
}

/// Whether a caught signal has asked the control loop to stop.
pub fn shutdown_requested() -> bool {
    SHUTDOWN.load(Ordering::SeqCst)
}

#[cfg(test)]
pub(crate) fn reset_shutdown_for_test() {
    SHUTDOWN.store(false, Ordering::SeqCst);
}

/// Puts stdin into raw, single-character, no-echo mode for the lifetime
/// of the guard, restoring the terminal's original `termios` on drop.
///
/// Acquisition and restoration form the scoped pair the resource-discipline
/// rules call for: the original settings are read once at entry and
/// written back unconditionally on drop, including on an early return or
/// a panic unwind.
pub struct RawTerminalGuard {
    original: libc::termios,
}

impl RawTerminalGuard {
    /// Switch stdin to raw mode, recording the previous settings.
    pub fn acquire() -> Result<Self> {
        unsafe {
            let mut original: libc::termios = std::mem::zeroed();
            if libc::tcgetattr(libc::STDIN_FILENO, &mut original) != 0 {
                return Err(Error::TerminalIOError(io::Error::last_os_error()));
            }
            let mut raw = original;
            libc::cfmakeraw(&mut raw);
            if libc::tcsetattr(libc::STDIN_FILENO, libc::TCSANOW, &raw) != 0 {
                return Err(Error::TerminalIOError(io::Error::last_os_error()));
            }
            Ok(RawTerminalGuard { original })
        }
    }
}

impl Drop for RawTerminalGuard {
    fn drop(&mut self) {
        unsafe {
            libc::tcsetattr(libc::STDIN_FILENO, libc::TCSANOW, &self.original);
        }
    }
}

/// Wait up to `timeout` for a byte to arrive on `fd`, returning `None` on
/// timeout. Generic over the file descriptor so tests can drive it with a
/// pipe instead of a real terminal's stdin.
fn poll_fd(fd: RawFd, timeout: Duration) -> Result<Option<u8>> {
    let mut pfd = libc::pollfd {
        fd,
        events: libc::POLLIN,
        revents: 0,
    };
    let millis = i32::try_from(timeout.as_millis()).unwrap_or(i32::MAX);
    let ready = unsafe { libc::poll(&mut pfd, 1, millis) };
    if ready < 0 {
        return Err(Error::TerminalIOError(io::Error::last_os_error()));
    }
    if ready == 0 || pfd.revents & libc::POLLIN == 0 {
        return Ok(None);
    }

    let mut byte = 0u8;
    let n = unsafe { libc::read(fd, &mut byte as *mut u8 as *mut libc::c_void, 1) };
    if n <= 0 {
        return Ok(None);
    }
    Ok(Some(byte))
}

fn poll_stdin(timeout: Duration) -> Result<Option<u8>> {
    poll_fd(libc::STDIN_FILENO, timeout)
}

/// Drive `sample` and `renderer` through the fixed per-mode tick sequence
/// until a signal, `'q'` (interactive mode only), or Prometheus's
/// single-shot rule ends the loop.
///
/// Callers are expected to have already taken the priming sample (the
/// first `tick()` after discovery, which leaves `timestamp_previous == 0`)
/// before calling this; every tick here is a steady-state sample.
pub fn run(
    sample: &mut Sample,
    mode: OutputMode,
    period: Duration,
    out: &mut dyn io::Write,
) -> Result<()> {
    let mut renderer: Box<dyn Renderer> = match mode {
        OutputMode::Interactive => Box::<InteractiveRenderer>::default(),
        OutputMode::Text => Box::<TextRenderer>::default(),
        OutputMode::Json => Box::<JsonRenderer>::default(),
        OutputMode::Prometheus => Box::<PrometheusRenderer>::default(),
    };

    let _raw_mode = if mode == OutputMode::Interactive {
        match RawTerminalGuard::acquire() {
            Ok(guard) => Some(guard),
            Err(err) => {
                log::warn!("raw terminal mode unavailable, keystrokes won't be read: {err}");
                None
            }
        }
    } else {
        None
    };

    let mut class_view = false;

    loop {
        if mode == OutputMode::Prometheus {
            std::thread::sleep(period);
        }

        if shutdown_requested() {
            return Ok(());
        }

        sample.tick()?;
        if !(mode == OutputMode::Interactive && sample.is_priming()) {
            renderer.render(sample, class_view, out)?;
        }

        if shutdown_requested() {
            return Ok(());
        }

        match mode {
            OutputMode::Prometheus => return Ok(()),
            OutputMode::Interactive => {
                let deadline = Instant::now() + period;
                loop {
                    let now = Instant::now();
                    if now >= deadline || shutdown_requested() {
                        break;
                    }
                    match poll_stdin(deadline - now) {
                        Ok(Some(b'q')) => return Ok(()),
                        Ok(Some(b'1')) => class_view = !class_view,
                        Ok(_) => {}
                        Err(err) => {
                            log::warn!("stdin polling failed, falling back to a plain sleep: {err}");
                            std::thread::sleep(deadline.saturating_duration_since(Instant::now()));
                            break;
                        }
                    }
                }
            }
            _ => std::thread::sleep(period),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shutdown_flag_round_trips() {
        reset_shutdown_for_test();
        assert!(!shutdown_requested());
        SHUTDOWN.store(true, Ordering::SeqCst);
        assert!(shutdown_requested());
        reset_shutdown_for_test();
    }

    fn make_pipe() -> (RawFd, RawFd) {
        let mut fds = [0 as RawFd; 2];
        assert_eq!(unsafe { libc::pipe(fds.as_mut_ptr()) }, 0);
        (fds[0], fds[1])
    }

    #[test]
    fn poll_fd_reads_a_ready_byte() {
        let (read_fd, write_fd) = make_pipe();
        unsafe {
            libc::write(write_fd, b"q".as_ptr() as *const libc::c_void, 1);
        }
        let byte = poll_fd(read_fd, Duration::from_millis(200)).unwrap();
        assert_eq!(byte, Some(b'q'));
        unsafe {
            libc::close(read_fd);
            libc::close(write_fd);
        }
    }

    #[test]
    fn poll_fd_times_out_with_nothing_to_read() {
        let (read_fd, write_fd) = make_pipe();
        let result = poll_fd(read_fd, Duration::from_millis(20)).unwrap();
        assert_eq!(result, None);
        unsafe {
            libc::close(read_fd);
            libc::close(write_fd);
        }
    }
}
