//! Command-line surface: flags, their defaults, and the output
//! mode they resolve to.

use clap::Parser;

use crate::sysfs::device::DeviceFilter;

/// A telemetry sampler and exporter for Intel GPU engines, RAPL energy,
/// and memory-controller bandwidth.
#[derive(Parser, Debug)]
#[command(name = "intel-gpu-top", version, about)]
pub struct Cli {
    /// Sample period in milliseconds.
    #[arg(short = 's', value_name = "ms", default_value_t = 1000)]
    pub period_ms: u64,

    /// Output file, or `-` for stdout. Defaults to stdout.
    #[arg(short = 'o', value_name = "path")]
    pub output: Option<String>,

    /// Emit samples as JSON.
    #[arg(short = 'J')]
    pub json: bool,

    /// Emit samples as fixed-width text columns.
    #[arg(short = 'l')]
    pub text: bool,

    /// Emit one Prometheus exposition block, then exit.
    #[arg(short = 'p')]
    pub prometheus: bool,

    /// List discovered devices, then exit.
    #[arg(short = 'L')]
    pub list_devices: bool,

    /// Device filter: a bare PCI slot, or `pci:vendor=..,card=..`.
    /// Defaults to the first discrete card, falling back to the
    /// integrated GPU.
    #[arg(short = 'd', value_name = "filter")]
    pub device: Option<String>,
}

/// Which renderer the control loop drives, resolved from the flags plus
/// whether stdout is a terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Full-screen ANSI dashboard with bar graphs.
    Interactive,
    /// Fixed-width text columns, with a repeated header.
    Text,
    /// Line-oriented JSON object stream.
    Json,
    /// Single-shot Prometheus exposition.
    Prometheus,
}

impl Cli {
    /// Parse the device filter flag, defaulting to
    /// [`DeviceFilter::Any`](DeviceFilter::Any).
    pub fn device_filter(&self) -> Result<DeviceFilter, String> {
        match &self.device {
            Some(expr) => DeviceFilter::parse(expr),
            None => Ok(DeviceFilter::Any),
        }
    }

    /// Resolve the flags (plus whether stdout is currently a terminal)
    /// into the output mode the control loop should drive.
    ///
    /// An explicit `-J`/`-l`/`-p` always wins; absent those, interactive
    /// mode is the default but silently downgrades to text columns when
    /// `-o` redirects output or stdout isn't a TTY.
    pub fn resolve_output_mode(&self, stdout_is_tty: bool) -> OutputMode {
        if self.prometheus {
            OutputMode::Prometheus
        } else if self.json {
            OutputMode::Json
        } else if self.text {
            OutputMode::Text
        } else if self.output.is_some() || !stdout_is_tty {
            OutputMode::Text
        } else {
            OutputMode::Interactive
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli(args: &[&str]) -> Cli {
        let mut full = vec!["intel-gpu-top"];
        full.extend_from_slice(args);
        Cli::parse_from(full)
    }

    #[test]
    fn default_mode_is_interactive_on_a_tty() {
        assert_eq!(
            cli(&[]).resolve_output_mode(true),
            OutputMode::Interactive
        );
    }

    #[test]
    fn downgrades_to_text_off_a_tty() {
        assert_eq!(cli(&[]).resolve_output_mode(false), OutputMode::Text);
    }

    #[test]
    fn output_flag_forces_text_even_on_a_tty() {
        assert_eq!(
            cli(&["-o", "out.txt"]).resolve_output_mode(true),
            OutputMode::Text
        );
    }

    #[test]
    fn explicit_flags_win() {
        assert_eq!(cli(&["-J"]).resolve_output_mode(true), OutputMode::Json);
        assert_eq!(cli(&["-p"]).resolve_output_mode(false), OutputMode::Prometheus);
    }
}
