//! CLI entry point: resolve the device and output mode, discover counters,
//! take the priming sample, and hand off to the control loop.

use std::fs::File;
use std::io::{self, IsTerminal, Write};
use std::path::Path;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;

use intel_gpu_top::cli::Cli;
use intel_gpu_top::control;
use intel_gpu_top::error::Error;
use intel_gpu_top::sample::Sample;
use intel_gpu_top::sysfs::device::{discover_devices, select_device};
use intel_gpu_top::sysfs::AttrResolver;
use intel_gpu_top::Result;

const SYS_DEVICES_ROOT: &str = "/sys/devices";

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<()> {
    let sys_devices_root = Path::new(SYS_DEVICES_ROOT);
    let devices = discover_devices(sys_devices_root)?;

    if cli.list_devices {
        for device in &devices {
            println!("{} ({})", device.identifier, device.pretty_name);
        }
        return Ok(());
    }

    let filter = cli
        .device_filter()
        .map_err(Error::InvalidDeviceFilter)?;
    let device = select_device(&devices, &filter)?;

    let attrs = AttrResolver::new();
    let rapl_root = Path::new("/sys/devices/power");
    let imc_root = Path::new("/sys/devices/uncore_imc");
    let mut sample = Sample::discover(&device, rapl_root, imc_root, &attrs)?;

    let stdout_is_tty = io::stdout().is_terminal();
    let mode = cli.resolve_output_mode(stdout_is_tty);

    let mut out: Box<dyn Write> = match &cli.output {
        Some(path) if path != "-" => Box::new(File::create(path)?),
        _ => Box::new(io::stdout()),
    };

    control::install_signal_handlers();

    // Priming sample: establishes `previous` and the first timestamp.
    // Interactive rendering suppresses emission for this tick; the control
    // loop treats every tick after this one as steady-state.
    sample.tick()?;

    control::run(&mut sample, mode, Duration::from_millis(cli.period_ms), out.as_mut())
}
