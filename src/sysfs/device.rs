//! Resolving the `-d` device filter into a concrete sysfs device root.
//!
//! Full device enumeration — mapping a PCI slot to a pretty codename, vendor
//! ID lookups, discrete/integrated classification from real hardware IDs —
//! is an external collaborator this crate only talks to through this
//! module's interface; what's implemented here is just enough sysfs
//! walking and filter matching to drive the CLI's `-d`/`-L` flags.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// A parsed `-d` device filter expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceFilter {
    /// No filter given: prefer the first discrete card, falling back to
    /// the integrated GPU.
    Any,
    /// A bare PCI slot string, e.g. `0000:03:00.0`.
    PciSlot(String),
    /// `pci:vendor=0x8086,card=1` — vendor id plus a zero-based ordinal
    /// among matching cards.
    PciVendorCard { vendor: u32, card: u32 },
}

impl DeviceFilter {
    /// Parse a `-d` argument.
    pub fn parse(s: &str) -> std::result::Result<Self, String> {
        if let Some(rest) = s.strip_prefix("pci:") {
            let mut vendor = None;
            let mut card = None;
            for kv in rest.split(',') {
                let (key, value) = kv
                    .split_once('=')
                    .ok_or_else(|| format!("malformed pci filter term {kv:?}"))?;
                match key {
                    "vendor" => {
                        let value = value.strip_prefix("0x").unwrap_or(value);
                        vendor = Some(
                            u32::from_str_radix(value, 16)
                                .map_err(|_| format!("bad vendor id {value:?}"))?,
                        );
                    }
                    "card" => {
                        card = Some(value.parse().map_err(|_| format!("bad card index {value:?}"))?);
                    }
                    other => return Err(format!("unknown pci filter key {other:?}")),
                }
            }
            return Ok(DeviceFilter::PciVendorCard {
                vendor: vendor.ok_or("pci filter missing vendor=")?,
                card: card.ok_or("pci filter missing card=")?,
            });
        }
        Ok(DeviceFilter::PciSlot(s.to_string()))
    }
}

impl fmt::Display for DeviceFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceFilter::Any => write!(f, "any"),
            DeviceFilter::PciSlot(slot) => write!(f, "{slot}"),
            DeviceFilter::PciVendorCard { vendor, card } => {
                write!(f, "pci:vendor={vendor:#x},card={card}")
            }
        }
    }
}

/// A GPU device discovered under `/sys/devices`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    /// The sysfs directory name (`i915`, `i915_0000:03:00.0`, `xe`, ...).
    pub identifier: String,
    /// The absolute sysfs path this device's PMU events live under.
    pub sysfs_root: PathBuf,
    /// A human-facing label; in the absence of a real codename lookup this
    /// is just the identifier.
    pub pretty_name: String,
    /// Whether this is a discrete card (has a PCI slot suffix) rather than
    /// the single integrated GPU.
    pub is_discrete: bool,
}

/// Enumerate every `i915`/`xe`-family device root under `sys_devices_root`
/// (ordinarily `/sys/devices`).
pub fn discover_devices(sys_devices_root: &Path) -> Result<Vec<DeviceInfo>> {
    let entries = match fs::read_dir(sys_devices_root) {
        Ok(entries) => entries,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(source) => {
            return Err(Error::Io {
                path: sys_devices_root.to_path_buf(),
                source,
            })
        }
    };

    let mut devices = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| Error::Io {
            path: sys_devices_root.to_path_buf(),
            source,
        })?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };

        let is_discrete = name.starts_with("i915_") || name.starts_with("xe_");
        if !(name == "i915" || name == "xe" || is_discrete) {
            continue;
        }

        devices.push(DeviceInfo {
            identifier: name.to_string(),
            sysfs_root: entry.path(),
            pretty_name: name.to_string(),
            is_discrete,
        });
    }

    // Stable order: discrete cards first (by identifier), then integrated.
    devices.sort_by(|a, b| match (a.is_discrete, b.is_discrete) {
        (true, false) => std::cmp::Ordering::Less,
        (false, true) => std::cmp::Ordering::Greater,
        _ => a.identifier.cmp(&b.identifier),
    });
    Ok(devices)
}

/// Pick the device `filter` selects out of `devices`.
pub fn select_device(devices: &[DeviceInfo], filter: &DeviceFilter) -> Result<DeviceInfo> {
    let found = match filter {
        DeviceFilter::Any => devices.first(),
        DeviceFilter::PciSlot(slot) => devices.iter().find(|d| d.identifier.contains(slot.as_str())),
        DeviceFilter::PciVendorCard { card, .. } => {
            devices.iter().filter(|d| d.is_discrete).nth(*card as usize)
        }
    };

    found
        .cloned()
        .ok_or_else(|| Error::DeviceNotFound(filter.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make(root: &Path, name: &str) {
        fs::create_dir_all(root.join(name)).unwrap();
    }

    #[test]
    fn discovers_integrated_and_discrete() {
        let dir = tempfile::tempdir().unwrap();
        make(dir.path(), "i915");
        make(dir.path(), "i915_0000:03:00.0");
        make(dir.path(), "pci0000:00");

        let devices = discover_devices(dir.path()).unwrap();
        assert_eq!(devices.len(), 2);
        assert!(devices[0].is_discrete);
        assert_eq!(devices[1].identifier, "i915");
    }

    #[test]
    fn any_filter_prefers_discrete() {
        let dir = tempfile::tempdir().unwrap();
        make(dir.path(), "i915");
        make(dir.path(), "i915_0000:03:00.0");
        let devices = discover_devices(dir.path()).unwrap();
        let selected = select_device(&devices, &DeviceFilter::Any).unwrap();
        assert!(selected.is_discrete);
    }

    #[test]
    fn filter_mismatch_is_device_not_found() {
        let dir = tempfile::tempdir().unwrap();
        make(dir.path(), "i915");
        let devices = discover_devices(dir.path()).unwrap();
        let filter = DeviceFilter::PciVendorCard {
            vendor: 0x8086,
            card: 99,
        };
        let err = select_device(&devices, &filter).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Requested device pci:vendor=0x8086,card=99 not found!"
        );
    }

    #[test]
    fn parses_pci_filter() {
        let filter = DeviceFilter::parse("pci:vendor=0x8086,card=1").unwrap();
        assert_eq!(
            filter,
            DeviceFilter::PciVendorCard {
                vendor: 0x8086,
                card: 1
            }
        );
    }

    #[test]
    fn parses_bare_slot() {
        let filter = DeviceFilter::parse("0000:03:00.0").unwrap();
        assert_eq!(filter, DeviceFilter::PciSlot("0000:03:00.0".to_string()));
    }
}
