//! Discovering the GPU engines a device's PMU exposes, by walking its
//! sysfs `events` directory.

use std::fs;
use std::path::Path;

use crate::error::{Error, Result};
use crate::sysfs::attr::AttrResolver;

/// Width in bits of the instance field packed into an engine event's
/// config value.
pub const INSTANCE_BITS: u32 = 8;
/// Bit offset of the engine-class field.
pub const CLASS_SHIFT: u32 = 16;
/// Threshold separating engine-event configs (class/instance encoded above
/// bit 16) from the kernel's small set of enumerated "other" counters
/// (IRQ, frequency, RC6), which are assigned small integer configs offset
/// by this base.
pub const OTHER_BASE: u64 = 1 << CLASS_SHIFT;

const INSTANCE_MASK: u64 = (1 << INSTANCE_BITS) - 1;

/// One GPU engine discovered under a device's sysfs `events` directory,
/// before any counters have been opened for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineDescriptor {
    /// The sysfs event stem (`rcs0`, `vcs1`, ...), also this engine's
    /// `events/<name>-busy` file name minus the suffix.
    pub name: String,
    /// A human-readable label combining the engine class and instance
    /// (`"Render/3D/0"`).
    pub display_name: String,
    /// Same as [`name`](EngineDescriptor::name); kept distinct from
    /// `display_name` per the data model, since callers index engines by
    /// this short form.
    pub short_name: String,
    /// The engine class, as packed into the config's class bits.
    pub class: u64,
    /// The zero-based instance index within `class`.
    pub instance: u64,
}

/// Walk `device_root/events`, recognise every `<stem>-busy` file as an
/// engine, and return a stably-sorted table.
///
/// Returns an empty `Vec` if no engine events are found — the caller
/// treats that as "this kernel does not support a PMU for this device"
/// rather than as an error in its own right.
pub fn discover_engines(device_root: &Path, attrs: &AttrResolver) -> Result<Vec<EngineDescriptor>> {
    let events_dir = device_root.join("events");
    let entries = match fs::read_dir(&events_dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(source) => {
            return Err(Error::Io {
                path: events_dir,
                source,
            })
        }
    };

    let mut engines = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| Error::Io {
            path: events_dir.clone(),
            source,
        })?;
        let file_name = entry.file_name();
        let Some(file_name) = file_name.to_str() else {
            continue;
        };
        // Skip the `.scale`/`.unit` siblings and any non-busy event files;
        // only `<stem>-busy` names an engine.
        let Some(stem) = file_name.strip_suffix("-busy") else {
            continue;
        };

        let attr = attrs.resolve(device_root, file_name)?;
        let class = attr.config >> CLASS_SHIFT;
        let instance = (attr.config >> INSTANCE_BITS) & INSTANCE_MASK;

        engines.push(EngineDescriptor {
            name: stem.to_string(),
            display_name: format!("{}/{}", class_name(class), instance),
            short_name: stem.to_string(),
            class,
            instance,
        });
    }

    engines.sort_by_key(|e| (e.class, e.instance));
    Ok(engines)
}

/// The human name for a known i915/xe engine class, or `Unknown(n)` for a
/// class id this crate doesn't recognize.
///
/// An unrecognized class degrades to a labeled-but-uncategorized row
/// rather than a discovery failure, so a newer kernel that adds an engine
/// class this crate predates doesn't break discovery outright.
pub fn class_name(class: u64) -> String {
    match class {
        0 => "Render/3D".to_string(),
        1 => "Blitter".to_string(),
        2 => "Video".to_string(),
        3 => "VideoEnhance".to_string(),
        other => format!("Unknown({other})"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write(path: &Path, contents: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    fn engine_config(class: u64, instance: u64) -> u64 {
        (class << CLASS_SHIFT) | (instance << INSTANCE_BITS)
    }

    #[test]
    fn discovers_and_sorts_by_class_then_instance() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(&root.join("type"), "20\n");
        write(
            &root.join("events/vcs1-busy"),
            &format!("event={:#x}\n", engine_config(2, 1)),
        );
        write(
            &root.join("events/rcs0-busy"),
            &format!("event={:#x}\n", engine_config(0, 0)),
        );
        write(
            &root.join("events/vcs0-busy"),
            &format!("event={:#x}\n", engine_config(2, 0)),
        );
        // A non-busy sibling must not be mistaken for an engine.
        write(&root.join("events/vcs0-wait"), "event=0x0\n");

        let attrs = AttrResolver::new();
        let engines = discover_engines(root, &attrs).unwrap();
        let names: Vec<_> = engines.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["rcs0", "vcs0", "vcs1"]);
        assert_eq!(engines[1].display_name, "Video/0");
    }

    #[test]
    fn missing_events_dir_yields_empty_list() {
        let dir = tempfile::tempdir().unwrap();
        let attrs = AttrResolver::new();
        let engines = discover_engines(dir.path(), &attrs).unwrap();
        assert!(engines.is_empty());
    }

    #[test]
    fn unknown_class_is_labeled_not_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(&root.join("type"), "20\n");
        write(
            &root.join("events/xyz0-busy"),
            &format!("event={:#x}\n", engine_config(9, 0)),
        );

        let attrs = AttrResolver::new();
        let engines = discover_engines(root, &attrs).unwrap();
        assert_eq!(engines[0].display_name, "Unknown(9)/0");
    }
}
