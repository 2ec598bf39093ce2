//! Everything this crate reads from `/sys`: perf attribute resolution
//! (C1), engine discovery (C2), and device selection.

pub mod attr;
pub mod device;
pub mod engines;

pub use attr::{AttrResolver, PerfAttr};
pub use device::{DeviceFilter, DeviceInfo};
pub use engines::EngineDescriptor;
