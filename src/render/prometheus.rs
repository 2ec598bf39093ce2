//! Prometheus exposition renderer. Single-shot: one block per process
//! invocation, no HTTP serving of its own — an external scraper is
//! expected to invoke this binary and capture its stdout.

use std::io::Write;

use crate::error::Result;
use crate::render::model::{build_groups, sanitize_key};
use crate::render::Renderer;
use crate::sample::Sample;

/// Renders one sample as a Prometheus text-exposition block.
#[derive(Default)]
pub struct PrometheusRenderer;

impl Renderer for PrometheusRenderer {
    fn render(&mut self, sample: &Sample, class_view: bool, out: &mut dyn Write) -> Result<()> {
        for group in build_groups(sample, class_view) {
            let group_key = sanitize_key(&group.key);
            for item in &group.items {
                if !item.present {
                    continue;
                }
                // Each key is sanitized to its own length; an earlier
                // version of the source tool iterated the item key under
                // the parent group key's length, silently truncating
                // long item names. That's not reproduced here.
                let item_key = sanitize_key(item.key);
                let name = format!("intel_gpu_top_{group_key}_{item_key}");

                writeln!(out, "# HELP {name} {}.{} ({})", group.key, item.key, item.unit)?;
                writeln!(out, "# TYPE {name} gauge")?;
                writeln!(out, "{name} {}", item.value)?;
            }
        }
        out.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use regex::Regex;

    #[test]
    fn sanitized_name_matches_required_pattern() {
        let re = Regex::new(r"^intel_gpu_top_[a-z0-9_]+_[a-z0-9_]+$").unwrap();
        let group_key = sanitize_key("Video/0");
        let item_key = sanitize_key("busy");
        let name = format!("intel_gpu_top_{group_key}_{item_key}");
        assert!(re.is_match(&name), "{name} did not match");
    }
}
