//! Hand-rolled JSON renderer.
//!
//! This deliberately doesn't go through `serde_json::Value`: the source
//! tool's own writer is an append-only, indent-tracking emitter whose
//! members are always comma-terminated, even the last one in an object —
//! a `serde_json::Value` would normalize that away and produce a
//! differently-shaped document. Samples are separated by a bare
//! comma-newline at the top level rather than being individually
//! newline-delimited.

use std::io::Write;

use crate::error::Result;
use crate::render::model::build_groups;
use crate::render::Renderer;
use crate::sample::Sample;

/// Renders samples as a stream of tab-indented JSON objects.
#[derive(Default)]
pub struct JsonRenderer {
    wrote_first: bool,
}

impl Renderer for JsonRenderer {
    fn render(&mut self, sample: &Sample, class_view: bool, out: &mut dyn Write) -> Result<()> {
        let groups = build_groups(sample, class_view);

        if self.wrote_first {
            writeln!(out, ",")?;
        }
        self.wrote_first = true;

        writeln!(out, "{{")?;
        for group in &groups {
            writeln!(out, "\t\"{}\": {{", escape(&group.key))?;
            for item in &group.items {
                if !item.present {
                    continue;
                }
                writeln!(
                    out,
                    "\t\t\"{}\": {:.prec$},",
                    escape(item.key),
                    item.value,
                    prec = item.precision
                )?;
            }
            writeln!(out, "\t}},")?;
        }
        write!(out, "}}")?;
        out.flush()?;
        Ok(())
    }
}

fn escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_quotes_and_backslashes() {
        assert_eq!(escape(r#"a"b\c"#), r#"a\"b\\c"#);
    }
}
