//! Plain-text column renderer: fixed-width fields, with the header row
//! pair repeated every 20 data rows to keep `grep`/`awk` pipelines legible.

use std::io::Write;

use crate::error::Result;
use crate::render::model::build_groups;
use crate::render::Renderer;
use crate::sample::Sample;

const HEADER_INTERVAL: usize = 20;

/// Renders samples as whitespace-separated fixed-width columns.
#[derive(Default)]
pub struct TextRenderer {
    rows_since_header: usize,
}

impl Renderer for TextRenderer {
    fn render(&mut self, sample: &Sample, class_view: bool, out: &mut dyn Write) -> Result<()> {
        let groups = build_groups(sample, class_view);

        if self.rows_since_header % HEADER_INTERVAL == 0 {
            write_header(&groups, out)?;
        }
        self.rows_since_header += 1;

        for group in &groups {
            for item in &group.items {
                if !item.present {
                    continue;
                }
                write!(out, "{:>width$.prec$} ", item.value, width = item.width, prec = item.precision)?;
            }
        }
        writeln!(out)?;
        Ok(())
    }
}

fn write_header(groups: &[crate::render::model::RenderGroup], out: &mut dyn Write) -> Result<()> {
    for group in groups {
        for item in &group.items {
            if !item.present {
                continue;
            }
            write!(out, "{:>width$} ", format!("{}.{}", group.key, item.key), width = item.width)?;
        }
    }
    writeln!(out)?;
    for group in groups {
        for item in &group.items {
            if !item.present {
                continue;
            }
            write!(out, "{:>width$} ", item.unit, width = item.width)?;
        }
    }
    writeln!(out)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::model::{Item, RenderGroup};

    #[test]
    fn header_repeats_every_twenty_rows() {
        let mut renderer = TextRenderer::default();
        assert_eq!(renderer.rows_since_header, 0);
        for _ in 0..HEADER_INTERVAL {
            renderer.rows_since_header += 1;
        }
        assert_eq!(renderer.rows_since_header % HEADER_INTERVAL, 0);
    }

    #[test]
    fn header_skips_absent_items() {
        let groups = vec![RenderGroup {
            key: "power".to_string(),
            items: vec![
                Item {
                    key: "GPU",
                    value: 0.0,
                    width: 4,
                    precision: 2,
                    unit: "W".to_string(),
                    present: false,
                },
                Item {
                    key: "Package",
                    value: 3.1,
                    width: 4,
                    precision: 2,
                    unit: "W".to_string(),
                    present: true,
                },
            ],
        }];
        let mut buf = Vec::new();
        write_header(&groups, &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(!text.contains("power.GPU"));
        assert!(text.contains("power.Package"));
    }
}
