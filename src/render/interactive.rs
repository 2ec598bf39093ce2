//! Interactive full-screen TUI renderer: ANSI home/erase each tick, a
//! summary line, a table header, then one bar-graphed row per engine (or
//! engine class).

use std::io::Write;

use crate::error::Result;
use crate::render::model::{build_groups, RenderGroup};
use crate::render::Renderer;
use crate::sample::Sample;

/// The nine glyphs used to fill a bar to eighth-cell precision, from
/// empty to full.
const BAR_GLYPHS: [char; 9] = [' ', '▏', '▎', '▍', '▌', '▋', '▊', '▉', '█'];

/// Renders samples as a full-screen ANSI dashboard.
#[derive(Default)]
pub struct InteractiveRenderer;

impl Renderer for InteractiveRenderer {
    fn render(&mut self, sample: &Sample, class_view: bool, out: &mut dyn Write) -> Result<()> {
        let groups = build_groups(sample, class_view);
        let (cols, _rows) = terminal_size();

        // Home cursor and erase to end of screen.
        write!(out, "\x1b[H\x1b[J")?;

        writeln!(
            out,
            "intel-gpu-top  interval {:.1} ms",
            groups
                .first()
                .and_then(|g| g.items.first())
                .map(|i| i.value)
                .unwrap_or(0.0)
        )?;

        write_scalar_groups(&groups, out)?;

        writeln!(out)?;
        for group in groups.iter().skip(scalar_group_count(&groups)) {
            write_engine_row(group, cols, out)?;
        }
        Ok(())
    }
}

/// The number of leading groups (`period`, `frequency`, `interrupts`,
/// `rc6`, optional `power`, optional `imc-bandwidth`) before the
/// per-engine/per-class rows begin.
fn scalar_group_count(groups: &[RenderGroup]) -> usize {
    groups
        .iter()
        .take_while(|g| {
            matches!(
                g.key.as_str(),
                "period" | "frequency" | "interrupts" | "rc6" | "power" | "imc-bandwidth"
            )
        })
        .count()
}

fn write_scalar_groups(groups: &[RenderGroup], out: &mut dyn Write) -> Result<()> {
    for group in groups.iter().take(scalar_group_count(groups)) {
        if group.key == "period" {
            continue;
        }
        write!(out, "{:<12}", group.key)?;
        for item in &group.items {
            if !item.present {
                continue;
            }
            write!(
                out,
                "{}: {:.prec$}{} ",
                item.key,
                item.value,
                item.unit,
                prec = item.precision
            )?;
        }
        writeln!(out)?;
    }
    Ok(())
}

fn write_engine_row(group: &RenderGroup, cols: u16, out: &mut dyn Write) -> Result<()> {
    let busy = group
        .items
        .iter()
        .find(|i| i.key == "busy")
        .map(|i| i.value)
        .unwrap_or(0.0);

    // Leave room for the label and the trailing percentage readout; the
    // remainder of the terminal width is split across eighth-cells.
    let max_cells = (cols as usize).saturating_sub(20).max(2);
    let bar = render_bar(busy, max_cells);

    write!(out, "{:<10} ", group.key)?;
    write!(out, "[{bar}] ")?;
    writeln!(out, "{busy:>6.2}%")?;
    Ok(())
}

/// Render a bar `max_cells` wide, filled to `percent` of its width using
/// eighth-cell Unicode block glyphs.
fn render_bar(percent: f64, max_cells: usize) -> String {
    let percent = percent.clamp(0.0, 100.0);
    let eighths = (percent * (8.0 * (max_cells.saturating_sub(2)) as f64) / 100.0) as usize;
    let full_cells = eighths / 8;
    let remainder = eighths % 8;

    let mut bar = String::with_capacity(max_cells);
    for _ in 0..full_cells {
        bar.push(BAR_GLYPHS[8]);
    }
    if remainder > 0 {
        bar.push(BAR_GLYPHS[remainder]);
    }
    let filled = full_cells + usize::from(remainder > 0);
    for _ in filled..max_cells.saturating_sub(2) {
        bar.push(' ');
    }
    bar
}

/// Query the terminal's current size via `TIOCGWINSZ`, falling back to
/// 80x24 on a serial console or when the ioctl reports zeros.
fn terminal_size() -> (u16, u16) {
    unsafe {
        let mut ws: libc::winsize = std::mem::zeroed();
        if libc::ioctl(libc::STDOUT_FILENO, libc::TIOCGWINSZ, &mut ws) == 0
            && ws.ws_col > 0
            && ws.ws_row > 0
        {
            (ws.ws_col, ws.ws_row)
        } else {
            (80, 24)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_percent_is_an_empty_bar() {
        let bar = render_bar(0.0, 20);
        assert!(bar.chars().all(|c| c == ' '));
    }

    #[test]
    fn full_percent_is_a_full_bar() {
        let bar = render_bar(100.0, 20);
        assert_eq!(bar.chars().filter(|&c| c == '█').count(), 18);
    }

    #[test]
    fn half_percent_fills_half_the_cells() {
        let bar = render_bar(50.0, 20);
        let full = bar.chars().filter(|&c| c == '█').count();
        assert_eq!(full, 9);
    }
}
