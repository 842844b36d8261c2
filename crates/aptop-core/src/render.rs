//! Terminal report rendering.
//!
//! Each frame is rendered from scratch into one string that starts by
//! clearing the screen, so consecutive frames overwrite each other instead of
//! scrolling.

use std::fmt::Write as _;
use std::io::{self, Write};

use crossterm::style::{Color, Stylize};

use crate::parser::MetricSet;
use crate::rules::Metric;

/// Clear screen, then cursor home.
pub const CLEAR_SCREEN: &str = "\x1b[2J\x1b[H";

const TITLE: &str = "System Metrics";
const TITLE_WIDTH: usize = 40;
const BAR_MAX: f64 = 100.0;
const BAR_FILLED: char = '█';
const BAR_EMPTY: char = '░';

/// Visual tier of a value relative to its thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Band {
    Low,
    Medium,
    High,
}

impl Band {
    pub fn color(self) -> Color {
        match self {
            Band::Low => Color::Green,
            Band::Medium => Color::Yellow,
            Band::High => Color::Red,
        }
    }
}

/// Per-metric band boundaries: `[0, low)`, `[low, medium)`, `[medium, ∞)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    pub low: f64,
    pub medium: f64,
}

impl Thresholds {
    pub const PERCENT: Thresholds = Thresholds::new(30.0, 70.0);
    /// GPU and CPU power, in mW.
    pub const COMPONENT_POWER: Thresholds = Thresholds::new(1000.0, 3000.0);
    /// Combined power, in mW.
    pub const TOTAL_POWER: Thresholds = Thresholds::new(2000.0, 5000.0);

    pub const fn new(low: f64, medium: f64) -> Self {
        Self { low, medium }
    }

    pub fn band(self, value: f64) -> Band {
        if value < self.low {
            Band::Low
        } else if value < self.medium {
            Band::Medium
        } else {
            Band::High
        }
    }
}

/// Number of filled cells for `value` on a bar of `width` cells spanning
/// `[0, max]`.
pub fn filled_cells(value: f64, max: f64, width: usize) -> usize {
    if max <= 0.0 || value.is_nan() {
        return 0;
    }
    let cells = (value / max * width as f64).round();
    cells.clamp(0.0, width as f64) as usize
}

/// Plain (uncolored) bar glyphs.
pub fn bar(value: f64, max: f64, width: usize) -> String {
    let filled = filled_cells(value, max, width);
    let mut out = String::with_capacity(width * BAR_FILLED.len_utf8());
    out.extend(std::iter::repeat_n(BAR_FILLED, filled));
    out.extend(std::iter::repeat_n(BAR_EMPTY, width - filled));
    out
}

fn banded(value: f64, thresholds: Thresholds) -> String {
    format!("{value:.2}")
        .with(thresholds.band(value).color())
        .to_string()
}

fn colored_bar(value: f64, width: usize) -> String {
    bar(value, BAR_MAX, width).cyan().to_string()
}

/// Renders metric sets for a terminal.
#[derive(Debug, Clone, Copy)]
pub struct Renderer {
    bar_width: usize,
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new(crate::config::Config::DEFAULT_BAR_WIDTH)
    }
}

impl Renderer {
    pub fn new(bar_width: usize) -> Self {
        Self { bar_width }
    }

    /// Renders the full report for one frame, including the leading
    /// clear-screen sequence.
    pub fn render(&self, metrics: &MetricSet) -> String {
        let m = |metric| metrics.get(metric);
        let width = self.bar_width;

        let sections: [(&str, Vec<String>); 5] = [
            (
                "GPU Metrics",
                vec![
                    format!(
                        "Usage: {}% {}",
                        banded(m(Metric::GpuUsage), Thresholds::PERCENT),
                        colored_bar(m(Metric::GpuUsage), width)
                    ),
                    format!("Frequency: {:.2} MHz", m(Metric::GpuFreq)),
                    format!(
                        "Power: {} mW",
                        banded(m(Metric::GpuPower), Thresholds::COMPONENT_POWER)
                    ),
                ],
            ),
            (
                "CPU Metrics",
                vec![
                    format!(
                        "Usage: {}% {}",
                        banded(m(Metric::CpuUsage), Thresholds::PERCENT),
                        colored_bar(m(Metric::CpuUsage), width)
                    ),
                    format!(
                        "E-Cluster: {:.2} MHz, {}%",
                        m(Metric::EClusterFreq),
                        banded(m(Metric::EClusterUsage), Thresholds::PERCENT)
                    ),
                    format!(
                        "P-Cluster: {:.2} MHz, {}%",
                        m(Metric::PClusterFreq),
                        banded(m(Metric::PClusterUsage), Thresholds::PERCENT)
                    ),
                    format!(
                        "Power: {} mW",
                        banded(m(Metric::CpuPower), Thresholds::COMPONENT_POWER)
                    ),
                ],
            ),
            (
                "Power",
                vec![format!(
                    "Total: {} mW",
                    banded(m(Metric::TotalPower), Thresholds::TOTAL_POWER)
                )],
            ),
            (
                "Network",
                vec![
                    format!("Out: {:.2} bytes/s", m(Metric::NetworkOut)),
                    format!("In: {:.2} bytes/s", m(Metric::NetworkIn)),
                ],
            ),
            (
                "Disk",
                vec![
                    format!("Read: {:.2} KB/s", m(Metric::DiskRead)),
                    format!("Write: {:.2} KB/s", m(Metric::DiskWrite)),
                ],
            ),
        ];

        let mut out = String::from(CLEAR_SCREEN);
        let title = format!("{TITLE:^TITLE_WIDTH$}").white().on_blue();
        let _ = write!(out, "{title}\n\n");
        for (heading, lines) in sections {
            let _ = writeln!(out, "{}", format!("{heading}:").magenta());
            for line in lines {
                out.push_str(&line);
                out.push('\n');
            }
            out.push('\n');
        }
        out
    }

    /// Renders `metrics` and writes the frame to `out` in one go.
    ///
    /// # Errors
    /// Returns an error if writing to or flushing `out` fails.
    pub fn write_frame<W: Write>(&self, out: &mut W, metrics: &MetricSet) -> io::Result<()> {
        out.write_all(self.render(metrics).as_bytes())?;
        out.flush()
    }
}
