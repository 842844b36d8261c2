//! Metric extraction rules.
//!
//! A fixed table that maps each metric reported by `powermetrics` to the
//! regular expression that captures its numeric value. The table is compiled
//! once and shared for the lifetime of the process.

use std::sync::LazyLock;

use enum_map::Enum;
use regex::Regex;

/// Substring of the line that closes every sampling cycle.
///
/// `powermetrics` prints the combined power figure last, so its appearance
/// marks the end of a frame.
pub const FRAME_TERMINATOR: &str = "Combined Power (CPU + GPU + ANE):";

/// Every metric known to the monitor, extracted and derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Enum)]
pub enum Metric {
    GpuUsage,
    GpuFreq,
    GpuPower,
    PClusterIdle,
    EClusterIdle,
    EClusterFreq,
    PClusterFreq,
    CpuPower,
    TotalPower,
    NetworkOut,
    NetworkIn,
    DiskRead,
    DiskWrite,
    /// Derived: `100 - EClusterIdle`.
    EClusterUsage,
    /// Derived: `100 - PClusterIdle`.
    PClusterUsage,
    /// Derived: mean of the two cluster usages.
    CpuUsage,
}

impl Metric {
    /// Stable snake_case name, used when logging parsed frames.
    pub fn name(self) -> &'static str {
        match self {
            Metric::GpuUsage => "gpu_usage",
            Metric::GpuFreq => "gpu_freq",
            Metric::GpuPower => "gpu_power",
            Metric::PClusterIdle => "p_cpu_idle",
            Metric::EClusterIdle => "e_cpu_idle",
            Metric::EClusterFreq => "cpu_freq_e",
            Metric::PClusterFreq => "cpu_freq_p",
            Metric::CpuPower => "cpu_power",
            Metric::TotalPower => "total_power",
            Metric::NetworkOut => "network_out",
            Metric::NetworkIn => "network_in",
            Metric::DiskRead => "disk_read",
            Metric::DiskWrite => "disk_write",
            Metric::EClusterUsage => "cpu_usage_e",
            Metric::PClusterUsage => "cpu_usage_p",
            Metric::CpuUsage => "cpu_usage",
        }
    }

    /// Whether the value is computed from other metrics rather than read
    /// from the frame text.
    pub fn is_derived(self) -> bool {
        matches!(
            self,
            Metric::EClusterUsage | Metric::PClusterUsage | Metric::CpuUsage
        )
    }
}

const RULE_SOURCES: [(Metric, &str); 13] = [
    (Metric::GpuUsage, r"GPU HW active residency:\s+([\d.]+)%"),
    (Metric::GpuFreq, r"GPU HW active frequency:\s+([\d.]+)\s+MHz"),
    (Metric::GpuPower, r"GPU Power:\s+([\d.]+)\s+mW"),
    (Metric::PClusterIdle, r"P-Cluster idle residency:\s+([\d.]+)"),
    (Metric::EClusterIdle, r"E-Cluster idle residency:\s+([\d.]+)"),
    (
        Metric::EClusterFreq,
        r"E-Cluster HW active frequency:\s+([\d.]+)\s+MHz",
    ),
    (
        Metric::PClusterFreq,
        r"P-Cluster HW active frequency:\s+([\d.]+)\s+MHz",
    ),
    (Metric::CpuPower, r"CPU Power:\s+([\d.]+)\s+mW"),
    (
        Metric::TotalPower,
        r"Combined Power \(CPU \+ GPU \+ ANE\):\s+([\d.]+)\s+mW",
    ),
    (Metric::NetworkOut, r"out:.*\s+([\d.]+)\s+bytes/s"),
    (Metric::NetworkIn, r"in:.*\s+([\d.]+)\s+bytes/s"),
    (Metric::DiskRead, r"read:.*\s+([\d.]+)\s+KBytes/s"),
    (Metric::DiskWrite, r"write:.*\s+([\d.]+)\s+KBytes/s"),
];

/// One row of the extraction table.
#[derive(Debug)]
pub struct MetricRule {
    pub metric: Metric,
    pattern: Regex,
}

impl MetricRule {
    /// Returns the value captured by the first match in `text`.
    ///
    /// `None` when the pattern does not match or the capture is not a number
    /// (e.g. a lone `.`).
    pub fn extract(&self, text: &str) -> Option<f64> {
        self.pattern
            .captures(text)
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse().ok())
    }
}

static RULES: LazyLock<Vec<MetricRule>> = LazyLock::new(|| {
    RULE_SOURCES
        .iter()
        .map(|&(metric, source)| MetricRule {
            metric,
            // Patterns are compile-time constants covered by tests.
            pattern: Regex::new(source).expect("static metric pattern is valid"),
        })
        .collect()
});

/// Returns the process-wide rule table.
pub fn rules() -> &'static [MetricRule] {
    &RULES
}
