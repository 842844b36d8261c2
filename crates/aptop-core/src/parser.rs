//! Frame parsing.
//!
//! Turns one raw frame of `powermetrics` text into a [`MetricSet`].

use std::fmt;

use enum_map::EnumMap;

use crate::rules::{Metric, rules};
use crate::segmenter::RawFrame;

/// Values for one sampling cycle, extracted and derived.
///
/// Metrics whose rule did not match the frame read as `0.0`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricSet {
    values: EnumMap<Metric, f64>,
}

impl MetricSet {
    /// Builds a set from extracted values and fills in the derived metrics.
    pub fn from_extracted(mut values: EnumMap<Metric, f64>) -> Self {
        let usage_e = 100.0 - values[Metric::EClusterIdle];
        let usage_p = 100.0 - values[Metric::PClusterIdle];
        values[Metric::EClusterUsage] = usage_e;
        values[Metric::PClusterUsage] = usage_p;
        values[Metric::CpuUsage] = f64::midpoint(usage_e, usage_p);
        Self { values }
    }

    pub fn get(&self, metric: Metric) -> f64 {
        self.values[metric]
    }

    pub fn iter(&self) -> impl Iterator<Item = (Metric, f64)> + '_ {
        self.values.iter().map(|(metric, value)| (metric, *value))
    }
}

/// One `name=value` pair per metric, space separated.
impl fmt::Display for MetricSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (metric, value)) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{}={value:.2}", metric.name())?;
        }
        Ok(())
    }
}

/// Parses one frame.
///
/// Pure: the result depends only on `frame`. Missing fields are expected
/// (the tool's output varies between models and degenerate samples) and
/// default to zero.
pub fn parse(frame: &RawFrame) -> MetricSet {
    parse_text(frame.as_str())
}

/// Parses arbitrary text with the rule table.
pub fn parse_text(text: &str) -> MetricSet {
    let mut values = EnumMap::default();
    for rule in rules() {
        values[rule.metric] = rule.extract(text).unwrap_or(0.0);
    }
    MetricSet::from_extracted(values)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_lists_every_metric_by_name() {
        let set = parse_text("GPU HW active residency:  42.50%\nE-Cluster idle residency:  70.00%\n");
        let text = set.to_string();

        assert!(text.starts_with("gpu_usage=42.50 "));
        assert!(text.contains(" cpu_usage_e=30.00 "));
        assert!(text.ends_with("cpu_usage=65.00"));
        assert_eq!(text.split(' ').count(), 16);
    }

    const SAMPLE: &str = "\
*** Sampled system activity (Mon Oct 19 10:00:00 2026 +0000) (1004.12ms elapsed) ***

**** Network activity ****

out: 11.95 packets/s, 1210.37 bytes/s
in:  15.94 packets/s, 4523.10 bytes/s

**** Disk activity ****

read: 3.98 ops/s 63.76 KBytes/s
write: 27.89 ops/s 402.12 KBytes/s

**** Processor usage ****

E-Cluster HW active frequency: 1245 MHz
E-Cluster HW active residency:  48.12%
E-Cluster idle residency:  51.88%
P-Cluster HW active frequency: 702 MHz
P-Cluster HW active residency:   6.35%
P-Cluster idle residency:  93.65%

CPU Power: 412 mW
GPU Power: 18 mW

**** GPU usage ****

GPU HW active frequency: 389 MHz
GPU HW active residency:   2.87% (389 MHz: 2.9% 486 MHz:   0%)
GPU SW requested state: (P1 : 100% P2 :   0%)
GPU idle residency:  97.13%
GPU Power: 18 mW

Combined Power (CPU + GPU + ANE): 430 mW
";

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn parses_full_sample() {
        let m = parse_text(SAMPLE);

        assert!(approx(m.get(Metric::GpuUsage), 2.87));
        assert!(approx(m.get(Metric::GpuFreq), 389.0));
        assert!(approx(m.get(Metric::GpuPower), 18.0));
        assert!(approx(m.get(Metric::EClusterIdle), 51.88));
        assert!(approx(m.get(Metric::PClusterIdle), 93.65));
        assert!(approx(m.get(Metric::EClusterFreq), 1245.0));
        assert!(approx(m.get(Metric::PClusterFreq), 702.0));
        assert!(approx(m.get(Metric::CpuPower), 412.0));
        assert!(approx(m.get(Metric::TotalPower), 430.0));
        assert!(approx(m.get(Metric::NetworkOut), 1210.37));
        assert!(approx(m.get(Metric::NetworkIn), 4523.10));
        assert!(approx(m.get(Metric::DiskRead), 63.76));
        assert!(approx(m.get(Metric::DiskWrite), 402.12));
    }

    #[test]
    fn missing_metrics_default_to_zero() {
        let m = parse_text("GPU Power: 55 mW\n");

        assert!(approx(m.get(Metric::GpuPower), 55.0));
        for (metric, value) in m.iter() {
            if metric == Metric::GpuPower || metric.is_derived() {
                continue;
            }
            assert!(approx(value, 0.0), "{} should be 0", metric.name());
        }
    }

    #[test]
    fn empty_frame_is_all_zero_with_full_usage() {
        let m = parse_text("");
        assert!(approx(m.get(Metric::TotalPower), 0.0));
        // Zero idle residency means fully busy.
        assert!(approx(m.get(Metric::EClusterUsage), 100.0));
        assert!(approx(m.get(Metric::PClusterUsage), 100.0));
        assert!(approx(m.get(Metric::CpuUsage), 100.0));
    }

    #[test]
    fn cluster_usage_is_complement_of_idle() {
        for idle in [0.0, 0.5, 12.25, 50.0, 70.0, 99.75, 100.0] {
            let text = format!(
                "E-Cluster idle residency: {idle}%\nP-Cluster idle residency: {idle}%\n"
            );
            let m = parse_text(&text);
            assert_eq!(m.get(Metric::EClusterUsage), 100.0 - idle);
            assert_eq!(m.get(Metric::PClusterUsage), 100.0 - idle);
        }
    }

    #[test]
    fn overall_usage_is_mean_of_clusters() {
        let m = parse_text("E-Cluster idle residency: 70\nP-Cluster idle residency: 60\n");
        assert!(approx(m.get(Metric::EClusterUsage), 30.0));
        assert!(approx(m.get(Metric::PClusterUsage), 40.0));
        assert!(approx(m.get(Metric::CpuUsage), 35.0));
    }

    #[test]
    fn parse_is_deterministic() {
        assert_eq!(parse_text(SAMPLE), parse_text(SAMPLE));
    }
}
