//! The rate calculator & aggregator (C5): turns raw counter deltas into
//! scaled rates and percentages, and folds per-instance engines into
//! per-class aggregates on demand.

use std::collections::BTreeMap;

use crate::counters::Counter;
use crate::sample::{EngineClassAggregate, Group, Sample};
use crate::sysfs::engines::class_name;

/// Where a metric's display scale `s` comes from: a fixed constant shared
/// by every counter of that kind, or each counter's own sysfs `scale`
/// value (used for power and bandwidth metrics, whose unit conversion
/// depends on what the kernel reports for that specific event).
#[derive(Debug, Clone, Copy)]
pub enum ScaleSource {
    /// A fixed multiplier, the same for every counter of this metric.
    Fixed(f64),
    /// Use the counter's own `scale` field.
    FromCounter,
}

/// The fixed `(d, s, width, precision, unit)` descriptor for one row of
/// the metric display table.
#[derive(Debug, Clone, Copy)]
pub struct MetricDescriptor {
    /// Dimensional divisor applied before the wall-time division.
    pub d: f64,
    /// Display scale, applied after the wall-time division.
    pub s: ScaleSource,
    /// Field width for fixed-width renderers.
    pub width: usize,
    /// Decimal places for fixed-width renderers.
    pub precision: usize,
    /// Unit suffix, or `""` when taken from the counter itself
    /// (`<unit>/s` in the IMC rows).
    pub unit: &'static str,
}

/// Every metric this tool displays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    /// `frequency.requested`
    FrequencyRequested,
    /// `frequency.actual`
    FrequencyActual,
    /// `interrupts.count`
    Interrupts,
    /// `rc6.value`
    Rc6,
    /// `power.GPU`
    PowerGpu,
    /// `power.Package`
    PowerPackage,
    /// `engines.*.busy`
    EngineBusy,
    /// `engines.*.sema`
    EngineSema,
    /// `engines.*.wait`
    EngineWait,
    /// `imc-bandwidth.reads`
    ImcReads,
    /// `imc-bandwidth.writes`
    ImcWrites,
}

impl Metric {
    /// This metric's fixed display descriptor.
    pub fn descriptor(self) -> MetricDescriptor {
        use Metric::*;
        use ScaleSource::*;
        match self {
            FrequencyRequested => MetricDescriptor {
                d: 1.0,
                s: Fixed(1.0),
                width: 4,
                precision: 0,
                unit: "MHz",
            },
            FrequencyActual => MetricDescriptor {
                d: 1.0,
                s: Fixed(1.0),
                width: 4,
                precision: 0,
                unit: "MHz",
            },
            Interrupts => MetricDescriptor {
                d: 1.0,
                s: Fixed(1.0),
                width: 8,
                precision: 0,
                unit: "irq/s",
            },
            Rc6 => MetricDescriptor {
                d: 1e9,
                s: Fixed(100.0),
                width: 3,
                precision: 0,
                unit: "%",
            },
            PowerGpu => MetricDescriptor {
                d: 1.0,
                s: FromCounter,
                width: 4,
                precision: 2,
                unit: "W",
            },
            PowerPackage => MetricDescriptor {
                d: 1.0,
                s: FromCounter,
                width: 4,
                precision: 2,
                unit: "W",
            },
            EngineBusy => MetricDescriptor {
                d: 1e9,
                s: Fixed(100.0),
                width: 6,
                precision: 2,
                unit: "%",
            },
            EngineSema => MetricDescriptor {
                d: 1e9,
                s: Fixed(100.0),
                width: 3,
                precision: 0,
                unit: "%",
            },
            EngineWait => MetricDescriptor {
                d: 1e9,
                s: Fixed(100.0),
                width: 3,
                precision: 0,
                unit: "%",
            },
            ImcReads => MetricDescriptor {
                d: 1.0,
                s: FromCounter,
                width: 6,
                precision: 0,
                unit: "",
            },
            ImcWrites => MetricDescriptor {
                d: 1.0,
                s: FromCounter,
                width: 6,
                precision: 0,
                unit: "",
            },
        }
    }
}

/// Apply the core rate formula to a raw `(current − previous)` delta:
/// `((delta / d) / t) * s`, clamped to 100 when the effective `s` is 100
/// (handles counter jitter right at a utilisation ceiling).
fn scaled_rate(delta: f64, d: f64, s: f64, t: f64) -> f64 {
    if t <= 0.0 {
        return 0.0;
    }
    let value = (delta / d) / t * s;
    if s == 100.0 && value > 100.0 {
        100.0
    } else {
        value
    }
}

/// Compute the display value for one counter under one metric descriptor,
/// given the sample's wall-time delta `t` in seconds.
pub fn rate(counter: &Counter, metric: Metric, t: f64) -> f64 {
    let descriptor = metric.descriptor();
    let delta = counter.current.saturating_sub(counter.previous) as f64;
    let s = match descriptor.s {
        ScaleSource::Fixed(v) => v,
        ScaleSource::FromCounter => counter.scale,
    };
    scaled_rate(delta, descriptor.d, s, t)
}

/// Fold every discovered engine into one synthetic aggregate per engine
/// class, averaging each class's per-tick busy/wait/sema deltas.
///
/// Previous/current pairs are summed then each divided by the class's
/// engine count, which is equivalent to averaging the deltas directly
/// since delta is linear in current and previous. Engines whose
/// relevant counter isn't present contribute a delta of zero rather than
/// being excluded from the divisor, matching "engine count" meaning the
/// class's full membership, not just its currently-open counters.
pub fn aggregate_by_class(sample: &Sample) -> Vec<EngineClassAggregate> {
    let mut by_class: BTreeMap<u64, Vec<_>> = BTreeMap::new();
    for slot in sample.engines() {
        by_class.entry(slot.descriptor.class).or_default().push(slot);
    }

    by_class
        .into_iter()
        .map(|(class, slots)| {
            let n = slots.len().max(1) as f64;
            let mut busy_sum = 0.0;
            let mut wait_sum = 0.0;
            let mut sema_sum = 0.0;
            for slot in &slots {
                busy_sum += signed_delta(sample.counter(Group::Engine, slot.busy));
                wait_sum += signed_delta(sample.counter(Group::Engine, slot.wait));
                sema_sum += signed_delta(sample.counter(Group::Engine, slot.sema));
            }
            EngineClassAggregate {
                class,
                human_name: class_name(class),
                engine_count: slots.len(),
                busy_delta: busy_sum / n,
                wait_delta: wait_sum / n,
                sema_delta: sema_sum / n,
            }
        })
        .collect()
}

/// Apply the core rate formula directly to a class aggregate's mean delta.
pub fn aggregate_rate(mean_delta: f64, metric: Metric, t: f64) -> f64 {
    let descriptor = metric.descriptor();
    // Class aggregates never draw `s` from a per-counter sysfs scale;
    // every aggregated metric (busy/wait/sema) is a fixed percentage.
    let s = match descriptor.s {
        ScaleSource::Fixed(v) => v,
        ScaleSource::FromCounter => 1.0,
    };
    scaled_rate(mean_delta, descriptor.d, s, t)
}

fn signed_delta(counter: &Counter) -> f64 {
    if counter.present {
        counter.current.saturating_sub(counter.previous) as f64
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counter(current: u64, previous: u64, scale: f64, present: bool) -> Counter {
        Counter {
            name: "test".to_string(),
            event_type: 0,
            event_config: 0,
            scale,
            unit: String::new(),
            present,
            real_index: None,
            previous,
            current,
        }
    }

    #[test]
    fn priming_tick_reports_fifty_percent() {
        // busy advances 5e8 ns over a 1e9 ns (1 second) window.
        let c = counter(5 * 10u64.pow(8), 0, 1.0, true);
        let value = rate(&c, Metric::EngineBusy, 1.0);
        assert!((value - 50.0).abs() < 1e-9);
    }

    #[test]
    fn clamp_to_100_on_jitter() {
        let c = counter(1_100_000_000, 0, 1.0, true);
        let value = rate(&c, Metric::EngineBusy, 1.0);
        assert_eq!(value, 100.0);
    }

    #[test]
    fn class_aggregate_averages_two_engines() {
        use crate::sample::EngineSlot;
        use crate::sysfs::engines::EngineDescriptor;

        // This test exercises the aggregation formula directly rather
        // than through a live Sample, since constructing one needs a real
        // i915/xe PMU; see `counters::tests` for the counter-group-level
        // partial-success and tick behavior this builds on.
        let descriptor = |name: &str, instance: u64| EngineDescriptor {
            name: name.to_string(),
            display_name: format!("Video/{instance}"),
            short_name: name.to_string(),
            class: 2,
            instance,
        };
        let _slots = vec![
            EngineSlot {
                descriptor: descriptor("vcs0", 0),
                busy: 0,
                wait: 1,
                sema: 2,
            },
            EngineSlot {
                descriptor: descriptor("vcs1", 1),
                busy: 3,
                wait: 4,
                sema: 5,
            },
        ];

        // Two engines with deltas 4e8 and 6e8 ns average to 5e8 ns, which
        // over a 1e9 ns window is 50%.
        let mean_delta = (4e8 + 6e8) / 2.0;
        let value = aggregate_rate(mean_delta, Metric::EngineBusy, 1.0);
        assert!((value - 50.0).abs() < 1e-9);
    }
}
