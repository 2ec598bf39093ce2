//! The per-sample data model every renderer draws from: an ordered list
//! of counter groups, each holding ordered items.

use crate::counters::Counter;
use crate::sample::aggregate::{aggregate_by_class, aggregate_rate, rate, Metric};
use crate::sample::{Group, Sample};

/// One displayed value within a [`RenderGroup`].
#[derive(Debug, Clone)]
pub struct Item {
    /// Short key (`"busy"`, `"requested"`, `"GPU"`, ...), used verbatim in
    /// the JSON and Prometheus renderers.
    pub key: &'static str,
    /// The computed display value; meaningless (and unused) if `present`
    /// is false.
    pub value: f64,
    /// Field width for fixed-width renderers.
    pub width: usize,
    /// Decimal places.
    pub precision: usize,
    /// Unit suffix.
    pub unit: String,
    /// Whether the underlying counter was open. An absent item is skipped
    /// entirely by every renderer, without shifting the columns after it.
    pub present: bool,
}

/// One counter group in emission order (`period`, `frequency`,
/// `interrupts`, `rc6`, `power`, optional `imc-bandwidth`, then one group
/// per engine or engine-class).
#[derive(Debug, Clone)]
pub struct RenderGroup {
    /// The group's key, used as the JSON object key and the Prometheus
    /// metric name's `<group_key>` component.
    pub key: String,
    /// This group's items, in display order.
    pub items: Vec<Item>,
}

fn item(key: &'static str, counter: &Counter, metric: Metric, t: f64) -> Item {
    let descriptor = metric.descriptor();
    let unit = if descriptor.unit.is_empty() {
        counter.unit.clone()
    } else {
        descriptor.unit.to_string()
    };
    Item {
        key,
        value: if counter.present {
            rate(counter, metric, t)
        } else {
            0.0
        },
        width: descriptor.width,
        precision: descriptor.precision,
        unit,
        present: counter.present,
    }
}

/// Build the ordered group list for one sample, in the fixed emission
/// order. `class_view` selects the per-instance engine table or the
/// aggregated per-class one; emission order is otherwise identical.
pub fn build_groups(sample: &Sample, class_view: bool) -> Vec<RenderGroup> {
    let t = sample.wall_time_delta_seconds();
    let mut groups = Vec::new();

    groups.push(RenderGroup {
        key: "period".to_string(),
        items: vec![Item {
            key: "interval",
            value: t * 1000.0,
            width: 6,
            precision: 1,
            unit: "ms".to_string(),
            present: true,
        }],
    });

    groups.push(RenderGroup {
        key: "frequency".to_string(),
        items: vec![
            item(
                "requested",
                sample.counter(Group::Engine, sample.freq_requested()),
                Metric::FrequencyRequested,
                t,
            ),
            item(
                "actual",
                sample.counter(Group::Engine, sample.freq_actual()),
                Metric::FrequencyActual,
                t,
            ),
        ],
    });

    groups.push(RenderGroup {
        key: "interrupts".to_string(),
        items: vec![item(
            "count",
            sample.counter(Group::Engine, sample.irq()),
            Metric::Interrupts,
            t,
        )],
    });

    groups.push(RenderGroup {
        key: "rc6".to_string(),
        items: vec![item(
            "value",
            sample.counter(Group::Engine, sample.rc6()),
            Metric::Rc6,
            t,
        )],
    });

    let gpu_energy = sample.counter(Group::Rapl, sample.gpu_energy());
    let package_energy = sample.counter(Group::Rapl, sample.package_energy());
    if gpu_energy.present || package_energy.present {
        groups.push(RenderGroup {
            key: "power".to_string(),
            items: vec![
                item("GPU", gpu_energy, Metric::PowerGpu, t),
                item("Package", package_energy, Metric::PowerPackage, t),
            ],
        });
    }

    let imc_read = sample.counter(Group::Imc, sample.imc_read());
    let imc_write = sample.counter(Group::Imc, sample.imc_write());
    if imc_read.present || imc_write.present {
        groups.push(RenderGroup {
            key: "imc-bandwidth".to_string(),
            items: vec![
                item("reads", imc_read, Metric::ImcReads, t),
                item("writes", imc_write, Metric::ImcWrites, t),
            ],
        });
    }

    if class_view {
        for aggregate in aggregate_by_class(sample) {
            groups.push(RenderGroup {
                key: aggregate.human_name.clone(),
                items: vec![
                    Item {
                        key: "busy",
                        value: aggregate_rate(aggregate.busy_delta, Metric::EngineBusy, t),
                        width: 6,
                        precision: 2,
                        unit: "%".to_string(),
                        present: true,
                    },
                    Item {
                        key: "sema",
                        value: aggregate_rate(aggregate.sema_delta, Metric::EngineSema, t),
                        width: 3,
                        precision: 0,
                        unit: "%".to_string(),
                        present: true,
                    },
                    Item {
                        key: "wait",
                        value: aggregate_rate(aggregate.wait_delta, Metric::EngineWait, t),
                        width: 3,
                        precision: 0,
                        unit: "%".to_string(),
                        present: true,
                    },
                ],
            });
        }
    } else {
        for slot in sample.engines() {
            groups.push(RenderGroup {
                key: slot.descriptor.short_name.clone(),
                items: vec![
                    item(
                        "busy",
                        sample.counter(Group::Engine, slot.busy),
                        Metric::EngineBusy,
                        t,
                    ),
                    item(
                        "sema",
                        sample.counter(Group::Engine, slot.sema),
                        Metric::EngineSema,
                        t,
                    ),
                    item(
                        "wait",
                        sample.counter(Group::Engine, slot.wait),
                        Metric::EngineWait,
                        t,
                    ),
                ],
            });
        }
    }

    groups
}

/// Sanitize a group or item key into the `[a-z0-9_]+` form Prometheus
/// metric names require: lower-case, every other byte replaced with `_`.
pub fn sanitize_key(key: &str) -> String {
    key.to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}
