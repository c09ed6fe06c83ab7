use prometheus::core::{Collector, Desc};
use prometheus::proto::MetricFamily;
use prometheus::{Gauge, Opts};

/// Shared handle to the `alert_test` gauge.
///
/// One instance is created at startup, cloned into every shard registry and
/// into the alert HTTP handler; clones share the same value.
#[derive(Clone)]
pub struct AlertGauge {
    gauge: Gauge,
}

impl AlertGauge {
    pub fn new() -> prometheus::Result<Self> {
        let opts = Opts::new("alert_test", "for testing alert purpose")
            .const_label("app", "metric-exporter");
        let gauge = Gauge::with_opts(opts)?;
        Ok(Self { gauge })
    }

    pub fn set(&self, value: i64) {
        self.gauge.set(value as f64);
    }

    pub fn get(&self) -> f64 {
        self.gauge.get()
    }
}

impl Collector for AlertGauge {
    fn desc(&self) -> Vec<&Desc> {
        self.gauge.desc()
    }

    fn collect(&self) -> Vec<MetricFamily> {
        self.gauge.collect()
    }
}
