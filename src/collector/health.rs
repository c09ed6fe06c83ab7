use super::WHO_LABEL;
use prometheus::core::{Collector, Desc};
use prometheus::proto::MetricFamily;
use prometheus::{Gauge, Opts};

/// `up` gauge, constant 1 while the process runs.
#[derive(Clone)]
pub struct HealthCollector {
    up: Gauge,
}

impl HealthCollector {
    pub fn new() -> prometheus::Result<Self> {
        let opts = Opts::new("up", "Is metrics exporter is running.")
            .const_label("version", crate::VERSION)
            .const_label(WHO_LABEL.0, WHO_LABEL.1);
        let up = Gauge::with_opts(opts)?;
        up.set(1.0);
        Ok(Self { up })
    }
}

impl Collector for HealthCollector {
    fn desc(&self) -> Vec<&Desc> {
        self.up.desc()
    }

    fn collect(&self) -> Vec<MetricFamily> {
        self.up.collect()
    }
}
