use super::WHO_LABEL;
use prometheus::core::{Collector, Desc};
use prometheus::proto::MetricFamily;
use prometheus::{Gauge, Opts};

/// Diagnostic gauge `test_metrics_<id>` with constant value 1.
///
/// Characters of the id that cannot appear in a metric name are replaced by
/// `_`; an empty id is rejected.
#[derive(Clone)]
pub struct TestMetricsCollector {
    gauge: Gauge,
}

impl TestMetricsCollector {
    pub fn new(id: &str) -> prometheus::Result<Self> {
        let opts = Opts::new(sanitize(id), "test metrics")
            .namespace("test_metrics")
            .const_label(WHO_LABEL.0, WHO_LABEL.1);
        let gauge = Gauge::with_opts(opts)?;
        gauge.set(1.0);
        Ok(Self { gauge })
    }
}

fn sanitize(id: &str) -> String {
    id.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}

impl Collector for TestMetricsCollector {
    fn desc(&self) -> Vec<&Desc> {
        self.gauge.desc()
    }

    fn collect(&self) -> Vec<MetricFamily> {
        self.gauge.collect()
    }
}
