use prometheus::core::{Collector, Desc};
use prometheus::proto::MetricFamily;
use prometheus::{Gauge, Opts};

/// `exporter_info{client_id="..."} 1`, exposing the resolved identity as a
/// series of its own.
#[derive(Clone)]
pub struct IdentityCollector {
    info: Gauge,
}

impl IdentityCollector {
    pub fn new(client_id: &str) -> prometheus::Result<Self> {
        let opts = Opts::new("exporter_info", "Identity the metrics exporter reports as.")
            .const_label("client_id", client_id)
            .const_label("version", crate::VERSION);
        let info = Gauge::with_opts(opts)?;
        info.set(1.0);
        Ok(Self { info })
    }
}

impl Collector for IdentityCollector {
    fn desc(&self) -> Vec<&Desc> {
        self.info.desc()
    }

    fn collect(&self) -> Vec<MetricFamily> {
        self.info.collect()
    }
}
