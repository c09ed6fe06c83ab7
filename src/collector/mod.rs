//! Collectors registered with every exporter's `prometheus::Registry`.
//!
//! Each type implements [`prometheus::core::Collector`], the registry's
//! describe (`desc`) / collect capability, so rosters can mix these with any
//! collector from the prometheus crate.

mod alert;
mod health;
mod identity;
mod test_metrics;

pub use alert::AlertGauge;
pub use health::HealthCollector;
pub use identity::IdentityCollector;
pub use test_metrics::TestMetricsCollector;

/// Constant label identifying series produced by this exporter itself.
pub const WHO_LABEL: (&str, &str) = ("who", "metric-exporter");
