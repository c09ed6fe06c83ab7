#![deny(rust_2024_compatibility)]
// Specific pedantic lints enforced (not blanket allow):
#![deny(
    clippy::explicit_iter_loop,
    clippy::manual_let_else,
    clippy::semicolon_if_nothing_returned,
    clippy::inconsistent_struct_constructor
)]
// Noisy pedantic lints suppressed with justification:
#![allow(
    clippy::cast_possible_truncation, // Durations and millisecond timestamps fit comfortably
    clippy::cast_precision_loss,      // Acceptable for metrics/display
    clippy::missing_errors_doc,       // Internal API
    clippy::missing_panics_doc,       // Internal API
    clippy::module_name_repetitions,  // e.g. ExporterError in exporter module
    clippy::must_use_candidate,       // Annotated selectively on critical APIs
    clippy::doc_markdown              // Internal API
)]

pub mod app;
pub mod collector;
pub mod exporter;
pub mod identity;
pub mod sender;

// Re-export main types for easy access
pub use app::{App, ExporterConfig};
pub use exporter::{MetricsExporter, RemoteWriter, WriterHandle};
pub use identity::Identity;
pub use sender::{DeliveryError, RemoteClient};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
