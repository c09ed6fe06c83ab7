pub mod client;
pub mod codec;
pub mod tls;

pub use client::{
    ClientError, DeliveryError, DeliverySnapshot, RemoteClient, RemoteClientConfig, Transport,
};
pub use codec::{CodecError, Label, Sample, TimeSeries, WriteRequest};
pub use codec::{decode_write_request, encode_write_request};
pub use tls::{TlsError, TlsSettings};

/// Reserved label carrying the metric name in every series.
pub const METRIC_NAME_LABEL: &str = "__name__";
