//! Prometheus remote-write (v1) wire format.
//!
//! A batch is a protobuf `WriteRequest` compressed with the snappy *block*
//! format (not the framed stream format), matching what remote-write
//! receivers expect alongside `Content-Encoding: snappy`.

use bytes::Bytes;
use prost::Message;
use thiserror::Error;

pub const CONTENT_TYPE: &str = "application/x-protobuf";
pub const CONTENT_ENCODING: &str = "snappy";
pub const PROTOCOL_VERSION: &str = "0.1.0";

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("snappy compression failed: {0}")]
    Compress(#[source] snap::Error),
    #[error("snappy decompression failed: {0}")]
    Decompress(#[source] snap::Error),
    #[error("protobuf decode failed: {0}")]
    Decode(#[from] prost::DecodeError),
}

#[derive(Clone, PartialEq, Message)]
pub struct WriteRequest {
    #[prost(message, repeated, tag = "1")]
    pub timeseries: Vec<TimeSeries>,
}

#[derive(Clone, PartialEq, Message)]
pub struct TimeSeries {
    /// Sorted by name; `__name__` carries the metric name.
    #[prost(message, repeated, tag = "1")]
    pub labels: Vec<Label>,
    #[prost(message, repeated, tag = "2")]
    pub samples: Vec<Sample>,
}

#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Message)]
pub struct Label {
    #[prost(string, tag = "1")]
    pub name: String,
    #[prost(string, tag = "2")]
    pub value: String,
}

#[derive(Clone, PartialEq, Message)]
pub struct Sample {
    #[prost(double, tag = "1")]
    pub value: f64,
    /// Milliseconds since the Unix epoch.
    #[prost(int64, tag = "2")]
    pub timestamp: i64,
}

impl Label {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

impl TimeSeries {
    /// Value of the `__name__` label, if present.
    pub fn metric_name(&self) -> Option<&str> {
        self.label_value(super::METRIC_NAME_LABEL)
    }

    pub fn label_value(&self, name: &str) -> Option<&str> {
        self.labels
            .iter()
            .find(|l| l.name == name)
            .map(|l| l.value.as_str())
    }
}

impl WriteRequest {
    pub fn sample_count(&self) -> usize {
        self.timeseries.iter().map(|ts| ts.samples.len()).sum()
    }
}

/// Serialize and snappy-compress a batch.
pub fn encode_write_request(request: &WriteRequest) -> Result<Bytes, CodecError> {
    let raw = request.encode_to_vec();
    let compressed = snap::raw::Encoder::new()
        .compress_vec(&raw)
        .map_err(CodecError::Compress)?;
    Ok(Bytes::from(compressed))
}

/// Inverse of [`encode_write_request`].
pub fn decode_write_request(payload: &[u8]) -> Result<WriteRequest, CodecError> {
    let raw = snap::raw::Decoder::new()
        .decompress_vec(payload)
        .map_err(CodecError::Decompress)?;
    Ok(WriteRequest::decode(raw.as_slice())?)
}
