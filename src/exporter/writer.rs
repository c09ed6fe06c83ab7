use super::ExporterError;
use super::convert::to_write_request;
use super::labels::ExtraLabels;
use crate::sender::{CodecError, DeliveryError, Transport, WriteRequest, encode_write_request};
use prometheus::Registry;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::{JoinError, JoinHandle};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriterState {
    Idle,
    Running,
    Stopped,
}

/// Result of one successful gather/encode/send cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickReport {
    /// Registry produced no series; nothing was sent.
    Empty,
    Delivered {
        series: usize,
        samples: usize,
        bytes: usize,
    },
}

#[derive(Error, Debug)]
pub enum TickError {
    #[error("failed to encode write request: {0}")]
    Encode(#[from] CodecError),
    #[error(transparent)]
    Delivery(#[from] DeliveryError),
}

/// Periodically gathers a registry and pushes it through a [`Transport`].
pub struct RemoteWriter<T: Transport> {
    transport: T,
    registry: Registry,
    interval: Duration,
    extra_labels: ExtraLabels,
    state: watch::Sender<WriterState>,
}

impl<T: Transport> RemoteWriter<T> {
    pub fn new(
        transport: T,
        registry: Registry,
        interval: Duration,
        extra_labels: ExtraLabels,
    ) -> Result<Self, ExporterError> {
        if interval.is_zero() {
            return Err(ExporterError::InvalidInterval);
        }
        let (state, _) = watch::channel(WriterState::Idle);
        Ok(Self {
            transport,
            registry,
            interval,
            extra_labels,
            state,
        })
    }

    pub fn state(&self) -> WriterState {
        *self.state.borrow()
    }

    /// Gathers the registry and converts it, stamping samples with the
    /// current wall-clock time.
    pub fn snapshot(&self) -> WriteRequest {
        let families = self.registry.gather();
        let now_ms = chrono::Utc::now().timestamp_millis();
        to_write_request(&families, &self.extra_labels, now_ms)
    }

    /// One gather/encode/send cycle.
    pub async fn tick(&self) -> Result<TickReport, TickError> {
        let request = self.snapshot();
        if request.timeseries.is_empty() {
            return Ok(TickReport::Empty);
        }

        let series = request.timeseries.len();
        let samples = request.sample_count();
        let payload = encode_write_request(&request)?;
        let bytes = payload.len();

        self.transport.store(payload).await?;
        Ok(TickReport::Delivered {
            series,
            samples,
            bytes,
        })
    }

    /// Spawns the periodic loop. The first cycle runs one interval after this
    /// call; a cycle in flight when the token is cancelled runs to completion.
    pub fn run(self, token: CancellationToken) -> WriterHandle {
        self.state.send_replace(WriterState::Running);
        let state = self.state.subscribe();
        let loop_token = token.clone();
        let join = tokio::spawn(async move {
            self.run_loop(loop_token).await;
        });

        WriterHandle { token, state, join }
    }

    async fn run_loop(self, token: CancellationToken) {
        let mut ticker = tokio::time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            interval_secs = self.interval.as_secs_f64(),
            labels = ?self.extra_labels,
            "Remote writer started"
        );

        loop {
            tokio::select! {
                biased;
                () = token.cancelled() => break,
                _ = ticker.tick() => {}
            }

            match self.tick().await {
                Ok(TickReport::Empty) => debug!("Registry empty, skipping write"),
                Ok(TickReport::Delivered {
                    series,
                    samples,
                    bytes,
                }) => debug!(series, samples, bytes, "Write request delivered"),
                Err(TickError::Delivery(e)) if e.is_retryable() => {
                    warn!(error = %e, "Remote write failed, retrying on next tick");
                }
                Err(e) => error!(error = %e, "Remote write failed"),
            }
        }

        self.state.send_replace(WriterState::Stopped);
        info!(labels = ?self.extra_labels, "Remote writer stopped");
    }
}

/// Control handle for a running writer.
#[derive(Debug)]
pub struct WriterHandle {
    token: CancellationToken,
    state: watch::Receiver<WriterState>,
    join: JoinHandle<()>,
}

impl WriterHandle {
    /// Requests the loop to exit; idempotent.
    pub fn stop(&self) {
        self.token.cancel();
    }

    pub fn state(&self) -> WriterState {
        *self.state.borrow()
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Waits for the loop task to exit.
    pub async fn join(self) -> Result<(), JoinError> {
        self.join.await
    }

    pub async fn shutdown(self) -> Result<(), JoinError> {
        self.stop();
        self.join().await
    }
}
