use bytes::Bytes;
use parking_lot::Mutex;
use prometheus::{Gauge, Opts, Registry};
use remote_metrics_exporter::exporter::{ExtraLabels, RemoteWriter, WriterState};
use remote_metrics_exporter::sender::{DeliveryError, Transport, WriteRequest, decode_write_request};
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const INTERVAL: Duration = Duration::from_secs(5);

/// Records every payload and answers with scripted outcomes (success once
/// the script runs out).
#[derive(Clone, Default)]
struct ScriptedTransport {
    payloads: Arc<Mutex<Vec<Bytes>>>,
    script: Arc<Mutex<VecDeque<Option<u16>>>>,
    delay: Option<Duration>,
    completed: Arc<AtomicUsize>,
    successes: Arc<AtomicUsize>,
}

impl ScriptedTransport {
    fn failing_on(calls: &[usize], status: u16, total: usize) -> Self {
        let script = (0..total)
            .map(|i| calls.contains(&i).then_some(status))
            .collect();
        Self {
            script: Arc::new(Mutex::new(script)),
            ..Self::default()
        }
    }

    fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    fn calls(&self) -> usize {
        self.payloads.lock().len()
    }

    fn requests(&self) -> Vec<WriteRequest> {
        self.payloads
            .lock()
            .iter()
            .map(|p| decode_write_request(p).unwrap())
            .collect()
    }
}

impl Transport for ScriptedTransport {
    async fn store(&self, payload: Bytes) -> Result<(), DeliveryError> {
        self.payloads.lock().push(payload);
        let outcome = self.script.lock().pop_front().flatten();

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.completed.fetch_add(1, Ordering::SeqCst);

        match outcome {
            Some(status) => Err(DeliveryError::ServerError {
                status,
                body_excerpt: "unavailable".to_string(),
            }),
            None => {
                self.successes.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        }
    }
}

fn registry_with(name: &str, value: f64) -> Registry {
    let registry = Registry::new();
    let gauge = Gauge::with_opts(Opts::new(name, "test gauge")).unwrap();
    gauge.set(value);
    registry.register(Box::new(gauge)).unwrap();
    registry
}

#[tokio::test(start_paused = true)]
async fn test_first_delivery_after_one_interval() {
    let transport = ScriptedTransport::default();
    let writer = RemoteWriter::new(
        transport.clone(),
        registry_with("my_metric", 1.0),
        INTERVAL,
        ExtraLabels::new().with("client_id", "abc").with("extra", "1"),
    )
    .unwrap();

    let token = CancellationToken::new();
    let handle = writer.run(token.clone());

    tokio::time::sleep(Duration::from_secs(4)).await;
    assert_eq!(transport.calls(), 0);

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(transport.calls(), 1);

    let request = &transport.requests()[0];
    assert_eq!(request.timeseries.len(), 1);
    assert_eq!(request.sample_count(), 1);
    let series = &request.timeseries[0];
    assert_eq!(series.metric_name(), Some("my_metric"));
    assert_eq!(series.samples[0].value, 1.0);
    assert_eq!(series.label_value("client_id"), Some("abc"));
    assert_eq!(series.label_value("extra"), Some("1"));

    handle.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_failed_tick_does_not_stop_loop() {
    let ticks = 4;
    let transport = ScriptedTransport::failing_on(&[1], 503, ticks);
    let writer = RemoteWriter::new(
        transport.clone(),
        registry_with("g", 1.0),
        INTERVAL,
        ExtraLabels::new(),
    )
    .unwrap();

    let handle = writer.run(CancellationToken::new());
    tokio::time::sleep(INTERVAL * ticks as u32 + Duration::from_secs(1)).await;

    assert_eq!(transport.calls(), ticks);
    assert_eq!(transport.completed.load(Ordering::SeqCst), ticks);
    assert_eq!(transport.successes.load(Ordering::SeqCst), ticks - 1);
    assert_eq!(handle.state(), WriterState::Running);
    assert!(!handle.is_finished());

    handle.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_empty_registry_sends_nothing() {
    let transport = ScriptedTransport::default();
    let writer = RemoteWriter::new(
        transport.clone(),
        Registry::new(),
        INTERVAL,
        ExtraLabels::shard(1),
    )
    .unwrap();

    let handle = writer.run(CancellationToken::new());
    tokio::time::sleep(INTERVAL * 3 + Duration::from_secs(1)).await;
    assert_eq!(transport.calls(), 0);

    handle.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_stop_prevents_further_ticks() {
    let transport = ScriptedTransport::default();
    let writer = RemoteWriter::new(
        transport.clone(),
        registry_with("g", 1.0),
        INTERVAL,
        ExtraLabels::new(),
    )
    .unwrap();

    let handle = writer.run(CancellationToken::new());
    tokio::time::sleep(INTERVAL + Duration::from_secs(1)).await;
    assert_eq!(transport.calls(), 1);

    handle.stop();
    handle.stop();
    let mut waited = 0;
    while !handle.is_finished() && waited < 10 {
        tokio::task::yield_now().await;
        waited += 1;
    }
    assert_eq!(handle.state(), WriterState::Stopped);

    tokio::time::sleep(INTERVAL * 3).await;
    assert_eq!(transport.calls(), 1);
    handle.join().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_in_flight_delivery_completes_on_stop() {
    let transport = ScriptedTransport::with_delay(Duration::from_secs(3));
    let writer = RemoteWriter::new(
        transport.clone(),
        registry_with("g", 1.0),
        INTERVAL,
        ExtraLabels::new(),
    )
    .unwrap();

    let token = CancellationToken::new();
    let handle = writer.run(token.clone());

    // Tick starts at 5s and its delivery is still pending at 6s.
    tokio::time::sleep(Duration::from_secs(6)).await;
    assert_eq!(transport.calls(), 1);
    assert_eq!(transport.completed.load(Ordering::SeqCst), 0);

    token.cancel();
    handle.join().await.unwrap();

    assert_eq!(transport.completed.load(Ordering::SeqCst), 1);
    assert_eq!(transport.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_parallel_shards_do_not_collide() {
    let transport = ScriptedTransport::default();
    let token = CancellationToken::new();
    let registry = registry_with("g", 1.0);

    let handles: Vec<_> = (1..=2)
        .map(|shard| {
            let labels = ExtraLabels::shard(shard).with("client_id", "abc");
            RemoteWriter::new(transport.clone(), registry.clone(), INTERVAL, labels)
                .unwrap()
                .run(token.child_token())
        })
        .collect();

    tokio::time::sleep(INTERVAL + Duration::from_secs(1)).await;
    token.cancel();
    for handle in handles {
        handle.join().await.unwrap();
    }

    let mut shards: Vec<String> = transport
        .requests()
        .iter()
        .flat_map(|r| r.timeseries.iter())
        .map(|s| {
            assert_eq!(s.label_value("client_id"), Some("abc"));
            s.label_value("extra").unwrap().to_string()
        })
        .collect();
    shards.sort();
    assert_eq!(shards, ["1", "2"]);
}

#[tokio::test(start_paused = true)]
async fn test_ticks_are_sequential() {
    // Delivery slower than the interval: ticks queue up instead of overlapping.
    let transport = ScriptedTransport::with_delay(Duration::from_secs(7));
    let writer = RemoteWriter::new(
        transport.clone(),
        registry_with("g", 1.0),
        INTERVAL,
        ExtraLabels::new(),
    )
    .unwrap();

    let handle = writer.run(CancellationToken::new());
    tokio::time::sleep(Duration::from_secs(13)).await;

    // One delivery started at 5s, finished at 12s; the next starts at 12s.
    assert_eq!(transport.completed.load(Ordering::SeqCst), 1);
    assert!(transport.calls() <= 2);
    assert_eq!(
        transport.calls() - transport.completed.load(Ordering::SeqCst),
        1
    );

    handle.shutdown().await.unwrap();
}
