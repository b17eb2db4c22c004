use log::{debug, info, warn};
use std::io::Write;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::error::{Result, RmzError};
use crate::network::codec::encode_to_vec;
use crate::network::core::PacketQueue;
use crate::network::stats::RelayStatistics;
use crate::utils::log_statistics;

/// Configuration for the relay loop.
#[derive(Debug, Clone, Copy)]
pub struct RelayConfig {
    /// Longest single wait on the queue
    pub wait_timeout: Duration,
    /// Interval between statistics log lines, `None` to disable
    pub stats_interval: Option<Duration>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            wait_timeout: Duration::from_secs(1),
            stats_interval: Some(Duration::from_secs(2)),
        }
    }
}

/// Runs the consumer loop until the queue shuts down.
///
/// Waits for data, pops everything available, encodes each packet as a
/// wire record and writes it to `sink`. Packets still queued when the
/// queue shuts down are left for the owner to drain.
///
/// # Arguments
///
/// * `queue` - The queue to consume
/// * `sink` - Where encoded records are written
/// * `statistics` - Shared statistics; delivered records are counted here
/// * `config` - Wait and logging intervals
///
/// # Returns
///
/// * `Ok(u64)` - The number of records delivered
/// * `Err(RmzError)` - If writing to `sink` failed
pub fn run_relay<W: Write>(
    queue: &PacketQueue,
    mut sink: W,
    statistics: &RelayStatistics,
    config: RelayConfig,
) -> Result<u64> {
    let mut delivered_total = 0u64;
    let mut last_log_time = Instant::now();

    info!("Starting packet relay.");

    loop {
        match queue.wait_for_data(Some(config.wait_timeout)) {
            Ok(_) => {}
            Err(RmzError::ShuttingDown) => break,
            Err(e) => return Err(e),
        }

        let mut delivered = 0u64;
        let mut longest_wait = Duration::ZERO;
        while let Some(packet) = queue.pop() {
            longest_wait = longest_wait.max(packet.age());
            let record = match encode_to_vec(&packet) {
                Ok(record) => record,
                Err(e) if e.is_recoverable() => {
                    warn!(
                        "Dropping packet {} of flow {}: {}",
                        packet.serial, packet.flow_id, e
                    );
                    statistics.record_discarded();
                    continue;
                }
                Err(e) => return Err(e),
            };

            sink.write_all(&record)?;
            delivered += 1;
        }

        if delivered > 0 {
            sink.flush()?;
            statistics.record_delivered(delivered);
            delivered_total += delivered;
            debug!(
                "Relayed {} records, longest queued {:?}",
                delivered, longest_wait
            );
        }

        if let Some(interval) = config.stats_interval {
            if last_log_time.elapsed() >= interval {
                log_statistics(&statistics.snapshot(), queue.len());
                last_log_time = Instant::now();
            }
        }
    }

    sink.flush()?;
    debug!("Shutting down packet relay after {} records", delivered_total);
    Ok(delivered_total)
}

/// Runs [`run_relay`] on its own thread.
pub fn spawn_relay<W>(
    queue: Arc<PacketQueue>,
    sink: W,
    statistics: Arc<RelayStatistics>,
    config: RelayConfig,
) -> JoinHandle<Result<u64>>
where
    W: Write + Send + 'static,
{
    thread::spawn(move || run_relay(&queue, sink, &statistics, config))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::codec::RecordReader;
    use crate::network::core::PacketSource;
    use parking_lot::Mutex;

    /// Sink that can be inspected while the relay thread owns a handle.
    #[derive(Clone, Default)]
    struct SharedSink(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedSink {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn quick_config() -> RelayConfig {
        RelayConfig {
            wait_timeout: Duration::from_millis(10),
            stats_interval: None,
        }
    }

    #[test]
    fn test_relay_writes_decodable_records() {
        let queue = Arc::new(PacketQueue::new());
        let statistics = Arc::new(RelayStatistics::new());
        let sink = SharedSink::default();

        let worker = spawn_relay(
            Arc::clone(&queue),
            sink.clone(),
            Arc::clone(&statistics),
            quick_config(),
        );

        queue.push(42, PacketSource::FromClient, b"hello").unwrap();
        queue.push(42, PacketSource::FromServer, b"world").unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        while statistics.snapshot().packets_delivered < 2 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }

        queue.shutdown();
        assert_eq!(worker.join().unwrap().unwrap(), 2);

        let bytes = sink.0.lock().clone();
        let records: Vec<_> = RecordReader::new(&bytes).map(|r| r.unwrap()).collect();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].serial, 0);
        assert_eq!(records[0].payload, b"hello");
        assert_eq!(records[1].source, PacketSource::FromServer);
        assert_eq!(records[1].payload, b"world");
    }

    #[test]
    fn test_relay_stops_on_shutdown_without_consuming() {
        let queue = PacketQueue::new();
        let statistics = RelayStatistics::new();
        queue.shutdown();
        queue.push(1, PacketSource::FromClient, b"x").unwrap();

        let mut sink = Vec::new();
        let delivered = run_relay(&queue, &mut sink, &statistics, quick_config()).unwrap();

        assert_eq!(delivered, 0);
        assert!(sink.is_empty());
        assert_eq!(queue.drain(), 1);
    }

    #[test]
    fn test_relay_reports_write_errors() {
        struct BrokenSink;

        impl Write for BrokenSink {
            fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
                Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "closed"))
            }

            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }

        let queue = PacketQueue::new();
        queue.push(1, PacketSource::FromClient, b"x").unwrap();

        let err = run_relay(&queue, BrokenSink, &RelayStatistics::new(), quick_config())
            .unwrap_err();
        assert!(matches!(err, RmzError::Io(_)));
    }
}
