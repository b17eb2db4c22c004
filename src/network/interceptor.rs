//! Interception context.
//!
//! Owns the flow registry, the packet queue and the classifier for one
//! load/unload cycle of the interception layer. Created once at startup and
//! handed to whatever glues the classify callbacks and the consumer to it.

use log::{info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::network::classify::{Classifier, StreamAssociator};
use crate::network::core::{FlowRegistry, PacketQueue};
use crate::network::stats::RelayStatistics;
use crate::settings::RelaySettings;

/// What [`Interceptor::unload`] released.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct UnloadReport {
    /// Flows removed from the registry
    pub flows_removed: usize,
    /// Flows whose deassociation the stack refused
    pub deassociation_failures: usize,
    /// Queued packets discarded
    pub packets_drained: usize,
}

pub struct Interceptor {
    registry: Arc<FlowRegistry>,
    queue: Arc<PacketQueue>,
    associator: Arc<dyn StreamAssociator>,
    statistics: Arc<RelayStatistics>,
    classifier: Classifier,
    unloaded: AtomicBool,
}

impl Interceptor {
    pub fn new(settings: &RelaySettings, associator: Arc<dyn StreamAssociator>) -> Self {
        let registry = Arc::new(FlowRegistry::new());
        let queue = Arc::new(PacketQueue::with_capacity_limit(
            settings.max_queued_packets,
        ));
        let statistics = Arc::new(RelayStatistics::new());

        let classifier = Classifier::new(
            Arc::clone(&registry),
            Arc::clone(&queue),
            Arc::clone(&associator),
            Arc::clone(&statistics),
            settings.stream_callout_id,
        )
        .announce_connections(settings.announce_connections);

        info!(
            "Interceptor initialized (stream callout {}, queue limit {})",
            settings.stream_callout_id,
            match settings.max_queued_packets {
                0 => "unbounded".to_string(),
                n => n.to_string(),
            }
        );

        Self {
            registry,
            queue,
            associator,
            statistics,
            classifier,
            unloaded: AtomicBool::new(false),
        }
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    pub fn queue(&self) -> &Arc<PacketQueue> {
        &self.queue
    }

    pub fn registry(&self) -> &Arc<FlowRegistry> {
        &self.registry
    }

    pub fn statistics(&self) -> &Arc<RelayStatistics> {
        &self.statistics
    }

    pub fn is_unloaded(&self) -> bool {
        self.unloaded.load(Ordering::SeqCst)
    }

    /// Wakes the consumer and stops further waits.
    ///
    /// Queued packets are kept; producers may keep pushing.
    pub fn shutdown(&self) {
        self.queue.shutdown();
    }

    /// Tears the context down.
    ///
    /// Shuts the queue down, deassociates and removes every flow, then
    /// drains the queue. The caller must have stopped the classify
    /// callbacks first. Only the first call does anything.
    pub fn unload(&self) -> UnloadReport {
        if self.unloaded.swap(true, Ordering::SeqCst) {
            return UnloadReport::default();
        }

        self.queue.shutdown();

        let mut report = UnloadReport::default();
        for handle in self.registry.clear() {
            if let Err(e) = self
                .associator
                .deassociate(handle.flow_id, handle.callout_id)
            {
                warn!("Failed to deassociate flow {}: {}", handle.flow_id, e);
                report.deassociation_failures += 1;
            }
            self.statistics.record_flow_removed();
            report.flows_removed += 1;
        }

        report.packets_drained = self.queue.drain();

        info!(
            "Interceptor unloaded: {} flows removed, {} packets discarded",
            report.flows_removed, report.packets_drained
        );
        report
    }
}

impl Drop for Interceptor {
    fn drop(&mut self) {
        self.unload();
    }
}
