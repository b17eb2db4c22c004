//! Classification decisions for the connect and stream layers.
//!
//! A connection is observed once at the flow-established layer, where it is
//! registered and subscribed to stream data. Stream data is then blocked by
//! default and copied onto the packet queue; whoever consumes the queue is
//! responsible for eventually letting the bytes through. None of these
//! callbacks block, and none of them fail the network stack's call.

use log::{debug, info, warn};
use std::sync::Arc;

use crate::error::Result;
use crate::network::classify::associator::StreamAssociator;
use crate::network::classify::types::{
    Action, ClassifyOut, FilterFlags, FilterInfo, IncomingMetadata, IncomingValues, Layer,
    NotifyType, Rights, StreamData,
};
use crate::network::core::{FlowRegistry, PacketQueue, PacketSource};
use crate::network::stats::RelayStatistics;

/// Per-event decision logic shared by the connect and stream callouts.
pub struct Classifier {
    registry: Arc<FlowRegistry>,
    queue: Arc<PacketQueue>,
    associator: Arc<dyn StreamAssociator>,
    statistics: Arc<RelayStatistics>,
    /// Callout that receives stream data for associated flows
    stream_callout_id: u32,
    /// Queue an empty NewConnection record when a flow is associated
    announce_connections: bool,
}

impl Classifier {
    pub fn new(
        registry: Arc<FlowRegistry>,
        queue: Arc<PacketQueue>,
        associator: Arc<dyn StreamAssociator>,
        statistics: Arc<RelayStatistics>,
        stream_callout_id: u32,
    ) -> Self {
        Self {
            registry,
            queue,
            associator,
            statistics,
            stream_callout_id,
            announce_connections: false,
        }
    }

    /// Sets whether new associations are announced to the consumer.
    pub fn announce_connections(mut self, announce: bool) -> Self {
        self.announce_connections = announce;
        self
    }

    pub fn stream_callout_id(&self) -> u32 {
        self.stream_callout_id
    }

    /// Handles a connect-layer classify call.
    ///
    /// `out` is always set to permit before returning, including on error.
    ///
    /// # Returns
    ///
    /// * `Ok(())` - The flow was associated, or association failed and the flow is left alone
    /// * `Err(RmzError::DuplicateFlow)` - The stack reported a flow id that is already tracked
    pub fn classify_connect(
        &self,
        fixed: &IncomingValues,
        meta: &IncomingMetadata,
        filter: &FilterInfo,
        out: &mut ClassifyOut,
    ) -> Result<()> {
        self.statistics.record_connect();

        if filter.flags.contains(FilterFlags::CLEAR_ACTION_RIGHT) {
            out.rights.remove(Rights::ACTION_WRITE);
        }
        out.action = Action::Permit;

        let Some(stream_layer) = fixed.layer.stream_layer() else {
            return Ok(());
        };

        let flow_id = meta.flow_handle;
        let handle = match self.registry.add_flow(flow_id, self.stream_callout_id) {
            Ok(handle) => handle,
            Err(e) if e.is_recoverable() => {
                warn!("Flow {} will not be intercepted: {}", flow_id, e);
                self.statistics.record_association(false);
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        if let Err(e) =
            self.associator
                .associate(flow_id, stream_layer, self.stream_callout_id, flow_id)
        {
            warn!("Flow {} will not be intercepted: {}", flow_id, e);
            self.registry.remove_flow(&handle);
            self.statistics.record_association(false);
            return Ok(());
        }

        self.statistics.record_association(true);
        debug!("Flow {} associated with {:?}", flow_id, stream_layer);

        if self.announce_connections {
            match self.queue.push(flow_id, PacketSource::NewConnection, &[]) {
                Ok(_) => self.statistics.record_queued(),
                Err(e) => {
                    debug!("Connection announcement for flow {} dropped: {}", flow_id, e);
                    self.statistics.record_dropped();
                }
            }
        }

        Ok(())
    }

    /// Handles a stream-layer classify call.
    ///
    /// Blocks by default. Disconnecting streams, unknown flows and chunks
    /// that could not be queued are permitted; everything else is queued and
    /// stays blocked.
    ///
    /// The registry check and the push take separate locks. A flow-delete
    /// landing between them leaves that one chunk queued for a flow that is
    /// no longer tracked, so consumers must accept records for flows they
    /// have already seen end.
    pub fn classify_stream(
        &self,
        fixed: &IncomingValues,
        layer_data: Option<&StreamData<'_>>,
        flow_context: u64,
        out: &mut ClassifyOut,
    ) {
        out.action = Action::Block;

        let Some(stream) = layer_data else {
            self.statistics.record_stream_decision(false);
            return;
        };

        if !fixed.layer.is_stream() {
            self.statistics.record_stream_decision(false);
            return;
        }

        if stream.flags.is_disconnect() {
            out.action = Action::Permit;
            self.statistics.record_stream_decision(true);
            return;
        }

        if !self.registry.contains(flow_context) {
            debug!(
                "Dropping {} bytes for untracked flow {}",
                stream.data.len(),
                flow_context
            );
            self.statistics.record_dropped();
            out.action = Action::Permit;
            self.statistics.record_stream_decision(true);
            return;
        }

        match self
            .queue
            .push(flow_context, stream.flags.source(), stream.data)
        {
            Ok(serial) => {
                debug!(
                    "Queued {} bytes for flow {} as serial {}",
                    stream.data.len(),
                    flow_context,
                    serial
                );
                self.statistics.record_queued();
                self.statistics.record_stream_decision(false);
            }
            Err(e) => {
                debug!("Dropping packet for flow {}: {}", flow_context, e);
                self.statistics.record_dropped();
                out.action = Action::Permit;
                self.statistics.record_stream_decision(true);
            }
        }
    }

    /// Handles the stack's notification that a flow has ended.
    ///
    /// Only removes the entry if it belongs to `callout_id`; anything else
    /// is a no-op.
    ///
    /// # Returns
    ///
    /// `true` if a registry entry was removed
    pub fn flow_delete(&self, layer: Layer, callout_id: u32, flow_context: u64) -> bool {
        let Some(handle) = self.registry.find_flow(flow_context) else {
            debug!("Flow delete for untracked flow {}", flow_context);
            return false;
        };

        if handle.callout_id != callout_id {
            debug!(
                "Flow delete for flow {} on {:?} from callout {} ignored, owned by {}",
                flow_context, layer, callout_id, handle.callout_id
            );
            return false;
        }

        let removed = self.registry.remove_flow(&handle);
        if removed {
            self.statistics.record_flow_removed();
            debug!("Flow {} deleted", flow_context);
        }
        removed
    }

    /// Handles filter add/delete notifications. Always succeeds.
    pub fn notify(&self, kind: NotifyType, filter: &FilterInfo) {
        match kind {
            NotifyType::AddFilter => info!("Filter added {}", filter.filter_id),
            NotifyType::DeleteFilter => info!("Filter deleted {}", filter.filter_id),
            NotifyType::Other(code) => info!("Unknown notify type {}", code),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RmzError;
    use crate::network::classify::types::StreamFlags;
    use parking_lot::Mutex;

    const STREAM_CALLOUT: u32 = 7;

    #[derive(Default)]
    struct RecordingAssociator {
        fail: bool,
        calls: Mutex<Vec<(u64, Layer, u32, u64)>>,
    }

    impl StreamAssociator for RecordingAssociator {
        fn associate(
            &self,
            flow_handle: u64,
            layer: Layer,
            callout_id: u32,
            context: u64,
        ) -> Result<()> {
            if self.fail {
                return Err(RmzError::association(flow_handle, "layer refused"));
            }
            self.calls
                .lock()
                .push((flow_handle, layer, callout_id, context));
            Ok(())
        }

        fn deassociate(&self, _flow_handle: u64, _callout_id: u32) -> Result<()> {
            Ok(())
        }
    }

    struct Fixture {
        registry: Arc<FlowRegistry>,
        queue: Arc<PacketQueue>,
        statistics: Arc<RelayStatistics>,
        associator: Arc<RecordingAssociator>,
        classifier: Classifier,
    }

    fn fixture_with(associator: RecordingAssociator, queue: PacketQueue) -> Fixture {
        let registry = Arc::new(FlowRegistry::new());
        let queue = Arc::new(queue);
        let statistics = Arc::new(RelayStatistics::new());
        let associator = Arc::new(associator);
        let classifier = Classifier::new(
            Arc::clone(&registry),
            Arc::clone(&queue),
            associator.clone(),
            Arc::clone(&statistics),
            STREAM_CALLOUT,
        );

        Fixture {
            registry,
            queue,
            statistics,
            associator,
            classifier,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(RecordingAssociator::default(), PacketQueue::new())
    }

    fn connect(classifier: &Classifier, flow_id: u64) -> (Result<()>, ClassifyOut) {
        let mut out = ClassifyOut::default();
        let result = classifier.classify_connect(
            &IncomingValues {
                layer: Layer::AleFlowEstablishedV4,
            },
            &IncomingMetadata {
                flow_handle: flow_id,
            },
            &FilterInfo::default(),
            &mut out,
        );
        (result, out)
    }

    fn stream(classifier: &Classifier, flow_id: u64, flags: StreamFlags, data: &[u8]) -> Action {
        let mut out = ClassifyOut::default();
        classifier.classify_stream(
            &IncomingValues {
                layer: Layer::StreamV4,
            },
            Some(&StreamData::new(flags, data)),
            flow_id,
            &mut out,
        );
        out.action
    }

    #[test]
    fn test_connect_associates_flow() {
        let f = fixture();
        let (result, out) = connect(&f.classifier, 42);

        assert!(result.is_ok());
        assert_eq!(out.action, Action::Permit);
        assert!(out.rights.contains(Rights::ACTION_WRITE));
        assert_eq!(f.registry.find_flow(42).unwrap().callout_id, STREAM_CALLOUT);
        assert_eq!(
            f.associator.calls.lock()[..],
            [(42, Layer::StreamV4, STREAM_CALLOUT, 42)]
        );
        assert!(f.queue.is_empty());
    }

    #[test]
    fn test_connect_clears_action_right() {
        let f = fixture();
        let mut out = ClassifyOut::default();
        let filter = FilterInfo {
            filter_id: 3,
            flags: FilterFlags::CLEAR_ACTION_RIGHT,
        };

        f.classifier
            .classify_connect(
                &IncomingValues {
                    layer: Layer::AleFlowEstablishedV6,
                },
                &IncomingMetadata { flow_handle: 9 },
                &filter,
                &mut out,
            )
            .unwrap();

        assert_eq!(out.action, Action::Permit);
        assert!(!out.rights.contains(Rights::ACTION_WRITE));
        assert_eq!(f.associator.calls.lock()[0].1, Layer::StreamV6);
    }

    #[test]
    fn test_connect_on_other_layer_only_permits() {
        let f = fixture();
        let mut out = ClassifyOut::default();

        f.classifier
            .classify_connect(
                &IncomingValues {
                    layer: Layer::Other(12),
                },
                &IncomingMetadata { flow_handle: 42 },
                &FilterInfo::default(),
                &mut out,
            )
            .unwrap();

        assert_eq!(out.action, Action::Permit);
        assert!(f.registry.is_empty());
    }

    #[test]
    fn test_association_failure_rolls_back() {
        let f = fixture_with(
            RecordingAssociator {
                fail: true,
                ..Default::default()
            },
            PacketQueue::new(),
        );

        let (result, out) = connect(&f.classifier, 42);
        assert!(result.is_ok());
        assert_eq!(out.action, Action::Permit);
        assert!(f.registry.find_flow(42).is_none());
        assert_eq!(f.statistics.snapshot().association_failures, 1);

        // The flow is simply not intercepted
        assert_eq!(stream(&f.classifier, 42, StreamFlags::SEND, b"x"), Action::Permit);
        assert!(f.queue.is_empty());
    }

    #[test]
    fn test_duplicate_connect_is_surfaced() {
        let f = fixture();
        connect(&f.classifier, 42).0.unwrap();

        let (result, out) = connect(&f.classifier, 42);
        assert!(matches!(result, Err(RmzError::DuplicateFlow(42))));
        assert_eq!(out.action, Action::Permit);
        assert_eq!(f.registry.len(), 1);
    }

    #[test]
    fn test_flow_lifecycle_scenario() {
        let f = fixture();

        connect(&f.classifier, 42).0.unwrap();
        assert_eq!(f.registry.find_flow(42).unwrap().callout_id, 7);

        let action = stream(&f.classifier, 42, StreamFlags::SEND, b"hello");
        assert_eq!(action, Action::Block);

        let packet = f.queue.pop().unwrap();
        assert_eq!(packet.flow_id, 42);
        assert_eq!(packet.source, PacketSource::FromClient);
        assert_eq!(packet.payload, b"hello");
        assert!(f.queue.pop().is_none());

        assert!(f.classifier.flow_delete(Layer::StreamV4, STREAM_CALLOUT, 42));
        assert!(f.registry.find_flow(42).is_none());

        // Stray data after teardown is dropped and let through
        let action = stream(&f.classifier, 42, StreamFlags::SEND, b"late");
        assert_eq!(action, Action::Permit);
        assert!(f.queue.is_empty());

        // A second delete is harmless
        assert!(!f.classifier.flow_delete(Layer::StreamV4, STREAM_CALLOUT, 42));
    }

    #[test]
    fn test_receive_direction_is_from_server() {
        let f = fixture();
        connect(&f.classifier, 5).0.unwrap();

        stream(&f.classifier, 5, StreamFlags::RECEIVE, b"reply");
        assert_eq!(f.queue.pop().unwrap().source, PacketSource::FromServer);
    }

    #[test]
    fn test_disconnect_permits_without_queueing() {
        let f = fixture();
        connect(&f.classifier, 42).0.unwrap();

        let action = stream(
            &f.classifier,
            42,
            StreamFlags::SEND | StreamFlags::SEND_DISCONNECT,
            b"",
        );
        assert_eq!(action, Action::Permit);

        let action = stream(
            &f.classifier,
            42,
            StreamFlags::RECEIVE | StreamFlags::RECEIVE_DISCONNECT,
            b"bye",
        );
        assert_eq!(action, Action::Permit);
        assert!(f.queue.is_empty());
    }

    #[test]
    fn test_missing_layer_data_blocks() {
        let f = fixture();
        connect(&f.classifier, 42).0.unwrap();

        let mut out = ClassifyOut::default();
        f.classifier.classify_stream(
            &IncomingValues {
                layer: Layer::StreamV4,
            },
            None,
            42,
            &mut out,
        );

        assert_eq!(out.action, Action::Block);
        assert!(f.queue.is_empty());

        f.classifier.classify_stream(
            &IncomingValues {
                layer: Layer::Other(20),
            },
            Some(&StreamData::new(StreamFlags::SEND, b"x")),
            42,
            &mut out,
        );

        assert_eq!(out.action, Action::Block);
        assert!(f.queue.is_empty());

        let snap = f.statistics.snapshot();
        assert_eq!(snap.stream_blocked, 2);
        assert_eq!(snap.packets_queued, 0);
    }

    #[test]
    fn test_chunk_queued_before_delete_survives() {
        let f = fixture();
        connect(&f.classifier, 42).0.unwrap();

        assert_eq!(stream(&f.classifier, 42, StreamFlags::SEND, b"last"), Action::Block);
        assert!(f.classifier.flow_delete(Layer::StreamV4, STREAM_CALLOUT, 42));

        // Already-queued data is still handed to the consumer
        let packet = f.queue.pop().unwrap();
        assert_eq!(packet.flow_id, 42);
        assert_eq!(packet.payload, b"last");
        assert!(!f.registry.contains(42));
    }

    #[test]
    fn test_push_failure_permits() {
        let f = fixture_with(
            RecordingAssociator::default(),
            PacketQueue::with_capacity_limit(1),
        );
        connect(&f.classifier, 42).0.unwrap();

        assert_eq!(stream(&f.classifier, 42, StreamFlags::SEND, b"a"), Action::Block);
        assert_eq!(stream(&f.classifier, 42, StreamFlags::SEND, b"b"), Action::Permit);
        assert_eq!(f.queue.len(), 1);
        assert_eq!(f.statistics.snapshot().packets_dropped, 1);
    }

    #[test]
    fn test_flow_delete_from_foreign_callout_ignored() {
        let f = fixture();
        connect(&f.classifier, 42).0.unwrap();

        assert!(!f.classifier.flow_delete(Layer::StreamV4, STREAM_CALLOUT + 1, 42));
        assert!(f.registry.find_flow(42).is_some());
    }

    #[test]
    fn test_announce_connections() {
        let registry = Arc::new(FlowRegistry::new());
        let queue = Arc::new(PacketQueue::new());
        let classifier = Classifier::new(
            Arc::clone(&registry),
            Arc::clone(&queue),
            Arc::new(RecordingAssociator::default()),
            Arc::new(RelayStatistics::new()),
            STREAM_CALLOUT,
        )
        .announce_connections(true);

        connect(&classifier, 42).0.unwrap();

        let packet = queue.pop().unwrap();
        assert_eq!(packet.flow_id, 42);
        assert_eq!(packet.source, PacketSource::NewConnection);
        assert!(packet.payload.is_empty());
    }
}
