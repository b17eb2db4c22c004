//! Seam to the network stack's flow-context association facility.

use log::debug;

use crate::error::Result;
use crate::network::classify::types::Layer;

/// Subscribes flows to stream-layer classify events.
///
/// Implementations wrap whatever the host stack provides for attaching a
/// context to a flow at a given layer. Both calls may run on any CPU and
/// must not block.
///
/// # Example
///
/// ```rust
/// use rmz::error::Result;
/// use rmz::network::classify::{Layer, StreamAssociator};
///
/// struct Loopback;
///
/// impl StreamAssociator for Loopback {
///     fn associate(&self, _flow: u64, _layer: Layer, _callout: u32, _ctx: u64) -> Result<()> {
///         Ok(())
///     }
///
///     fn deassociate(&self, _flow: u64, _callout: u32) -> Result<()> {
///         Ok(())
///     }
/// }
/// ```
pub trait StreamAssociator: Send + Sync {
    /// Attaches `context` to the flow so that `callout_id` sees its stream data.
    ///
    /// Failures are reported as [`RmzError::AssociationFailure`](crate::error::RmzError).
    fn associate(&self, flow_handle: u64, layer: Layer, callout_id: u32, context: u64)
        -> Result<()>;

    /// Detaches the flow's context from every layer `callout_id` is
    /// associated at; the stack then reports a flow delete.
    fn deassociate(&self, flow_handle: u64, callout_id: u32) -> Result<()>;
}

/// Associator that accepts every request.
///
/// Used when events are replayed without a live network stack.
#[derive(Debug, Default, Clone, Copy)]
pub struct AcceptAllAssociator;

impl StreamAssociator for AcceptAllAssociator {
    fn associate(
        &self,
        flow_handle: u64,
        layer: Layer,
        callout_id: u32,
        _context: u64,
    ) -> Result<()> {
        debug!(
            "Associated flow {} with {:?} for callout {}",
            flow_handle, layer, callout_id
        );
        Ok(())
    }

    fn deassociate(&self, flow_handle: u64, callout_id: u32) -> Result<()> {
        debug!(
            "Deassociated flow {} from callout {}",
            flow_handle, callout_id
        );
        Ok(())
    }
}
