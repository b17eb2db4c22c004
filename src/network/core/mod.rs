//! Core interception state.
//!
//! This module contains the flow registry, the packet queue shared between
//! classify callbacks and the consumer, and the packet type they exchange.

pub mod flow_registry;
pub mod packet;
pub mod packet_queue;

// Re-export commonly used types
pub use flow_registry::{FlowHandle, FlowRegistry};
pub use packet::{Packet, PacketSource};
pub use packet_queue::PacketQueue;
