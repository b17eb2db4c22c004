//! Prelude module for convenient imports.
//!
//! This module re-exports commonly used types and traits from the crate,
//! allowing users to import everything they need with a single use statement:
//!
//! ```rust
//! use rmz::prelude::*;
//! ```

// Error handling
pub use crate::error::{Result, RmzError};

// Network core
pub use crate::network::core::{FlowHandle, FlowRegistry, Packet, PacketQueue, PacketSource};
pub use crate::network::{Interceptor, UnloadReport};

// Classification
pub use crate::network::classify::{
    AcceptAllAssociator, Action, Classifier, ClassifyOut, FilterFlags, FilterInfo,
    IncomingMetadata, IncomingValues, Layer, NotifyType, Rights, StreamAssociator, StreamData,
    StreamFlags,
};

// Wire format
pub use crate::network::codec::{decode_record, encode_packet, encode_to_vec, Record, RecordReader};

// Statistics
pub use crate::network::stats::{RelayStatistics, StatisticsSnapshot};

// Settings
pub use crate::settings::RelaySettings;

// Commands
pub use crate::commands::{
    load_script, run_replay, start_relay, stop_relay, ReplayScript, RelayState,
};
