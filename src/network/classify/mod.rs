//! Classification callouts for the connect and stream layers.

pub mod associator;
pub mod classifier;
pub mod types;

pub use associator::{AcceptAllAssociator, StreamAssociator};
pub use classifier::Classifier;
pub use types::{
    Action, ClassifyOut, FilterFlags, FilterInfo, IncomingMetadata, IncomingValues, Layer,
    NotifyType, Rights, StreamData, StreamFlags,
};
