//! Command handlers.
//!
//! Relay lifecycle (start, stop, status) and the scripted replay driver,
//! organized into submodules by functionality.

pub mod replay;
pub mod start;
pub mod state;
pub mod status;
pub mod stop;

pub use replay::{load_script, parse_script, run_replay, ReplayEvent, ReplayReport, ReplayScript};
pub use start::start_relay;
pub use state::RelayState;
pub use status::{get_status, RelayStatus};
pub use stop::{stop_relay, wait_for_idle, StopReport};
