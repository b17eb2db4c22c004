pub mod relay;

pub use relay::{run_relay, spawn_relay, RelayConfig};
