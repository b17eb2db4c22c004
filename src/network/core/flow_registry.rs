//! Flow registry for intercepted connections.
//!
//! Maps the network stack's opaque flow id to the stream callout that owns
//! the flow's association. Every operation takes one short lock and never
//! blocks while holding it, so it is safe to call from classify callbacks on
//! any number of CPUs.

use log::debug;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::{Result, RmzError};

/// Handle to a registered flow.
///
/// The token identifies this particular registration, so a handle that
/// outlives its flow never removes a later flow that reused the same id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FlowHandle {
    pub flow_id: u64,
    pub callout_id: u32,
    token: u64,
}

impl FlowHandle {
    /// Registration token, unique within one registry.
    pub fn token(&self) -> u64 {
        self.token
    }
}

#[derive(Debug, Clone, Copy)]
struct FlowEntry {
    callout_id: u32,
    token: u64,
}

/// Tracks active flows by id.
#[derive(Debug)]
pub struct FlowRegistry {
    flows: Mutex<HashMap<u64, FlowEntry>>,
    next_token: AtomicU64,
}

impl FlowRegistry {
    pub fn new() -> Self {
        Self {
            flows: Mutex::new(HashMap::new()),
            next_token: AtomicU64::new(1),
        }
    }

    /// Registers a flow.
    ///
    /// # Returns
    ///
    /// * `Ok(FlowHandle)` - The handle for the new entry
    /// * `Err(RmzError::DuplicateFlow)` - If `flow_id` is already tracked
    /// * `Err(RmzError::AllocationFailure)` - If the map could not grow
    pub fn add_flow(&self, flow_id: u64, callout_id: u32) -> Result<FlowHandle> {
        let token = self.next_token.fetch_add(1, Ordering::Relaxed);
        let mut flows = self.flows.lock();

        if flows.contains_key(&flow_id) {
            return Err(RmzError::DuplicateFlow(flow_id));
        }

        flows
            .try_reserve(1)
            .map_err(|_| RmzError::allocation("flow entry"))?;
        flows.insert(flow_id, FlowEntry { callout_id, token });
        drop(flows);

        debug!("Flow {} registered for callout {}", flow_id, callout_id);
        Ok(FlowHandle {
            flow_id,
            callout_id,
            token,
        })
    }

    /// Removes the entry a handle refers to.
    ///
    /// Removing an entry that is already gone is a no-op.
    ///
    /// # Returns
    ///
    /// `true` if this call removed the entry
    pub fn remove_flow(&self, handle: &FlowHandle) -> bool {
        let mut flows = self.flows.lock();

        let matches = flows
            .get(&handle.flow_id)
            .is_some_and(|entry| entry.token == handle.token);

        if matches {
            flows.remove(&handle.flow_id);
        }
        drop(flows);

        if matches {
            debug!("Flow {} removed", handle.flow_id);
        }
        matches
    }

    /// Looks up a flow by id.
    pub fn find_flow(&self, flow_id: u64) -> Option<FlowHandle> {
        self.flows.lock().get(&flow_id).map(|entry| FlowHandle {
            flow_id,
            callout_id: entry.callout_id,
            token: entry.token,
        })
    }

    /// Returns whether a flow is tracked.
    pub fn contains(&self, flow_id: u64) -> bool {
        self.flows.lock().contains_key(&flow_id)
    }

    /// Number of tracked flows.
    pub fn len(&self) -> usize {
        self.flows.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of every tracked flow.
    pub fn flows(&self) -> Vec<FlowHandle> {
        self.flows
            .lock()
            .iter()
            .map(|(&flow_id, entry)| FlowHandle {
                flow_id,
                callout_id: entry.callout_id,
                token: entry.token,
            })
            .collect()
    }

    /// Removes every flow and returns the handles that were removed.
    pub fn clear(&self) -> Vec<FlowHandle> {
        let drained: Vec<(u64, FlowEntry)> = self.flows.lock().drain().collect();

        drained
            .into_iter()
            .map(|(flow_id, entry)| FlowHandle {
                flow_id,
                callout_id: entry.callout_id,
                token: entry.token,
            })
            .collect()
    }
}

impl Default for FlowRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_add_and_find() {
        let registry = FlowRegistry::new();
        let handle = registry.add_flow(42, 7).unwrap();

        assert_eq!(handle.flow_id, 42);
        assert_eq!(handle.callout_id, 7);
        assert_eq!(registry.find_flow(42), Some(handle));
        assert!(registry.find_flow(43).is_none());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_duplicate_flow_rejected() {
        let registry = FlowRegistry::new();
        registry.add_flow(42, 7).unwrap();

        let err = registry.add_flow(42, 9).unwrap_err();
        assert!(matches!(err, RmzError::DuplicateFlow(42)));

        // The original entry is untouched
        assert_eq!(registry.find_flow(42).unwrap().callout_id, 7);
    }

    #[test]
    fn test_remove_is_idempotent() {
        let registry = FlowRegistry::new();
        let handle = registry.add_flow(42, 7).unwrap();

        assert!(registry.remove_flow(&handle));
        assert!(!registry.remove_flow(&handle));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_stale_handle_does_not_remove_reused_id() {
        let registry = FlowRegistry::new();
        let old = registry.add_flow(42, 7).unwrap();
        assert!(registry.remove_flow(&old));

        let new = registry.add_flow(42, 7).unwrap();
        assert_ne!(old.token(), new.token());

        assert!(!registry.remove_flow(&old));
        assert_eq!(registry.find_flow(42), Some(new));
    }

    #[test]
    fn test_clear_returns_removed_flows() {
        let registry = FlowRegistry::new();
        registry.add_flow(1, 7).unwrap();
        registry.add_flow(2, 7).unwrap();

        let mut removed: Vec<u64> = registry.clear().iter().map(|h| h.flow_id).collect();
        removed.sort_unstable();

        assert_eq!(removed, vec![1, 2]);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_concurrent_add_remove() {
        let registry = Arc::new(FlowRegistry::new());

        let workers: Vec<_> = (0..8u64)
            .map(|t| {
                let registry = Arc::clone(&registry);
                thread::spawn(move || {
                    for i in 0..500u64 {
                        let id = t * 1_000 + i;
                        let handle = registry.add_flow(id, 7).unwrap();
                        if i % 2 == 0 {
                            assert!(registry.remove_flow(&handle));
                            assert!(!registry.remove_flow(&handle));
                        }
                    }
                })
            })
            .collect();

        for worker in workers {
            worker.join().unwrap();
        }

        assert_eq!(registry.len(), 8 * 250);
    }
}
