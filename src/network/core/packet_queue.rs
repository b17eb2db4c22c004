//! Packet queue between classify callbacks and the single consumer.
//!
//! Producers copy the stream bytes, splice the packet onto the tail under a
//! short lock and signal after releasing it. Only the consumer ever blocks,
//! in [`PacketQueue::wait_for_data`].

use log::debug;
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::time::{Duration, Instant};

use crate::error::{Result, RmzError};
use crate::network::core::packet::{Packet, PacketSource};

#[derive(Debug)]
struct QueueState {
    packets: VecDeque<Packet>,
    next_serial: u64,
    shutdown: bool,
}

/// Strict FIFO of intercepted packets with a blocking wait for one reader.
#[derive(Debug)]
pub struct PacketQueue {
    state: Mutex<QueueState>,
    data_ready: Condvar,
    /// Maximum queued packets, 0 for unbounded
    capacity_limit: usize,
}

impl PacketQueue {
    /// Creates an unbounded queue.
    pub fn new() -> Self {
        Self::with_capacity_limit(0)
    }

    /// Creates a queue that refuses pushes beyond `limit` packets.
    ///
    /// A refused push is reported as an allocation failure. `0` means
    /// unbounded.
    pub fn with_capacity_limit(limit: usize) -> Self {
        Self {
            state: Mutex::new(QueueState {
                packets: VecDeque::new(),
                next_serial: 0,
                shutdown: false,
            }),
            data_ready: Condvar::new(),
            capacity_limit: limit,
        }
    }

    /// Copies `payload` into a new packet and appends it to the tail.
    ///
    /// Never blocks beyond the list splice. Still accepted after
    /// [`shutdown`](Self::shutdown); such packets are only reclaimed by
    /// [`drain`](Self::drain).
    ///
    /// # Returns
    ///
    /// * `Ok(serial)` - The serial assigned to the queued packet
    /// * `Err(RmzError::AllocationFailure)` - If the copy or the queue slot could not be allocated
    pub fn push(&self, flow_id: u64, source: PacketSource, payload: &[u8]) -> Result<u64> {
        let mut copy = Vec::new();
        copy.try_reserve_exact(payload.len())
            .map_err(|_| RmzError::allocation("packet payload"))?;
        copy.extend_from_slice(payload);

        let mut packet = Packet::new(flow_id, 0, source, copy);

        let serial = {
            let mut state = self.state.lock();

            if self.capacity_limit != 0 && state.packets.len() >= self.capacity_limit {
                return Err(RmzError::AllocationFailure(format!(
                    "packet queue full ({} packets)",
                    self.capacity_limit
                )));
            }

            state
                .packets
                .try_reserve(1)
                .map_err(|_| RmzError::allocation("packet queue slot"))?;

            let serial = state.next_serial;
            state.next_serial += 1;
            packet.serial = serial;
            state.packets.push_back(packet);
            serial
        };

        self.data_ready.notify_one();
        Ok(serial)
    }

    /// Removes and returns the head packet without blocking.
    pub fn pop(&self) -> Option<Packet> {
        self.state.lock().packets.pop_front()
    }

    /// Blocks until data is queued, `timeout` elapses, or the queue shuts down.
    ///
    /// The result is advisory: the caller must still handle an empty
    /// [`pop`](Self::pop).
    ///
    /// # Returns
    ///
    /// * `Ok(true)` - The queue was non-empty
    /// * `Ok(false)` - The timeout elapsed first
    /// * `Err(RmzError::ShuttingDown)` - The queue was shut down
    ///
    /// A timeout too large to represent as a deadline waits without one.
    pub fn wait_for_data(&self, timeout: Option<Duration>) -> Result<bool> {
        let deadline = timeout.and_then(|t| Instant::now().checked_add(t));
        let mut state = self.state.lock();

        loop {
            if state.shutdown {
                return Err(RmzError::ShuttingDown);
            }
            if !state.packets.is_empty() {
                return Ok(true);
            }

            match deadline {
                Some(deadline) => {
                    if self.data_ready.wait_until(&mut state, deadline).timed_out() {
                        if state.shutdown {
                            return Err(RmzError::ShuttingDown);
                        }
                        return Ok(!state.packets.is_empty());
                    }
                }
                None => self.data_ready.wait(&mut state),
            }
        }
    }

    /// Wakes every waiter and makes all later waits return immediately.
    ///
    /// Queued packets are kept.
    pub fn shutdown(&self) {
        self.state.lock().shutdown = true;
        self.data_ready.notify_all();
        debug!("Packet queue shut down");
    }

    pub fn is_shut_down(&self) -> bool {
        self.state.lock().shutdown
    }

    /// Removes and releases every queued packet.
    ///
    /// # Returns
    ///
    /// The number of packets discarded
    pub fn drain(&self) -> usize {
        let drained = std::mem::take(&mut self.state.lock().packets);
        let count = drained.len();
        drop(drained);

        if count > 0 {
            debug!("Drained {} queued packets", count);
        }
        count
    }

    /// Number of queued packets.
    pub fn len(&self) -> usize {
        self.state.lock().packets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for PacketQueue {
    fn default() -> Self {
        Self::new()
    }
}
