//! Process-wide guard making the assistant connection a singleton resource.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::errors::bridge_error::{BridgeError, BridgeResult};

/// Shared occupancy flag for the assistant connection.
///
/// Cloning shares the same flag. A channel holds the [`SlotGuard`] for as long
/// as its connection is open.
#[derive(Debug, Clone, Default)]
pub struct AssistantSlot {
    occupied: Arc<AtomicBool>,
}

impl AssistantSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the slot, failing with `AlreadyConnected` while another guard
    /// is alive.
    pub fn try_acquire(&self) -> BridgeResult<SlotGuard> {
        self.occupied
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| BridgeError::AlreadyConnected)?;
        Ok(SlotGuard {
            occupied: self.occupied.clone(),
        })
    }

    pub fn is_occupied(&self) -> bool {
        self.occupied.load(Ordering::Acquire)
    }
}

/// Releases the slot when dropped.
#[derive(Debug)]
pub struct SlotGuard {
    occupied: Arc<AtomicBool>,
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        self.occupied.store(false, Ordering::Release);
    }
}
