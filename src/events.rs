//! Event Aggregator – per-avatar accumulator of uncommitted simulation
//! events, drained atomically once per publish cycle.
//!
//! Recording is commutative (increments and flag sets only), so any thread
//! may record without ordering constraints; only the read-and-clear in
//! [`EventAggregator::consume_and_reset`] is atomic with respect to writers.

use crate::types::Guid;
use parking_lot::Mutex;
use std::collections::HashMap;

/// One observed simulation event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Experience(u64),
    Copper(u64),
    LootedItem,
    LevelUp,
    EquippedUpgrade,
}

/// Deltas accumulated for one avatar since the last consume.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventDelta {
    pub xp_gained: u64,
    pub loot_copper: u64,
    pub loot_score: u64,
    pub leveled_up: bool,
    pub equipped_upgrade: bool,
}

#[derive(Debug, Default)]
struct Slot {
    delta: EventDelta,
    /// Publish cycles this avatar has been absent from the online set.
    idle_cycles: u32,
}

/// Thread-safe per-avatar event accumulators.
///
/// Entries are created lazily on first record and evicted by [`sweep`]
/// once their avatar has been offline long enough, so permanently
/// disconnected avatars cannot leak entries.
///
/// [`sweep`]: EventAggregator::sweep
pub struct EventAggregator {
    inner: Mutex<HashMap<Guid, Slot>>,
}

impl EventAggregator {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
        }
    }

    /// Record one event for `guid`. Callable from any thread.
    pub fn record(&self, guid: Guid, event: Event) {
        let mut inner = self.inner.lock();
        let slot = inner.entry(guid).or_default();
        slot.idle_cycles = 0;
        match event {
            Event::Experience(amount) => slot.delta.xp_gained += amount,
            Event::Copper(amount) => slot.delta.loot_copper += amount,
            Event::LootedItem => slot.delta.loot_score += 1,
            Event::LevelUp => slot.delta.leveled_up = true,
            Event::EquippedUpgrade => slot.delta.equipped_upgrade = true,
        }
    }

    /// Atomically read and clear the accumulator for one avatar.
    ///
    /// Returns a zeroed delta when nothing is pending — never an error.
    pub fn consume_and_reset(&self, guid: Guid) -> EventDelta {
        self.inner
            .lock()
            .get_mut(&guid)
            .map(|slot| std::mem::take(&mut slot.delta))
            .unwrap_or_default()
    }

    /// Eviction pass, run once per publish cycle: entries for avatars not in
    /// `online` age by one cycle and are dropped after `evict_after` cycles.
    pub fn sweep(&self, online: &[Guid], evict_after: u32) {
        let mut inner = self.inner.lock();
        inner.retain(|guid, slot| {
            if online.contains(guid) {
                slot.idle_cycles = 0;
                true
            } else {
                slot.idle_cycles += 1;
                slot.idle_cycles < evict_after
            }
        });
    }

    /// Number of avatars currently tracked.
    pub fn tracked(&self) -> usize {
        self.inner.lock().len()
    }
}

impl Default for EventAggregator {
    fn default() -> Self {
        Self::new()
    }
}
