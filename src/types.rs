//! Core types shared across all modules.

use serde::{Deserialize, Serialize};

/// Stable simulation-wide identity for avatars and entities.
pub type Guid = u64;

/// Identity of the account that owns a persisted avatar.
pub type AccountId = u32;

// ---------------------------------------------------------------------------
// Basic math
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn zero() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }

    pub fn distance(&self, other: &Vec3) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }
}

impl std::fmt::Display for Vec3 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.2}, {:.2}, {:.2})", self.x, self.y, self.z)
    }
}

// ---------------------------------------------------------------------------
// Stats & config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeStats {
    pub online_avatars: usize,
    pub queued_commands: usize,
    pub tracked_accumulators: usize,
    pub snapshot_version: u64,
    pub total_ticks: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// TCP port the controller connects to.
    pub port: u16,
    /// Snapshot publish cadence in milliseconds.
    pub publish_interval_ms: u32,
    /// Nearby-entity rescan cadence in milliseconds.
    pub nearby_interval_ms: u32,
    /// Auto-facing cadence in milliseconds.
    pub facing_interval_ms: u32,
    /// Resend the snapshot to an idle connection after this long.
    pub keepalive_ms: u64,
    /// Per-connection write-side poll cadence.
    pub poll_interval_ms: u64,
    /// Orientation delta applied by `turn_left` / `turn_right` (radians).
    pub turn_step: f32,
    /// Distance covered by one `move_forward` (world units).
    pub forward_step: f32,
    /// Living entities appear in the nearby list within this radius.
    pub nearby_radius: f32,
    /// Dead entities appear in the nearby list only within this radius.
    pub corpse_radius: f32,
    /// Maximum distance at which a corpse can be looted.
    pub loot_radius: f32,
    /// Maximum distance to a vendor for `sell_grey`.
    pub vendor_radius: f32,
    /// Default search range for `target_nearest` when no range is given.
    pub default_target_range: f32,
    /// Spell that always targets the caster.
    pub self_spell: u32,
    /// Spell that falls back to a nearby-attackable search.
    pub execute_spell: u32,
    /// Search radius for the execute-spell fallback.
    pub execute_search_radius: f32,
    /// Item id never destroyed by `sell_grey`.
    pub protected_item: u32,
    /// Accumulator entries for avatars absent this many publish cycles are
    /// dropped.
    pub evict_after_cycles: u32,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            port: 5000,
            publish_interval_ms: 400,
            nearby_interval_ms: 2000,
            facing_interval_ms: 150,
            keepalive_ms: 500,
            poll_interval_ms: 10,
            turn_step: 0.5,
            forward_step: 3.0,
            nearby_radius: 50.0,
            corpse_radius: 15.0,
            loot_radius: 10.0,
            vendor_radius: 15.0,
            default_target_range: 30.0,
            self_spell: 2050,
            execute_spell: 585,
            execute_search_radius: 30.0,
            protected_item: 6948,
            evict_after_cycles: 16,
        }
    }
}
