//! Snapshot Publisher – versioned, read-copy-published avatar state.
//!
//! The tick rebuilds the document wholesale once per publish interval and
//! swaps it in under a short-held lock; connection handlers copy out a
//! refcounted string and release the lock before any socket write. The
//! version counter increments on every replacement and never decreases.
//!
//! Nearby-entity lists are refreshed on a slower cadence and cached here
//! between rescans; [`rebuild`] embeds the most recent list per avatar.
//!
//! [`rebuild`]: SnapshotPublisher::rebuild

use crate::events::EventAggregator;
use crate::protocol::{NearbyEntity, PlayerState, Snapshot, TargetStatus};
use crate::types::{BridgeConfig, Guid};
use crate::world::{Avatar, EntityKind, World};
use log::warn;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

struct Published {
    version: u64,
    json: Arc<str>,
}

pub struct SnapshotPublisher {
    current: Mutex<Published>,
    nearby: Mutex<HashMap<Guid, Vec<NearbyEntity>>>,
}

impl SnapshotPublisher {
    pub fn new() -> Self {
        Self {
            current: Mutex::new(Published {
                version: 0,
                json: Arc::from(r#"{"version":0,"players":[]}"#),
            }),
            nearby: Mutex::new(HashMap::new()),
        }
    }

    /// Current version and serialized document, consistent as a pair.
    pub fn latest(&self) -> (u64, Arc<str>) {
        let current = self.current.lock();
        (current.version, Arc::clone(&current.json))
    }

    pub fn version(&self) -> u64 {
        self.current.lock().version
    }

    /// Publish cycle: build one state record per online avatar (consuming
    /// its event deltas), serialize, and swap the document in. Also runs
    /// the aggregator eviction sweep for this cycle.
    pub fn rebuild(&self, world: &World, events: &EventAggregator, config: &BridgeConfig) {
        let nearby = self.nearby.lock().clone();
        let players: Vec<PlayerState> = world
            .avatars()
            .map(|avatar| player_state(world, events, avatar, nearby.get(&avatar.guid)))
            .collect();
        events.sweep(&world.online_guids(), config.evict_after_cycles);

        let version = self.current.lock().version + 1;
        let snapshot = Snapshot { version, players };
        match serde_json::to_string(&snapshot) {
            Ok(json) => {
                let mut current = self.current.lock();
                current.version = version;
                current.json = Arc::from(json);
            }
            Err(e) => warn!("failed to serialize snapshot: {e}"),
        }
    }

    /// Slow cycle: rescan entities around every online avatar.
    ///
    /// Decorations (totems, pets, critters) are filtered out; dead entities
    /// are kept only within the short corpse radius, living ones within the
    /// full nearby radius.
    pub fn rebuild_nearby(&self, world: &World, config: &BridgeConfig) {
        let mut map = HashMap::new();
        for avatar in world.avatars() {
            let list: Vec<NearbyEntity> = world
                .entities_within(avatar.position, config.nearby_radius)
                .into_iter()
                .filter(|e| e.kind == EntityKind::Creature)
                .filter(|e| {
                    e.is_alive() || e.position.distance(&avatar.position) <= config.corpse_radius
                })
                .map(|e| NearbyEntity {
                    guid: e.guid,
                    name: e.name.clone(),
                    level: e.level,
                    attackable: e.attackable && e.is_alive(),
                    vendor: e.vendor,
                    target: e.target.unwrap_or(0),
                    hp: e.health,
                    x: e.position.x,
                    y: e.position.y,
                    z: e.position.z,
                })
                .collect();
            map.insert(avatar.guid, list);
        }
        *self.nearby.lock() = map;
    }
}

impl Default for SnapshotPublisher {
    fn default() -> Self {
        Self::new()
    }
}

fn player_state(
    world: &World,
    events: &EventAggregator,
    avatar: &Avatar,
    nearby: Option<&Vec<NearbyEntity>>,
) -> PlayerState {
    let target = avatar.selection.and_then(|guid| world.entity(guid));
    let (target_status, target_hp, tpos) = match target {
        Some(t) if t.is_alive() => (TargetStatus::Alive, t.health, t.position),
        Some(t) => (TargetStatus::Dead, t.health, t.position),
        None => (TargetStatus::None, 0, crate::types::Vec3::zero()),
    };
    let delta = events.consume_and_reset(avatar.guid);

    PlayerState {
        name: avatar.name.clone(),
        hp: avatar.health,
        max_hp: avatar.max_health,
        power: avatar.power,
        max_power: avatar.max_power,
        level: avatar.level,
        x: avatar.position.x,
        y: avatar.position.y,
        z: avatar.position.z,
        o: avatar.orientation,
        combat: avatar.in_combat,
        casting: avatar.casting,
        free_slots: avatar.inventory.free_slots(),
        target_status,
        target_hp,
        tx: tpos.x,
        ty: tpos.y,
        tz: tpos.z,
        xp_gained: delta.xp_gained,
        loot_copper: delta.loot_copper,
        loot_score: delta.loot_score,
        leveled_up: delta.leveled_up,
        equipped_upgrade: delta.equipped_upgrade,
        nearby_mobs: nearby.cloned().unwrap_or_default(),
    }
}
