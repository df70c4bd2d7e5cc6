//! In-memory simulation data layer: avatars, entities, inventories, loot.
//!
//! The bridge proper never owns gameplay — it drives this layer through the
//! same accessors a host simulation would expose (position, vitals,
//! inventory slots, spatial queries). Only the tick thread mutates it; see
//! the locking rules in [`crate::bridge`].

use crate::types::{AccountId, Guid, Vec3};
use std::collections::HashMap;
use std::f32::consts::TAU;
use std::sync::Arc;

/// Slots in the main pack.
pub const PACK_SLOTS: usize = 16;

// ---------------------------------------------------------------------------
// Items
// ---------------------------------------------------------------------------

/// Equipment slot an item can occupy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EquipSlot {
    Head,
    Shoulders,
    Chest,
    Waist,
    Legs,
    Feet,
    Wrists,
    Hands,
    MainHand,
    OffHand,
}

/// Static item definition shared by every stack of that item.
#[derive(Debug, Clone, Default)]
pub struct ItemTemplate {
    pub id: u32,
    pub name: String,
    pub quality: u32,
    pub item_level: u32,
    pub armor: u32,
    pub damage_min: f32,
    pub damage_max: f32,
    pub is_weapon: bool,
    pub stats: Vec<i32>,
    /// Copper credited per unit when vendored; 0 = worthless.
    pub sell_price: u64,
    /// `None` for items that cannot be equipped.
    pub equips_to: Option<EquipSlot>,
}

impl ItemTemplate {
    /// Equipment score used for auto-equip decisions: quality and item level
    /// weighted, armor flat, weapon damage flat, stats doubled.
    pub fn score(&self) -> i64 {
        let mut score = i64::from(self.quality) * 10;
        score += i64::from(self.item_level);
        score += i64::from(self.armor);
        if self.is_weapon {
            score += (self.damage_max + self.damage_min) as i64;
        }
        for stat in &self.stats {
            score += i64::from(*stat) * 2;
        }
        score
    }
}

/// A stack of one item in a slot.
#[derive(Debug, Clone)]
pub struct ItemStack {
    pub template: Arc<ItemTemplate>,
    pub count: u32,
}

impl ItemStack {
    pub fn new(template: Arc<ItemTemplate>, count: u32) -> Self {
        Self { template, count }
    }
}

// ---------------------------------------------------------------------------
// Inventory
// ---------------------------------------------------------------------------

/// An equipped bag container.
#[derive(Debug, Clone)]
pub struct Bag {
    pub slots: Vec<Option<ItemStack>>,
}

impl Bag {
    pub fn new(size: usize) -> Self {
        Self {
            slots: vec![None; size],
        }
    }

    pub fn free_slots(&self) -> u32 {
        self.slots.iter().filter(|s| s.is_none()).count() as u32
    }
}

/// Addresses one inventory slot (main pack or an equipped bag).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotRef {
    Pack(usize),
    Bag(usize, usize),
}

/// Main pack, equipped bags, and worn equipment.
#[derive(Debug, Clone)]
pub struct Inventory {
    pub pack: Vec<Option<ItemStack>>,
    pub bags: Vec<Bag>,
    pub equipment: HashMap<EquipSlot, ItemStack>,
}

impl Inventory {
    pub fn new() -> Self {
        Self {
            pack: vec![None; PACK_SLOTS],
            bags: Vec::new(),
            equipment: HashMap::new(),
        }
    }

    /// Free slot count across the main pack and every equipped bag.
    pub fn free_slots(&self) -> u32 {
        let pack_free = self.pack.iter().filter(|s| s.is_none()).count() as u32;
        pack_free + self.bags.iter().map(Bag::free_slots).sum::<u32>()
    }

    /// Store a stack in the first free slot (pack first, then bags).
    /// Returns where it landed, or `None` when everything is full.
    pub fn store(&mut self, item: ItemStack) -> Option<SlotRef> {
        if let Some(idx) = self.pack.iter().position(|s| s.is_none()) {
            self.pack[idx] = Some(item);
            return Some(SlotRef::Pack(idx));
        }
        for (bag_idx, bag) in self.bags.iter_mut().enumerate() {
            if let Some(idx) = bag.slots.iter().position(|s| s.is_none()) {
                bag.slots[idx] = Some(item);
                return Some(SlotRef::Bag(bag_idx, idx));
            }
        }
        None
    }

    pub fn item_at(&self, slot: SlotRef) -> Option<&ItemStack> {
        match slot {
            SlotRef::Pack(i) => self.pack.get(i)?.as_ref(),
            SlotRef::Bag(b, i) => self.bags.get(b)?.slots.get(i)?.as_ref(),
        }
    }

    /// Remove and return the stack in `slot`.
    pub fn take(&mut self, slot: SlotRef) -> Option<ItemStack> {
        match slot {
            SlotRef::Pack(i) => self.pack.get_mut(i)?.take(),
            SlotRef::Bag(b, i) => self.bags.get_mut(b)?.slots.get_mut(i)?.take(),
        }
    }

    fn put(&mut self, slot: SlotRef, item: ItemStack) {
        match slot {
            SlotRef::Pack(i) => {
                if let Some(s) = self.pack.get_mut(i) {
                    *s = Some(item);
                }
            }
            SlotRef::Bag(b, i) => {
                if let Some(s) = self.bags.get_mut(b).and_then(|bag| bag.slots.get_mut(i)) {
                    *s = Some(item);
                }
            }
        }
    }

    /// Equip the item in `slot` when it outscores whatever currently occupies
    /// its equipment slot. The displaced item (if any) lands back in `slot`.
    /// Returns whether a swap happened.
    pub fn equip_if_better(&mut self, slot: SlotRef) -> bool {
        let Some(item) = self.item_at(slot) else {
            return false;
        };
        let Some(dest) = item.template.equips_to else {
            return false;
        };
        let new_score = item.template.score();
        let current_score = self
            .equipment
            .get(&dest)
            .map(|cur| cur.template.score())
            .unwrap_or(-1);
        if new_score <= current_score {
            return false;
        }
        let Some(item) = self.take(slot) else {
            return false;
        };
        if let Some(displaced) = self.equipment.insert(dest, item) {
            self.put(slot, displaced);
        }
        true
    }
}

impl Default for Inventory {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Avatars
// ---------------------------------------------------------------------------

/// Where the avatar's motion controller is headed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Motion {
    Idle,
    MovingTo(Vec3),
}

/// A controller-drivable character attached to the simulation.
#[derive(Debug, Clone)]
pub struct Avatar {
    pub guid: Guid,
    pub account: AccountId,
    pub name: String,
    pub level: u32,
    pub health: u32,
    pub max_health: u32,
    pub power: u32,
    pub max_power: u32,
    pub position: Vec3,
    pub orientation: f32,
    /// Home-bind position used by `reset`.
    pub home: Vec3,
    pub in_combat: bool,
    pub casting: bool,
    /// Currently selected entity, if any.
    pub selection: Option<Guid>,
    pub motion: Motion,
    pub money: u64,
    pub inventory: Inventory,
    /// Lines this avatar has spoken (the "speak" mutation).
    pub chat_log: Vec<String>,
    /// Spells this avatar has cast, with the resolved target guid.
    pub cast_log: Vec<(u32, Guid)>,
}

impl Avatar {
    pub fn new(guid: Guid, account: AccountId, name: impl Into<String>, position: Vec3) -> Self {
        Self {
            guid,
            account,
            name: name.into(),
            level: 1,
            health: 100,
            max_health: 100,
            power: 100,
            max_power: 100,
            position,
            orientation: 0.0,
            home: position,
            in_combat: false,
            casting: false,
            selection: None,
            motion: Motion::Idle,
            money: 0,
            inventory: Inventory::new(),
            chat_log: Vec::new(),
            cast_log: Vec::new(),
        }
    }

    pub fn is_dead(&self) -> bool {
        self.health == 0
    }

    pub fn say(&mut self, text: &str) {
        self.chat_log.push(text.to_string());
    }

    pub fn stop_motion(&mut self) {
        self.motion = Motion::Idle;
    }

    pub fn move_point(&mut self, dest: Vec3) {
        self.motion = Motion::MovingTo(dest);
    }

    /// Point the avatar at a world position.
    pub fn face_towards(&mut self, point: Vec3) {
        let o = (point.y - self.position.y).atan2(point.x - self.position.x);
        self.orientation = o.rem_euclid(TAU);
    }
}

// ---------------------------------------------------------------------------
// Entities
// ---------------------------------------------------------------------------

/// Non-avatar classification; only `Creature` shows up in nearby lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Creature,
    Critter,
    Totem,
    Pet,
}

/// One lootable slot on a corpse.
#[derive(Debug, Clone)]
pub struct LootItem {
    pub template: Arc<ItemTemplate>,
    pub count: u32,
    pub looted: bool,
}

/// Pending loot on a corpse.
#[derive(Debug, Clone, Default)]
pub struct Loot {
    pub copper: u64,
    pub items: Vec<LootItem>,
}

/// Any simulation object other than an avatar (creatures, vendors).
#[derive(Debug, Clone)]
pub struct Entity {
    pub guid: Guid,
    pub name: String,
    pub level: u32,
    pub kind: EntityKind,
    pub vendor: bool,
    pub attackable: bool,
    pub health: u32,
    pub max_health: u32,
    pub position: Vec3,
    /// Whoever this entity is currently targeting.
    pub target: Option<Guid>,
    pub loot: Option<Loot>,
    /// Cleared once the loot session has been released.
    pub lootable: bool,
}

impl Entity {
    pub fn new(guid: Guid, name: impl Into<String>, position: Vec3) -> Self {
        Self {
            guid,
            name: name.into(),
            level: 1,
            kind: EntityKind::Creature,
            vendor: false,
            attackable: true,
            health: 100,
            max_health: 100,
            position,
            target: None,
            loot: None,
            lootable: false,
        }
    }

    pub fn is_alive(&self) -> bool {
        self.health > 0
    }
}

// ---------------------------------------------------------------------------
// World
// ---------------------------------------------------------------------------

/// The live object registry: every online avatar and spawned entity.
pub struct World {
    avatars: HashMap<Guid, Avatar>,
    entities: HashMap<Guid, Entity>,
}

impl World {
    pub fn new() -> Self {
        Self {
            avatars: HashMap::new(),
            entities: HashMap::new(),
        }
    }

    // -- avatars ------------------------------------------------------------

    pub fn attach_avatar(&mut self, avatar: Avatar) {
        self.avatars.insert(avatar.guid, avatar);
    }

    pub fn detach_avatar(&mut self, guid: Guid) -> Option<Avatar> {
        self.avatars.remove(&guid)
    }

    pub fn avatar(&self, guid: Guid) -> Option<&Avatar> {
        self.avatars.get(&guid)
    }

    pub fn avatar_mut(&mut self, guid: Guid) -> Option<&mut Avatar> {
        self.avatars.get_mut(&guid)
    }

    pub fn avatar_by_name(&self, name: &str) -> Option<&Avatar> {
        self.avatars.values().find(|a| a.name == name)
    }

    pub fn avatar_by_name_mut(&mut self, name: &str) -> Option<&mut Avatar> {
        self.avatars.values_mut().find(|a| a.name == name)
    }

    pub fn avatars(&self) -> impl Iterator<Item = &Avatar> {
        self.avatars.values()
    }

    pub fn avatars_mut(&mut self) -> impl Iterator<Item = &mut Avatar> {
        self.avatars.values_mut()
    }

    pub fn online_guids(&self) -> Vec<Guid> {
        self.avatars.keys().copied().collect()
    }

    pub fn avatar_count(&self) -> usize {
        self.avatars.len()
    }

    pub fn account_online(&self, account: AccountId) -> bool {
        self.avatars.values().any(|a| a.account == account)
    }

    // -- entities -----------------------------------------------------------

    pub fn spawn_entity(&mut self, entity: Entity) {
        self.entities.insert(entity.guid, entity);
    }

    pub fn entity(&self, guid: Guid) -> Option<&Entity> {
        self.entities.get(&guid)
    }

    pub fn entity_mut(&mut self, guid: Guid) -> Option<&mut Entity> {
        self.entities.get_mut(&guid)
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Both sides of an avatar/entity interaction, borrowed at once.
    pub fn avatar_and_entity_mut(
        &mut self,
        avatar: Guid,
        entity: Guid,
    ) -> (Option<&mut Avatar>, Option<&mut Entity>) {
        (self.avatars.get_mut(&avatar), self.entities.get_mut(&entity))
    }

    /// Spatial query: entities within `radius` of `center`.
    pub fn entities_within(&self, center: Vec3, radius: f32) -> Vec<&Entity> {
        self.entities
            .values()
            .filter(|e| e.position.distance(&center) <= radius)
            .collect()
    }

    /// Nearest living attackable entity within `radius` of `center`.
    pub fn nearest_attackable(&self, center: Vec3, radius: f32) -> Option<&Entity> {
        self.entities
            .values()
            .filter(|e| e.attackable && e.is_alive())
            .filter(|e| e.position.distance(&center) <= radius)
            .min_by(|a, b| {
                let da = a.position.distance(&center);
                let db = b.position.distance(&center);
                da.partial_cmp(&db).unwrap_or(std::cmp::Ordering::Equal)
            })
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}
