//! Inventory and spatial-query unit tests

#[cfg(test)]
mod tests {
    use avatar_bridge::world::{
        Bag, Entity, EquipSlot, Inventory, ItemStack, ItemTemplate, SlotRef, World, PACK_SLOTS,
    };
    use avatar_bridge::Vec3;
    use std::sync::Arc;

    fn gear(id: u32, armor: u32, slot: EquipSlot) -> Arc<ItemTemplate> {
        Arc::new(ItemTemplate {
            id,
            name: format!("item-{id}"),
            armor,
            equips_to: Some(slot),
            ..Default::default()
        })
    }

    // -----------------------------------------------------------------------
    // Inventory
    // -----------------------------------------------------------------------

    #[test]
    fn store_fills_pack_then_bags() {
        let mut inv = Inventory::new();
        inv.bags.push(Bag::new(4));
        assert_eq!(inv.free_slots(), PACK_SLOTS as u32 + 4);

        for _ in 0..PACK_SLOTS {
            let slot = inv
                .store(ItemStack::new(gear(1, 1, EquipSlot::Head), 1))
                .unwrap();
            assert!(matches!(slot, SlotRef::Pack(_)));
        }
        let slot = inv
            .store(ItemStack::new(gear(1, 1, EquipSlot::Head), 1))
            .unwrap();
        assert_eq!(slot, SlotRef::Bag(0, 0));
        assert_eq!(inv.free_slots(), 3);
    }

    #[test]
    fn store_returns_none_when_full() {
        let mut inv = Inventory::new();
        for _ in 0..PACK_SLOTS {
            inv.store(ItemStack::new(gear(1, 1, EquipSlot::Head), 1))
                .unwrap();
        }
        assert!(inv
            .store(ItemStack::new(gear(2, 1, EquipSlot::Head), 1))
            .is_none());
    }

    #[test]
    fn equip_if_better_swaps_and_returns_displaced() {
        let mut inv = Inventory::new();
        inv.equipment.insert(
            EquipSlot::Chest,
            ItemStack::new(gear(1, 5, EquipSlot::Chest), 1),
        );

        let slot = inv
            .store(ItemStack::new(gear(2, 50, EquipSlot::Chest), 1))
            .unwrap();
        assert!(inv.equip_if_better(slot));
        assert_eq!(inv.equipment[&EquipSlot::Chest].template.id, 2);
        // displaced chest piece went back to the freed slot
        assert_eq!(inv.item_at(slot).unwrap().template.id, 1);

        // a worse item stays put
        let slot = inv
            .store(ItemStack::new(gear(3, 2, EquipSlot::Chest), 1))
            .unwrap();
        assert!(!inv.equip_if_better(slot));
        assert_eq!(inv.item_at(slot).unwrap().template.id, 3);
    }

    #[test]
    fn unequippable_items_never_equip() {
        let mut inv = Inventory::new();
        let junk = Arc::new(ItemTemplate {
            id: 9,
            sell_price: 5,
            ..Default::default()
        });
        let slot = inv.store(ItemStack::new(junk, 1)).unwrap();
        assert!(!inv.equip_if_better(slot));
    }

    #[test]
    fn weapon_score_counts_damage_and_stats() {
        let sword = ItemTemplate {
            quality: 2,
            item_level: 10,
            damage_min: 4.0,
            damage_max: 9.0,
            is_weapon: true,
            stats: vec![3, 1],
            ..Default::default()
        };
        // 2*10 + 10 + (4+9) + 2*(3+1)
        assert_eq!(sword.score(), 51);
    }

    // -----------------------------------------------------------------------
    // Spatial queries
    // -----------------------------------------------------------------------

    #[test]
    fn nearest_attackable_skips_dead_and_friendly() {
        let mut world = World::new();
        let mut dead = Entity::new(1, "dead", Vec3::new(1.0, 0.0, 0.0));
        dead.health = 0;
        world.spawn_entity(dead);
        let mut friendly = Entity::new(2, "friendly", Vec3::new(2.0, 0.0, 0.0));
        friendly.attackable = false;
        world.spawn_entity(friendly);
        world.spawn_entity(Entity::new(3, "far", Vec3::new(8.0, 0.0, 0.0)));
        world.spawn_entity(Entity::new(4, "near", Vec3::new(4.0, 0.0, 0.0)));

        let found = world.nearest_attackable(Vec3::zero(), 30.0).unwrap();
        assert_eq!(found.guid, 4);
    }

    #[test]
    fn entities_within_respects_radius() {
        let mut world = World::new();
        world.spawn_entity(Entity::new(1, "close", Vec3::new(3.0, 0.0, 0.0)));
        world.spawn_entity(Entity::new(2, "distant", Vec3::new(100.0, 0.0, 0.0)));

        let hits = world.entities_within(Vec3::zero(), 10.0);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].guid, 1);
    }
}
