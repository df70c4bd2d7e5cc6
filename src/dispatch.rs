//! Command application – drains the queue's output against live avatars.
//!
//! Runs on the tick thread only. `targetName` resolves to a live avatar at
//! apply time, so commands for avatars that logged off in the meantime are
//! silently skipped. Structured arguments are parsed here, per command; a
//! parse failure drops that command alone and never the rest of the batch.

use crate::events::{Event, EventAggregator};
use crate::protocol::{Action, Command};
use crate::types::{BridgeConfig, Guid, Vec3};
use crate::world::{ItemStack, World};
use log::{debug, info};
use std::f32::consts::TAU;

/// Apply every queued command in FIFO order.
pub fn apply_all(
    world: &mut World,
    events: &EventAggregator,
    config: &BridgeConfig,
    commands: Vec<Command>,
) {
    for command in commands {
        let Some(guid) = world.avatar_by_name(&command.avatar).map(|a| a.guid) else {
            debug!("dropping command for offline avatar '{}'", command.avatar);
            continue;
        };
        apply(world, events, config, guid, &command);
    }
}

fn apply(
    world: &mut World,
    events: &EventAggregator,
    config: &BridgeConfig,
    guid: Guid,
    command: &Command,
) {
    match command.action {
        Action::Say => {
            if let Some(avatar) = world.avatar_mut(guid) {
                avatar.say(&command.value);
            }
        }
        Action::Stop => {
            if let Some(avatar) = world.avatar_mut(guid) {
                avatar.stop_motion();
            }
        }
        Action::TurnLeft => turn(world, guid, config.turn_step),
        Action::TurnRight => turn(world, guid, -config.turn_step),
        Action::MoveForward => {
            if let Some(avatar) = world.avatar_mut(guid) {
                let o = avatar.orientation;
                let dest = Vec3::new(
                    avatar.position.x + config.forward_step * o.cos(),
                    avatar.position.y + config.forward_step * o.sin(),
                    avatar.position.z,
                );
                avatar.move_point(dest);
            }
        }
        Action::MoveTo => apply_move_to(world, guid, &command.value),
        Action::TargetGuid => apply_target_guid(world, guid, &command.value),
        Action::TargetNearest => apply_target_nearest(world, config, guid, &command.value),
        Action::Cast => apply_cast(world, config, guid, &command.value),
        Action::Reset => apply_reset(world, guid),
        Action::LootGuid => apply_loot(world, events, config, guid, &command.value),
        Action::SellGrey => apply_sell_grey(world, events, config, guid, &command.value),
    }
}

/// Wrap an orientation into `[0, 2π)`.
fn wrap_orientation(o: f32) -> f32 {
    o.rem_euclid(TAU)
}

fn turn(world: &mut World, guid: Guid, step: f32) {
    if let Some(avatar) = world.avatar_mut(guid) {
        avatar.orientation = wrap_orientation(avatar.orientation + step);
    }
}

fn apply_move_to(world: &mut World, guid: Guid, value: &str) {
    let Some(dest) = parse_vec3(value) else {
        debug!("move_to with malformed coordinates '{value}' dropped");
        return;
    };
    if let Some(avatar) = world.avatar_mut(guid) {
        avatar.move_point(dest);
    }
}

fn parse_vec3(value: &str) -> Option<Vec3> {
    let (x, rest) = value.split_once(':')?;
    let (y, z) = rest.split_once(':')?;
    Some(Vec3::new(
        x.trim().parse().ok()?,
        y.trim().parse().ok()?,
        z.trim().parse().ok()?,
    ))
}

fn apply_target_guid(world: &mut World, guid: Guid, value: &str) {
    let Ok(target) = value.trim().parse::<Guid>() else {
        debug!("target_guid with malformed guid '{value}' dropped");
        return;
    };
    let Some(target_pos) = world.entity(target).map(|e| e.position) else {
        return;
    };
    if let Some(avatar) = world.avatar_mut(guid) {
        avatar.selection = Some(target);
        avatar.face_towards(target_pos);
    }
}

fn apply_target_nearest(world: &mut World, config: &BridgeConfig, guid: Guid, value: &str) {
    let range = if value.trim().is_empty() {
        config.default_target_range
    } else {
        match value.trim().parse::<f32>() {
            Ok(r) => r,
            Err(_) => {
                debug!("target_nearest with malformed range '{value}' dropped");
                return;
            }
        }
    };
    let Some(position) = world.avatar(guid).map(|a| a.position) else {
        return;
    };
    let Some((target, target_pos)) = world
        .nearest_attackable(position, range)
        .map(|e| (e.guid, e.position))
    else {
        return;
    };
    if let Some(avatar) = world.avatar_mut(guid) {
        avatar.selection = Some(target);
        avatar.face_towards(target_pos);
    }
}

/// Cast resolution mirrors the fixed spell roles: the self-spell always
/// targets the caster; the execute-spell hunts for a nearby attackable when
/// nothing (or the caster) is selected and is suppressed entirely when only
/// the caster would remain; anything else without a selection self-targets.
fn apply_cast(world: &mut World, config: &BridgeConfig, guid: Guid, value: &str) {
    let Ok(spell) = value.trim().parse::<u32>() else {
        debug!("cast with malformed spell id '{value}' dropped");
        return;
    };
    let Some((position, selection)) = world.avatar(guid).map(|a| (a.position, a.selection)) else {
        return;
    };

    let mut target = selection.filter(|t| world.entity(*t).is_some());
    if spell == config.self_spell {
        target = Some(guid);
    } else if spell == config.execute_spell {
        if target.is_none() || target == Some(guid) {
            target = world
                .nearest_attackable(position, config.execute_search_radius)
                .map(|e| e.guid);
        }
    } else if target.is_none() {
        target = Some(guid);
    }

    let Some(target) = target else {
        return;
    };
    if spell == config.execute_spell && target == guid {
        return;
    }
    if let Some(avatar) = world.avatar_mut(guid) {
        info!("{} casts spell {} on {}", avatar.name, spell, target);
        avatar.casting = true;
        avatar.cast_log.push((spell, target));
    }
}

fn apply_reset(world: &mut World, guid: Guid) {
    if let Some(avatar) = world.avatar_mut(guid) {
        avatar.in_combat = false;
        avatar.casting = false;
        avatar.selection = None;
        avatar.stop_motion();
        avatar.health = avatar.max_health;
        avatar.power = avatar.max_power;
        avatar.position = avatar.home;
    }
}

/// Full loot transaction: copper transfer, per-item store with auto-equip,
/// session release. Items that do not fit stay unlooted (partial success);
/// an item is marked looted only after its store succeeded, so nothing is
/// ever duplicated or torn.
fn apply_loot(
    world: &mut World,
    events: &EventAggregator,
    config: &BridgeConfig,
    guid: Guid,
    value: &str,
) {
    let Ok(target) = value.trim().parse::<Guid>() else {
        debug!("loot_guid with malformed guid '{value}' dropped");
        return;
    };
    let (Some(avatar), Some(entity)) = world.avatar_and_entity_mut(guid, target) else {
        return;
    };
    if entity.is_alive() || avatar.position.distance(&entity.position) > config.loot_radius {
        return;
    }
    let Some(loot) = entity.loot.as_mut() else {
        return;
    };

    if loot.copper > 0 {
        let copper = loot.copper;
        loot.copper = 0;
        avatar.money += copper;
        events.record(guid, Event::Copper(copper));
    }

    for item in loot.items.iter_mut() {
        if item.looted {
            continue;
        }
        let stack = ItemStack::new(item.template.clone(), item.count);
        match avatar.inventory.store(stack) {
            Some(slot) => {
                item.looted = true;
                events.record(guid, Event::LootedItem);
                if avatar.inventory.equip_if_better(slot) {
                    info!("{} equipped an upgrade while looting", avatar.name);
                    events.record(guid, Event::EquippedUpgrade);
                }
            }
            None => debug!("{} has no room for loot item {}", avatar.name, item.template.id),
        }
    }

    // Release the loot session regardless of leftovers.
    entity.lootable = false;
    avatar.selection = None;
}

/// Destroy every positive-sell-value item in the main pack and equipped
/// bags (except the protected item) and credit the summed price once.
fn apply_sell_grey(
    world: &mut World,
    events: &EventAggregator,
    config: &BridgeConfig,
    guid: Guid,
    value: &str,
) {
    let Ok(vendor) = value.trim().parse::<Guid>() else {
        debug!("sell_grey with malformed guid '{value}' dropped");
        return;
    };
    let Some(vendor_pos) = world
        .entity(vendor)
        .filter(|e| e.vendor)
        .map(|e| e.position)
    else {
        return;
    };
    let Some(avatar) = world.avatar_mut(guid) else {
        return;
    };
    if avatar.position.distance(&vendor_pos) > config.vendor_radius {
        return;
    }
    avatar.stop_motion();

    let mut total = 0u64;
    for slot in avatar.inventory.pack.iter_mut() {
        sell_slot(slot, config.protected_item, &mut total);
    }
    for bag in avatar.inventory.bags.iter_mut() {
        for slot in bag.slots.iter_mut() {
            sell_slot(slot, config.protected_item, &mut total);
        }
    }

    if total > 0 {
        avatar.money += total;
        events.record(guid, Event::Copper(total));
    }
    avatar.selection = None;
}

fn sell_slot(slot: &mut Option<ItemStack>, protected_item: u32, total: &mut u64) {
    let Some(stack) = slot else {
        return;
    };
    if stack.template.sell_price > 0 && stack.template.id != protected_item {
        *total += stack.template.sell_price * u64::from(stack.count);
        *slot = None;
    }
}
