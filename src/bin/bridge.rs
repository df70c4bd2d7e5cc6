//! avatar-bridge-server binary
//!
//! Runs the bridge standalone against the in-memory world and record store.
//! Useful for driving a controller client without a full simulation host.
//!
//! ## Configuration (flags / env)
//!
//! | Key                    | Default | Description                        |
//! |------------------------|---------|------------------------------------|
//! | `BRIDGE_PORT`          | `5000`  | Controller TCP port                |
//! | `BRIDGE_TICK_MS`       | `50`    | Simulation tick cadence            |
//! | `BRIDGE_PUBLISH_MS`    | `400`   | Snapshot publish cadence           |
//! | `BRIDGE_NEARBY_MS`     | `2000`  | Nearby-entity rescan cadence       |
//! | `BRIDGE_KEEPALIVE_MS`  | `500`   | Idle-connection resend interval    |

use anyhow::Result;
use avatar_bridge::provision::{AvatarRecord, RecordStore};
use avatar_bridge::world::{Entity, EntityKind, ItemTemplate, Loot, LootItem, World};
use avatar_bridge::{Bridge, BridgeConfig, Vec3};
use clap::Parser;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

// ---------------------------------------------------------------------------
// CLI
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(name = "avatar-bridge-server", about = "Avatar Bridge", version)]
struct Args {
    /// Controller TCP port
    #[arg(long, env = "BRIDGE_PORT", default_value_t = 5000)]
    port: u16,

    /// Simulation tick cadence in milliseconds
    #[arg(long, env = "BRIDGE_TICK_MS", default_value_t = 50)]
    tick_ms: u64,

    /// Snapshot publish cadence in milliseconds
    #[arg(long, env = "BRIDGE_PUBLISH_MS", default_value_t = 400)]
    publish_ms: u32,

    /// Nearby-entity rescan cadence in milliseconds
    #[arg(long, env = "BRIDGE_NEARBY_MS", default_value_t = 2000)]
    nearby_ms: u32,

    /// Idle-connection resend interval in milliseconds
    #[arg(long, env = "BRIDGE_KEEPALIVE_MS", default_value_t = 500)]
    keepalive_ms: u64,
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    // Initialise logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("avatar_bridge=debug".parse()?),
        )
        .init();

    let args = Args::parse();

    log::info!(
        "Starting avatar-bridge-server (port={}, tick={}ms, publish={}ms)",
        args.port,
        args.tick_ms,
        args.publish_ms,
    );

    let config = BridgeConfig {
        port: args.port,
        publish_interval_ms: args.publish_ms,
        nearby_interval_ms: args.nearby_ms,
        keepalive_ms: args.keepalive_ms,
        ..Default::default()
    };

    // Demo world + record store so `.spawn Alice` works out of the box.
    let store = Arc::new(RecordStore::new());
    let world = Arc::new(Mutex::new(World::new()));
    seed_demo(&mut world.lock(), &store);

    let mut bridge = Bridge::new(config, world, store);

    let manager = bridge.bind_server().await?;
    tokio::spawn(manager.run());

    // Drive the tick at the host cadence until shutdown.
    let mut timer = tokio::time::interval(Duration::from_millis(args.tick_ms.max(1)));
    let mut last = Instant::now();
    loop {
        tokio::select! {
            _ = timer.tick() => {
                let diff = last.elapsed().as_millis() as u32;
                last = Instant::now();
                bridge.on_update(diff);
                for notice in bridge.take_notices() {
                    log::info!("{notice}");
                }
            }
            _ = tokio::signal::ctrl_c() => {
                log::info!("avatar-bridge-server shutting down (SIGINT)");
                break;
            }
        }
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Demo content
// ---------------------------------------------------------------------------

fn seed_demo(world: &mut World, store: &RecordStore) {
    store.insert_record(AvatarRecord {
        guid: 1000,
        account: 1,
        name: "Alice".to_string(),
        level: 3,
        health: 120,
        max_health: 120,
        power: 80,
        max_power: 80,
        position: Vec3::zero(),
        orientation: 0.0,
        money: 250,
    });
    store.insert_record(AvatarRecord {
        guid: 1001,
        account: 2,
        name: "Bob".to_string(),
        level: 1,
        health: 100,
        max_health: 100,
        power: 100,
        max_power: 100,
        position: Vec3::new(5.0, 5.0, 0.0),
        orientation: 0.0,
        money: 0,
    });

    let scraps = Arc::new(ItemTemplate {
        id: 2934,
        name: "Ruined Pelt".to_string(),
        quality: 0,
        sell_price: 3,
        ..Default::default()
    });

    for (guid, offset) in [(10u64, 8.0f32), (11, -12.0)] {
        let mut wolf = Entity::new(guid, "Young Wolf", Vec3::new(offset, offset, 0.0));
        wolf.level = 2;
        wolf.loot = Some(Loot {
            copper: 12,
            items: vec![LootItem {
                template: Arc::clone(&scraps),
                count: 1,
                looted: false,
            }],
        });
        world.spawn_entity(wolf);
    }

    let mut vendor = Entity::new(20, "Trader Hesker", Vec3::new(3.0, -3.0, 0.0));
    vendor.vendor = true;
    vendor.attackable = false;
    world.spawn_entity(vendor);

    let mut rabbit = Entity::new(30, "Rabbit", Vec3::new(1.0, 1.0, 0.0));
    rabbit.kind = EntityKind::Critter;
    rabbit.attackable = false;
    world.spawn_entity(rabbit);

    log::info!(
        "demo world seeded ({} entities, 2 persisted avatars)",
        world.entity_count()
    );
}
