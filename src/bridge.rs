//! Tick Integration – wires every component to the host simulation's
//! update loop.
//!
//! ## Execution domains
//!
//! | Domain                  | Runs                                   |
//! |-------------------------|----------------------------------------|
//! | tick thread (host)      | [`Bridge::on_update`] — sole mutator of |
//! |                         | the [`World`]                          |
//! | connection tasks        | snapshot fan-out, command parsing      |
//! | datastore executor      | record loads (results polled per tick) |
//!
//! All cross-domain state (snapshot, command queue, event accumulators,
//! provisioning registry) sits behind short-held locks; no lock is ever
//! held across a socket operation. Errors raised by commands, connections,
//! or provisioning are contained here — nothing propagates into the host's
//! tick.

use crate::channel::CommandChannel;
use crate::dispatch;
use crate::events::{Event, EventAggregator};
use crate::provision::{Datastore, ProvisioningPipeline};
use crate::server::ConnectionManager;
use crate::snapshot::SnapshotPublisher;
use crate::types::{BridgeConfig, BridgeStats, Guid, Vec3};
use crate::world::World;
use anyhow::Result;
use log::{info, warn};
use parking_lot::Mutex;
use std::net::SocketAddr;
use std::sync::Arc;

pub struct Bridge {
    config: BridgeConfig,
    world: Arc<Mutex<World>>,
    events: Arc<EventAggregator>,
    channel: Arc<CommandChannel>,
    publisher: Arc<SnapshotPublisher>,
    pipeline: ProvisioningPipeline,
    datastore: Arc<dyn Datastore>,
    fast_timer: u32,
    slow_timer: u32,
    face_timer: u32,
    tick_count: u64,
    notices: Vec<String>,
}

impl Bridge {
    pub fn new(
        config: BridgeConfig,
        world: Arc<Mutex<World>>,
        datastore: Arc<dyn Datastore>,
    ) -> Self {
        Self {
            config,
            world,
            events: Arc::new(EventAggregator::new()),
            channel: Arc::new(CommandChannel::new()),
            publisher: Arc::new(SnapshotPublisher::new()),
            pipeline: ProvisioningPipeline::new(),
            datastore,
            fast_timer: 0,
            slow_timer: 0,
            face_timer: 0,
            tick_count: 0,
            notices: Vec::new(),
        }
    }

    // -----------------------------------------------------------------------
    // Component handles
    // -----------------------------------------------------------------------

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn world(&self) -> Arc<Mutex<World>> {
        Arc::clone(&self.world)
    }

    pub fn events(&self) -> Arc<EventAggregator> {
        Arc::clone(&self.events)
    }

    pub fn channel(&self) -> Arc<CommandChannel> {
        Arc::clone(&self.channel)
    }

    pub fn publisher(&self) -> Arc<SnapshotPublisher> {
        Arc::clone(&self.publisher)
    }

    // -----------------------------------------------------------------------
    // Server startup
    // -----------------------------------------------------------------------

    /// Bind the controller socket on the configured port. The caller spawns
    /// [`ConnectionManager::run`]; a bind failure means the bridge does not
    /// start, while the host process is unaffected.
    pub async fn bind_server(&self) -> Result<ConnectionManager> {
        self.bind_server_on(SocketAddr::from(([0, 0, 0, 0], self.config.port)))
            .await
    }

    pub async fn bind_server_on(&self, addr: SocketAddr) -> Result<ConnectionManager> {
        ConnectionManager::bind(
            addr,
            Arc::clone(&self.publisher),
            Arc::clone(&self.channel),
            &self.config,
        )
        .await
    }

    // -----------------------------------------------------------------------
    // Tick entry point
    // -----------------------------------------------------------------------

    /// Invoked once per host update with the elapsed milliseconds.
    ///
    /// Sequences: auto-facing → provisioning completions → queued commands
    /// → snapshot publish (fast cadence) → nearby rescan (slow cadence).
    pub fn on_update(&mut self, diff_ms: u32) {
        self.tick_count += 1;
        self.fast_timer += diff_ms;
        self.slow_timer += diff_ms;
        self.face_timer += diff_ms;

        let mut world = self.world.lock();

        if self.face_timer >= self.config.facing_interval_ms {
            self.face_timer = 0;
            auto_face(&mut world);
        }

        for outcome in self
            .pipeline
            .drain_completions(&mut world, self.datastore.as_ref())
        {
            let notice = match outcome.result {
                Ok(_) => {
                    info!("avatar '{}' is now controller-drivable", outcome.name);
                    format!("avatar '{}' has joined", outcome.name)
                }
                Err(e) => {
                    warn!("provisioning '{}' failed: {e}", outcome.name);
                    format!("spawn of '{}' failed: {e}", outcome.name)
                }
            };
            self.notices.push(notice);
        }

        let commands = self.channel.drain();
        dispatch::apply_all(&mut world, &self.events, &self.config, commands);

        if self.fast_timer >= self.config.publish_interval_ms {
            self.fast_timer = 0;
            self.publisher.rebuild(&world, &self.events, &self.config);
        }

        if self.slow_timer >= self.config.nearby_interval_ms {
            self.slow_timer = 0;
            self.publisher.rebuild_nearby(&world, &self.config);
        }
    }

    // -----------------------------------------------------------------------
    // Host-facing hooks
    // -----------------------------------------------------------------------

    /// Chat filter hook: recognizes the `.spawn <name>` control command and
    /// returns the reply for the requester. `None` means the message is not
    /// ours and should pass through.
    pub fn on_chat_message(&self, sender: Guid, text: &str) -> Option<String> {
        let rest = text.trim().strip_prefix(".spawn")?;
        if !rest.is_empty() && !rest.starts_with(' ') {
            return None;
        }
        let name = rest.trim();
        let world = self.world.lock();
        match self
            .pipeline
            .request(&world, self.datastore.as_ref(), name, sender)
        {
            Ok(()) => Some(format!("provisioning avatar '{name}'")),
            Err(e) => Some(format!("spawn failed: {e}")),
        }
    }

    /// The host reports experience gains here. Callable from any thread.
    pub fn on_experience_gained(&self, guid: Guid, amount: u64) {
        self.events.record(guid, Event::Experience(amount));
    }

    /// The host reports money changes here; only gains count as loot.
    pub fn on_money_changed(&self, guid: Guid, delta: i64) {
        if delta > 0 {
            self.events.record(guid, Event::Copper(delta as u64));
        }
    }

    /// The host reports level changes here.
    pub fn on_level_changed(&self, guid: Guid, _new_level: u32) {
        self.events.record(guid, Event::LevelUp);
    }

    /// Completion/failure announcements accumulated since the last call.
    pub fn take_notices(&mut self) -> Vec<String> {
        std::mem::take(&mut self.notices)
    }

    pub fn stats(&self) -> BridgeStats {
        BridgeStats {
            online_avatars: self.world.lock().avatar_count(),
            queued_commands: self.channel.len(),
            tracked_accumulators: self.events.tracked(),
            snapshot_version: self.publisher.version(),
            total_ticks: self.tick_count,
        }
    }
}

/// Avatars in combat or casting keep facing their selected target.
fn auto_face(world: &mut World) {
    let updates: Vec<(Guid, Vec3)> = world
        .avatars()
        .filter(|a| a.in_combat || a.casting)
        .filter_map(|a| {
            let target = a.selection?;
            world.entity(target).map(|e| (a.guid, e.position))
        })
        .collect();
    for (guid, position) in updates {
        if let Some(avatar) = world.avatar_mut(guid) {
            avatar.face_towards(position);
        }
    }
}
