//! Avatar Bridge
//!
//! A socket bridge that lets an external controller observe and drive
//! avatars inside a tick-driven simulation it does not own.
//!
//! ## Architecture
//!
//! ```text
//! Bridge  (bridge.rs)            ← tick integration, host hooks
//!   ├── ConnectionManager  (server.rs)    ← TCP acceptor + handlers
//!   │     ├── SnapshotPublisher (snapshot.rs)  ← versioned fan-out
//!   │     └── CommandChannel    (channel.rs)   ← inbound FIFO
//!   ├── dispatch  (dispatch.rs)            ← command application
//!   ├── EventAggregator  (events.rs)       ← per-avatar deltas
//!   ├── ProvisioningPipeline  (provision.rs) ← async avatar spawn
//!   └── World  (world.rs)                  ← simulation data layer
//! ```
//!
//! Connection handlers feed the `CommandChannel`; the tick drains it,
//! mutates the `World`, and republishes the snapshot that handlers fan
//! back out. Provisioning runs against the datastore off-tick and is
//! collected by a non-blocking poll each update.

// Protocol types are always available (no server feature needed).
pub mod protocol;
pub mod types;

// Server-side modules require the `server` feature.
#[cfg(feature = "server")]
pub mod bridge;
#[cfg(feature = "server")]
pub mod channel;
#[cfg(feature = "server")]
pub mod dispatch;
#[cfg(feature = "server")]
pub mod events;
#[cfg(feature = "server")]
pub mod provision;
#[cfg(feature = "server")]
pub mod server;
#[cfg(feature = "server")]
pub mod snapshot;
#[cfg(feature = "server")]
pub mod world;

// Convenience re-exports (server only)
#[cfg(feature = "server")]
pub use bridge::Bridge;
#[cfg(feature = "server")]
pub use channel::CommandChannel;
#[cfg(feature = "server")]
pub use events::{Event, EventAggregator, EventDelta};
#[cfg(feature = "server")]
pub use provision::{
    AvatarRecord, Datastore, ProvisionError, ProvisioningPipeline, RecordStore,
};
#[cfg(feature = "server")]
pub use server::ConnectionManager;
#[cfg(feature = "server")]
pub use snapshot::SnapshotPublisher;
#[cfg(feature = "server")]
pub use world::{Avatar, Entity, Inventory, ItemStack, ItemTemplate, World};
pub use protocol::{Action, Command, Snapshot};
pub use types::{BridgeConfig, BridgeStats, Guid, Vec3};
