//! Avatar Provisioning Pipeline – turns a "spawn avatar by name" request
//! into a fully attached avatar without ever blocking the tick.
//!
//! ## State machine
//!
//! ```text
//! Requested ──→ DatastoreQuerySubmitted ──→ DatastoreQueryComplete ──→ SimulationAttached
//!     │                  │                          │
//!     └──────────────────┴──────────────────────────┴──→ Failed
//! ```
//!
//! `Requested` validates preconditions synchronously (name non-empty, not
//! already online, persisted identity resolvable, owning account free, no
//! provisioning already in flight for that account). Submission is
//! fire-and-forget: the datastore runs the load on its own executor and
//! delivers the record through a oneshot channel. Completions are collected
//! by a non-blocking poll once per tick, so hydration always happens on the
//! tick thread. Exactly one in-flight request per account; a concurrent
//! second request is rejected synchronously, never queued.

use crate::types::{AccountId, Guid, Vec3};
use crate::world::{Avatar, World};
use log::{debug, info};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use tokio::sync::oneshot;
use tokio::sync::oneshot::error::TryRecvError;

// ---------------------------------------------------------------------------
// Datastore collaborator
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, thiserror::Error)]
pub enum DatastoreError {
    #[error("datastore query failed: {0}")]
    Query(String),
    #[error("no persisted record for guid {0}")]
    Missing(Guid),
}

/// Persisted avatar record as loaded from the datastore.
#[derive(Debug, Clone)]
pub struct AvatarRecord {
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
    pub money: u64,
}

/// Completion handle for an asynchronous record load.
pub type LoadHandle = oneshot::Receiver<Result<AvatarRecord, DatastoreError>>;

/// The persisted-record datastore, specified at its interface only.
///
/// `resolve` and `mark_online` are the synchronous query/execute path;
/// `load` submits the record batch asynchronously and must never block the
/// caller.
pub trait Datastore: Send + Sync {
    /// Index lookup: avatar name → (persisted guid, owning account).
    fn resolve(&self, name: &str) -> Option<(Guid, AccountId)>;

    /// Fire-and-forget load of the full record; the result arrives on the
    /// returned channel from the datastore's own execution context.
    fn load(&self, guid: Guid) -> LoadHandle;

    /// Synchronous small write marking the avatar online/offline.
    fn mark_online(&self, guid: Guid, online: bool);
}

/// In-memory datastore used by the binary and tests.
///
/// Loads complete on a short-lived worker thread to exercise the same
/// cross-context hand-off a real query executor would.
pub struct RecordStore {
    by_name: Mutex<HashMap<String, (Guid, AccountId)>>,
    records: Mutex<HashMap<Guid, AvatarRecord>>,
    online: Mutex<HashSet<Guid>>,
}

impl RecordStore {
    pub fn new() -> Self {
        Self {
            by_name: Mutex::new(HashMap::new()),
            records: Mutex::new(HashMap::new()),
            online: Mutex::new(HashSet::new()),
        }
    }

    /// Register a record and index it by name.
    pub fn insert_record(&self, record: AvatarRecord) {
        self.by_name
            .lock()
            .insert(record.name.clone(), (record.guid, record.account));
        self.records.lock().insert(record.guid, record);
    }

    /// Index a name without a backing record; loads for it will fail.
    pub fn insert_dangling_name(&self, name: &str, guid: Guid, account: AccountId) {
        self.by_name.lock().insert(name.to_string(), (guid, account));
    }

    pub fn is_online(&self, guid: Guid) -> bool {
        self.online.lock().contains(&guid)
    }
}

impl Default for RecordStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Datastore for RecordStore {
    fn resolve(&self, name: &str) -> Option<(Guid, AccountId)> {
        self.by_name.lock().get(name).copied()
    }

    fn load(&self, guid: Guid) -> LoadHandle {
        let (tx, rx) = oneshot::channel();
        let result = self
            .records
            .lock()
            .get(&guid)
            .cloned()
            .ok_or(DatastoreError::Missing(guid));
        std::thread::spawn(move || {
            let _ = tx.send(result);
        });
        rx
    }

    fn mark_online(&self, guid: Guid, online: bool) {
        if online {
            self.online.lock().insert(guid);
        } else {
            self.online.lock().remove(&guid);
        }
    }
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, thiserror::Error)]
pub enum ProvisionError {
    #[error("avatar name must not be empty")]
    EmptyName,
    #[error("avatar '{0}' is already online")]
    AlreadyOnline(String),
    #[error("no persisted avatar named '{0}'")]
    UnknownAvatar(String),
    #[error("account {0} already has an avatar online")]
    AccountBusy(AccountId),
    #[error("provisioning already in progress for account {0}")]
    InFlight(AccountId),
    #[error(transparent)]
    Datastore(#[from] DatastoreError),
    #[error("hydration failed: {0}")]
    Hydration(String),
}

struct Pending {
    name: String,
    requester: Guid,
    handle: LoadHandle,
}

/// Outcome of one completed (or failed) provisioning request.
pub struct ProvisionOutcome {
    pub name: String,
    pub account: AccountId,
    /// Avatar that issued the spawn request, for reply routing.
    pub requester: Guid,
    pub result: Result<Guid, ProvisionError>,
}

/// Registry of in-flight provisioning requests, keyed by account.
pub struct ProvisioningPipeline {
    in_flight: Mutex<HashMap<AccountId, Pending>>,
}

impl ProvisioningPipeline {
    pub fn new() -> Self {
        Self {
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    /// `Requested` → `DatastoreQuerySubmitted`, or a synchronous failure.
    ///
    /// On success a registry entry exists under the owning account until the
    /// load completes, blocking duplicate concurrent requests.
    pub fn request(
        &self,
        world: &World,
        store: &dyn Datastore,
        name: &str,
        requester: Guid,
    ) -> Result<(), ProvisionError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ProvisionError::EmptyName);
        }
        if world.avatar_by_name(name).is_some() {
            return Err(ProvisionError::AlreadyOnline(name.to_string()));
        }
        let (guid, account) = store
            .resolve(name)
            .ok_or_else(|| ProvisionError::UnknownAvatar(name.to_string()))?;
        if world.account_online(account) {
            return Err(ProvisionError::AccountBusy(account));
        }

        let mut in_flight = self.in_flight.lock();
        if in_flight.contains_key(&account) {
            return Err(ProvisionError::InFlight(account));
        }
        let handle = store.load(guid);
        in_flight.insert(
            account,
            Pending {
                name: name.to_string(),
                requester,
                handle,
            },
        );
        debug!("provisioning submitted for '{name}' (account {account})");
        Ok(())
    }

    /// Non-blocking completion poll, run once per tick on the tick thread.
    ///
    /// Every resolved load transitions to `SimulationAttached` or `Failed`;
    /// either way its registry entry is gone when this returns.
    pub fn drain_completions(
        &self,
        world: &mut World,
        store: &dyn Datastore,
    ) -> Vec<ProvisionOutcome> {
        let mut outcomes = Vec::new();
        let mut in_flight = self.in_flight.lock();
        let mut still_pending = HashMap::new();

        for (account, mut pending) in in_flight.drain() {
            let result = match pending.handle.try_recv() {
                Err(TryRecvError::Empty) => {
                    still_pending.insert(account, pending);
                    continue;
                }
                Err(TryRecvError::Closed) => Err(ProvisionError::Datastore(
                    DatastoreError::Query("completion channel closed".to_string()),
                )),
                Ok(Err(e)) => Err(ProvisionError::Datastore(e)),
                Ok(Ok(record)) => attach(world, store, record),
            };
            outcomes.push(ProvisionOutcome {
                name: pending.name,
                account,
                requester: pending.requester,
                result,
            });
        }

        *in_flight = still_pending;
        outcomes
    }

    pub fn in_flight_count(&self) -> usize {
        self.in_flight.lock().len()
    }
}

impl Default for ProvisioningPipeline {
    fn default() -> Self {
        Self::new()
    }
}

/// `DatastoreQueryComplete` → `SimulationAttached`: hydrate the record into
/// a live avatar and register it with the world.
fn attach(
    world: &mut World,
    store: &dyn Datastore,
    record: AvatarRecord,
) -> Result<Guid, ProvisionError> {
    if record.max_health == 0 {
        return Err(ProvisionError::Hydration(format!(
            "record for '{}' has no vitals",
            record.name
        )));
    }
    if world.avatar(record.guid).is_some() {
        return Err(ProvisionError::Hydration(format!(
            "guid {} is already attached",
            record.guid
        )));
    }

    let mut avatar = Avatar::new(record.guid, record.account, record.name.clone(), record.position);
    avatar.level = record.level;
    avatar.health = record.health;
    avatar.max_health = record.max_health;
    avatar.power = record.power;
    avatar.max_power = record.max_power;
    avatar.orientation = record.orientation;
    avatar.money = record.money;

    let guid = avatar.guid;
    world.attach_avatar(avatar);
    store.mark_online(guid, true);
    info!("avatar '{}' attached at {}", record.name, record.position);
    Ok(guid)
}
