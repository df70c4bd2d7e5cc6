//! Line-oriented wire protocol.
//!
//! This module owns **every message that crosses the socket boundary**
//! between the bridge and a controller client.
//!
//! ## Framing
//!
//! | Direction       | Frame                                           |
//! |-----------------|-------------------------------------------------|
//! | server → client | one JSON [`Snapshot`] document per line         |
//! | client → server | one `name:action:value` command per line        |
//!
//! ## Design rules
//!
//! 1. Every outbound struct is `Serialize + Deserialize` with snake_case JSON.
//! 2. Nothing outside this module ever sees a raw command string — inbound
//!    lines become a typed [`Command`] here or are dropped.
//! 3. The snapshot carries a monotonically increasing `version`; clients
//!    and connection handlers use it to detect staleness.

use crate::types::Guid;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Inbound commands
// ---------------------------------------------------------------------------

/// Action vocabulary accepted from the controller.
///
/// The wire names are fixed; adding a variant here is a protocol change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Say,
    Stop,
    TurnLeft,
    TurnRight,
    MoveForward,
    MoveTo,
    TargetGuid,
    TargetNearest,
    Cast,
    Reset,
    LootGuid,
    SellGrey,
}

impl Action {
    /// Decode the wire name of an action.
    pub fn parse(word: &str) -> Option<Action> {
        Some(match word {
            "say" => Action::Say,
            "stop" => Action::Stop,
            "turn_left" => Action::TurnLeft,
            "turn_right" => Action::TurnRight,
            "move_forward" => Action::MoveForward,
            "move_to" => Action::MoveTo,
            "target_guid" => Action::TargetGuid,
            "target_nearest" => Action::TargetNearest,
            "cast" => Action::Cast,
            "reset" => Action::Reset,
            "loot_guid" => Action::LootGuid,
            "sell_grey" => Action::SellGrey,
            _ => return None,
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Say => "say",
            Action::Stop => "stop",
            Action::TurnLeft => "turn_left",
            Action::TurnRight => "turn_right",
            Action::MoveForward => "move_forward",
            Action::MoveTo => "move_to",
            Action::TargetGuid => "target_guid",
            Action::TargetNearest => "target_nearest",
            Action::Cast => "cast",
            Action::Reset => "reset",
            Action::LootGuid => "loot_guid",
            Action::SellGrey => "sell_grey",
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One parsed controller command, immutable once constructed.
///
/// `value` is action-specific and parsed again at apply time: free text for
/// `say`, three colon-separated floats for `move_to`, a numeric identifier
/// for `cast`/`target_guid`/`loot_guid`/`sell_grey`, an optional range for
/// `target_nearest`, empty otherwise.
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    pub avatar: String,
    pub action: Action,
    pub value: String,
}

impl Command {
    /// Parse one `name:action:value` line.
    ///
    /// Splits on the first two colons; everything after the second colon is
    /// the value (so `move_to` coordinates survive intact). Missing
    /// delimiters, an empty avatar name, or an unknown action yield `None` —
    /// malformed lines are dropped, never an error.
    pub fn parse(line: &str) -> Option<Command> {
        let line = line.trim();
        let (avatar, rest) = line.split_once(':')?;
        let (action, value) = rest.split_once(':')?;
        if avatar.is_empty() {
            return None;
        }
        Some(Command {
            avatar: avatar.to_string(),
            action: Action::parse(action)?,
            value: value.to_string(),
        })
    }
}

// ---------------------------------------------------------------------------
// Outbound snapshot
// ---------------------------------------------------------------------------

/// Relation of an avatar to its current selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetStatus {
    None,
    Alive,
    Dead,
}

/// One entry of an avatar's nearby-entity list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NearbyEntity {
    pub guid: Guid,
    pub name: String,
    pub level: u32,
    pub attackable: bool,
    pub vendor: bool,
    /// Guid of whatever this entity is currently targeting (0 = nothing);
    /// lets the controller detect aggro on its avatars.
    pub target: Guid,
    pub hp: u32,
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

/// Per-avatar state record inside a [`Snapshot`].
///
/// The field set is stable — controllers key on these names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerState {
    pub name: String,
    pub hp: u32,
    pub max_hp: u32,
    pub power: u32,
    pub max_power: u32,
    pub level: u32,
    pub x: f32,
    pub y: f32,
    pub z: f32,
    /// Orientation in radians, `[0, 2π)`.
    pub o: f32,
    pub combat: bool,
    pub casting: bool,
    pub free_slots: u32,
    pub target_status: TargetStatus,
    pub target_hp: u32,
    pub tx: f32,
    pub ty: f32,
    pub tz: f32,
    /// Event deltas accumulated since the previous publish cycle.
    pub xp_gained: u64,
    pub loot_copper: u64,
    pub loot_score: u64,
    pub leveled_up: bool,
    pub equipped_upgrade: bool,
    pub nearby_mobs: Vec<NearbyEntity>,
}

/// The complete, versioned, point-in-time document published to clients.
///
/// Replaced wholesale each publish cycle; `version` never decreases.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: u64,
    pub players: Vec<PlayerState>,
}

impl Snapshot {
    pub fn empty() -> Self {
        Self {
            version: 0,
            players: Vec::new(),
        }
    }
}
