//! Approach identities and per-approach signal state

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// One of the four fixed intersection approaches.
///
/// The identity set is closed: names are assigned at process start and
/// never negotiated with devices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApproachId {
    East,
    West,
    South,
    North,
}

impl ApproachId {
    /// All approaches in the fixed processing order used by the control
    /// loop and reporting snapshots.
    pub const ALL: [ApproachId; 4] = [
        ApproachId::East,
        ApproachId::West,
        ApproachId::South,
        ApproachId::North,
    ];

    /// Wire name of this approach (the registration token a device sends).
    pub fn as_str(&self) -> &'static str {
        match self {
            ApproachId::East => "east",
            ApproachId::West => "west",
            ApproachId::South => "south",
            ApproachId::North => "north",
        }
    }

    /// Resolve a claimed identity name. Exact match only, case-sensitive.
    pub fn from_name(name: &str) -> Option<ApproachId> {
        match name {
            "east" => Some(ApproachId::East),
            "west" => Some(ApproachId::West),
            "south" => Some(ApproachId::South),
            "north" => Some(ApproachId::North),
            _ => None,
        }
    }

    /// Slot index, stable across the process lifetime.
    pub fn index(&self) -> usize {
        match self {
            ApproachId::East => 0,
            ApproachId::West => 1,
            ApproachId::South => 2,
            ApproachId::North => 3,
        }
    }
}

impl fmt::Display for ApproachId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Vehicle tallies produced by the detection engine for one frame.
///
/// Overwritten at the start of every scheduler cycle and filled in by
/// that cycle's detection pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VehicleCounts {
    /// Vehicles seen head-on (approaching the stop line).
    pub front: u32,
    /// Vehicles seen from behind (leaving the intersection).
    pub back: u32,
    /// Vehicles seen side-on (crossing traffic).
    pub side: u32,
    /// Accident-classified vehicles.
    pub accident: u32,
}

/// The four output flags a device polls: green-straight, green-left,
/// amber, red. Encoded as independent flags rather than an enum because
/// that is the device's wire contract.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedVector {
    pub green: bool,
    pub green_left: bool,
    pub amber: bool,
    pub red: bool,
}

impl LedVector {
    /// All lamps off.
    pub const OFF: LedVector = LedVector {
        green: false,
        green_left: false,
        amber: false,
        red: false,
    };

    /// Straight-ahead green.
    pub const GREEN: LedVector = LedVector {
        green: true,
        green_left: false,
        amber: false,
        red: false,
    };

    /// Left-turn green.
    pub const GREEN_LEFT: LedVector = LedVector {
        green: false,
        green_left: true,
        amber: false,
        red: false,
    };

    /// Amber interstitial.
    pub const AMBER: LedVector = LedVector {
        green: false,
        green_left: false,
        amber: true,
        red: false,
    };

    /// Stop.
    pub const RED: LedVector = LedVector {
        green: false,
        green_left: false,
        amber: false,
        red: true,
    };

    /// Flags in wire order as 0/1 digits.
    pub fn as_flags(&self) -> [u8; 4] {
        [
            self.green as u8,
            self.green_left as u8,
            self.amber as u8,
            self.red as u8,
        ]
    }

    /// Space-separated 0/1 encoding sent in reply to `/get_led`.
    pub fn to_wire(&self) -> String {
        let f = self.as_flags();
        format!("{} {} {} {}", f[0], f[1], f[2], f[3])
    }
}

/// Mutable per-approach state, guarded by the approach's own lock.
#[derive(Debug, Clone, Default)]
pub struct ApproachState {
    /// Tallies from the most recent detection pass.
    pub counts: VehicleCounts,
    /// Last committed output vector.
    pub leds: LedVector,
    /// Unix-seconds stamp of the most recently stored frame file, the
    /// join key between session handler and detection step.
    pub frame_stamp: Option<i64>,
}

/// One approach and its guarded state.
#[derive(Debug)]
pub struct Approach {
    id: ApproachId,
    state: Mutex<ApproachState>,
}

impl Approach {
    pub(crate) fn new(id: ApproachId) -> Self {
        Self {
            id,
            state: Mutex::new(ApproachState::default()),
        }
    }

    /// Identity of this approach.
    pub fn id(&self) -> ApproachId {
        self.id
    }

    /// Take the per-approach guard. All writes are whole-field, so a
    /// poisoned lock still holds consistent state and is recovered.
    pub(crate) fn lock(&self) -> MutexGuard<'_, ApproachState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
