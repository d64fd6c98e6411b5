//! Registry Implementation

use crate::approach::{Approach, ApproachId, LedVector, VehicleCounts};
use serde::Serialize;
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;
use tracing::info;

/// Errors raised when binding a session to an approach slot.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// The claimed identity is not one of the four fixed names.
    #[error("unknown approach name {0:?}")]
    UnknownName(String),

    /// The approach already has a live session.
    #[error("approach \"{0}\" already has a live session")]
    AlreadyBound(ApproachId),
}

/// Read-only view of one approach, taken under its guard.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ApproachSnapshot {
    pub id: ApproachId,
    pub bound: bool,
    pub counts: VehicleCounts,
    pub leds: LedVector,
    pub frame_stamp: Option<i64>,
}

/// Fixed-capacity table of the four approaches and their session
/// bindings.
///
/// Slot assignment and release go through the registry-wide binding
/// lock; ordinary field access takes only the per-approach guard and is
/// never held across network I/O.
#[derive(Debug)]
pub struct Registry {
    approaches: [Approach; 4],
    bindings: Mutex<[bool; 4]>,
}

impl Registry {
    /// Create the registry with all four slots free.
    pub fn new() -> Self {
        Self {
            approaches: ApproachId::ALL.map(Approach::new),
            bindings: Mutex::new([false; 4]),
        }
    }

    /// Bind a session to the named approach.
    ///
    /// Atomic under the registry lock: fails without consuming a slot if
    /// the name is unknown or the approach already has a live session.
    /// The returned handle releases the slot when dropped.
    pub fn bind(self: &Arc<Self>, name: &str) -> Result<SessionHandle, RegistryError> {
        let id = ApproachId::from_name(name)
            .ok_or_else(|| RegistryError::UnknownName(name.to_string()))?;

        let mut bindings = self
            .bindings
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if bindings[id.index()] {
            return Err(RegistryError::AlreadyBound(id));
        }
        bindings[id.index()] = true;
        drop(bindings);

        info!(approach = %id, "session bound");
        Ok(SessionHandle {
            registry: Arc::clone(self),
            id,
            released: false,
        })
    }

    /// Release an approach slot. Idempotent: releasing a free slot is a
    /// no-op.
    fn release(&self, id: ApproachId) {
        let mut bindings = self
            .bindings
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if bindings[id.index()] {
            bindings[id.index()] = false;
            info!(approach = %id, "session released");
        }
    }

    /// Whether the approach currently has a live session.
    pub fn is_bound(&self, id: ApproachId) -> bool {
        self.bindings.lock().unwrap_or_else(PoisonError::into_inner)[id.index()]
    }

    fn approach(&self, id: ApproachId) -> &Approach {
        &self.approaches[id.index()]
    }

    /// Zero the approach's counts at the start of a scheduler cycle.
    pub fn begin_cycle(&self, id: ApproachId) {
        self.approach(id).lock().counts = VehicleCounts::default();
    }

    /// Store the counts produced by this cycle's detection pass.
    pub fn record_counts(&self, id: ApproachId, counts: VehicleCounts) {
        self.approach(id).lock().counts = counts;
    }

    /// Counts from the most recent detection pass.
    pub fn counts(&self, id: ApproachId) -> VehicleCounts {
        self.approach(id).lock().counts
    }

    /// Commit a new output vector for the approach. Devices observe it
    /// on their next `/get_led` poll.
    pub fn publish_outputs(&self, id: ApproachId, leds: LedVector) {
        self.approach(id).lock().leds = leds;
    }

    /// Last committed output vector.
    pub fn outputs(&self, id: ApproachId) -> LedVector {
        self.approach(id).lock().leds
    }

    /// Stamp of the approach's most recent frame, if one was stored.
    pub fn frame_stamp(&self, id: ApproachId) -> Option<i64> {
        self.approach(id).lock().frame_stamp
    }

    /// Consistent read of the approach's state under its guard.
    pub fn snapshot(&self, id: ApproachId) -> ApproachSnapshot {
        let state = self.approach(id).lock();
        ApproachSnapshot {
            id,
            bound: self.is_bound(id),
            counts: state.counts,
            leds: state.leds,
            frame_stamp: state.frame_stamp,
        }
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

/// Exclusive ownership of one approach slot for the lifetime of a
/// session handler. Dropping the handle releases the slot, so release
/// happens exactly once even on abnormal termination.
#[derive(Debug)]
pub struct SessionHandle {
    registry: Arc<Registry>,
    id: ApproachId,
    released: bool,
}

impl SessionHandle {
    /// Identity this session is bound to.
    pub fn id(&self) -> ApproachId {
        self.id
    }

    /// Current output vector for this approach.
    pub fn leds(&self) -> LedVector {
        self.registry.outputs(self.id)
    }

    /// Record the stamp of a newly stored frame file. Takes the
    /// per-approach guard only for the assignment.
    pub fn set_frame_stamp(&self, stamp: i64) {
        self.registry.approach(self.id).lock().frame_stamp = Some(stamp);
    }

    /// Stamp of the most recent frame, if any.
    pub fn frame_stamp(&self) -> Option<i64> {
        self.registry.frame_stamp(self.id)
    }

    /// Release the slot early. Equivalent to dropping the handle.
    pub fn release(mut self) {
        self.registry.release(self.id);
        self.released = true;
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        if !self.released {
            self.registry.release(self.id);
        }
    }
}
