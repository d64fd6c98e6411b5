//! Approach Registry
//!
//! Owns the state of the four fixed intersection approaches (east, west,
//! south, north): vehicle counts from the latest detection pass, the
//! published LED output vector, and the stamp of the most recent frame.
//! Each approach can be claimed by at most one live device session at a
//! time; session handlers hold an RAII handle that releases the slot on
//! drop, so a panicking handler can never leak its binding.

mod approach;
mod registry;

pub use approach::{ApproachId, ApproachState, LedVector, VehicleCounts};
pub use registry::{ApproachSnapshot, Registry, RegistryError, SessionHandle};

/// Number of approaches at the managed intersection. Fixed at startup,
/// never grows.
pub const APPROACH_COUNT: usize = 4;
