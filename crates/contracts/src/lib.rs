//! # Contracts
//!
//! Frozen interface contracts (ICD), defining inter-crate data structures and traits.
//! All business crates can only depend on this crate, reverse dependencies are prohibited.
//!
//! ## Time Model
//! - `timestamp_us` (u32, microseconds) is the beacon-derived sensor clock and the
//!   primary alignment key; it wraps at u32::MAX and comparisons are modular.
//! - `frame_number` (u32) orders packets within one node and drives jitter-buffer release.
//! - Wall time enters only as caller-supplied monotonic milliseconds for timeouts.
//!
//! ## Coordinate Model
//! World frame is right-handed Y-up (Y up, Z forward, X right). Quaternions are
//! unit (w, x, y, z), hemisphere-normalized to w >= 0 on every pipeline output.

mod blueprint;
mod error;
mod fusion_config;
mod magcal;
mod math;
mod motion;
mod sample;
mod sensor_id;
mod sink;
mod sync;
mod sync_config;
mod tare;

pub use blueprint::*;
pub use error::*;
pub use fusion_config::*;
pub use magcal::*;
pub use math::*;
pub use motion::*;
pub use sample::*;
pub use sensor_id::SensorId;
pub use sink::*;
pub use sync::*;
pub use sync_config::*;
pub use tare::*;
