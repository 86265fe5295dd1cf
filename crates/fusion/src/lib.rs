//! # Orientation Fusion
//!
//! Per-sensor 9-axis sensor fusion: gyroscope integration corrected by
//! gravity (tilt) and, when trustworthy, by the magnetometer (heading).
//!
//! Robustness gates:
//! - external acceleration withholds tilt correction;
//! - the [`DisturbanceDetector`] weights or withholds heading correction;
//! - rest detection drives gyro-bias learning and a higher correction gain.
//!
//! Magnetometer hard/soft-iron calibration ([`MagCalibrator`]) is a one-shot
//! run off the critical path; its output record is applied read-only on
//! every heading tick.

mod convert;
mod disturbance;
mod filter;
mod magcal;

pub use convert::{quat_to_contract, to_quat, to_vector};
pub use disturbance::{DisturbanceAssessment, DisturbanceDetector, DisturbanceKind};
pub use filter::{FusionStatus, OrientationFilter};
pub use magcal::MagCalibrator;
