//! # Orientation Pipeline
//!
//! Maps fused sensor quaternions into anatomical bone frames and clinical
//! joint angles.
//!
//! Layers, applied in order:
//! 1. input normalization (non-finite → identity, marked invalid);
//! 2. mounting tare (sensor-local offset; single-pose or two-layer);
//! 3. frame alignment (PCA-derived axis map, two-layer segments);
//! 4. heading tare (yaw zeroing, per segment or global);
//! 5. joint decomposition with per-joint Euler orders and a subtracted
//!    joint tare.
//!
//! Calibration primitives (spherical mean, stillness, functional-axis PCA),
//! the soft-tissue-artifact low-pass and the reliability statistics used by
//! test-retest tooling live here too.

mod convert;
mod euler;
mod joints;
mod pca;
mod pipeline;
mod reliability;
mod spherical;
mod sta;

pub use convert::{quat_to_contract, to_quat, to_vector};
pub use euler::{decompose, euler_to_quat};
pub use joints::decompose_joint;
pub use pca::{anatomical_alignment, functional_axis, AxisEstimate};
pub use pipeline::{
    capture_heading_tare, capture_mounting_robust, capture_mounting_single,
    capture_mounting_two_layer, compute_heading_tare, TarePipeline, TaredPose,
};
pub use reliability::{icc_2_1, mdc95, sem};
pub use spherical::{spherical_mean, stillness_variance, stillness_score};
pub use sta::{filtfilt, StaFilter};
