//! # Session
//!
//! The host-side control surface. One [`MocapSession`] owns the whole
//! numerical pipeline for a capture session:
//!
//! ```text
//! feed(bytes) → decoder → jitter buffer → assembler → per-sensor fusion
//!             → per-segment tare pipeline → joint decomposition → pop_frames()
//! ```
//!
//! Calibration operations (mag calibration runs, tare captures) mutate
//! session state between frame updates; frame updates themselves only read
//! it. All timing comes from the caller: wire timestamps for message time
//! and a monotonic millisecond clock for timeouts.

mod magrun;
mod session;

pub use magrun::MagCalRunner;
pub use session::MocapSession;
