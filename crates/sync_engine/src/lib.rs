//! # Sync Engine
//!
//! Reconstructs time-aligned multi-sensor frames from a lossy wireless
//! stream.
//!
//! Two stages, both deterministic given their inputs and the caller's clock:
//!
//! 1. [`JitterBuffer`] - per-node reorder buffer. Releases decoded batches
//!    in strict `frame_number` order: immediately when the next expected
//!    frame is at the head, otherwise after a bounded delay. Detects device
//!    resets (large backward jumps) and flushes.
//! 2. [`FrameAssembler`] - groups released per-sensor samples into
//!    timestamp slots and emits a [`contracts::SyncFrame`] once a slot holds
//!    exactly one sample from every expected sensor.
//!
//! All timeouts are driven by caller-supplied monotonic milliseconds and the
//! message-time carried on the samples; the engine never reads a clock.

mod assembler;
mod engine;
mod jitter;

pub use assembler::FrameAssembler;
pub use contracts::{AssemblerConfig, JitterConfig, SyncEngineConfig};
pub use engine::SyncEngine;
pub use jitter::{JitterBuffer, JitterState};
