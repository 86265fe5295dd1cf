//! TransportSource trait - byte source abstraction
//!
//! Defines a unified interface for transport byte sources, decoupling the
//! ingestion pipeline from the concrete receiver. Real BLE bridge receivers
//! and the mock fleet implement the same trait.

use std::sync::Arc;

use bytes::Bytes;

/// Byte chunk callback type
///
/// When a source produces a chunk of wire bytes it hands them through this
/// callback. Uses `Arc` to allow callback sharing across multiple contexts.
pub type ByteCallback = Arc<dyn Fn(Bytes) + Send + Sync>;

/// Transport byte source trait
///
/// Abstracts the common behavior of real receivers and the mock fleet.
pub trait TransportSource: Send + Sync {
    /// Node id the produced packets are attributed to
    fn node_id(&self) -> u16;

    /// Register data callback
    ///
    /// When the source produces bytes, it calls the callback. If already
    /// listening, repeated calls are idempotent (no double registration).
    fn listen(&self, callback: ByteCallback);

    /// Stop producing
    fn stop(&self);

    /// Check if currently listening
    fn is_listening(&self) -> bool;
}
