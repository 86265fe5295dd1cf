//! Sink implementations
//!
//! Contains LogSink, JsonlFileSink, and NetworkSink.

mod file;
mod log;
mod network;

pub use self::file::JsonlFileSink;
pub use self::log::LogSink;
pub use self::network::NetworkSink;
