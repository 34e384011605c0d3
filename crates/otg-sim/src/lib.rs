//! Simulated OTG controller.
//!
//! Implements the five-operation controller contract in-process
//! ([`SimController`], usable directly as an `otg_client::Controller`) and
//! over HTTP ([`server::router`]). Ports are back to back and transmission
//! is instantaneous, which makes the simulator deterministic enough for
//! harness tests and local dry runs. It is not a model of a real packet
//! engine.

pub mod engine;
pub mod error;
pub mod frame;
pub mod pcap;
pub mod server;
pub mod validate;

pub mod test_util;

pub use engine::SimController;
pub use error::SimError;
