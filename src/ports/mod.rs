//! Port traits: the engine's view of the outside world.
//!
//! The engine itself never touches a port; the CLI wires adapters to it.

pub mod config_port;
pub mod data_port;
pub mod result_port;
