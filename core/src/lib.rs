//! # atacfg core
//!
//! Everything that touches the network or the clock: interface selection,
//! the subnet sweep, neighbor-table lookups, the adapter's shell session,
//! the firmware server and the workflow that strings them together.

pub mod arp;
pub mod assets;
pub mod discovery;
pub mod locator;
pub mod network;
pub mod selector;
pub mod server;
pub mod session;
pub mod workflow;
