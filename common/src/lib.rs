//! # atacfg common
//!
//! Domain types shared by the provisioning engine and the command line.
//!
//! Nothing in here opens sockets or spawns processes. Reading `/sys` and
//! `/proc` to classify interfaces is the one exception.

pub mod config;
pub mod device;
pub mod error;
pub mod network;
pub mod operator;
pub mod plan;
pub mod script;
pub mod version;
