//! GestureLink Serial - Command transport to the peripheral
//!
//! This crate owns the byte-oriented serial link: opening the port with a
//! settle delay, fire-and-forget command writes, and the shutdown handshake.

pub mod link;

pub use link::{default_port, LinkError, SerialLink, SerialSettings, DEFAULT_BAUD_RATE};
