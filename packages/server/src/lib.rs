//! Real-time text relay server.
//!
//! Every text frame a connected client sends is broadcast to every connected
//! client, sender included.

// layers
pub mod domain;
pub mod infrastructure;
pub mod ui;
pub mod usecase;

pub mod config;
pub mod error;
