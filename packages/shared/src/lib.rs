//! Utilities shared by the Hibiki relay server and client.

pub mod logger;
pub mod time;
