//! Command-line client for the Hibiki relay.

pub mod error;
pub mod formatter;
pub mod runner;
pub mod session;
pub mod ui;

pub use error::ClientError;
pub use runner::{ReconnectPolicy, run_client};
