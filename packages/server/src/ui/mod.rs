//! HTTP and WebSocket surface of the relay server.

mod handler;
mod server;
mod session;
mod signal;
pub mod state;

pub use server::{Server, build_router};
pub use session::ClientSession;
pub use signal::shutdown_signal;
