//! Connection registry.
//!
//! Membership is owned by one task, the control loop in [`ConnectionRegistry`].
//! Every other component talks to it through a [`RegistryHandle`], so the
//! mapping is never touched concurrently and needs no lock.
//!
//! Membership changes are atomic. Snapshots are consistent at the moment the
//! control loop takes them and may be stale by the time they are used.

mod actor;
mod command;
mod handle;

pub use actor::ConnectionRegistry;
pub use handle::RegistryHandle;
