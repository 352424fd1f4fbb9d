//! Infrastructure layer: in-process state owned by dedicated tasks.

pub mod registry;

pub use registry::{ConnectionRegistry, RegistryHandle};
