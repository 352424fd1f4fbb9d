//! UseCase layer: message-routing policies.

mod broadcast;

pub use broadcast::BroadcastHandler;
