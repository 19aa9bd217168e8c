//! HTTP handlers for the game-server sync protocol.

pub mod login;
pub mod disconnect;
pub mod sync;
pub mod acknowledge;
pub mod notifications;
