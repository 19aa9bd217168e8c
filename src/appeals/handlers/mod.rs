//! HTTP handlers for the `/appeals` routes and in-game ticket creation.

pub mod root;
pub mod by_id;
pub mod ticket;
