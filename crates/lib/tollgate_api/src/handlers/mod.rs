//! Request handlers.

pub mod admin;
pub mod device;
pub mod health;
pub mod playback;
