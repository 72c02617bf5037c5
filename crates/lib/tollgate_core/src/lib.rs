//! # tollgate_core
//!
//! Core domain logic for Tollgate: device registry, credential vault,
//! session and playback tokens.

pub mod adult_pin;
pub mod auth;
pub mod device_code;
pub mod migrate;
pub mod models;
pub mod playback;
pub mod registry;
pub mod store;
pub mod upstream;
pub mod vault;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_not_empty() {
        assert!(!version().is_empty());
    }
}
