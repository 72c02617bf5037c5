//! Domain models shared across the registry, stores, and token services.

pub mod device;
