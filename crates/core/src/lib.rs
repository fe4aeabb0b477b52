//! Emote registry and access-control core for eevee-rs.

pub mod registry;
pub mod services;

pub use registry::{CacheStats, EmoteRegistry};
pub use services::*;
