//! Application services: page resolution, rendering and background refresh.

pub mod error;
pub mod origin;
pub mod refresh;
pub mod registry;
pub mod render;
pub mod resolver;
