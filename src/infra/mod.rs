//! Infrastructure adapters and runtime bootstrap.

pub mod cdn;
pub mod error;
pub mod http_origin;
pub mod telemetry;
pub mod upstash;
