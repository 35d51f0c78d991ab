//! Containment check for a cup placed into an open-topped box.
//!
//! The crate samples the cup geometry, decides whether every part of it stays
//! inside the box walls, and rate-limits re-evaluation while the configuration
//! is being edited. `api` exposes the shared session over HTTP.

pub mod api;
pub mod config;
pub mod containment;
pub mod geometry;
pub mod model;
pub mod session;
pub mod throttle;
pub mod types;
