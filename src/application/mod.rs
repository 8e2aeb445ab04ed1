//! Application layer: orchestrates domain aggregates through the ports.

pub mod handlers;
