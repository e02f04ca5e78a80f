//! HTTP handlers

pub mod health;
pub mod edge;
pub mod stats;
