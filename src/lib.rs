//! sensett library.
//!
//! Exposes the sensor pipeline, its port traits and the concrete adapters
//! for integration testing.  Linux bus access is behind the `linux`
//! feature; everything else builds and tests on any host.

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod config;
pub mod control;
pub mod error;
pub mod scheduler;
pub mod sensors;
