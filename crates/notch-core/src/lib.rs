//! Core data types for the NOTCH weather-to-MIDI tool
//!
//! This crate provides the observation record model shared by the log
//! store, the fetch collaborators and the daemon.

pub mod source;
pub mod types;

pub use source::*;
pub use types::*;
