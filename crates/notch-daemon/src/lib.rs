//! NOTCH daemon: periodic weather logging with MIDI forwarding
//!
//! The [`Scheduler`] drives one fetch worker whose results flow over a
//! dispatch queue into the [`App`], the only owner of the log store and
//! the MIDI session.

pub mod app;
pub mod config;
pub mod forward;
pub mod scheduler;

pub use app::App;
pub use forward::derive_controls;
pub use scheduler::{Dispatch, Scheduler, SchedulerError, SchedulerResult};
