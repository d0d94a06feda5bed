#![deny(missing_docs)]
#![deny(missing_copy_implementations)]
#![deny(trivial_casts)]
#![deny(trivial_numeric_casts)]
#![deny(unused_import_braces)]
#![deny(unused_qualifications)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(rustdoc::private_intra_doc_links)]

//! This crate keeps track of how much filament a 3D printer uses, and takes
//! it off the spools loaded into each extruder.
//!
//! The [Odometer] watches the G-code sent to the printer and counts the
//! filament pushed through every tool. The [FilamentTracker] drives it from
//! print job events, converts the counted length into grams with the
//! [usage] formulas and records it against a [SpoolStore].

pub mod config;
pub mod gcode;
pub mod inventory;
pub mod noop;
pub mod odometer;
pub mod store;
#[cfg(test)]
mod tests;
pub mod tracker;
mod traits;
pub mod usage;

pub use config::{Config, Settings};
pub use gcode::GcodeLine;
pub use inventory::{Profile, Selection, Spool, SpoolRecord};
pub use odometer::{Odometer, PositioningMode};
pub use store::{InMemoryStore, StoreError, Table};
pub use tracker::{FilamentTracker, JobState, PrintEvent, SendOutcome, ToolUsage, UsageReport};
pub use traits::{PauseControl, SpoolStore};
pub use usage::UsageError;
