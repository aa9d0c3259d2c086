//! Display configurations
//!
//! A [`Configuration`] says what every output should show, independently of
//! the hardware: position, size, refresh rate, rotation, the primary flag and
//! whether outputs mirror each other. Each output also carries the identity
//! of the monitor attached to it (vendor, product, serial), which is how a
//! stored configuration is matched against the monitors plugged in now.
//!
//! # Lifecycle
//!
//! ```text
//! ScreenInfo ──new_current──┐
//!                           ├──> Configuration ──apply──> CrtcAssignment ──> Screen
//! monitors.xml ─new_stored──┘          │
//!                                      └──save──> monitors.xml (+ .backup)
//! ```
//!
//! # Matching
//!
//! [`Configuration::matches`] compares hardware fingerprints and
//! [`Configuration::equals`] additionally compares what is shown. Both are
//! one-directional; see [`matching`].

mod config;
pub mod matching;
mod output_info;
pub mod store;
pub mod xml;

pub use config::Configuration;
pub use output_info::OutputInfo;
pub use store::{backup_path, intended_path, load_all, save};
