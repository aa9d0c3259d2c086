//! # mate-rr
//!
//! RandR display configuration for the MATE desktop.
//!
//! This crate models the display hardware of an X screen, stores and matches
//! monitor layouts, and programs the hardware to show a chosen layout:
//! - [`screen`] - Hardware topology snapshots (outputs, CRTCs, modes)
//! - [`monitors`] - Hardware-independent layouts and `monitors.xml`
//! - [`assignment`] - CRTC assignment search and the commit sequence
//! - [`labeler`] - Per-output identification colours
//! - [`backend`] - Display server protocol (X11 RandR, in-memory simulation)
//!
//! # Architecture
//!
//! ```text
//! mate-rr
//!   ├─> Backend (RandR requests: query, configure CRTC, resize, primary)
//!   ├─> Screen (owns the backend and the current ScreenInfo snapshot)
//!   ├─> Configuration (what each output should show)
//!   │     ├─> monitors.xml (load, match, save with backup)
//!   │     └─> Labeler (identification colours)
//!   └─> CrtcAssignment (search, then commit under a server grab)
//! ```
//!
//! # Data Flow
//!
//! **Restore path:** monitors.xml → Configuration → CrtcAssignment → Screen → server
//!
//! **Capture path:** server → Screen → ScreenInfo → Configuration → monitors.xml
//!
//! # Example
//!
//! ```no_run
//! use mate_rr::backend::MemoryBackend;
//! use mate_rr::monitors::{self, Configuration};
//! use mate_rr::screen::Screen;
//!
//! # fn main() -> mate_rr::Result<()> {
//! let backend = MemoryBackend::from_fixture("hardware.toml".as_ref())?;
//! let mut screen = Screen::new(Box::new(backend))?;
//!
//! let current = Configuration::new_current(&screen.info());
//! current.apply(&mut screen, 0)?;
//! monitors::save(&current, "monitors.xml".as_ref())?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

/// CRTC assignment search and commit
pub mod assignment;

/// Display server backends
pub mod backend;

/// Tool configuration
pub mod config;

/// Error types
pub mod error;

/// Output identification colours
pub mod labeler;

/// Display configurations and their persistence
pub mod monitors;

/// Hardware topology model
pub mod screen;

/// Utility functions
pub mod utils;

pub use assignment::{AssignmentError, CrtcAssignment};
pub use error::{ApplyStep, RandrError, Result};
pub use labeler::Labeler;
pub use monitors::{Configuration, OutputInfo};
pub use screen::{Screen, ScreenEvent, ScreenInfo};
