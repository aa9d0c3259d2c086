//! Utility Functions and Diagnostics
//!
//! System diagnostics and user-friendly error formatting for the `mate-rr`
//! tool.
//!
//! ## Diagnostics
//!
//! The [`diagnostics`] module logs the runtime environment and the display
//! hardware:
//!
//! ```rust,no_run
//! use mate_rr::utils::{log_screen_summary, SystemInfo};
//! # fn demo(info: &mate_rr::ScreenInfo) {
//! SystemInfo::gather().log();  // Logs: OS, kernel, hostname
//! log_screen_summary(info);    // Logs: size range, outputs, clone modes
//! # }
//! ```
//!
//! ## Error Formatting
//!
//! The [`errors`] module turns an error chain into a message with
//! troubleshooting steps. Errors that carry a [`RandrError`] anywhere in
//! their chain are classified by variant:
//! - Backend errors → `$DISPLAY`, RANDR version, Wayland sessions
//! - Bounds errors → virtual screen limits
//! - Assignment errors → CRTC count, modes, clone compatibility
//! - Stored layout errors → backup file, permissions
//!
//! [`RandrError`]: crate::error::RandrError

pub mod diagnostics;
pub mod errors;

// Re-export key types
pub use diagnostics::{detect_session, log_screen_summary, log_startup_diagnostics, SystemInfo};
pub use errors::format_user_error;
