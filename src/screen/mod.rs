//! Hardware Topology Model
//!
//! A [`Screen`] owns a display backend and a point-in-time snapshot of the
//! hardware, [`ScreenInfo`]: outputs (connectors), CRTCs (scan-out engines)
//! and modes, plus the virtual screen size limits.
//!
//! # Snapshots
//!
//! Snapshots are immutable and shared through [`Arc`](std::sync::Arc). A
//! refresh builds a new snapshot and swaps it in wholesale; readers holding
//! the previous one keep a consistent, if stale, view.
//!
//! ```text
//!             refresh()
//! backend ──────────────> Resources ──validate──> ScreenInfo ──> Arc swap
//!                                                      │
//!                                      ScreenEvent::Changed (if timestamps moved)
//! ```
//!
//! # Identifiers
//!
//! Outputs, CRTCs and modes refer to each other by protocol id
//! ([`OutputId`], [`CrtcId`], [`ModeId`]). Ids are only meaningful within the
//! snapshot they came from.

mod rotation;
mod snapshot;
mod topology;
mod types;

pub use rotation::{Rotation, RotationFlag};
pub use snapshot::ScreenInfo;
pub(crate) use topology::check_crtc_bounds;
pub use topology::{Screen, ScreenEvent, ServerGrab};
pub(crate) use types::unknown_vendor;
pub use types::{Crtc, CrtcId, Mode, ModeId, Output, OutputId, SizeRange};
