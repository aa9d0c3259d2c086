//! Display server backends
//!
//! The topology model and the commit engine only talk to the display server
//! through [`RandrBackend`]. Two implementations ship with the crate:
//!
//! - [`MemoryBackend`]: a simulated server holding its state in memory. It
//!   follows the RandR timestamp rules and records every request, which makes
//!   it the backend of choice for tests and for trying out layouts from a
//!   TOML fixture.
//! - `X11Backend` (`x11` feature): the RandR extension of a live X server
//!   through `x11rb`.
//!
//! # Protocol surface
//!
//! ```text
//! query_resources ──> Resources { outputs, crtcs, modes, size range, timestamps }
//! set_crtc_config ──> one CRTC: position, mode, rotation, outputs, timestamp
//! set_screen_size ──> virtual screen in pixels and millimetres
//! set_primary     ──> primary output (or none)
//! grab / ungrab   ──> exclusive access while a configuration is applied
//! ```
//!
//! All calls block on the server round trip.

mod fixture;
mod memory;

#[cfg(feature = "x11")]
pub mod x11;

pub use fixture::ResourcesBuilder;
pub use memory::{BackendCall, MemoryBackend, MemoryHandle};
#[cfg(feature = "x11")]
pub use x11::X11Backend;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::screen::{Crtc, CrtcId, Mode, ModeId, Output, OutputId, Rotation, SizeRange};

/// Everything a backend reports about the screen in one query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resources {
    /// Time of the last successful configuration change
    #[serde(default)]
    pub timestamp: u32,
    /// Time of the last hardware (hotplug) change
    #[serde(default)]
    pub config_timestamp: u32,
    /// Limits on the virtual screen size
    pub size_range: SizeRange,
    /// All outputs, connected or not
    #[serde(default, rename = "output")]
    pub outputs: Vec<Output>,
    /// All CRTCs
    #[serde(default, rename = "crtc")]
    pub crtcs: Vec<Crtc>,
    /// All modes known to the server
    #[serde(default, rename = "mode")]
    pub modes: Vec<Mode>,
    /// Primary output, if any
    #[serde(default)]
    pub primary: Option<OutputId>,
}

/// Requested state for one CRTC
///
/// A request without a mode and without outputs turns the CRTC off.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrtcConfig {
    /// Top-left corner in the virtual screen
    pub x: i32,
    /// Top-left corner in the virtual screen
    pub y: i32,
    /// Mode to scan out
    pub mode: Option<ModeId>,
    /// Rotation and reflection
    pub rotation: Rotation,
    /// Outputs to drive
    pub outputs: Vec<OutputId>,
}

impl CrtcConfig {
    /// Request that switches a CRTC off
    pub fn disabled() -> Self {
        Self {
            x: 0,
            y: 0,
            mode: None,
            rotation: Rotation::NORMAL,
            outputs: Vec::new(),
        }
    }

    /// Whether this request switches the CRTC off
    pub fn is_disabled(&self) -> bool {
        self.mode.is_none() && self.outputs.is_empty()
    }
}

/// One colour channel table per primary colour
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GammaRamp {
    /// Red channel
    pub red: Vec<u16>,
    /// Green channel
    pub green: Vec<u16>,
    /// Blue channel
    pub blue: Vec<u16>,
}

impl GammaRamp {
    /// Identity ramp of `size` entries
    pub fn linear(size: usize) -> Self {
        let step = if size > 1 { 65535 / (size - 1) } else { 0 };
        let channel: Vec<u16> = (0..size).map(|i| (i * step).min(65535) as u16).collect();
        Self {
            red: channel.clone(),
            green: channel.clone(),
            blue: channel,
        }
    }

    /// Entries per channel, if all three channels agree
    pub fn len(&self) -> Option<usize> {
        let len = self.red.len();
        (self.green.len() == len && self.blue.len() == len).then_some(len)
    }

    /// Whether the ramp has no entries
    pub fn is_empty(&self) -> bool {
        self.red.is_empty() && self.green.is_empty() && self.blue.is_empty()
    }
}

/// Display-configuration protocol
///
/// Implementations translate these calls to a concrete protocol. They are
/// not expected to validate requests beyond what the server itself does:
/// bounds and capability checks live in [`Screen`](crate::screen::Screen)
/// and the CRTC solver.
pub trait RandrBackend: Send {
    /// Short identifier for logs ("x11", "memory", ...)
    fn name(&self) -> &'static str;

    /// Fail with `BackendUnavailable` if the protocol is missing or too old
    fn check_version(&mut self) -> Result<()> {
        Ok(())
    }

    /// Query the screen resources
    ///
    /// With `reprobe` the server re-detects connected monitors, which is
    /// slow; otherwise the cached state is returned.
    fn query_resources(&mut self, reprobe: bool) -> Result<Resources>;

    /// Configure one CRTC
    ///
    /// The server rejects the request when `timestamp` is older than its last
    /// configuration change. A timestamp of 0 means "current time".
    fn set_crtc_config(&mut self, crtc: CrtcId, timestamp: u32, config: &CrtcConfig)
        -> Result<()>;

    /// Resize the virtual screen
    fn set_screen_size(&mut self, width: i32, height: i32, width_mm: i32, height_mm: i32)
        -> Result<()>;

    /// Make `output` the primary output, or clear the primary output
    fn set_primary(&mut self, output: Option<OutputId>) -> Result<()>;

    /// Gain exclusive access to the server
    fn grab(&mut self) -> Result<()>;

    /// Release exclusive access to the server
    fn ungrab(&mut self) -> Result<()>;

    /// Read the gamma ramp of a CRTC
    fn crtc_gamma(&mut self, crtc: CrtcId) -> Result<GammaRamp>;

    /// Replace the gamma ramp of a CRTC
    fn set_crtc_gamma(&mut self, crtc: CrtcId, ramp: &GammaRamp) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_crtc_config() {
        let config = CrtcConfig::disabled();
        assert!(config.is_disabled());
        assert_eq!(config.rotation, Rotation::NORMAL);
    }

    #[test]
    fn test_linear_gamma_ramp() {
        let ramp = GammaRamp::linear(256);
        assert_eq!(ramp.len(), Some(256));
        assert_eq!(ramp.red[0], 0);
        assert_eq!(ramp.red[255], 65535);
        assert_eq!(ramp.green, ramp.blue);

        let uneven = GammaRamp {
            red: vec![0; 3],
            green: vec![0; 2],
            blue: vec![0; 3],
        };
        assert_eq!(uneven.len(), None);
    }
}
