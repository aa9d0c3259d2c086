//! Hardware object definitions
//!
//! Outputs and CRTCs reference each other cyclically, so all cross references
//! are protocol identifiers resolved through the owning [`ScreenInfo`]
//! snapshot rather than pointers.
//!
//! [`ScreenInfo`]: super::ScreenInfo

use serde::{Deserialize, Serialize};

use super::rotation::Rotation;

macro_rules! protocol_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub u32);

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

protocol_id!(
    /// Protocol handle of an output (connector)
    OutputId
);
protocol_id!(
    /// Protocol handle of a CRTC
    CrtcId
);
protocol_id!(
    /// Protocol handle of a mode
    ModeId
);

/// A display timing offered by one or more outputs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mode {
    /// Protocol handle
    pub id: ModeId,
    /// Mode name as reported by the server (e.g. "1920x1080")
    #[serde(default)]
    pub name: String,
    /// Horizontal resolution in pixels
    pub width: u32,
    /// Vertical resolution in pixels
    pub height: u32,
    /// Refresh rate in milli-Hertz
    pub freq: u32,
}

impl Mode {
    /// Refresh rate in whole Hertz, truncated
    pub fn refresh_rate(&self) -> i32 {
        (self.freq / 1000) as i32
    }

    /// Same width and height, any refresh rate
    pub fn same_size(&self, other: &Mode) -> bool {
        self.width == other.width && self.height == other.height
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}@{}Hz", self.width, self.height, self.refresh_rate())
    }
}

/// Virtual screen size limits reported by the driver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizeRange {
    /// Minimum width in pixels
    pub min_width: i32,
    /// Maximum width in pixels
    pub max_width: i32,
    /// Minimum height in pixels
    pub min_height: i32,
    /// Maximum height in pixels
    pub max_height: i32,
}

impl SizeRange {
    /// Whether a virtual screen of this size is allowed
    pub fn contains(&self, width: i32, height: i32) -> bool {
        (self.min_width..=self.max_width).contains(&width)
            && (self.min_height..=self.max_height).contains(&height)
    }

    /// Clamp a size into the allowed range
    pub fn clamp(&self, width: i32, height: i32) -> (i32, i32) {
        (
            width.max(self.min_width).min(self.max_width),
            height.max(self.min_height).min(self.max_height),
        )
    }
}

/// A physical connector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Output {
    /// Protocol handle
    pub id: OutputId,
    /// Connector name, stable across sessions (e.g. "eDP-1", "HDMI-1")
    pub name: String,
    /// Whether a monitor is attached
    pub connected: bool,
    /// Physical width in millimetres (0 if unknown)
    #[serde(default)]
    pub width_mm: u32,
    /// Physical height in millimetres (0 if unknown)
    #[serde(default)]
    pub height_mm: u32,
    /// Three-letter PNP vendor code from the monitor identity, "???" if unknown
    #[serde(default = "unknown_vendor")]
    pub vendor: String,
    /// Product code from the monitor identity
    #[serde(default)]
    pub product: u16,
    /// Serial number from the monitor identity
    #[serde(default)]
    pub serial: u32,
    /// Connector type property (e.g. "Panel", "HDMI"), if the driver exposes it
    #[serde(default)]
    pub connector_type: Option<String>,
    /// CRTCs able to drive this output
    #[serde(default)]
    pub possible_crtcs: Vec<CrtcId>,
    /// Outputs that may share a CRTC with this one
    #[serde(default)]
    pub clones: Vec<OutputId>,
    /// Supported modes, preferred ones first
    #[serde(default)]
    pub modes: Vec<ModeId>,
    /// How many leading entries of `modes` are preferred
    #[serde(default)]
    pub n_preferred: usize,
    /// CRTC currently driving this output
    #[serde(default)]
    pub crtc: Option<CrtcId>,
    /// Whether the server reports this as the primary output
    #[serde(default)]
    pub is_primary: bool,
}

pub(crate) fn unknown_vendor() -> String {
    "???".to_string()
}

impl Output {
    /// Whether `mode` is in this output's mode list
    pub fn supports_mode(&self, mode: ModeId) -> bool {
        self.modes.contains(&mode)
    }

    /// Whether `other` may be driven by the same CRTC
    pub fn can_clone(&self, other: OutputId) -> bool {
        self.clones.contains(&other)
    }

    /// Whether `crtc` can drive this output
    pub fn can_use_crtc(&self, crtc: CrtcId) -> bool {
        self.possible_crtcs.contains(&crtc)
    }

    /// Preferred modes, in server order
    pub fn preferred_modes(&self) -> &[ModeId] {
        &self.modes[..self.n_preferred.min(self.modes.len())]
    }

    /// Built-in panel of a laptop
    ///
    /// Drivers that expose the connector type say "Panel"; older ones only
    /// reveal it through the connector name.
    pub fn is_laptop(&self) -> bool {
        if !self.connected {
            return false;
        }

        if self.connector_type.as_deref() == Some("Panel") {
            return true;
        }

        ["lvds", "LVDS", "Lvds", "LCD", "eDP"]
            .iter()
            .any(|needle| self.name.contains(needle))
    }

    /// Human-readable monitor name: "Laptop" or vendor plus diagonal size
    pub fn display_name(&self) -> String {
        if self.is_laptop() {
            return "Laptop".to_string();
        }

        let vendor = if self.vendor.is_empty() || self.vendor == "???" {
            "Unknown"
        } else {
            self.vendor.as_str()
        };

        if self.width_mm > 0 && self.height_mm > 0 {
            let diagonal_mm = f64::from(self.width_mm).hypot(f64::from(self.height_mm));
            let inches = (diagonal_mm / 25.4 + 0.5) as u32;
            format!("{vendor} {inches}\"")
        } else {
            vendor.to_string()
        }
    }
}

/// A scan-out engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Crtc {
    /// Protocol handle
    pub id: CrtcId,
    /// Mode being scanned out, `None` when the CRTC is off
    #[serde(default)]
    pub current_mode: Option<ModeId>,
    /// Position of the top-left corner in the virtual screen
    #[serde(default)]
    pub x: i32,
    /// Position of the top-left corner in the virtual screen
    #[serde(default)]
    pub y: i32,
    /// Rotation currently applied
    #[serde(default)]
    pub current_rotation: Rotation,
    /// Rotations and reflections the CRTC supports
    #[serde(default = "all_rotations")]
    pub rotations: Rotation,
    /// Outputs this CRTC can drive
    #[serde(default)]
    pub possible_outputs: Vec<OutputId>,
    /// Outputs currently driven (several when cloned)
    #[serde(default)]
    pub current_outputs: Vec<OutputId>,
    /// Number of entries in each gamma ramp
    #[serde(default)]
    pub gamma_size: u32,
}

fn all_rotations() -> Rotation {
    Rotation::ALL
}

impl Crtc {
    /// Whether `output` is currently driven by, or possible for, this CRTC
    pub fn can_drive_output(&self, output: OutputId) -> bool {
        self.current_outputs.contains(&output) || self.possible_outputs.contains(&output)
    }

    /// Whether every bit of `rotation` is supported
    pub fn supports_rotation(&self, rotation: Rotation) -> bool {
        self.rotations.contains(rotation)
    }
}
