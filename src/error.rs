//! Error types for the RandR display-configuration subsystem
//!
//! Every fallible operation in the crate returns [`Result`], whose error side
//! is [`RandrError`]. The CRTC solver reports its own richer
//! [`AssignmentError`](crate::assignment::AssignmentError), which is wrapped
//! into [`RandrError::Assignment`] so callers can still inspect the search
//! trail.

use std::path::PathBuf;

use thiserror::Error;

use crate::assignment::AssignmentError;
use crate::screen::CrtcId;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, RandrError>;

/// Step of the commit sequence that the backend rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyStep {
    /// Grabbing the server
    Grab,
    /// Turning off a CRTC that is unused or would lie outside the new screen
    DisableCrtc(CrtcId),
    /// Resizing the virtual screen
    Resize,
    /// Configuring a CRTC from the assignment
    ConfigureCrtc(CrtcId),
    /// Setting the primary output
    SetPrimary,
}

impl std::fmt::Display for ApplyStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Grab => write!(f, "grab server"),
            Self::DisableCrtc(crtc) => write!(f, "disable CRTC {crtc}"),
            Self::Resize => write!(f, "resize screen"),
            Self::ConfigureCrtc(crtc) => write!(f, "configure CRTC {crtc}"),
            Self::SetPrimary => write!(f, "set primary output"),
        }
    }
}

/// Unified error type for display configuration operations
#[derive(Debug, Error)]
pub enum RandrError {
    // =========================================================================
    // Backend Errors
    // =========================================================================
    /// The RandR extension is missing or too old
    #[error("RANDR extension is not present or too old: {reason}")]
    BackendUnavailable { reason: String },

    /// Querying the screen resources failed
    #[error("could not get the screen resources (CRTCs, outputs, modes): {0}")]
    Query(String),

    /// A backend request failed for a reason not covered by another variant
    #[error("RANDR error: {0}")]
    Backend(String),

    // =========================================================================
    // Validation Errors
    // =========================================================================
    /// The virtual screen required by an assignment does not fit the driver limits
    #[error(
        "required virtual size does not fit available size: requested=({requested_width}, {requested_height}), minimum=({min_width}, {min_height}), maximum=({max_width}, {max_height})"
    )]
    ScreenBounds {
        requested_width: i32,
        requested_height: i32,
        min_width: i32,
        min_height: i32,
        max_width: i32,
        max_height: i32,
    },

    /// A single CRTC would scan out pixels beyond the maximum screen size
    #[error(
        "requested position/size for CRTC {crtc} is outside the allowed limit: position=({x}, {y}), size=({width}, {height}), maximum=({max_width}, {max_height})"
    )]
    CrtcBounds {
        crtc: CrtcId,
        x: i32,
        y: i32,
        width: i32,
        height: i32,
        max_width: i32,
        max_height: i32,
    },

    /// Gamma ramp length does not match the CRTC
    #[error("gamma ramp for CRTC {crtc} has {got} entries, expected {expected}")]
    GammaSize {
        crtc: CrtcId,
        expected: usize,
        got: usize,
    },

    /// No object with that identifier in the current snapshot
    #[error("unknown {kind} {name}")]
    UnknownObject { kind: &'static str, name: String },

    // =========================================================================
    // Solver / Commit Errors
    // =========================================================================
    /// No CRTC assignment satisfies the configuration
    #[error(transparent)]
    Assignment(#[from] AssignmentError),

    /// The backend rejected part of the commit sequence
    #[error("could not {step}: {reason}")]
    Apply { step: ApplyStep, reason: String },

    // =========================================================================
    // Stored Configuration Errors
    // =========================================================================
    /// The monitors file is not a valid configuration document
    #[error("could not parse {path}: {message}")]
    Parse { path: PathBuf, message: String },

    /// Reading or writing the monitors file failed
    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// None of the stored configurations applies to the attached monitors
    #[error("none of the saved display configurations matched the active configuration")]
    NoMatchingConfig,
}

impl RandrError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn parse(path: impl Into<PathBuf>, message: impl std::fmt::Display) -> Self {
        Self::Parse {
            path: path.into(),
            message: message.to_string(),
        }
    }

    /// Whether the whole subsystem is unusable (no degraded mode exists)
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::BackendUnavailable { .. })
    }

    /// Whether this is a driver limit violation
    pub fn is_bounds_error(&self) -> bool {
        matches!(self, Self::ScreenBounds { .. } | Self::CrtcBounds { .. })
    }

    /// Whether callers should fall back to the current hardware configuration
    ///
    /// Missing or unreadable stored configurations are not failures of the
    /// display subsystem itself.
    pub fn wants_current_fallback(&self) -> bool {
        match self {
            Self::NoMatchingConfig | Self::Parse { .. } => true,
            Self::Io { source, .. } => source.kind() == std::io::ErrorKind::NotFound,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounds_error_display() {
        let error = RandrError::ScreenBounds {
            requested_width: 8192,
            requested_height: 1080,
            min_width: 320,
            min_height: 200,
            max_width: 4096,
            max_height: 4096,
        };
        assert_eq!(
            error.to_string(),
            "required virtual size does not fit available size: requested=(8192, 1080), minimum=(320, 200), maximum=(4096, 4096)"
        );
        assert!(error.is_bounds_error());
        assert!(!error.is_fatal());
    }

    #[test]
    fn test_fallback_classification() {
        assert!(RandrError::NoMatchingConfig.wants_current_fallback());
        assert!(RandrError::parse("/tmp/monitors.xml", "bad").wants_current_fallback());

        let missing = RandrError::io(
            "/tmp/monitors.xml",
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        assert!(missing.wants_current_fallback());

        let denied = RandrError::io(
            "/tmp/monitors.xml",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "no"),
        );
        assert!(!denied.wants_current_fallback());
    }

    #[test]
    fn test_apply_step_display() {
        let error = RandrError::Apply {
            step: ApplyStep::ConfigureCrtc(CrtcId(63)),
            reason: "stale timestamp".to_string(),
        };
        assert_eq!(error.to_string(), "could not configure CRTC 63: stale timestamp");
    }
}
