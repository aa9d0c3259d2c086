//! Solver failure reporting
//!
//! The solver does not stop at the first rejected candidate: every CRTC and
//! mode it tried, and why each was turned down, ends up in the trail of the
//! final [`AssignmentError`].

use thiserror::Error;

use crate::screen::{CrtcId, Rotation};

/// Why one candidate (CRTC, mode) pair was turned down for an output
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    /// The CRTC cannot be connected to the output
    #[error("CRTC {crtc} cannot drive output {output}")]
    CannotDrive { crtc: CrtcId, output: String },

    /// The mode is not in the output's mode list
    #[error("output {output} does not support mode {width}x{height}@{rate}Hz")]
    ModeUnsupported {
        output: String,
        width: u32,
        height: u32,
        rate: i32,
    },

    /// The CRTC lacks the rotation or a reflection
    #[error("CRTC {crtc} does not support rotation={rotation}")]
    RotationUnsupported { crtc: CrtcId, rotation: Rotation },

    /// The CRTC already shows something different
    #[error(
        "output {output} does not have the same parameters as another cloned output:\nexisting mode = {existing_mode}, new mode = {new_mode}\nexisting coordinates = ({existing_x}, {existing_y}), new coordinates = ({x}, {y})\nexisting rotation = {existing_rotation}, new rotation = {rotation}"
    )]
    CloneParameters {
        output: String,
        existing_mode: u32,
        new_mode: u32,
        existing_x: i32,
        existing_y: i32,
        x: i32,
        y: i32,
        existing_rotation: Rotation,
        rotation: Rotation,
    },

    /// The CRTC already drives an output this one cannot share with
    #[error("cannot clone to output {output}")]
    CloneIncompatible { output: String },
}

/// One line of the search history
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchStep {
    /// Started on a CRTC for an output
    TryingCrtc { crtc: CrtcId, output: String },

    /// Compared one of the output's modes with the requested geometry
    TryingMode {
        crtc: CrtcId,
        mode_width: u32,
        mode_height: u32,
        mode_rate: i32,
        width: i32,
        height: i32,
        rate: i32,
        pass: u8,
    },

    /// The candidate was turned down
    Rejected(Rejection),

    /// The candidate fitted, but the remaining outputs could not be placed
    Subsearch(Box<AssignmentError>),
}

impl std::fmt::Display for SearchStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TryingCrtc { crtc, output } => {
                write!(f, "CRTC {crtc}: trying modes for output {output}")
            }
            Self::TryingMode {
                crtc,
                mode_width,
                mode_height,
                mode_rate,
                width,
                height,
                rate,
                pass,
            } => write!(
                f,
                "CRTC {crtc}: trying mode {mode_width}x{mode_height}@{mode_rate}Hz with output at {width}x{height}@{rate}Hz (pass {pass})"
            ),
            Self::Rejected(rejection) => write_indented(f, &rejection.to_string()),
            Self::Subsearch(error) => write_indented(f, &error.to_string()),
        }
    }
}

fn write_indented(f: &mut std::fmt::Formatter<'_>, text: &str) -> std::fmt::Result {
    for (index, line) in text.lines().enumerate() {
        if index > 0 {
            writeln!(f)?;
        }
        write!(f, "    {line}")?;
    }
    Ok(())
}

/// Overall reason the search failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// No mode of the right size (and rate) existed for some output
    NoCompatibleMode,
    /// Modes fitted, but no combination of CRTCs worked
    Unassignable,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoCompatibleMode => {
                write!(f, "none of the selected modes were compatible with the possible modes")
            }
            Self::Unassignable => write!(f, "could not assign CRTCs to outputs"),
        }
    }
}

/// No CRTC assignment satisfies the configuration
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}:\n{}", render_trail(.trail))]
pub struct AssignmentError {
    /// Headline reason
    pub kind: FailureKind,
    /// Everything the solver tried, in order
    pub trail: Vec<SearchStep>,
}

fn render_trail(trail: &[SearchStep]) -> String {
    trail
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}

impl AssignmentError {
    /// Every rejection in the trail, including those of nested searches
    pub fn rejections(&self) -> Vec<&Rejection> {
        self.trail
            .iter()
            .flat_map(|step| match step {
                SearchStep::Rejected(rejection) => vec![rejection],
                SearchStep::Subsearch(error) => error.rejections(),
                _ => Vec::new(),
            })
            .collect()
    }
}
