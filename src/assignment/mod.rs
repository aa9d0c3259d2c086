//! CRTC Assignment Solver
//!
//! Finds CRTCs, modes and positions that make the hardware show a list of
//! [`OutputInfo`]s, by depth-first search over the active outputs:
//!
//! ```text
//! for each active output, in order:
//!     for each CRTC:
//!         pass 0: modes of the output with the requested size AND rate
//!         pass 1: modes of the output with the requested size, any rate
//!             tentatively assign (CRTC can drive output, output has mode,
//!             CRTC has rotation, clone rules) and recurse;
//!             undo on failure
//! ```
//!
//! The first complete assignment wins. There is no search for a "best" one,
//! which keeps the worst case exponential only in theory: real hardware has
//! a handful of outputs.
//!
//! A CRTC can drive several outputs (mirroring) when they want the same mode,
//! position and rotation and every pair of them is clone-compatible.
//!
//! After the search, the virtual screen size (the bottom-right corner of
//! everything lit) is checked against the driver's size range.

mod commit;
mod error;

pub use error::{AssignmentError, FailureKind, Rejection, SearchStep};

use std::collections::BTreeMap;
use std::ops::{Deref, DerefMut};

use tracing::{debug, trace};

use crate::error::{RandrError, Result};
use crate::monitors::OutputInfo;
use crate::screen::{Crtc, CrtcId, Mode, ModeId, Output, OutputId, Rotation, ScreenInfo};

/// What one CRTC will scan out
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrtcSetting {
    /// Mode to scan out
    pub mode: ModeId,
    /// Top-left corner
    pub x: i32,
    /// Top-left corner
    pub y: i32,
    /// Rotation and reflection
    pub rotation: Rotation,
    /// Outputs driven, in assignment order
    pub outputs: Vec<OutputId>,
}

#[derive(Debug, Default)]
struct AssignmentState {
    crtcs: BTreeMap<CrtcId, CrtcSetting>,
    primary: Option<OutputId>,
}

struct Candidate<'a> {
    crtc: &'a Crtc,
    mode: &'a Mode,
    output: &'a Output,
    x: i32,
    y: i32,
    rotation: Rotation,
    primary: bool,
}

impl AssignmentState {
    fn assign(&mut self, info: &ScreenInfo, candidate: &Candidate<'_>) -> std::result::Result<(), Rejection> {
        let Candidate {
            crtc,
            mode,
            output,
            x,
            y,
            rotation,
            primary,
        } = *candidate;

        if !crtc.can_drive_output(output.id) {
            return Err(Rejection::CannotDrive {
                crtc: crtc.id,
                output: output.name.clone(),
            });
        }

        if !output.supports_mode(mode.id) {
            return Err(Rejection::ModeUnsupported {
                output: output.name.clone(),
                width: mode.width,
                height: mode.height,
                rate: mode.refresh_rate(),
            });
        }

        if !crtc.supports_rotation(rotation) {
            return Err(Rejection::RotationUnsupported {
                crtc: crtc.id,
                rotation,
            });
        }

        if let Some(setting) = self.crtcs.get_mut(&crtc.id) {
            if !(setting.mode == mode.id && setting.x == x && setting.y == y && setting.rotation == rotation) {
                return Err(Rejection::CloneParameters {
                    output: output.name.clone(),
                    existing_mode: setting.mode.0,
                    new_mode: mode.id.0,
                    existing_x: setting.x,
                    existing_y: setting.y,
                    x,
                    y,
                    existing_rotation: setting.rotation,
                    rotation,
                });
            }

            let compatible = setting.outputs.iter().all(|id| {
                info.output_by_id(*id)
                    .is_some_and(|existing| existing.can_clone(output.id))
            });
            if !compatible {
                return Err(Rejection::CloneIncompatible {
                    output: output.name.clone(),
                });
            }

            setting.outputs.push(output.id);
        } else {
            self.crtcs.insert(
                crtc.id,
                CrtcSetting {
                    mode: mode.id,
                    x,
                    y,
                    rotation,
                    outputs: vec![output.id],
                },
            );
        }

        if primary && self.primary.is_none() {
            self.primary = Some(output.id);
        }
        Ok(())
    }

    fn unassign(&mut self, crtc: CrtcId, output: OutputId) {
        let Some(setting) = self.crtcs.get_mut(&crtc) else {
            return;
        };

        setting.outputs.retain(|id| *id != output);
        if self.primary == Some(output) {
            self.primary = None;
        }
        if setting.outputs.is_empty() {
            self.crtcs.remove(&crtc);
        }
    }
}

/// A tentative assignment, undone on drop unless kept
struct Tentative<'s> {
    state: &'s mut AssignmentState,
    crtc: CrtcId,
    output: OutputId,
    keep: bool,
}

impl<'s> Tentative<'s> {
    fn new(
        state: &'s mut AssignmentState,
        info: &ScreenInfo,
        candidate: &Candidate<'_>,
    ) -> std::result::Result<Self, Rejection> {
        state.assign(info, candidate)?;
        Ok(Self {
            state,
            crtc: candidate.crtc.id,
            output: candidate.output.id,
            keep: false,
        })
    }

    fn keep(mut self) {
        self.keep = true;
    }
}

impl Deref for Tentative<'_> {
    type Target = AssignmentState;

    fn deref(&self) -> &Self::Target {
        self.state
    }
}

impl DerefMut for Tentative<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.state
    }
}

impl Drop for Tentative<'_> {
    fn drop(&mut self) {
        if !self.keep {
            self.state.unassign(self.crtc, self.output);
        }
    }
}

fn search(
    info: &ScreenInfo,
    outputs: &[OutputInfo],
    state: &mut AssignmentState,
) -> std::result::Result<(), AssignmentError> {
    let Some((wanted, rest)) = outputs.split_first() else {
        return Ok(());
    };

    if !wanted.is_active() {
        return search(info, rest, state);
    }

    let (x, y, width, height) = wanted.geometry();
    let rate = wanted.refresh_rate();
    let mut trail = Vec::new();
    let mut tried_mode = false;

    let live = info.output_by_name(wanted.name());

    for crtc in info.crtcs() {
        trail.push(SearchStep::TryingCrtc {
            crtc: crtc.id,
            output: wanted.name().to_string(),
        });

        let Some(live) = live else {
            continue;
        };

        for pass in 0..2u8 {
            for mode in info.output_modes(live) {
                trail.push(SearchStep::TryingMode {
                    crtc: crtc.id,
                    mode_width: mode.width,
                    mode_height: mode.height,
                    mode_rate: mode.refresh_rate(),
                    width,
                    height,
                    rate,
                    pass,
                });

                let size_fits = mode.width as i32 == width && mode.height as i32 == height;
                if !size_fits || (pass == 0 && mode.refresh_rate() != rate) {
                    continue;
                }
                tried_mode = true;

                let candidate = Candidate {
                    crtc,
                    mode,
                    output: live,
                    x,
                    y,
                    rotation: wanted.rotation(),
                    primary: wanted.is_primary(),
                };

                let mut tentative = match Tentative::new(state, info, &candidate) {
                    Ok(tentative) => tentative,
                    Err(rejection) => {
                        trace!("{}: {rejection}", wanted.name());
                        trail.push(SearchStep::Rejected(rejection));
                        continue;
                    }
                };

                match search(info, rest, &mut tentative) {
                    Ok(()) => {
                        trace!("{} on CRTC {} with {mode}", wanted.name(), crtc.id);
                        tentative.keep();
                        return Ok(());
                    }
                    Err(nested) => trail.push(SearchStep::Subsearch(Box::new(nested))),
                }
            }
        }
    }

    let kind = if tried_mode {
        FailureKind::Unassignable
    } else {
        FailureKind::NoCompatibleMode
    };
    Err(AssignmentError { kind, trail })
}

/// Smallest virtual screen showing every used CRTC, at least 1x1
fn required_size(info: &ScreenInfo, crtcs: &BTreeMap<CrtcId, CrtcSetting>) -> (i32, i32) {
    crtcs
        .values()
        .filter_map(|setting| {
            let mode = info.mode_by_id(setting.mode)?;
            let (mut width, mut height) = (mode.width as i32, mode.height as i32);
            if setting.rotation.swaps_axes() {
                std::mem::swap(&mut width, &mut height);
            }
            Some((setting.x + width, setting.y + height))
        })
        .fold((1, 1), |(w, h), (right, bottom)| (w.max(right), h.max(bottom)))
}

/// A complete mapping of CRTCs to outputs for one snapshot
#[derive(Debug, Clone)]
pub struct CrtcAssignment {
    crtcs: BTreeMap<CrtcId, CrtcSetting>,
    primary: Option<OutputId>,
    width: i32,
    height: i32,
}

impl CrtcAssignment {
    /// Search for an assignment
    ///
    /// # Errors
    ///
    /// `Assignment` with the search trail when no assignment exists;
    /// `ScreenBounds` when one exists but needs a virtual screen outside the
    /// driver's size range.
    pub fn solve(info: &ScreenInfo, outputs: &[OutputInfo]) -> Result<Self> {
        let mut state = AssignmentState::default();
        search(info, outputs, &mut state)?;

        let (width, height) = required_size(info, &state.crtcs);
        let range = info.size_range();
        if !range.contains(width, height) {
            return Err(RandrError::ScreenBounds {
                requested_width: width,
                requested_height: height,
                min_width: range.min_width,
                min_height: range.min_height,
                max_width: range.max_width,
                max_height: range.max_height,
            });
        }

        debug!(
            "Assigned {} CRTCs, virtual size {width}x{height}, primary {:?}",
            state.crtcs.len(),
            state.primary
        );

        Ok(Self {
            crtcs: state.crtcs,
            primary: state.primary,
            width,
            height,
        })
    }

    /// Setting for each used CRTC
    pub fn crtcs(&self) -> &BTreeMap<CrtcId, CrtcSetting> {
        &self.crtcs
    }

    /// Setting of one CRTC, if used
    pub fn crtc(&self, crtc: CrtcId) -> Option<&CrtcSetting> {
        self.crtcs.get(&crtc)
    }

    /// CRTC chosen for an output
    pub fn crtc_for_output(&self, output: OutputId) -> Option<CrtcId> {
        self.crtcs
            .iter()
            .find(|(_, setting)| setting.outputs.contains(&output))
            .map(|(id, _)| *id)
    }

    /// The first active output flagged primary
    pub fn primary(&self) -> Option<OutputId> {
        self.primary
    }

    /// Required virtual screen size
    pub fn virtual_size(&self) -> (i32, i32) {
        (self.width, self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::ResourcesBuilder;
    use crate::monitors::Configuration;
    use crate::screen::RotationFlag;

    fn active(name: &str, x: i32, y: i32, width: i32, height: i32, rate: i32) -> OutputInfo {
        let mut out = OutputInfo::connected(name, "???", 0, 0);
        out.set_active(true);
        out.set_geometry(x, y, width, height);
        out.set_refresh_rate(rate);
        out
    }

    fn two_outputs_two_crtcs() -> ScreenInfo {
        let resources = ResourcesBuilder::new(8192, 8192)
            .mode(1, 1920, 1080, 60)
            .mode(2, 1920, 1080, 50)
            .mode(3, 1024, 768, 60)
            .crtc(10)
            .crtc(11)
            .output(20, "DP-1", &[1, 2, 3])
            .output(21, "DP-2", &[1, 3])
            .build();
        ScreenInfo::new(resources).unwrap()
    }

    #[test]
    fn test_side_by_side() {
        let info = two_outputs_two_crtcs();
        let outputs = [
            active("DP-1", 0, 0, 1920, 1080, 60),
            active("DP-2", 1920, 0, 1920, 1080, 60),
        ];

        let assignment = CrtcAssignment::solve(&info, &outputs).unwrap();
        assert_eq!(assignment.virtual_size(), (3840, 1080));
        assert_eq!(assignment.crtc_for_output(OutputId(20)), Some(CrtcId(10)));
        assert_eq!(assignment.crtc_for_output(OutputId(21)), Some(CrtcId(11)));
        assert_eq!(assignment.primary(), None);
    }

    #[test]
    fn test_exact_rate_preferred() {
        let info = two_outputs_two_crtcs();
        let outputs = [active("DP-1", 0, 0, 1920, 1080, 50)];
        let assignment = CrtcAssignment::solve(&info, &outputs).unwrap();
        assert_eq!(assignment.crtc(CrtcId(10)).unwrap().mode, ModeId(2));
    }

    #[test]
    fn test_rate_relaxed_when_unavailable() {
        let info = two_outputs_two_crtcs();
        let outputs = [active("DP-2", 0, 0, 1920, 1080, 75)];
        let assignment = CrtcAssignment::solve(&info, &outputs).unwrap();
        assert_eq!(assignment.crtc(CrtcId(10)).unwrap().mode, ModeId(1));
    }

    #[test]
    fn test_no_compatible_mode() {
        let info = two_outputs_two_crtcs();
        let outputs = [active("DP-2", 0, 0, 1280, 1024, 60)];
        let err = CrtcAssignment::solve(&info, &outputs).unwrap_err();
        match err {
            RandrError::Assignment(e) => {
                assert_eq!(e.kind, FailureKind::NoCompatibleMode);
                assert!(e.to_string().starts_with("none of the selected modes were compatible"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_single_crtc_cannot_show_two_geometries() {
        let resources = ResourcesBuilder::new(8192, 8192)
            .mode(1, 1920, 1080, 60)
            .mode(2, 1024, 768, 60)
            .crtc(10)
            .output(20, "A", &[1, 2])
            .output(21, "B", &[1, 2])
            .clones("A", "B")
            .build();
        let info = ScreenInfo::new(resources).unwrap();
        let outputs = [active("A", 0, 0, 1920, 1080, 60), active("B", 1920, 0, 1024, 768, 60)];

        let err = CrtcAssignment::solve(&info, &outputs).unwrap_err();
        let RandrError::Assignment(e) = err else {
            panic!("expected an assignment error");
        };
        assert_eq!(e.kind, FailureKind::Unassignable);
        assert!(e
            .rejections()
            .iter()
            .any(|r| matches!(r, Rejection::CloneParameters { .. })));
    }

    #[test]
    fn test_clone_requires_compatible_outputs() {
        let resources = ResourcesBuilder::new(8192, 8192)
            .mode(1, 1024, 768, 60)
            .crtc(10)
            .output(20, "A", &[1])
            .output(21, "B", &[1])
            .build();
        let info = ScreenInfo::new(resources).unwrap();
        let outputs = [active("A", 0, 0, 1024, 768, 60), active("B", 0, 0, 1024, 768, 60)];

        let err = CrtcAssignment::solve(&info, &outputs).unwrap_err();
        let RandrError::Assignment(e) = err else {
            panic!("expected an assignment error");
        };
        assert!(e
            .rejections()
            .iter()
            .any(|r| matches!(r, Rejection::CloneIncompatible { .. })));
    }

    #[test]
    fn test_clone_shares_crtc() {
        let resources = ResourcesBuilder::new(8192, 8192)
            .mode(1, 1024, 768, 60)
            .crtc(10)
            .output(20, "A", &[1])
            .output(21, "B", &[1])
            .clones("A", "B")
            .build();
        let info = ScreenInfo::new(resources).unwrap();
        let config = Configuration::new(
            true,
            vec![active("A", 0, 0, 1024, 768, 60), active("B", 500, 0, 1024, 768, 60)],
        );

        let assignment = CrtcAssignment::solve(&info, &config.outputs_for_assignment()).unwrap();
        assert_eq!(assignment.crtc(CrtcId(10)).unwrap().outputs, vec![OutputId(20), OutputId(21)]);
        assert_eq!(assignment.virtual_size(), (1024, 768));
    }

    #[test]
    fn test_backtracks_out_of_dead_end() {
        // A can use either CRTC, B only the first: A must give way.
        let resources = ResourcesBuilder::new(8192, 8192)
            .mode(1, 1024, 768, 60)
            .crtc(10)
            .crtc(11)
            .output(20, "A", &[1])
            .output(21, "B", &[1])
            .possible_crtcs("B", &[10])
            .build();
        let info = ScreenInfo::new(resources).unwrap();
        let mut b = active("B", 1024, 0, 1024, 768, 60);
        b.set_primary(true);
        let outputs = [active("A", 0, 0, 1024, 768, 60), b];

        let assignment = CrtcAssignment::solve(&info, &outputs).unwrap();
        assert_eq!(assignment.crtc_for_output(OutputId(20)), Some(CrtcId(11)));
        assert_eq!(assignment.crtc_for_output(OutputId(21)), Some(CrtcId(10)));
        assert_eq!(assignment.primary(), Some(OutputId(21)));
    }

    #[test]
    fn test_rotation_capability_checked() {
        let resources = ResourcesBuilder::new(8192, 8192)
            .mode(1, 1024, 768, 60)
            .crtc(10)
            .crtc_rotations(10, Rotation::NORMAL)
            .output(20, "A", &[1])
            .build();
        let info = ScreenInfo::new(resources).unwrap();
        let mut out = active("A", 0, 0, 1024, 768, 60);
        out.set_rotation(RotationFlag::Rotate90.into());

        let err = CrtcAssignment::solve(&info, &[out]).unwrap_err();
        let RandrError::Assignment(e) = err else {
            panic!("expected an assignment error");
        };
        assert!(matches!(
            e.rejections()[0],
            Rejection::RotationUnsupported { crtc: CrtcId(10), .. }
        ));
    }

    #[test]
    fn test_rotated_virtual_size() {
        let info = two_outputs_two_crtcs();
        let mut portrait = active("DP-1", 0, 0, 1920, 1080, 60);
        portrait.set_rotation(RotationFlag::Rotate270.into());
        let outputs = [portrait, active("DP-2", 1080, 0, 1920, 1080, 60)];

        let assignment = CrtcAssignment::solve(&info, &outputs).unwrap();
        assert_eq!(assignment.virtual_size(), (3000, 1920));
    }

    #[test]
    fn test_screen_bounds_enforced() {
        let resources = ResourcesBuilder::new(2048, 2048)
            .mode(1, 1920, 1080, 60)
            .crtc(10)
            .crtc(11)
            .output(20, "DP-1", &[1])
            .output(21, "DP-2", &[1])
            .build();
        let info = ScreenInfo::new(resources).unwrap();
        let outputs = [
            active("DP-1", 0, 0, 1920, 1080, 60),
            active("DP-2", 1920, 0, 1920, 1080, 60),
        ];

        let err = CrtcAssignment::solve(&info, &outputs).unwrap_err();
        assert!(matches!(
            err,
            RandrError::ScreenBounds {
                requested_width: 3840,
                max_width: 2048,
                ..
            }
        ));
    }

    #[test]
    fn test_failed_branches_leave_no_trace() {
        let resources = ResourcesBuilder::new(8192, 8192)
            .mode(1, 1024, 768, 60)
            .crtc(10)
            .output(20, "A", &[1])
            .output(21, "B", &[1])
            .build();
        let info = ScreenInfo::new(resources).unwrap();
        let mut a = active("A", 0, 0, 1024, 768, 60);
        a.set_primary(true);
        let outputs = [a, active("B", 1024, 0, 1024, 768, 60)];

        let mut state = AssignmentState::default();
        assert!(search(&info, &outputs, &mut state).is_err());
        assert!(state.crtcs.is_empty());
        assert_eq!(state.primary, None);
    }
}
