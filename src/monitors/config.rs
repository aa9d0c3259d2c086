//! Hardware-independent display configuration

use std::path::Path;

use tracing::{debug, info};

use super::matching;
use super::output_info::OutputInfo;
use super::store;
use crate::assignment::CrtcAssignment;
use crate::error::{RandrError, Result};
use crate::screen::{Rotation, Screen, ScreenInfo};

/// Desired state of every output, plus whether they mirror each other
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Configuration {
    clone: bool,
    outputs: Vec<OutputInfo>,
}

impl Configuration {
    /// Build a configuration from explicit outputs
    pub fn new(clone: bool, outputs: Vec<OutputInfo>) -> Self {
        Self { clone, outputs }
    }

    /// Describe what the hardware is showing right now
    ///
    /// Connected monitors that are switched off are placed to the right of
    /// everything lit, so turning them on does not overlap another output.
    pub fn new_current(info: &ScreenInfo) -> Self {
        let mut clone = false;
        let mut clone_size: Option<(i32, i32)> = None;
        let mut outputs = Vec::with_capacity(info.outputs().len());

        for output in info.outputs() {
            let mut out = OutputInfo::from_output(output);

            if output.connected {
                let lit = info
                    .output_crtc(output)
                    .and_then(|crtc| info.crtc_mode(crtc).map(|mode| (crtc, mode)));

                if let Some((crtc, mode)) = lit {
                    let (width, height) = (mode.width as i32, mode.height as i32);
                    out.set_active(true);
                    out.set_geometry(crtc.x, crtc.y, width, height);
                    out.set_refresh_rate(mode.refresh_rate());
                    out.set_rotation(crtc.current_rotation);

                    if crtc.x == 0 && crtc.y == 0 {
                        match clone_size {
                            None => clone_size = Some((width, height)),
                            Some(size) if size == (width, height) => clone = true,
                            Some(_) => {}
                        }
                    }
                }

                let preferred = info.preferred_mode(output).or_else(|| {
                    info.output_modes(output)
                        .max_by_key(|m| u64::from(m.width) * u64::from(m.height))
                });
                if let Some(mode) = preferred {
                    out.set_preferred_size(mode.width as i32, mode.height as i32);
                }

                out.set_primary(output.is_primary || info.resources().primary == Some(output.id));
            }

            outputs.push(out);
        }

        let mut last_x = outputs
            .iter()
            .filter(|o| o.is_active())
            .map(|o| {
                let (x, _, width, _) = o.geometry();
                x + width
            })
            .max()
            .unwrap_or(0)
            .max(0);

        for out in outputs.iter_mut().filter(|o| o.is_connected() && !o.is_active()) {
            out.set_position(last_x, 0);
            last_x += out.preferred_size().0;
        }

        debug!(
            "Current configuration: {} outputs, {} active, clone={clone}",
            outputs.len(),
            outputs.iter().filter(|o| o.is_active()).count()
        );

        Self { clone, outputs }
    }

    /// The stored configuration that fits the attached monitors
    ///
    /// # Errors
    ///
    /// `NoMatchingConfig` when no stored configuration applies; `Io` or
    /// `Parse` when the file cannot be read.
    pub fn new_stored(info: &ScreenInfo, path: &Path) -> Result<Self> {
        let current = Self::new_current(info);
        store::load_all(path)?
            .into_iter()
            .find(|stored| matching::matches(stored, &current))
            .ok_or(RandrError::NoMatchingConfig)
    }

    /// Whether every active output mirrors the first one
    pub fn is_clone(&self) -> bool {
        self.clone
    }

    /// Turn mirroring on or off
    pub fn set_clone(&mut self, clone: bool) {
        self.clone = clone;
    }

    /// All outputs, in hardware order
    pub fn outputs(&self) -> &[OutputInfo] {
        &self.outputs
    }

    /// All outputs, for editing
    pub fn outputs_mut(&mut self) -> &mut [OutputInfo] {
        &mut self.outputs
    }

    /// Output by connector name
    pub fn output(&self, name: &str) -> Option<&OutputInfo> {
        self.outputs.iter().find(|o| o.name() == name)
    }

    /// Output by connector name, for editing
    pub fn output_mut(&mut self, name: &str) -> Option<&mut OutputInfo> {
        self.outputs.iter_mut().find(|o| o.name() == name)
    }

    /// Same monitors attached to the same connectors
    pub fn matches(&self, other: &Configuration) -> bool {
        matching::matches(self, other)
    }

    /// Same monitors showing the same picture
    pub fn equals(&self, other: &Configuration) -> bool {
        matching::equals(self, other)
    }

    /// Normalise the layout
    ///
    /// Moves the active outputs so the top-left corner of their bounding box
    /// is at (0, 0) and keeps only the first primary flag.
    pub fn sanitize(&mut self) {
        let origin = self
            .outputs
            .iter()
            .filter(|o| o.is_active())
            .map(|o| {
                let (x, y, _, _) = o.geometry();
                (x, y)
            })
            .reduce(|(ax, ay), (x, y)| (ax.min(x), ay.min(y)));

        if let Some((dx, dy)) = origin {
            for out in self.outputs.iter_mut().filter(|o| o.is_active()) {
                let (x, y, _, _) = out.geometry();
                out.set_position(x - dx, y - dy);
            }
        }

        let mut found = false;
        for out in self.outputs.iter_mut().filter(|o| o.is_primary()) {
            if found {
                out.set_primary(false);
            }
            found = true;
        }
    }

    /// Make sure exactly one active output is primary
    ///
    /// Inactive outputs lose the flag. Without any primary, the laptop panel
    /// is chosen, else the top-left active output. Returns whether a primary
    /// had to be chosen.
    pub fn ensure_primary(&mut self, info: &ScreenInfo) -> bool {
        let mut found = false;
        let mut laptop: Option<usize> = None;
        let mut top_left: Option<usize> = None;

        for index in 0..self.outputs.len() {
            let out = &mut self.outputs[index];
            if !out.is_active() {
                out.set_primary(false);
                continue;
            }

            if out.is_primary() {
                if found {
                    out.set_primary(false);
                } else {
                    found = true;
                }
            }

            let (x, y, _, _) = out.geometry();
            let is_more_top_left = top_left.map_or(true, |current| {
                let (cx, cy, _, _) = self.outputs[current].geometry();
                x < cx && y < cy
            });
            if is_more_top_left {
                top_left = Some(index);
            }

            let is_laptop = info
                .output_by_name(self.outputs[index].name())
                .is_some_and(|o| o.is_laptop());
            if laptop.is_none() && is_laptop {
                laptop = Some(index);
            }
        }

        if found {
            return false;
        }

        if let Some(index) = laptop.or(top_left) {
            debug!("No primary output, choosing {}", self.outputs[index].name());
            self.outputs[index].set_primary(true);
        }
        true
    }

    /// Outputs as the CRTC solver should see them
    ///
    /// In clone mode every active output takes the size and rotation of the
    /// first active one, at (0, 0).
    pub fn outputs_for_assignment(&self) -> Vec<OutputInfo> {
        let mut outputs = self.outputs.clone();
        if !self.clone {
            return outputs;
        }

        let Some((width, height, rotation)) = outputs.iter().find(|o| o.is_active()).map(|o| {
            let (_, _, width, height) = o.geometry();
            (width, height, o.rotation())
        }) else {
            return outputs;
        };

        for out in outputs.iter_mut().filter(|o| o.is_active()) {
            out.set_geometry(0, 0, width, height);
            out.set_rotation(rotation);
        }
        outputs
    }

    /// Check that the hardware can show this configuration, without changing it
    pub fn applicable(&self, info: &ScreenInfo) -> Result<()> {
        CrtcAssignment::solve(info, &self.outputs_for_assignment()).map(|_| ())
    }

    /// Apply to the display server
    ///
    /// `timestamp` guards against racing another client; 0 means "now".
    /// Steps already performed are not undone when a later one fails.
    pub fn apply(&self, screen: &mut Screen, timestamp: u32) -> Result<()> {
        let info = screen.info();
        let assignment = CrtcAssignment::solve(&info, &self.outputs_for_assignment())?;
        assignment.commit(screen, timestamp)?;
        info!(
            "Applied configuration: {} active outputs{}",
            self.outputs.iter().filter(|o| o.is_active()).count(),
            if self.clone { " (mirrored)" } else { "" }
        );
        Ok(())
    }

    /// Refresh the hardware, then apply the stored configuration for it
    pub fn apply_stored(screen: &mut Screen, path: &Path, timestamp: u32) -> Result<Self> {
        if let Err(e) = screen.refresh() {
            debug!("Refresh before applying stored configuration failed: {e}");
        }

        let stored = Self::new_stored(&screen.info(), path)?;
        stored.apply(screen, timestamp)?;
        Ok(stored)
    }

    /// One-line summary of the active outputs
    pub fn describe(&self) -> String {
        self.outputs
            .iter()
            .filter(|o| o.is_active())
            .map(|o| {
                let (x, y, width, height) = o.geometry();
                let rotation = if o.rotation() == Rotation::NORMAL {
                    String::new()
                } else {
                    format!(" {}", o.rotation())
                };
                format!(
                    "{} {width}x{height}@{} +{x}+{y}{rotation}{}",
                    o.name(),
                    o.refresh_rate(),
                    if o.is_primary() { " primary" } else { "" }
                )
            })
            .collect::<Vec<_>>()
            .join(", ")
    }
}
