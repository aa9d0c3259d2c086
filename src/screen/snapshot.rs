//! Immutable hardware snapshot

use tracing::trace;

use super::types::{Crtc, CrtcId, Mode, ModeId, Output, OutputId, SizeRange};
use crate::backend::Resources;
use crate::error::{RandrError, Result};

/// Outputs, CRTCs and modes as reported by one backend query
#[derive(Debug, Clone, PartialEq)]
pub struct ScreenInfo {
    resources: Resources,
    clone_modes: Vec<Mode>,
}

impl ScreenInfo {
    /// Validate a backend query result and derive the clone modes
    ///
    /// Fails with [`RandrError::Query`] when an object refers to an id the
    /// query did not report.
    pub fn new(resources: Resources) -> Result<Self> {
        validate(&resources)?;
        let clone_modes = gather_clone_modes(&resources);
        trace!(
            "Snapshot: {} outputs, {} CRTCs, {} modes, {} clone modes",
            resources.outputs.len(),
            resources.crtcs.len(),
            resources.modes.len(),
            clone_modes.len()
        );

        Ok(Self {
            resources,
            clone_modes,
        })
    }

    /// The underlying query result
    pub fn resources(&self) -> &Resources {
        &self.resources
    }

    /// All outputs, connected or not
    pub fn outputs(&self) -> &[Output] {
        &self.resources.outputs
    }

    /// All CRTCs
    pub fn crtcs(&self) -> &[Crtc] {
        &self.resources.crtcs
    }

    /// All modes
    pub fn modes(&self) -> &[Mode] {
        &self.resources.modes
    }

    /// Modes whose size every connected output can show, at any refresh rate
    pub fn clone_modes(&self) -> &[Mode] {
        &self.clone_modes
    }

    /// Output by connector name
    pub fn output_by_name(&self, name: &str) -> Option<&Output> {
        self.outputs().iter().find(|output| output.name == name)
    }

    /// Output by protocol id
    pub fn output_by_id(&self, id: OutputId) -> Option<&Output> {
        self.outputs().iter().find(|output| output.id == id)
    }

    /// CRTC by protocol id
    pub fn crtc_by_id(&self, id: CrtcId) -> Option<&Crtc> {
        self.crtcs().iter().find(|crtc| crtc.id == id)
    }

    /// Mode by protocol id
    pub fn mode_by_id(&self, id: ModeId) -> Option<&Mode> {
        self.modes().iter().find(|mode| mode.id == id)
    }

    /// CRTC currently driving `output`
    pub fn output_crtc(&self, output: &Output) -> Option<&Crtc> {
        output.crtc.and_then(|id| self.crtc_by_id(id))
    }

    /// Mode a CRTC is scanning out
    pub fn crtc_mode(&self, crtc: &Crtc) -> Option<&Mode> {
        crtc.current_mode.and_then(|id| self.mode_by_id(id))
    }

    /// Modes of an output, in the order the server reported them
    pub fn output_modes<'a>(&'a self, output: &'a Output) -> impl Iterator<Item = &'a Mode> + 'a {
        output.modes.iter().filter_map(move |id| self.mode_by_id(*id))
    }

    /// First preferred mode of an output
    pub fn preferred_mode(&self, output: &Output) -> Option<&Mode> {
        output
            .preferred_modes()
            .first()
            .and_then(|id| self.mode_by_id(*id))
    }

    /// Whether an output has a mode with the same size as `mode`
    pub fn has_similar_mode(&self, output: &Output, mode: &Mode) -> bool {
        self.output_modes(output).any(|m| m.same_size(mode))
    }

    /// Virtual screen size limits
    pub fn size_range(&self) -> SizeRange {
        self.resources.size_range
    }

    /// Time of the last configuration change
    pub fn timestamp(&self) -> u32 {
        self.resources.timestamp
    }

    /// Time of the last hardware change
    pub fn config_timestamp(&self) -> u32 {
        self.resources.config_timestamp
    }

    /// The primary output, if the server reports one
    pub fn primary_output(&self) -> Option<&Output> {
        self.resources.primary.and_then(|id| self.output_by_id(id))
    }
}

fn validate(resources: &Resources) -> Result<()> {
    let has_crtc = |id: CrtcId| resources.crtcs.iter().any(|c| c.id == id);
    let has_output = |id: OutputId| resources.outputs.iter().any(|o| o.id == id);
    let has_mode = |id: ModeId| resources.modes.iter().any(|m| m.id == id);

    for output in &resources.outputs {
        let dangling = output
            .possible_crtcs
            .iter()
            .chain(output.crtc.iter())
            .find(|id| !has_crtc(**id))
            .map(|id| format!("output {} refers to unknown CRTC {id}", output.name))
            .or_else(|| {
                output
                    .modes
                    .iter()
                    .find(|id| !has_mode(**id))
                    .map(|id| format!("output {} refers to unknown mode {id}", output.name))
            })
            .or_else(|| {
                output
                    .clones
                    .iter()
                    .find(|id| !has_output(**id))
                    .map(|id| format!("output {} refers to unknown clone {id}", output.name))
            });

        if let Some(reason) = dangling {
            return Err(RandrError::Query(reason));
        }
    }

    for crtc in &resources.crtcs {
        if let Some(mode) = crtc.current_mode.filter(|id| !has_mode(*id)) {
            return Err(RandrError::Query(format!(
                "CRTC {} is scanning out unknown mode {mode}",
                crtc.id
            )));
        }

        if let Some(output) = crtc
            .possible_outputs
            .iter()
            .chain(crtc.current_outputs.iter())
            .find(|id| !has_output(**id))
        {
            return Err(RandrError::Query(format!(
                "CRTC {} refers to unknown output {output}",
                crtc.id
            )));
        }
    }

    Ok(())
}

fn gather_clone_modes(resources: &Resources) -> Vec<Mode> {
    let connected: Vec<&Output> = resources.outputs.iter().filter(|o| o.connected).collect();
    if connected.is_empty() {
        return Vec::new();
    }

    let offers_size = |output: &Output, mode: &Mode| {
        output
            .modes
            .iter()
            .filter_map(|id| resources.modes.iter().find(|m| m.id == *id))
            .any(|m| m.same_size(mode))
    };

    // Candidates are the modes the connected outputs list themselves.
    let mut clone_modes: Vec<Mode> = Vec::new();
    let candidates = connected
        .iter()
        .flat_map(|output| &output.modes)
        .filter_map(|id| resources.modes.iter().find(|m| m.id == *id));
    for mode in candidates {
        if clone_modes.iter().any(|m| m.id == mode.id) {
            continue;
        }
        if connected.iter().all(|output| offers_size(output, mode)) {
            clone_modes.push(mode.clone());
        }
    }
    clone_modes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::ResourcesBuilder;

    #[test]
    fn test_clone_modes_intersect_sizes() {
        let resources = ResourcesBuilder::new(8192, 8192)
            .mode(1, 800, 600, 60)
            .mode(2, 1920, 1080, 60)
            .mode(3, 800, 600, 75)
            .crtc(10)
            .crtc(11)
            .output(20, "X", &[1, 2])
            .output(21, "Y", &[3])
            .build();
        let info = ScreenInfo::new(resources).unwrap();

        let sizes: Vec<(u32, u32, i32)> = info
            .clone_modes()
            .iter()
            .map(|m| (m.width, m.height, m.refresh_rate()))
            .collect();
        // Each size-compatible mode a connected output lists is kept, at its own rate.
        assert_eq!(sizes, vec![(800, 600, 60), (800, 600, 75)]);
    }

    #[test]
    fn test_clone_modes_skip_modes_only_disconnected_outputs_list() {
        let mut resources = ResourcesBuilder::new(8192, 8192)
            .mode(1, 1024, 768, 60)
            .mode(2, 1024, 768, 75)
            .crtc(10)
            .crtc(11)
            .output(20, "DP-1", &[1])
            .output(21, "DP-2", &[1])
            .disconnected_output(22, "VGA-1")
            .build();
        resources.outputs[2].modes.push(ModeId(2));
        let info = ScreenInfo::new(resources).unwrap();

        let ids: Vec<ModeId> = info.clone_modes().iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![ModeId(1)]);
    }

    #[test]
    fn test_clone_modes_ignore_disconnected() {
        let resources = ResourcesBuilder::new(8192, 8192)
            .mode(1, 1920, 1080, 60)
            .crtc(10)
            .output(20, "DP-1", &[1])
            .disconnected_output(21, "DP-2")
            .build();
        let info = ScreenInfo::new(resources).unwrap();
        assert_eq!(info.clone_modes().len(), 1);
    }

    #[test]
    fn test_dangling_reference_rejected() {
        let mut resources = ResourcesBuilder::new(8192, 8192)
            .mode(1, 1920, 1080, 60)
            .crtc(10)
            .output(20, "DP-1", &[1])
            .build();
        resources.outputs[0].modes.push(ModeId(99));

        let err = ScreenInfo::new(resources).unwrap_err();
        assert!(matches!(err, RandrError::Query(ref msg) if msg.contains("unknown mode 99")));
    }

    #[test]
    fn test_lookups() {
        let resources = ResourcesBuilder::new(8192, 8192)
            .mode(1, 1920, 1080, 60)
            .mode(2, 1280, 720, 60)
            .crtc(10)
            .output(20, "HDMI-1", &[2, 1])
            .lit(10, 1, 0, 0, &[20])
            .primary("HDMI-1")
            .build();
        let info = ScreenInfo::new(resources).unwrap();

        let output = info.output_by_name("HDMI-1").unwrap();
        assert_eq!(info.output_by_id(OutputId(20)).unwrap().name, "HDMI-1");
        assert_eq!(info.output_crtc(output).unwrap().id, CrtcId(10));
        assert_eq!(info.preferred_mode(output).unwrap().width, 1280);
        assert_eq!(info.primary_output().unwrap().name, "HDMI-1");
        assert!(info.output_by_name("DP-9").is_none());
    }
}
