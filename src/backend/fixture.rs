//! Programmatic construction of simulated hardware

use super::Resources;
use crate::screen::{
    unknown_vendor, Crtc, CrtcId, Mode, ModeId, Output, OutputId, Rotation, SizeRange,
};

/// Builder for [`Resources`] describing simulated hardware
///
/// Outputs that were not given explicit possible CRTCs can use every CRTC;
/// each CRTC's possible outputs are derived from the outputs at build time.
///
/// ```
/// use mate_rr::backend::ResourcesBuilder;
///
/// let resources = ResourcesBuilder::new(8192, 8192)
///     .mode(1, 1920, 1080, 60)
///     .crtc(63)
///     .crtc(64)
///     .output(65, "eDP-1", &[1])
///     .identity("eDP-1", "AUO", 0x1234, 0)
///     .lit(63, 1, 0, 0, &[65])
///     .build();
///
/// assert_eq!(resources.outputs[0].crtc.map(|c| c.0), Some(63));
/// ```
#[derive(Debug, Clone)]
pub struct ResourcesBuilder {
    size_range: SizeRange,
    modes: Vec<Mode>,
    crtcs: Vec<Crtc>,
    outputs: Vec<Output>,
    explicit_crtcs: Vec<OutputId>,
    primary: Option<OutputId>,
}

impl ResourcesBuilder {
    /// Hardware with the given maximum virtual screen size
    pub fn new(max_width: i32, max_height: i32) -> Self {
        Self {
            size_range: SizeRange {
                min_width: 320,
                max_width,
                min_height: 200,
                max_height,
            },
            modes: Vec::new(),
            crtcs: Vec::new(),
            outputs: Vec::new(),
            explicit_crtcs: Vec::new(),
            primary: None,
        }
    }

    /// Override the full size range
    pub fn size_range(mut self, size_range: SizeRange) -> Self {
        self.size_range = size_range;
        self
    }

    /// Add a mode with a refresh rate in whole Hertz
    pub fn mode(mut self, id: u32, width: u32, height: u32, hz: u32) -> Self {
        self.modes.push(Mode {
            id: ModeId(id),
            name: format!("{width}x{height}"),
            width,
            height,
            freq: hz * 1000,
        });
        self
    }

    /// Add an idle CRTC supporting every rotation
    pub fn crtc(mut self, id: u32) -> Self {
        self.crtcs.push(Crtc {
            id: CrtcId(id),
            current_mode: None,
            x: 0,
            y: 0,
            current_rotation: Rotation::NORMAL,
            rotations: Rotation::ALL,
            possible_outputs: Vec::new(),
            current_outputs: Vec::new(),
            gamma_size: 256,
        });
        self
    }

    /// Restrict the rotations a CRTC supports
    pub fn crtc_rotations(mut self, id: u32, rotations: Rotation) -> Self {
        if let Some(crtc) = self.crtcs.iter_mut().find(|c| c.id == CrtcId(id)) {
            crtc.rotations = rotations;
        }
        self
    }

    /// Add a connected output; the first mode is the preferred one
    pub fn output(mut self, id: u32, name: &str, modes: &[u32]) -> Self {
        self.outputs.push(Output {
            id: OutputId(id),
            name: name.to_string(),
            connected: true,
            width_mm: 0,
            height_mm: 0,
            vendor: unknown_vendor(),
            product: 0,
            serial: 0,
            connector_type: None,
            possible_crtcs: Vec::new(),
            clones: Vec::new(),
            modes: modes.iter().copied().map(ModeId).collect(),
            n_preferred: usize::from(!modes.is_empty()),
            crtc: None,
            is_primary: false,
        });
        self
    }

    /// Add an output with nothing attached
    pub fn disconnected_output(self, id: u32, name: &str) -> Self {
        let mut builder = self.output(id, name, &[]);
        if let Some(output) = builder.outputs.last_mut() {
            output.connected = false;
        }
        builder
    }

    /// Set the monitor identity of an output
    pub fn identity(mut self, name: &str, vendor: &str, product: u16, serial: u32) -> Self {
        if let Some(output) = self.find(name) {
            output.vendor = vendor.to_string();
            output.product = product;
            output.serial = serial;
        }
        self
    }

    /// Set the physical size of an output's monitor
    pub fn physical_size(mut self, name: &str, width_mm: u32, height_mm: u32) -> Self {
        if let Some(output) = self.find(name) {
            output.width_mm = width_mm;
            output.height_mm = height_mm;
        }
        self
    }

    /// Set the connector type property of an output
    pub fn connector_type(mut self, name: &str, connector_type: &str) -> Self {
        if let Some(output) = self.find(name) {
            output.connector_type = Some(connector_type.to_string());
        }
        self
    }

    /// Limit which CRTCs can drive an output
    pub fn possible_crtcs(mut self, name: &str, crtcs: &[u32]) -> Self {
        if let Some(output) = self.find(name) {
            output.possible_crtcs = crtcs.iter().copied().map(CrtcId).collect();
            let id = output.id;
            self.explicit_crtcs.push(id);
        }
        self
    }

    /// Allow two outputs to share a CRTC
    pub fn clones(mut self, a: &str, b: &str) -> Self {
        let ids = (
            self.outputs.iter().find(|o| o.name == a).map(|o| o.id),
            self.outputs.iter().find(|o| o.name == b).map(|o| o.id),
        );
        if let (Some(a_id), Some(b_id)) = ids {
            for output in self.outputs.iter_mut() {
                if output.id == a_id && !output.clones.contains(&b_id) {
                    output.clones.push(b_id);
                }
                if output.id == b_id && !output.clones.contains(&a_id) {
                    output.clones.push(a_id);
                }
            }
        }
        self
    }

    /// Light a CRTC with a mode at a position, driving the given outputs
    pub fn lit(self, crtc: u32, mode: u32, x: i32, y: i32, outputs: &[u32]) -> Self {
        self.lit_rotated(crtc, mode, x, y, Rotation::NORMAL, outputs)
    }

    /// Like [`lit`](Self::lit) with a rotation
    pub fn lit_rotated(
        mut self,
        crtc: u32,
        mode: u32,
        x: i32,
        y: i32,
        rotation: Rotation,
        outputs: &[u32],
    ) -> Self {
        let ids: Vec<OutputId> = outputs.iter().copied().map(OutputId).collect();
        if let Some(c) = self.crtcs.iter_mut().find(|c| c.id == CrtcId(crtc)) {
            c.current_mode = Some(ModeId(mode));
            c.x = x;
            c.y = y;
            c.current_rotation = rotation;
            c.current_outputs = ids.clone();
        }
        for output in self.outputs.iter_mut().filter(|o| ids.contains(&o.id)) {
            output.crtc = Some(CrtcId(crtc));
        }
        self
    }

    /// Mark an output as primary
    pub fn primary(mut self, name: &str) -> Self {
        self.primary = self.outputs.iter().find(|o| o.name == name).map(|o| o.id);
        self
    }

    fn find(&mut self, name: &str) -> Option<&mut Output> {
        self.outputs.iter_mut().find(|o| o.name == name)
    }

    /// Finish the hardware description
    pub fn build(mut self) -> Resources {
        let all_crtcs: Vec<CrtcId> = self.crtcs.iter().map(|c| c.id).collect();
        for output in self.outputs.iter_mut() {
            if !self.explicit_crtcs.contains(&output.id) {
                output.possible_crtcs = all_crtcs.clone();
            }
            output.is_primary = Some(output.id) == self.primary;
        }

        for crtc in self.crtcs.iter_mut() {
            crtc.possible_outputs = self
                .outputs
                .iter()
                .filter(|o| o.possible_crtcs.contains(&crtc.id))
                .map(|o| o.id)
                .collect();
        }

        Resources {
            timestamp: 1,
            config_timestamp: 1,
            size_range: self.size_range,
            outputs: self.outputs,
            crtcs: self.crtcs,
            modes: self.modes,
            primary: self.primary,
        }
    }
}
