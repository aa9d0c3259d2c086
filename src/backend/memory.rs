//! In-memory simulated display server
//!
//! Keeps a [`Resources`] value as the server state and applies requests to
//! it with the same rules an X server enforces:
//!
//! - a CRTC request older than the last configuration change is rejected
//! - a CRTC may only drive outputs listed as possible for it
//! - the screen cannot shrink below a lit CRTC, nor leave the size range
//!
//! Every request is appended to a call log that tests inspect through a
//! [`MemoryHandle`], which shares the state with the backend after the
//! backend itself has been handed to a [`Screen`](crate::screen::Screen).

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, trace};

use super::{CrtcConfig, GammaRamp, RandrBackend, Resources};
use crate::error::{RandrError, Result};
use crate::screen::{CrtcId, OutputId};

/// A request observed by the simulated server
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendCall {
    /// Resources were queried
    Query { reprobe: bool },
    /// A CRTC was configured (or switched off)
    SetCrtcConfig {
        crtc: CrtcId,
        timestamp: u32,
        config: CrtcConfig,
    },
    /// The virtual screen was resized
    SetScreenSize {
        width: i32,
        height: i32,
        width_mm: i32,
        height_mm: i32,
    },
    /// The primary output was changed
    SetPrimary(Option<OutputId>),
    /// The server was grabbed
    Grab,
    /// The server was released
    Ungrab,
    /// A gamma ramp was replaced
    SetGamma(CrtcId),
}

#[derive(Debug)]
struct ServerState {
    resources: Resources,
    screen_size: (i32, i32),
    clock: u32,
    grabbed: bool,
    calls: Vec<BackendCall>,
    gamma: HashMap<CrtcId, GammaRamp>,
    failing_crtc: Option<CrtcId>,
    query_failure: Option<String>,
}

impl ServerState {
    fn new(resources: Resources) -> Self {
        let screen_size = lit_extent(&resources);
        let clock = resources.timestamp.max(resources.config_timestamp);

        Self {
            resources,
            screen_size,
            clock,
            grabbed: false,
            calls: Vec::new(),
            gamma: HashMap::new(),
            failing_crtc: None,
            query_failure: None,
        }
    }

    fn tick(&mut self) -> u32 {
        self.clock += 1;
        self.clock
    }

    fn apply_crtc(&mut self, crtc_id: CrtcId, timestamp: u32, config: &CrtcConfig) -> Result<()> {
        if self.failing_crtc == Some(crtc_id) {
            return Err(RandrError::Backend(format!(
                "could not set the configuration for CRTC {crtc_id}"
            )));
        }

        if timestamp != 0 && timestamp < self.resources.timestamp {
            return Err(RandrError::Backend(format!(
                "request time {timestamp} is older than the last configuration change at {}",
                self.resources.timestamp
            )));
        }

        let resources = &mut self.resources;
        let crtc_index = resources
            .crtcs
            .iter()
            .position(|crtc| crtc.id == crtc_id)
            .ok_or_else(|| RandrError::Backend(format!("bad CRTC {crtc_id}")))?;

        if let Some(mode) = config.mode {
            if !resources.modes.iter().any(|m| m.id == mode) {
                return Err(RandrError::Backend(format!("bad mode {mode}")));
            }
        }

        for output in &config.outputs {
            if !resources.crtcs[crtc_index].possible_outputs.contains(output) {
                return Err(RandrError::Backend(format!(
                    "CRTC {crtc_id} cannot drive output {output}"
                )));
            }
        }

        // Outputs move between CRTCs: detach them from wherever they are now.
        for crtc in resources.crtcs.iter_mut().filter(|crtc| crtc.id != crtc_id) {
            crtc.current_outputs.retain(|output| !config.outputs.contains(output));
            if crtc.current_outputs.is_empty() {
                crtc.current_mode = None;
            }
        }

        let previous = std::mem::take(&mut resources.crtcs[crtc_index].current_outputs);
        for output in resources.outputs.iter_mut() {
            if previous.contains(&output.id) || config.outputs.contains(&output.id) {
                output.crtc = None;
            }
            if config.outputs.contains(&output.id) {
                output.crtc = Some(crtc_id);
            }
        }

        let crtc = &mut resources.crtcs[crtc_index];
        if config.is_disabled() {
            crtc.current_mode = None;
            crtc.x = 0;
            crtc.y = 0;
        } else {
            crtc.current_mode = config.mode;
            crtc.x = config.x;
            crtc.y = config.y;
            crtc.current_outputs = config.outputs.clone();
        }
        crtc.current_rotation = config.rotation;

        let now = if timestamp == 0 { self.tick() } else { timestamp };
        self.resources.timestamp = now;
        Ok(())
    }

    fn resize(&mut self, width: i32, height: i32) -> Result<()> {
        let range = self.resources.size_range;
        if !range.contains(width, height) {
            return Err(RandrError::Backend(format!(
                "screen size {width}x{height} outside {}x{} .. {}x{}",
                range.min_width, range.min_height, range.max_width, range.max_height
            )));
        }

        let (lit_width, lit_height) = lit_extent(&self.resources);
        if lit_width > width || lit_height > height {
            return Err(RandrError::Backend(format!(
                "screen size {width}x{height} is smaller than the lit CRTCs ({lit_width}x{lit_height})"
            )));
        }

        self.screen_size = (width, height);
        Ok(())
    }
}

/// Bottom-right corner of everything currently scanned out
fn lit_extent(resources: &Resources) -> (i32, i32) {
    resources
        .crtcs
        .iter()
        .filter_map(|crtc| {
            let mode = resources.modes.iter().find(|m| Some(m.id) == crtc.current_mode)?;
            let (mut w, mut h) = (mode.width as i32, mode.height as i32);
            if crtc.current_rotation.swaps_axes() {
                std::mem::swap(&mut w, &mut h);
            }
            Some((crtc.x + w, crtc.y + h))
        })
        .fold((0, 0), |(w, h), (x, y)| (w.max(x), h.max(y)))
}

/// Simulated display server
#[derive(Debug, Clone)]
pub struct MemoryBackend {
    state: Arc<Mutex<ServerState>>,
}

impl MemoryBackend {
    /// Create a server in the given state
    pub fn new(resources: Resources) -> Self {
        Self {
            state: Arc::new(Mutex::new(ServerState::new(resources))),
        }
    }

    /// Load the server state from a TOML fixture
    pub fn from_fixture(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| RandrError::io(path, e))?;
        let resources: Resources = toml::from_str(&content).map_err(|e| RandrError::parse(path, e))?;
        debug!(
            "Loaded fixture {} ({} outputs, {} CRTCs, {} modes)",
            path.display(),
            resources.outputs.len(),
            resources.crtcs.len(),
            resources.modes.len()
        );
        Ok(Self::new(resources))
    }

    /// Handle sharing this server's state
    pub fn handle(&self) -> MemoryHandle {
        MemoryHandle {
            state: Arc::clone(&self.state),
        }
    }
}

impl RandrBackend for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn query_resources(&mut self, reprobe: bool) -> Result<Resources> {
        let mut state = self.state.lock();
        state.calls.push(BackendCall::Query { reprobe });

        if let Some(reason) = &state.query_failure {
            return Err(RandrError::Query(reason.clone()));
        }

        let mut resources = state.resources.clone();
        let primary = resources.primary;
        for output in resources.outputs.iter_mut() {
            output.is_primary = Some(output.id) == primary;
        }
        Ok(resources)
    }

    fn set_crtc_config(&mut self, crtc: CrtcId, timestamp: u32, config: &CrtcConfig) -> Result<()> {
        let mut state = self.state.lock();
        trace!("memory: set CRTC {crtc} to {config:?} at {timestamp}");
        state.calls.push(BackendCall::SetCrtcConfig {
            crtc,
            timestamp,
            config: config.clone(),
        });
        state.apply_crtc(crtc, timestamp, config)
    }

    fn set_screen_size(&mut self, width: i32, height: i32, width_mm: i32, height_mm: i32) -> Result<()> {
        let mut state = self.state.lock();
        state.calls.push(BackendCall::SetScreenSize {
            width,
            height,
            width_mm,
            height_mm,
        });
        state.resize(width, height)
    }

    fn set_primary(&mut self, output: Option<OutputId>) -> Result<()> {
        let mut state = self.state.lock();
        state.calls.push(BackendCall::SetPrimary(output));

        if let Some(id) = output {
            if !state.resources.outputs.iter().any(|o| o.id == id) {
                return Err(RandrError::Backend(format!("bad output {id}")));
            }
        }
        state.resources.primary = output;
        Ok(())
    }

    fn grab(&mut self) -> Result<()> {
        let mut state = self.state.lock();
        state.calls.push(BackendCall::Grab);
        state.grabbed = true;
        Ok(())
    }

    fn ungrab(&mut self) -> Result<()> {
        let mut state = self.state.lock();
        state.calls.push(BackendCall::Ungrab);
        state.grabbed = false;
        Ok(())
    }

    fn crtc_gamma(&mut self, crtc: CrtcId) -> Result<GammaRamp> {
        let state = self.state.lock();
        let info = state
            .resources
            .crtcs
            .iter()
            .find(|c| c.id == crtc)
            .ok_or_else(|| RandrError::Backend(format!("bad CRTC {crtc}")))?;

        Ok(state
            .gamma
            .get(&crtc)
            .cloned()
            .unwrap_or_else(|| GammaRamp::linear(info.gamma_size as usize)))
    }

    fn set_crtc_gamma(&mut self, crtc: CrtcId, ramp: &GammaRamp) -> Result<()> {
        let mut state = self.state.lock();
        state.calls.push(BackendCall::SetGamma(crtc));
        state.gamma.insert(crtc, ramp.clone());
        Ok(())
    }
}

/// Inspection and hotplug access to a [`MemoryBackend`]
#[derive(Debug, Clone)]
pub struct MemoryHandle {
    state: Arc<Mutex<ServerState>>,
}

impl MemoryHandle {
    /// Current server state
    pub fn resources(&self) -> Resources {
        self.state.lock().resources.clone()
    }

    /// Current virtual screen size
    pub fn screen_size(&self) -> (i32, i32) {
        self.state.lock().screen_size
    }

    /// Whether a client holds the grab
    pub fn is_grabbed(&self) -> bool {
        self.state.lock().grabbed
    }

    /// Requests received so far
    pub fn calls(&self) -> Vec<BackendCall> {
        self.state.lock().calls.clone()
    }

    /// Forget the recorded requests
    pub fn clear_calls(&self) {
        self.state.lock().calls.clear();
    }

    /// Change the hardware (plug or unplug monitors)
    ///
    /// Bumps the configuration timestamp the way a real hotplug does.
    pub fn hotplug(&self, change: impl FnOnce(&mut Resources)) {
        let mut state = self.state.lock();
        change(&mut state.resources);
        let now = state.tick();
        state.resources.config_timestamp = now;
    }

    /// Simulate another client changing the configuration
    pub fn touch(&self) {
        let mut state = self.state.lock();
        let now = state.tick();
        state.resources.timestamp = now;
    }

    /// Make every request for `crtc` fail
    pub fn fail_crtc(&self, crtc: Option<CrtcId>) {
        self.state.lock().failing_crtc = crtc;
    }

    /// Make resource queries fail with `reason`
    pub fn fail_queries(&self, reason: Option<&str>) {
        self.state.lock().query_failure = reason.map(str::to_string);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::ResourcesBuilder;
    use crate::screen::{ModeId, Rotation};

    fn two_heads() -> Resources {
        ResourcesBuilder::new(8192, 8192)
            .mode(1, 1920, 1080, 60)
            .mode(2, 1280, 1024, 60)
            .crtc(10)
            .crtc(11)
            .output(20, "DP-1", &[1, 2])
            .output(21, "HDMI-1", &[2])
            .lit(10, 1, 0, 0, &[20])
            .build()
    }

    fn lit(x: i32, mode: u32, outputs: &[u32]) -> CrtcConfig {
        CrtcConfig {
            x,
            y: 0,
            mode: Some(ModeId(mode)),
            rotation: Rotation::NORMAL,
            outputs: outputs.iter().copied().map(OutputId).collect(),
        }
    }

    #[test]
    fn test_crtc_config_updates_state() {
        let mut backend = MemoryBackend::new(two_heads());
        let handle = backend.handle();

        backend.set_crtc_config(CrtcId(11), 0, &lit(1920, 2, &[21])).unwrap();

        let resources = handle.resources();
        let crtc = resources.crtcs.iter().find(|c| c.id == CrtcId(11)).unwrap();
        assert_eq!(crtc.current_mode, Some(ModeId(2)));
        assert_eq!(crtc.x, 1920);
        let output = resources.outputs.iter().find(|o| o.id == OutputId(21)).unwrap();
        assert_eq!(output.crtc, Some(CrtcId(11)));
    }

    #[test]
    fn test_current_time_request_advances_timestamp() {
        let mut backend = MemoryBackend::new(two_heads());
        let handle = backend.handle();
        let before = handle.resources().timestamp;

        backend.set_crtc_config(CrtcId(11), 0, &lit(1920, 2, &[21])).unwrap();
        let after = handle.resources().timestamp;
        assert!(after > before);

        backend.set_crtc_config(CrtcId(11), after, &lit(1920, 2, &[21])).unwrap();
        assert_eq!(handle.resources().timestamp, after);
    }

    #[test]
    fn test_stale_timestamp_rejected() {
        let mut backend = MemoryBackend::new(two_heads());
        let handle = backend.handle();
        let before = handle.resources().timestamp;

        handle.touch();

        let result = backend.set_crtc_config(CrtcId(11), before, &lit(1920, 2, &[21]));
        assert!(result.is_err());

        // The current timestamp is accepted, repeatedly.
        let now = handle.resources().timestamp;
        backend.set_crtc_config(CrtcId(11), now, &lit(1920, 2, &[21])).unwrap();
        backend.set_crtc_config(CrtcId(10), now, &lit(0, 2, &[20])).unwrap();
    }

    #[test]
    fn test_resize_refuses_to_cut_lit_crtc() {
        let mut backend = MemoryBackend::new(two_heads());
        assert!(backend.set_screen_size(1280, 1024, 339, 271).is_err());

        backend.set_crtc_config(CrtcId(10), 0, &CrtcConfig::disabled()).unwrap();
        backend.set_screen_size(1280, 1024, 339, 271).unwrap();
        assert_eq!(backend.handle().screen_size(), (1280, 1024));
    }

    #[test]
    fn test_impossible_output_rejected() {
        let resources = ResourcesBuilder::new(8192, 8192)
            .mode(1, 1024, 768, 60)
            .crtc(10)
            .crtc(11)
            .output(20, "VGA-1", &[1])
            .possible_crtcs("VGA-1", &[10])
            .build();
        let mut backend = MemoryBackend::new(resources);
        assert!(backend.set_crtc_config(CrtcId(11), 0, &lit(0, 1, &[20])).is_err());
    }

    #[test]
    fn test_hotplug_bumps_config_timestamp() {
        let backend = MemoryBackend::new(two_heads());
        let handle = backend.handle();
        let before = handle.resources().config_timestamp;

        handle.hotplug(|resources| {
            resources.outputs[1].connected = false;
        });

        let after = handle.resources();
        assert!(after.config_timestamp > before);
        assert!(!after.outputs[1].connected);
    }

    #[test]
    fn test_query_failure_injection() {
        let mut backend = MemoryBackend::new(two_heads());
        backend.handle().fail_queries(Some("connection lost"));
        assert!(matches!(backend.query_resources(false), Err(RandrError::Query(_))));
    }
}
