//! Live screen: backend plus current snapshot

use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender};
use tracing::{debug, info, warn};

use super::snapshot::ScreenInfo;
use super::types::{Crtc, CrtcId, Mode, Output, OutputId, SizeRange};
use crate::backend::{CrtcConfig, GammaRamp, RandrBackend};
use crate::error::{RandrError, Result};

/// Notification sent to subscribers after a refresh
#[derive(Debug, Clone)]
pub enum ScreenEvent {
    /// The hardware or its configuration changed; carries the new snapshot
    Changed(Arc<ScreenInfo>),
}

/// A display server and the latest snapshot of its hardware
///
/// There is no process-wide instance: every `Screen` owns its backend, so
/// several can coexist (one per simulated server in tests).
pub struct Screen {
    backend: Box<dyn RandrBackend>,
    info: Arc<ScreenInfo>,
    subscribers: Vec<Sender<ScreenEvent>>,
}

impl std::fmt::Debug for Screen {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Screen")
            .field("backend", &self.backend.name())
            .field("info", &self.info)
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}

impl Screen {
    /// Connect to a backend and take the first snapshot
    ///
    /// # Errors
    ///
    /// `BackendUnavailable` if the protocol is missing or too old, `Query`
    /// if the initial query fails.
    pub fn new(mut backend: Box<dyn RandrBackend>) -> Result<Self> {
        backend.check_version()?;
        let info = ScreenInfo::new(backend.query_resources(true)?)?;

        info!(
            "Display backend '{}': {} outputs ({} connected), {} CRTCs, {} modes",
            backend.name(),
            info.outputs().len(),
            info.outputs().iter().filter(|o| o.connected).count(),
            info.crtcs().len(),
            info.modes().len()
        );

        Ok(Self {
            backend,
            info: Arc::new(info),
            subscribers: Vec::new(),
        })
    }

    /// Name of the backend in use
    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Re-detect the hardware and replace the snapshot
    ///
    /// Returns whether anything changed. Runs under a server grab and
    /// finishes with a timestamp update, so other clients do not mistake the
    /// reprobe for a configuration change of their own.
    pub fn refresh(&mut self) -> Result<bool> {
        self.refresh_with(false, true)
    }

    /// Re-query the cached hardware state without reprobing
    pub fn refresh_current(&mut self) -> Result<bool> {
        self.refresh_with(false, false)
    }

    /// Replace the snapshot, notifying subscribers on change or when `force`d
    ///
    /// On failure the previous snapshot is kept.
    pub fn refresh_with(&mut self, force: bool, reprobe: bool) -> Result<bool> {
        let previous = Arc::clone(&self.info);

        let info = if reprobe {
            let mut grab = self.grab()?;
            let resources = grab.query_resources(true)?;
            let info = ScreenInfo::new(resources)?;
            force_timestamp_update(&mut *grab, &info);
            info
        } else {
            ScreenInfo::new(self.backend.query_resources(false)?)?
        };

        let changed = info.timestamp() != previous.timestamp()
            || info.config_timestamp() != previous.config_timestamp();

        self.info = Arc::new(info);

        if changed {
            debug!(
                "Screen changed: timestamp {} -> {}, config timestamp {} -> {}",
                previous.timestamp(),
                self.info.timestamp(),
                previous.config_timestamp(),
                self.info.config_timestamp()
            );
        }

        if changed || force {
            self.notify();
        }

        Ok(changed)
    }

    /// Receive a [`ScreenEvent`] after every refresh that changed something
    pub fn subscribe(&mut self) -> Receiver<ScreenEvent> {
        let (tx, rx) = crossbeam_channel::unbounded();
        self.subscribers.push(tx);
        rx
    }

    fn notify(&mut self) {
        let event = ScreenEvent::Changed(Arc::clone(&self.info));
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    /// Current snapshot
    pub fn info(&self) -> Arc<ScreenInfo> {
        Arc::clone(&self.info)
    }

    /// All outputs, connected or not
    pub fn list_outputs(&self) -> &[Output] {
        self.info.outputs()
    }

    /// All CRTCs
    pub fn list_crtcs(&self) -> &[Crtc] {
        self.info.crtcs()
    }

    /// All modes
    pub fn list_modes(&self) -> &[Mode] {
        self.info.modes()
    }

    /// Modes every connected output can show
    pub fn list_clone_modes(&self) -> &[Mode] {
        self.info.clone_modes()
    }

    /// Output by connector name
    pub fn output_by_name(&self, name: &str) -> Option<&Output> {
        self.info.output_by_name(name)
    }

    /// Output by protocol id
    pub fn output_by_id(&self, id: OutputId) -> Option<&Output> {
        self.info.output_by_id(id)
    }

    /// CRTC by protocol id
    pub fn crtc_by_id(&self, id: CrtcId) -> Option<&Crtc> {
        self.info.crtc_by_id(id)
    }

    /// Virtual screen size limits
    pub fn size_range(&self) -> SizeRange {
        self.info.size_range()
    }

    /// Make `output` the primary output, or clear it
    pub fn set_primary_output(&mut self, output: Option<OutputId>) -> Result<()> {
        if let Some(id) = output {
            if self.info.output_by_id(id).is_none() {
                return Err(RandrError::UnknownObject {
                    kind: "output",
                    name: id.to_string(),
                });
            }
        }
        self.backend.set_primary(output)
    }

    /// Configure a single CRTC
    ///
    /// # Errors
    ///
    /// `CrtcBounds` if the CRTC would scan out beyond the maximum screen
    /// size; the backend is not called in that case.
    pub fn set_crtc_config(&mut self, crtc: CrtcId, timestamp: u32, config: &CrtcConfig) -> Result<()> {
        check_crtc_bounds(&self.info, crtc, config)?;
        self.backend.set_crtc_config(crtc, timestamp, config)
    }

    /// Resize the virtual screen
    pub fn set_size(&mut self, width: i32, height: i32, width_mm: i32, height_mm: i32) -> Result<()> {
        debug!("Resizing screen to {width}x{height} ({width_mm}x{height_mm} mm)");
        self.backend.set_screen_size(width, height, width_mm, height_mm)
    }

    /// Gamma ramp of a CRTC
    pub fn crtc_gamma(&mut self, crtc: CrtcId) -> Result<GammaRamp> {
        self.known_crtc(crtc)?;
        self.backend.crtc_gamma(crtc)
    }

    /// Replace the gamma ramp of a CRTC
    ///
    /// Every channel must have exactly the CRTC's gamma size entries.
    pub fn set_crtc_gamma(&mut self, crtc: CrtcId, ramp: &GammaRamp) -> Result<()> {
        let expected = self.known_crtc(crtc)?.gamma_size as usize;
        let got = ramp.len().unwrap_or(0);
        if ramp.len() != Some(expected) {
            return Err(RandrError::GammaSize { crtc, expected, got });
        }
        self.backend.set_crtc_gamma(crtc, ramp)
    }

    fn known_crtc(&self, crtc: CrtcId) -> Result<&Crtc> {
        self.info.crtc_by_id(crtc).ok_or_else(|| RandrError::UnknownObject {
            kind: "CRTC",
            name: crtc.to_string(),
        })
    }

    /// Grab the server; it is released when the guard drops
    pub fn grab(&mut self) -> Result<ServerGrab<'_>> {
        self.backend.grab()?;
        Ok(ServerGrab {
            backend: self.backend.as_mut(),
        })
    }

    /// Bump the server's configuration timestamp
    ///
    /// Re-applies the first CRTC's own configuration unchanged.
    pub fn force_timestamp_update(&mut self) {
        let info = Arc::clone(&self.info);
        force_timestamp_update(self.backend.as_mut(), &info);
    }
}

fn force_timestamp_update(backend: &mut dyn RandrBackend, info: &ScreenInfo) {
    let Some(crtc) = info.crtcs().first() else {
        return;
    };

    let config = CrtcConfig {
        x: crtc.x,
        y: crtc.y,
        mode: crtc.current_mode,
        rotation: crtc.current_rotation,
        outputs: crtc.current_outputs.clone(),
    };

    if let Err(e) = backend.set_crtc_config(crtc.id, info.timestamp(), &config) {
        debug!("Timestamp update on CRTC {} failed: {e}", crtc.id);
    }
}

pub(crate) fn check_crtc_bounds(info: &ScreenInfo, crtc: CrtcId, config: &CrtcConfig) -> Result<()> {
    if info.crtc_by_id(crtc).is_none() {
        return Err(RandrError::UnknownObject {
            kind: "CRTC",
            name: crtc.to_string(),
        });
    }

    let Some(mode_id) = config.mode else {
        return Ok(());
    };
    let mode = info.mode_by_id(mode_id).ok_or_else(|| RandrError::UnknownObject {
        kind: "mode",
        name: mode_id.to_string(),
    })?;

    let (mut width, mut height) = (mode.width as i32, mode.height as i32);
    if config.rotation.swaps_axes() {
        std::mem::swap(&mut width, &mut height);
    }

    let range = info.size_range();
    if config.x + width > range.max_width || config.y + height > range.max_height {
        return Err(RandrError::CrtcBounds {
            crtc,
            x: config.x,
            y: config.y,
            width,
            height,
            max_width: range.max_width,
            max_height: range.max_height,
        });
    }

    Ok(())
}

/// Exclusive access to the display server
///
/// Dereferences to the backend. Dropping the guard ungrabs, on every path.
pub struct ServerGrab<'a> {
    backend: &'a mut dyn RandrBackend,
}

impl<'a> Deref for ServerGrab<'a> {
    type Target = dyn RandrBackend + 'a;

    fn deref(&self) -> &Self::Target {
        self.backend
    }
}

impl<'a> DerefMut for ServerGrab<'a> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.backend
    }
}

impl Drop for ServerGrab<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.backend.ungrab() {
            warn!("Failed to release server grab: {e}");
        }
    }
}
