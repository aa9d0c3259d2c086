//! Applying an assignment to the server
//!
//! ```text
//! grab ─> disable stale CRTCs ─> resize screen ─> configure CRTCs ─> set primary ─> ungrab
//! ```
//!
//! A CRTC is stale when the assignment does not use it, or when it is lit
//! beyond the new virtual size (the resize would fail with it on). The first
//! failing request aborts the sequence; the grab is released on every path.

use tracing::{debug, info};

use super::CrtcAssignment;
use crate::backend::CrtcConfig;
use crate::error::{ApplyStep, RandrError, Result};
use crate::screen::{check_crtc_bounds, Screen, ScreenInfo};

/// Resolution used to derive the physical screen size
const DPI: f64 = 96.0;

/// Millimetres spanned by `pixels` at [`DPI`]
fn pixels_to_mm(pixels: i32) -> i32 {
    (f64::from(pixels) / DPI * 25.4 + 0.5) as i32
}

fn apply_error(step: ApplyStep) -> impl FnOnce(RandrError) -> RandrError {
    move |e| RandrError::Apply {
        step,
        reason: e.to_string(),
    }
}

fn lit_outside(info: &ScreenInfo, crtc: &crate::screen::Crtc, width: i32, height: i32) -> bool {
    let Some(mode) = info.crtc_mode(crtc) else {
        return false;
    };
    let (mut w, mut h) = (mode.width as i32, mode.height as i32);
    if crtc.current_rotation.swaps_axes() {
        std::mem::swap(&mut w, &mut h);
    }
    crtc.x + w > width || crtc.y + h > height
}

impl CrtcAssignment {
    /// Program the server
    ///
    /// `timestamp` is the configuration timestamp the caller last saw; the
    /// server rejects the CRTC requests when it is stale.
    ///
    /// # Errors
    ///
    /// `Apply` naming the failed step. Requests already sent are not undone.
    pub fn commit(&self, screen: &mut Screen, timestamp: u32) -> Result<()> {
        let info = screen.info();
        let (width, height) = info.size_range().clamp(self.width, self.height);

        let mut grab = screen.grab().map_err(apply_error(ApplyStep::Grab))?;

        for crtc in info.crtcs() {
            if crtc.current_mode.is_none() {
                continue;
            }
            if self.crtcs.contains_key(&crtc.id) && !lit_outside(&info, crtc, width, height) {
                continue;
            }

            debug!("Disabling CRTC {}", crtc.id);
            grab.set_crtc_config(crtc.id, timestamp, &CrtcConfig::disabled())
                .map_err(apply_error(ApplyStep::DisableCrtc(crtc.id)))?;
        }

        let (width_mm, height_mm) = (pixels_to_mm(width), pixels_to_mm(height));
        debug!("Resizing screen to {width}x{height} ({width_mm}x{height_mm} mm)");
        grab.set_screen_size(width, height, width_mm, height_mm)
            .map_err(apply_error(ApplyStep::Resize))?;

        for (crtc, setting) in &self.crtcs {
            let config = CrtcConfig {
                x: setting.x,
                y: setting.y,
                mode: Some(setting.mode),
                rotation: setting.rotation,
                outputs: setting.outputs.clone(),
            };

            check_crtc_bounds(&info, *crtc, &config)
                .and_then(|()| grab.set_crtc_config(*crtc, timestamp, &config))
                .map_err(apply_error(ApplyStep::ConfigureCrtc(*crtc)))?;
        }

        grab.set_primary(self.primary)
            .map_err(apply_error(ApplyStep::SetPrimary))?;

        info!(
            "Applied {} CRTCs on a {width}x{height} screen",
            self.crtcs.len()
        );
        Ok(())
    }
}
