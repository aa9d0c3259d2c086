//! System Diagnostics and Status Reporting
//!
//! Provides startup diagnostics and a summary of the display hardware for
//! debugging.

use sysinfo::System;
use tracing::info;

use crate::screen::ScreenInfo;

/// System information for diagnostics
#[derive(Debug, Clone)]
pub struct SystemInfo {
    /// Operating system name (e.g., "Linux", "Ubuntu")
    pub os_name: String,
    /// Operating system version string
    pub os_version: String,

    /// Kernel version string
    pub kernel_version: String,

    /// System hostname
    pub hostname: String,
}

impl SystemInfo {
    /// Gather system information
    pub fn gather() -> Self {
        Self {
            os_name: System::name().unwrap_or_else(|| "Unknown".to_string()),
            os_version: System::os_version().unwrap_or_else(|| "Unknown".to_string()),
            kernel_version: System::kernel_version().unwrap_or_else(|| "Unknown".to_string()),
            hostname: System::host_name().unwrap_or_else(|| "Unknown".to_string()),
        }
    }

    /// Log system information
    pub fn log(&self) {
        info!("=== System Information ===");
        info!("  OS: {} {}", self.os_name, self.os_version);
        info!("  Kernel: {}", self.kernel_version);
        info!("  Hostname: {}", self.hostname);
    }
}

/// Detect the desktop session
pub fn detect_session() -> Option<String> {
    let desktop = std::env::var("XDG_CURRENT_DESKTOP").ok();
    let kind = std::env::var("XDG_SESSION_TYPE").ok();

    match (desktop, kind) {
        (Some(desktop), Some(kind)) => Some(format!("{} ({})", desktop, kind)),
        (Some(desktop), None) => Some(desktop),
        (None, Some(kind)) => Some(kind),
        (None, None) => None,
    }
}

/// Log complete diagnostics on startup
pub fn log_startup_diagnostics() {
    info!("╔════════════════════════════════════════════════════════════╗");
    info!("║          Startup Diagnostics                              ║");
    info!("╚════════════════════════════════════════════════════════════╝");

    // System info
    let sys_info = SystemInfo::gather();
    sys_info.log();

    // Environment
    info!("=== Environment ===");
    if let Some(session) = detect_session() {
        info!("  Session: {}", session);
    } else {
        info!("  Session: Unknown");
    }

    match std::env::var("DISPLAY") {
        Ok(value) => info!("  X Display: {}", value),
        Err(_) => info!("  X Display: Not set"),
    }

    match crate::monitors::intended_path() {
        Some(path) => info!("  Layout file: {}", path.display()),
        None => info!("  Layout file: No configuration directory"),
    }

    info!("=== Build ===");
    info!("  Version: {}", env!("CARGO_PKG_VERSION"));
    #[cfg(debug_assertions)]
    info!("  Build: debug");
    #[cfg(not(debug_assertions))]
    info!("  Build: release");
    info!("  X11 backend: {}", cfg!(feature = "x11"));

    info!("╚════════════════════════════════════════════════════════════╝");
}

/// Log the hardware described by a snapshot
pub fn log_screen_summary(info: &ScreenInfo) {
    let range = info.size_range();
    info!("=== Screen ===");
    info!(
        "  Size range: {}x{} .. {}x{}",
        range.min_width, range.min_height, range.max_width, range.max_height
    );
    info!(
        "  Timestamps: config {} / hardware {}",
        info.timestamp(),
        info.config_timestamp()
    );

    for output in info.outputs() {
        let state = match (output.connected, info.output_crtc(output)) {
            (false, _) => "disconnected".to_string(),
            (true, None) => "off".to_string(),
            (true, Some(crtc)) => match info.crtc_mode(crtc) {
                Some(mode) => format!("{} at +{}+{} on CRTC {}", mode, crtc.x, crtc.y, crtc.id),
                None => format!("CRTC {} (no mode)", crtc.id),
            },
        };
        info!("  {}: {}", output.name, state);
    }

    info!("  Clone modes: {}", info.clone_modes().len());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::ResourcesBuilder;

    #[test]
    fn test_system_info_gather() {
        let info = SystemInfo::gather();
        assert!(!info.os_name.is_empty());
        assert!(!info.hostname.is_empty());
    }

    #[test]
    fn test_startup_diagnostics_does_not_panic() {
        log_startup_diagnostics();
    }

    #[test]
    fn test_screen_summary_does_not_panic() {
        let resources = ResourcesBuilder::new(4096, 4096)
            .mode(1, 1024, 768, 60)
            .crtc(10)
            .output(20, "DP-1", &[1])
            .disconnected_output(21, "VGA-1")
            .lit(10, 1, 0, 0, &[20])
            .build();
        log_screen_summary(&ScreenInfo::new(resources).unwrap());
    }
}
