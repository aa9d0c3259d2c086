//! User-Friendly Error Formatting
//!
//! Provides user-friendly error messages with troubleshooting hints
//! for common error scenarios.

use std::fmt::Write;

use crate::error::RandrError;

/// Format error for user consumption
///
/// Takes technical error and produces user-friendly message with
/// troubleshooting steps and context.
pub fn format_user_error(error: &anyhow::Error) -> String {
    let mut output = String::new();

    // Header
    writeln!(&mut output).ok();
    writeln!(
        &mut output,
        "╔════════════════════════════════════════════════════════════╗"
    )
    .ok();
    writeln!(
        &mut output,
        "║                     ERROR                                  ║"
    )
    .ok();
    writeln!(
        &mut output,
        "╚════════════════════════════════════════════════════════════╝"
    )
    .ok();
    writeln!(&mut output).ok();

    // Analyze error and provide context
    let randr = error
        .chain()
        .find_map(|cause| cause.downcast_ref::<RandrError>());

    match randr {
        Some(RandrError::BackendUnavailable { .. }) => format_backend_error(&mut output),
        Some(e @ (RandrError::ScreenBounds { .. } | RandrError::CrtcBounds { .. })) => {
            format_bounds_error(&mut output, e)
        }
        Some(RandrError::Assignment(_)) => format_assignment_error(&mut output),
        Some(RandrError::Apply { step, .. }) => format_apply_error(&mut output, &step.to_string()),
        Some(e @ (RandrError::Parse { .. } | RandrError::Io { .. })) => {
            format_monitors_file_error(&mut output, e)
        }
        Some(RandrError::NoMatchingConfig) => format_no_match_error(&mut output),
        _ if error.to_string().contains("config") => format_config_error(&mut output),
        _ => format_generic_error(&mut output, &error.to_string()),
    }

    // Technical details
    writeln!(&mut output).ok();
    writeln!(
        &mut output,
        "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━"
    )
    .ok();
    writeln!(&mut output, "Technical Details:").ok();
    writeln!(&mut output).ok();
    writeln!(&mut output, "{:#}", error).ok();
    writeln!(&mut output).ok();

    // Footer with help
    writeln!(
        &mut output,
        "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━"
    )
    .ok();
    writeln!(&mut output, "Need Help?").ok();
    writeln!(
        &mut output,
        "  - Run with --verbose for detailed logs: mate-rr -vvv <command>"
    )
    .ok();
    writeln!(
        &mut output,
        "  - Report issues: https://github.com/mate-desktop/mate-desktop/issues"
    )
    .ok();
    writeln!(
        &mut output,
        "╚════════════════════════════════════════════════════════════╝"
    )
    .ok();

    output
}

fn format_backend_error(output: &mut String) {
    writeln!(output, "Display Server Error").ok();
    writeln!(output).ok();
    writeln!(output, "Could not use the RANDR extension of the display server.").ok();
    writeln!(output).ok();
    writeln!(output, "Common Causes:").ok();
    writeln!(output).ok();
    writeln!(output, "  1. No X display").ok();
    writeln!(output, "     → Check: echo $DISPLAY (should not be empty)").ok();
    writeln!(output, "     → Or pass: mate-rr --display :0 <command>").ok();
    writeln!(output).ok();
    writeln!(output, "  2. RANDR too old").ok();
    writeln!(output, "     → Run: xrandr --version").ok();
    writeln!(output, "     → Need: RANDR 1.3 or newer").ok();
    writeln!(output).ok();
    writeln!(output, "  3. Running under Wayland").ok();
    writeln!(output, "     → Xwayland does not expose real outputs").ok();
    writeln!(output, "     → Use the compositor's display settings instead").ok();
}

fn format_bounds_error(output: &mut String, error: &RandrError) {
    writeln!(output, "Layout Too Large").ok();
    writeln!(output).ok();
    writeln!(output, "{}", error).ok();
    writeln!(output).ok();
    writeln!(output, "Common Causes:").ok();
    writeln!(output).ok();
    writeln!(output, "  1. Monitors placed too far apart").ok();
    writeln!(output, "     → Move outputs closer to the top-left corner").ok();
    writeln!(output).ok();
    writeln!(output, "  2. Driver limit on the virtual screen").ok();
    writeln!(output, "     → Check: xrandr | head -1 (shows the maximum)").ok();
    writeln!(output, "     → Use a lower resolution or rotate a monitor").ok();
}

fn format_assignment_error(output: &mut String) {
    writeln!(output, "Layout Not Supported By Hardware").ok();
    writeln!(output).ok();
    writeln!(
        output,
        "The graphics card cannot drive all outputs with the requested modes."
    )
    .ok();
    writeln!(output).ok();
    writeln!(output, "Common Causes:").ok();
    writeln!(output).ok();
    writeln!(output, "  1. More monitors than CRTCs").ok();
    writeln!(output, "     → Turn one output off, or mirror two of them").ok();
    writeln!(output).ok();
    writeln!(output, "  2. Mode no longer offered").ok();
    writeln!(output, "     → The monitor changed; run: mate-rr show").ok();
    writeln!(output).ok();
    writeln!(output, "  3. Mirrored outputs that cannot share a CRTC").ok();
    writeln!(output, "     → Pick a mode listed under 'clone modes'").ok();
}

fn format_apply_error(output: &mut String, step: &str) {
    writeln!(output, "Display Server Rejected The Layout").ok();
    writeln!(output).ok();
    writeln!(output, "The server refused to {}.", step).ok();
    writeln!(output).ok();
    writeln!(output, "Common Causes:").ok();
    writeln!(output).ok();
    writeln!(output, "  1. Another program changed the layout meanwhile").ok();
    writeln!(output, "     → Run the command again").ok();
    writeln!(output).ok();
    writeln!(output, "  2. Driver limitation").ok();
    writeln!(output, "     → Check the X server log: ~/.local/share/xorg/Xorg.0.log").ok();
}

fn format_monitors_file_error(output: &mut String, error: &RandrError) {
    writeln!(output, "Stored Layout Error").ok();
    writeln!(output).ok();
    writeln!(output, "{}", error).ok();
    writeln!(output).ok();
    writeln!(output, "Common Causes:").ok();
    writeln!(output).ok();
    writeln!(output, "  1. File damaged or edited by hand").ok();
    writeln!(output, "     → Restore the previous copy: monitors.xml.backup").ok();
    writeln!(output, "     → Or store the current layout again: mate-rr save").ok();
    writeln!(output).ok();
    writeln!(output, "  2. No permission to write the configuration directory").ok();
    writeln!(output, "     → Check: ls -ld ~/.config").ok();
}

fn format_no_match_error(output: &mut String) {
    writeln!(output, "No Stored Layout For These Monitors").ok();
    writeln!(output).ok();
    writeln!(
        output,
        "None of the saved layouts was made for the monitors attached now."
    )
    .ok();
    writeln!(output).ok();
    writeln!(output, "  → Arrange the monitors, then run: mate-rr save").ok();
}

fn format_config_error(output: &mut String) {
    writeln!(output, "Configuration Error").ok();
    writeln!(output).ok();
    writeln!(output, "Problem with configuration file.").ok();
    writeln!(output).ok();
    writeln!(output, "Common Causes:").ok();
    writeln!(output).ok();
    writeln!(output, "  1. Configuration file not found").ok();
    writeln!(output, "     → Default location: ~/.config/mate-rr/config.toml").ok();
    writeln!(output, "     → Or specify: mate-rr -c /path/to/config.toml").ok();
    writeln!(output).ok();
    writeln!(output, "  2. Invalid TOML syntax").ok();
    writeln!(output, "     → Check for typos, missing quotes, etc.").ok();
    writeln!(output).ok();
    writeln!(output, "  3. Memory backend without fixture").ok();
    writeln!(output, "     → Set [backend] fixture or pass --fixture").ok();
}

fn format_generic_error(output: &mut String, error: &str) {
    writeln!(output, "Display Configuration Error").ok();
    writeln!(output).ok();
    writeln!(output, "Error: {}", error).ok();
    writeln!(output).ok();
    writeln!(output, "Troubleshooting:").ok();
    writeln!(output).ok();
    writeln!(output, "  1. Inspect the hardware: mate-rr show").ok();
    writeln!(output, "  2. Check the stored layout: mate-rr check").ok();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ApplyStep;
    use crate::screen::CrtcId;

    #[test]
    fn test_format_user_error() {
        let error = anyhow::Error::new(RandrError::BackendUnavailable {
            reason: "no display".to_string(),
        });
        let formatted = format_user_error(&error);
        assert!(formatted.contains("ERROR"));
        assert!(formatted.contains("RANDR"));
        assert!(formatted.contains("no display"));
    }

    #[test]
    fn test_context_wrapped_error_is_classified() {
        let error = anyhow::Error::new(RandrError::Apply {
            step: ApplyStep::ConfigureCrtc(CrtcId(63)),
            reason: "bad match".to_string(),
        })
        .context("Failed to apply layout");
        let formatted = format_user_error(&error);
        assert!(formatted.contains("refused to configure CRTC 63"));
    }

    #[test]
    fn test_no_match_formatting() {
        let error = anyhow::Error::new(RandrError::NoMatchingConfig);
        let formatted = format_user_error(&error);
        assert!(formatted.contains("mate-rr save"));
    }
}
