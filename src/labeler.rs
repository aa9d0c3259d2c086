//! Output identification labels
//!
//! Gives every output of a [`Configuration`] its own colour and places a
//! label at the top-left corner of each lit output, so users can tell which
//! physical monitor is which. Colours are spread along the hue wheel from red
//! to blue; magenta and purple are left out because they are too close to red
//! once desaturated.
//!
//! Drawing is left to the caller: the labeler only decides what goes where.

use tracing::debug;

use crate::monitors::Configuration;

const HUE_START: f64 = 0.0;
const HUE_END: f64 = 2.0 / 3.0;
const SATURATION: f64 = 1.0 / 3.0;
const VALUE: f64 = 1.0;

/// Text of the single label shown for mirrored outputs
pub const MIRROR_TEXT: &str = "Mirror Screens";

/// An opaque colour with channels in `0.0..=1.0`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rgba {
    /// Red channel
    pub red: f64,
    /// Green channel
    pub green: f64,
    /// Blue channel
    pub blue: f64,
    /// Always 1.0 for label backgrounds
    pub alpha: f64,
}

impl Rgba {
    /// `#rrggbb`
    pub fn to_hex(&self) -> String {
        let channel = |c: f64| (c.clamp(0.0, 1.0) * 255.0).round() as u8;
        format!(
            "#{:02x}{:02x}{:02x}",
            channel(self.red),
            channel(self.green),
            channel(self.blue)
        )
    }
}

impl std::fmt::Display for Rgba {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Convert hue, saturation and value (all in `0.0..=1.0`) to RGB
pub fn hsv_to_rgb(hue: f64, saturation: f64, value: f64) -> (f64, f64, f64) {
    if saturation == 0.0 {
        return (value, value, value);
    }

    let mut h = hue * 6.0;
    if h >= 6.0 {
        h = 0.0;
    }
    let sector = h.floor();
    let f = h - sector;
    let p = value * (1.0 - saturation);
    let q = value * (1.0 - saturation * f);
    let t = value * (1.0 - saturation * (1.0 - f));

    match sector as u8 {
        0 => (value, t, p),
        1 => (q, value, p),
        2 => (p, value, t),
        3 => (p, q, value),
        4 => (t, p, value),
        _ => (value, p, q),
    }
}

/// `count` distinct colours, in output order
pub fn palette(count: usize) -> Vec<Rgba> {
    (0..count)
        .map(|i| {
            let hue = HUE_START + (HUE_END - HUE_START) / count as f64 * i as f64;
            let (red, green, blue) = hsv_to_rgb(hue, SATURATION, VALUE);
            Rgba {
                red,
                green,
                blue,
                alpha: 1.0,
            }
        })
        .collect()
}

/// What to draw on one output
#[derive(Debug, Clone, PartialEq)]
pub struct Label {
    /// Connector the label identifies
    pub output: String,
    /// Text to show
    pub text: String,
    /// Top-left corner in the virtual screen
    pub x: i32,
    /// Top-left corner in the virtual screen
    pub y: i32,
    /// Background colour
    pub color: Rgba,
}

/// Colours and labels for one configuration
#[derive(Debug, Clone)]
pub struct Labeler {
    names: Vec<String>,
    palette: Vec<Rgba>,
    labels: Vec<Label>,
    visible: bool,
}

impl Labeler {
    /// Assign colours to every output of `config` and lay out the labels
    pub fn new(config: &Configuration) -> Self {
        let outputs = config.outputs();
        let palette = palette(outputs.len());

        let mut labels = Vec::new();
        for (output, color) in outputs.iter().zip(&palette) {
            if !output.is_active() {
                continue;
            }

            let (x, y, _, _) = output.geometry();
            let text = if config.is_clone() {
                MIRROR_TEXT.to_string()
            } else {
                output.display_name().to_string()
            };
            labels.push(Label {
                output: output.name().to_string(),
                text,
                x,
                y,
                color: *color,
            });

            // Mirrored outputs all show the same picture.
            if config.is_clone() {
                break;
            }
        }

        debug!("Labeler: {} colours, {} labels", palette.len(), labels.len());

        Self {
            names: outputs.iter().map(|o| o.name().to_string()).collect(),
            palette,
            labels,
            visible: true,
        }
    }

    /// Colour assigned to an output of the configuration
    pub fn color_for_output(&self, name: &str) -> Option<Rgba> {
        self.names
            .iter()
            .position(|n| n == name)
            .and_then(|i| self.palette.get(i).copied())
    }

    /// Labels to draw; empty while hidden
    pub fn labels(&self) -> &[Label] {
        if self.visible {
            &self.labels
        } else {
            &[]
        }
    }

    /// Colours in output order
    pub fn palette(&self) -> &[Rgba] {
        &self.palette
    }

    /// Start drawing the labels
    pub fn show(&mut self) {
        self.visible = true;
    }

    /// Stop drawing the labels
    pub fn hide(&mut self) {
        self.visible = false;
    }

    /// Whether the labels are drawn
    pub fn is_visible(&self) -> bool {
        self.visible
    }
}
