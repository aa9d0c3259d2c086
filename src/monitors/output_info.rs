//! Desired state of one output

use crate::screen::{Output, Rotation};

/// What one named output should show
///
/// Geometry is `-1` throughout while the output is inactive. Setters store
/// whatever they are given; the CRTC solver decides whether the hardware can
/// show it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputInfo {
    name: String,
    display_name: String,
    active: bool,
    connected: bool,
    vendor: String,
    product: u16,
    serial: u32,
    x: i32,
    y: i32,
    width: i32,
    height: i32,
    rate: i32,
    rotation: Rotation,
    primary: bool,
    pref_width: i32,
    pref_height: i32,
}

impl OutputInfo {
    /// A connector with nothing plugged in
    pub fn disconnected(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            display_name: name.clone(),
            name,
            active: false,
            connected: false,
            vendor: String::new(),
            product: 0,
            serial: 0,
            x: -1,
            y: -1,
            width: -1,
            height: -1,
            rate: -1,
            rotation: Rotation::NORMAL,
            primary: false,
            pref_width: 0,
            pref_height: 0,
        }
    }

    /// A connected monitor, initially inactive
    pub fn connected(name: impl Into<String>, vendor: impl Into<String>, product: u16, serial: u32) -> Self {
        Self {
            connected: true,
            vendor: vendor.into(),
            product,
            serial,
            ..Self::disconnected(name)
        }
    }

    /// Take the identity and display name of a live output
    pub(crate) fn from_output(output: &Output) -> Self {
        if !output.connected {
            return Self::disconnected(&output.name);
        }

        let mut info = Self::connected(&output.name, &output.vendor, output.product, output.serial);
        info.display_name = output.display_name();
        info
    }

    /// Connector name, the join key to the hardware
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Human-readable monitor name ("Laptop", "DEL 24\"")
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// Whether a signal should be driven
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Switch the output on or off
    pub fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    /// Whether a monitor is attached
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub(crate) fn set_connected(&mut self, connected: bool) {
        self.connected = connected;
    }

    /// Three-letter vendor code
    pub fn vendor(&self) -> &str {
        &self.vendor
    }

    pub(crate) fn set_vendor(&mut self, vendor: &str) {
        self.vendor = vendor.chars().take(3).collect();
    }

    /// Product code
    pub fn product(&self) -> u16 {
        self.product
    }

    pub(crate) fn set_product(&mut self, product: u16) {
        self.product = product;
    }

    /// Serial number
    pub fn serial(&self) -> u32 {
        self.serial
    }

    pub(crate) fn set_serial(&mut self, serial: u32) {
        self.serial = serial;
    }

    /// Position and size as `(x, y, width, height)`
    pub fn geometry(&self) -> (i32, i32, i32, i32) {
        (self.x, self.y, self.width, self.height)
    }

    /// Set position and size
    pub fn set_geometry(&mut self, x: i32, y: i32, width: i32, height: i32) {
        self.x = x;
        self.y = y;
        self.width = width;
        self.height = height;
    }

    /// Move without resizing
    pub fn set_position(&mut self, x: i32, y: i32) {
        self.x = x;
        self.y = y;
    }

    pub(crate) fn set_width(&mut self, width: i32) {
        self.width = width;
    }

    pub(crate) fn set_height(&mut self, height: i32) {
        self.height = height;
    }

    /// Refresh rate in Hertz
    pub fn refresh_rate(&self) -> i32 {
        self.rate
    }

    /// Set the refresh rate in Hertz
    pub fn set_refresh_rate(&mut self, rate: i32) {
        self.rate = rate;
    }

    /// Rotation and reflection
    pub fn rotation(&self) -> Rotation {
        self.rotation
    }

    /// Set rotation and reflection
    pub fn set_rotation(&mut self, rotation: Rotation) {
        self.rotation = rotation;
    }

    /// Whether this should be the primary output
    pub fn is_primary(&self) -> bool {
        self.primary
    }

    /// Mark or unmark as primary; uniqueness is restored by `sanitize`
    pub fn set_primary(&mut self, primary: bool) {
        self.primary = primary;
    }

    /// Size of the monitor's preferred mode
    pub fn preferred_size(&self) -> (i32, i32) {
        (self.pref_width, self.pref_height)
    }

    pub(crate) fn set_preferred_size(&mut self, width: i32, height: i32) {
        self.pref_width = width;
        self.pref_height = height;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disconnected_sentinels() {
        let info = OutputInfo::disconnected("VGA-1");
        assert_eq!(info.geometry(), (-1, -1, -1, -1));
        assert_eq!(info.refresh_rate(), -1);
        assert_eq!(info.rotation(), Rotation::NORMAL);
        assert!(!info.is_connected());
        assert!(!info.is_active());
        assert_eq!(info.vendor(), "");
    }

    #[test]
    fn test_setters_do_not_validate() {
        let mut info = OutputInfo::connected("DP-1", "DEL", 0x1234, 1);
        info.set_geometry(-500, 7, 0, 0);
        info.set_refresh_rate(1000);
        assert_eq!(info.geometry(), (-500, 7, 0, 0));
        assert_eq!(info.refresh_rate(), 1000);
    }

    #[test]
    fn test_vendor_truncated_to_three_letters() {
        let mut info = OutputInfo::disconnected("DP-1");
        info.set_vendor("SAMSUNG");
        assert_eq!(info.vendor(), "SAM");
    }
}
