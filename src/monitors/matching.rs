//! Hardware fingerprint and picture comparison
//!
//! Both checks walk the outputs of the *first* configuration only and look
//! each one up by name in the second. An output present only in the second
//! configuration is never examined, so `matches(a, b)` does not imply
//! `matches(b, a)`. Stored configurations are always passed first, against
//! the current hardware.

use super::config::Configuration;
use super::output_info::OutputInfo;

fn find<'a>(config: &'a Configuration, name: &str) -> Option<&'a OutputInfo> {
    config.outputs().iter().find(|o| o.name() == name)
}

fn output_matches(a: &OutputInfo, b: &OutputInfo) -> bool {
    a.name() == b.name()
        && a.vendor() == b.vendor()
        && a.product() == b.product()
        && a.serial() == b.serial()
        && a.is_connected() == b.is_connected()
}

fn output_equals(a: &OutputInfo, b: &OutputInfo) -> bool {
    if !output_matches(a, b) || a.is_active() != b.is_active() {
        return false;
    }

    !a.is_active()
        || (a.geometry() == b.geometry()
            && a.refresh_rate() == b.refresh_rate()
            && a.rotation() == b.rotation())
}

/// Every output of `c1` is attached, with the same monitor, in `c2`
pub fn matches(c1: &Configuration, c2: &Configuration) -> bool {
    c1.outputs()
        .iter()
        .all(|a| find(c2, a.name()).is_some_and(|b| output_matches(a, b)))
}

/// [`matches`], and every active output of `c1` shows the same picture in `c2`
pub fn equals(c1: &Configuration, c2: &Configuration) -> bool {
    c1.outputs()
        .iter()
        .all(|a| find(c2, a.name()).is_some_and(|b| output_equals(a, b)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::screen::RotationFlag;

    fn monitor(name: &str, serial: u32) -> OutputInfo {
        let mut out = OutputInfo::connected(name, "DEL", 0x1234, serial);
        out.set_active(true);
        out.set_geometry(0, 0, 1920, 1080);
        out.set_refresh_rate(60);
        out
    }

    #[test]
    fn test_match_is_asymmetric() {
        let both = Configuration::new(false, vec![monitor("A", 1), monitor("B", 2)]);
        let one = Configuration::new(false, vec![monitor("A", 1)]);

        assert!(matches(&one, &both));
        assert!(!matches(&both, &one));
    }

    #[test]
    fn test_match_checks_identity() {
        let stored = Configuration::new(false, vec![monitor("eDP-1", 1)]);
        let current = Configuration::new(false, vec![monitor("eDP-1", 2)]);
        assert!(!matches(&stored, &current));

        let mut unplugged = monitor("eDP-1", 1);
        unplugged.set_connected(false);
        let current = Configuration::new(false, vec![unplugged]);
        assert!(!matches(&stored, &current));
    }

    #[test]
    fn test_equal_compares_active_geometry() {
        let a = Configuration::new(false, vec![monitor("A", 1)]);
        let mut b = a.clone();
        assert!(equals(&a, &b));

        b.output_mut("A").unwrap().set_rotation(RotationFlag::Rotate180.into());
        assert!(matches(&a, &b));
        assert!(!equals(&a, &b));
    }

    #[test]
    fn test_equal_ignores_geometry_of_inactive() {
        let mut off = monitor("A", 1);
        off.set_active(false);
        let a = Configuration::new(false, vec![off.clone()]);

        off.set_geometry(-1, -1, -1, -1);
        let b = Configuration::new(false, vec![off]);
        assert!(equals(&a, &b));
    }
}
