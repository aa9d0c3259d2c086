//! RandR integration tests
//!
//! Drives the whole stack (snapshot, configuration, solver, commit, storage)
//! against the in-memory server.

use mate_rr::assignment::{CrtcAssignment, FailureKind};
use mate_rr::backend::{BackendCall, CrtcConfig, MemoryBackend, MemoryHandle, ResourcesBuilder};
use mate_rr::monitors::{self, matching, Configuration, OutputInfo};
use mate_rr::screen::{CrtcId, ModeId, OutputId, Rotation, Screen, ScreenEvent};
use mate_rr::RandrError;

fn dual_head_screen() -> (Screen, MemoryHandle) {
    let resources = ResourcesBuilder::new(8192, 8192)
        .mode(1, 1920, 1080, 60)
        .mode(2, 1024, 768, 60)
        .crtc(10)
        .crtc(11)
        .output(20, "DP-1", &[1, 2])
        .output(21, "DP-2", &[1, 2])
        .identity("DP-1", "DEL", 0xa0c4, 11)
        .identity("DP-2", "GSM", 0x5b7f, 22)
        .clones("DP-1", "DP-2")
        .lit(10, 1, 0, 0, &[20])
        .lit(11, 1, 1920, 0, &[21])
        .build();
    let backend = MemoryBackend::new(resources);
    let handle = backend.handle();
    let screen = Screen::new(Box::new(backend)).unwrap();
    (screen, handle)
}

fn laptop_screen(serial: u32) -> Screen {
    let resources = ResourcesBuilder::new(4096, 4096)
        .mode(1, 1920, 1080, 60)
        .crtc(10)
        .output(20, "eDP-1", &[1])
        .identity("eDP-1", "DEL", 0x1234, serial)
        .connector_type("eDP-1", "Panel")
        .lit(10, 1, 0, 0, &[20])
        .build();
    Screen::new(Box::new(MemoryBackend::new(resources))).unwrap()
}

#[test]
fn test_side_by_side_layout_read_and_solved() {
    let (screen, _handle) = dual_head_screen();
    let info = screen.info();

    let mut config = Configuration::new_current(&info);
    config.sanitize();

    assert!(!config.is_clone());
    assert!(config.outputs().iter().all(|o| !o.is_primary()));
    assert_eq!(config.output("DP-2").unwrap().geometry(), (1920, 0, 1920, 1080));

    let assignment = CrtcAssignment::solve(&info, &config.outputs_for_assignment()).unwrap();
    assert_eq!(assignment.virtual_size(), (3840, 1080));
}

#[test]
fn test_clone_layout_forced_to_origin() {
    let (screen, handle) = dual_head_screen();

    let mut first = OutputInfo::connected("DP-1", "DEL", 0xa0c4, 11);
    first.set_active(true);
    first.set_geometry(0, 0, 1024, 768);
    first.set_refresh_rate(60);
    let mut second = OutputInfo::connected("DP-2", "GSM", 0x5b7f, 22);
    second.set_active(true);
    second.set_geometry(300, 200, 1024, 768);
    second.set_refresh_rate(60);
    second.set_rotation(Rotation::NORMAL);
    let config = Configuration::new(true, vec![first, second]);

    let assignment = CrtcAssignment::solve(&screen.info(), &config.outputs_for_assignment()).unwrap();
    assert_eq!(assignment.virtual_size(), (1024, 768));
    for setting in assignment.crtcs().values() {
        assert_eq!((setting.x, setting.y), (0, 0));
        assert_eq!(setting.rotation, Rotation::NORMAL);
        assert_eq!(setting.mode, ModeId(2));
    }

    let mut screen = screen;
    config.apply(&mut screen, 0).unwrap();
    assert_eq!(handle.screen_size(), (1024, 768));
}

#[test]
fn test_changed_serial_has_no_stored_layout() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("monitors.xml");

    let original = laptop_screen(0x1);
    let stored = Configuration::new_current(&original.info());
    monitors::save(&stored, &path).unwrap();

    let replaced = laptop_screen(0x2);
    let err = Configuration::new_stored(&replaced.info(), &path).unwrap_err();
    assert!(matches!(err, RandrError::NoMatchingConfig));
    assert!(err.wants_current_fallback());

    let same = laptop_screen(0x1);
    assert!(Configuration::new_stored(&same.info(), &path).is_ok());
}

#[test]
fn test_saved_layout_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("monitors.xml");
    let (screen, _handle) = dual_head_screen();

    let mut current = Configuration::new_current(&screen.info());
    current.outputs_mut()[1].set_rotation(Rotation::new(
        mate_rr::screen::RotationFlag::Rotate180,
        true,
        false,
    ));
    current.output_mut("DP-1").unwrap().set_primary(true);
    monitors::save(&current, &path).unwrap();

    let loaded = monitors::load_all(&path).unwrap();
    assert_eq!(loaded.len(), 1);
    assert!(matching::equals(&loaded[0], &current));
    assert!(matching::equals(&current, &loaded[0]));
    assert!(loaded[0].output("DP-1").unwrap().is_primary());
    assert_eq!(loaded[0].is_clone(), current.is_clone());
}

#[test]
fn test_stored_subset_matches_larger_hardware() {
    let (screen, _handle) = dual_head_screen();
    let current = Configuration::new_current(&screen.info());

    let only_first = Configuration::new(false, vec![current.outputs()[0].clone()]);
    assert!(only_first.matches(&current));
    assert!(!current.matches(&only_first));
}

#[test]
fn test_apply_stored_after_hotplug() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("monitors.xml");
    let (mut screen, handle) = dual_head_screen();
    let events = screen.subscribe();

    // Store DP-2 on the left of DP-1
    let mut layout = Configuration::new_current(&screen.info());
    layout.output_mut("DP-2").unwrap().set_position(0, 0);
    layout.output_mut("DP-1").unwrap().set_position(1920, 0);
    monitors::save(&layout, &path).unwrap();

    handle.hotplug(|_| {});
    let applied = Configuration::apply_stored(&mut screen, &path, 0).unwrap();
    assert!(applied.equals(&layout));

    assert!(matches!(events.try_recv(), Ok(ScreenEvent::Changed(_))));

    screen.refresh().unwrap();
    let now = Configuration::new_current(&screen.info());
    assert_eq!(now.output("DP-2").unwrap().geometry(), (0, 0, 1920, 1080));
    assert_eq!(now.output("DP-1").unwrap().geometry(), (1920, 0, 1920, 1080));
    assert!(!handle.is_grabbed());
}

#[test]
fn test_too_many_outputs_for_crtcs() {
    let resources = ResourcesBuilder::new(8192, 8192)
        .mode(1, 1024, 768, 60)
        .crtc(10)
        .output(20, "DP-1", &[1])
        .output(21, "DP-2", &[1])
        .build();
    let screen = Screen::new(Box::new(MemoryBackend::new(resources))).unwrap();

    let layout: Vec<OutputInfo> = ["DP-1", "DP-2"]
        .iter()
        .enumerate()
        .map(|(i, name)| {
            let mut out = OutputInfo::connected(*name, "???", 0, 0);
            out.set_active(true);
            out.set_geometry(i as i32 * 1024, 0, 1024, 768);
            out.set_refresh_rate(60);
            out
        })
        .collect();
    let config = Configuration::new(false, layout);

    match config.applicable(&screen.info()) {
        Err(RandrError::Assignment(e)) => {
            assert_eq!(e.kind, FailureKind::Unassignable);
            assert!(!e.trail.is_empty());
        }
        other => panic!("expected an assignment failure, got {other:?}"),
    }
}

#[test]
fn test_clone_modes_follow_connected_outputs() {
    let resources = ResourcesBuilder::new(8192, 8192)
        .mode(1, 1920, 1080, 60)
        .mode(2, 1024, 768, 60)
        .mode(3, 1024, 768, 75)
        .crtc(10)
        .crtc(11)
        .output(20, "DP-1", &[1, 2])
        .output(21, "DP-2", &[3])
        .disconnected_output(22, "VGA-1")
        .build();
    let screen = Screen::new(Box::new(MemoryBackend::new(resources))).unwrap();

    let sizes: Vec<(u32, u32)> = screen
        .list_clone_modes()
        .iter()
        .map(|m| (m.width, m.height))
        .collect();
    assert!(sizes.iter().all(|size| *size == (1024, 768)));
    assert!(!sizes.is_empty());
}

#[test]
fn test_commit_order_on_server() {
    let (mut screen, handle) = dual_head_screen();
    handle.clear_calls();

    let mut layout = Configuration::new_current(&screen.info());
    layout.output_mut("DP-2").unwrap().set_active(false);
    layout.output_mut("DP-1").unwrap().set_primary(true);
    layout.apply(&mut screen, 0).unwrap();

    let calls = handle.calls();
    assert_eq!(calls.first(), Some(&BackendCall::Grab));
    assert_eq!(
        calls[1],
        BackendCall::SetCrtcConfig {
            crtc: CrtcId(11),
            timestamp: 0,
            config: CrtcConfig::disabled(),
        }
    );
    assert!(matches!(
        calls[2],
        BackendCall::SetScreenSize {
            width: 1920,
            height: 1080,
            ..
        }
    ));
    assert_eq!(calls[calls.len() - 2], BackendCall::SetPrimary(Some(OutputId(20))));
    assert_eq!(calls.last(), Some(&BackendCall::Ungrab));
}

#[test]
fn test_demo_fixture_loads() {
    let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("demos/laptop-dock.toml");
    let screen = Screen::new(Box::new(MemoryBackend::from_fixture(&path).unwrap())).unwrap();
    let info = screen.info();

    let config = Configuration::new_current(&info);
    assert_eq!(config.output("eDP-1").unwrap().display_name(), "Laptop");
    assert!(config.output("eDP-1").unwrap().is_primary());
    assert_eq!(config.output("DP-1").unwrap().geometry(), (1920, 0, 2560, 1440));
    assert!(!config.output("VGA-1").unwrap().is_connected());
    assert!(config.applicable(&info).is_ok());
}

#[test]
fn test_monitor_without_vendor_finds_its_stored_layout() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("monitors.xml");
    let resources = ResourcesBuilder::new(4096, 4096)
        .mode(1, 1920, 1080, 60)
        .crtc(10)
        .output(20, "DP-1", &[1])
        .identity("DP-1", "", 0x1234, 7)
        .lit(10, 1, 0, 0, &[20])
        .build();
    let screen = Screen::new(Box::new(MemoryBackend::new(resources))).unwrap();

    let current = Configuration::new_current(&screen.info());
    monitors::save(&current, &path).unwrap();

    let loaded = monitors::load_all(&path).unwrap();
    let output = loaded[0].output("DP-1").unwrap();
    assert!(output.is_connected());
    assert_eq!(output.product(), 0x1234);
    assert!(loaded[0].equals(&current));
    assert!(Configuration::new_stored(&screen.info(), &path).is_ok());
}
