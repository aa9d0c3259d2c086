//! Property tests for layout normalisation and matching

use proptest::prelude::*;

use mate_rr::monitors::{matching, Configuration, OutputInfo};

fn arb_output(index: usize) -> impl Strategy<Value = OutputInfo> {
    (
        any::<bool>(),
        any::<bool>(),
        -4000i32..4000,
        -4000i32..4000,
        prop::sample::select(vec![(1024, 768), (1920, 1080), (2560, 1440)]),
        0u32..4,
    )
        .prop_map(move |(active, primary, x, y, (width, height), serial)| {
            let mut out = OutputInfo::connected(format!("DP-{index}"), "DEL", 0x4321, serial);
            out.set_active(active);
            out.set_geometry(x, y, width, height);
            out.set_refresh_rate(60);
            out.set_primary(primary);
            out
        })
}

fn arb_configuration() -> impl Strategy<Value = Configuration> {
    (1usize..5)
        .prop_flat_map(|count| (0..count).map(arb_output).collect::<Vec<_>>())
        .prop_map(|outputs| Configuration::new(false, outputs))
}

proptest! {
    #[test]
    fn sanitize_is_idempotent(config in arb_configuration()) {
        let mut once = config.clone();
        once.sanitize();
        let mut twice = once.clone();
        twice.sanitize();
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn sanitize_moves_layout_to_origin(config in arb_configuration()) {
        let mut config = config;
        config.sanitize();

        let active: Vec<_> = config.outputs().iter().filter(|o| o.is_active()).collect();
        if !active.is_empty() {
            let min_x = active.iter().map(|o| o.geometry().0).min();
            let min_y = active.iter().map(|o| o.geometry().1).min();
            prop_assert_eq!(min_x, Some(0));
            prop_assert_eq!(min_y, Some(0));
        }
        prop_assert!(config.outputs().iter().filter(|o| o.is_primary()).count() <= 1);
    }

    #[test]
    fn sanitize_keeps_identity(config in arb_configuration()) {
        let mut sanitized = config.clone();
        sanitized.sanitize();
        prop_assert!(matching::matches(&config, &sanitized));
        prop_assert!(matching::matches(&sanitized, &config));
    }

    #[test]
    fn every_layout_matches_itself(config in arb_configuration()) {
        prop_assert!(matching::matches(&config, &config));
        prop_assert!(matching::equals(&config, &config));
    }

    #[test]
    fn subset_matches_only_one_way(config in arb_configuration()) {
        prop_assume!(config.outputs().len() > 1);
        let subset = Configuration::new(false, config.outputs()[..1].to_vec());

        prop_assert!(matching::matches(&subset, &config));
        prop_assert!(!matching::matches(&config, &subset));
    }
}
