use latlon_amr::coarsen::{CoarsenConfig, InterpolateConfig};
use latlon_amr::coupler::Coupler;
use latlon_amr::forest::{build_forest, morton, GridMode};
use proptest::prelude::*;

fn ingest(x: usize, y: usize) -> Coupler {
    let mut coupler = Coupler::initialize(
        "morton",
        "XYZ",
        [x, y, 1],
        0,
        0,
        2,
        -1e34,
        CoarsenConfig::error_tolerance(0.10),
        InterpolateConfig::default(),
    )
    .unwrap();
    let cells = x * y;
    coupler
        .set_tracer_values("q", &vec![1.0; cells])
        .unwrap();
    coupler
        .set_tracer_values("mass", &vec![1.0; cells])
        .unwrap();
    coupler
}

#[test]
fn data_ids_strictly_increase_after_apply_sfc() {
    for (x, y) in [(4, 4), (5, 3), (8, 8), (1, 1), (7, 2)] {
        let mut coupler = ingest(x, y);
        coupler.apply_sfc().unwrap();
        let ids = coupler.chunk().data_ids();
        assert_eq!(ids.len(), coupler.get_max_num_elements());
        assert!(
            ids.windows(2).all(|w| w[0] < w[1]),
            "ids not strictly increasing for {x}x{y}"
        );
    }
}

#[test]
fn data_ids_stay_sorted_across_coarsen_rounds() {
    let mut coupler = ingest(8, 8);
    coupler.apply_sfc().unwrap();
    let report = coupler.coarsen().unwrap();
    assert_eq!(report.num_elements, 1);
    // Every swap refreshed the ids; the invariant holds at the end too.
    let ids = coupler.chunk().data_ids();
    assert_eq!(ids.len(), 1);
}

#[test]
fn forest_traversal_matches_scaled_morton_order() {
    let (forest, _) = build_forest(5, 3, 0, 0, GridMode::Coarsen).unwrap();
    assert!(forest.is_strictly_z_ordered());
    let (forest, _) = build_forest(5, 3, 0, 0, GridMode::Refine).unwrap();
    assert!(forest.is_strictly_z_ordered());
}

#[test]
fn construction_modes_are_observationally_equivalent() {
    for (x, y) in [(1, 1), (2, 2), (3, 5), (6, 4), (9, 9), (16, 16)] {
        let (refined, _) = build_forest(x, y, 0, 0, GridMode::Refine).unwrap();
        let (coarsened, _) = build_forest(x, y, 0, 0, GridMode::Coarsen).unwrap();
        assert_eq!(
            refined.leaves(),
            coarsened.leaves(),
            "leaf sets differ for {x}x{y}"
        );
    }
}

proptest! {
    #[test]
    fn interleave_roundtrips(x in 0u32..=u16::MAX as u32, y in 0u32..=u16::MAX as u32) {
        prop_assert_eq!(morton::deinterleave(morton::interleave(x, y)), (x, y));
    }
}

#[test]
fn padding_leaves_carry_no_data_after_reorder() {
    let mut coupler = ingest(3, 3);
    coupler.apply_sfc().unwrap();
    let context = *coupler.context();
    let chunk = coupler.chunk();
    for (i, cell) in coupler.forest().leaves().iter().enumerate() {
        let expected = if context.cell_in_rectangle(cell) { 1.0 } else { 0.0 };
        assert_eq!(chunk.value(i, 0, 0), expected);
        assert_eq!(chunk.value(i, 0, 1), expected);
    }
}
