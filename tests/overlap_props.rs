use std::collections::BTreeMap;

use graphx_layout::CancellationToken;
use graphx_layout::geometry::{Point, Rect};
use graphx_layout::overlap::{OneWayFsaParams, OverlapRemovalParams, OverlapRemover, SweepAxis};
use graphx_layout::routing::compatibility;
use proptest::prelude::*;

fn rect_strategy() -> impl Strategy<Value = Rect> {
    (-100.0..100.0f64, -100.0..100.0f64, 1.0..40.0f64, 1.0..40.0f64)
        .prop_map(|(x, y, w, h)| Rect::new(x, y, w, h))
}

fn rect_map(rects: Vec<Rect>) -> BTreeMap<usize, Rect> {
    rects.into_iter().enumerate().collect()
}

fn assert_separated(rects: &BTreeMap<usize, Rect>, h_gap: f64, v_gap: f64) {
    let grown: Vec<Rect> = rects
        .values()
        .map(|r| r.inflate(h_gap / 2.0 - 1e-6, v_gap / 2.0 - 1e-6))
        .collect();
    for (i, a) in grown.iter().enumerate() {
        for b in &grown[i + 1..] {
            assert!(!a.intersects_with(b), "{a:?} overlaps {b:?}");
        }
    }
}

fn segment() -> impl Strategy<Value = (Point, Point)> {
    (
        -500.0..500.0f64,
        -500.0..500.0f64,
        -500.0..500.0f64,
        -500.0..500.0f64,
    )
        .prop_map(|(x0, y0, x1, y1)| (Point::new(x0, y0), Point::new(x1, y1)))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn two_way_fsa_leaves_no_overlap(
        rects in prop::collection::vec(rect_strategy(), 1..30),
        h_gap in 0.5..10.0f64,
        v_gap in 0.5..10.0f64,
    ) {
        let input = rect_map(rects);
        let remover = OverlapRemover::Fsa(OverlapRemovalParams {
            horizontal_gap: h_gap,
            vertical_gap: v_gap,
            ..OverlapRemovalParams::default()
        });
        let out = remover.compute(&input, &CancellationToken::new()).unwrap();
        prop_assert_eq!(out.rects.len(), input.len());
        for (key, rect) in &out.rects {
            prop_assert!((rect.width - input[key].width).abs() < 1e-9);
            prop_assert!((rect.height - input[key].height).abs() < 1e-9);
        }
        assert_separated(&out.rects, h_gap, v_gap);
    }

    #[test]
    fn second_run_is_a_no_op(rects in prop::collection::vec(rect_strategy(), 2..20)) {
        let remover = OverlapRemover::Fsa(OverlapRemovalParams::default());
        let first = remover.compute(&rect_map(rects), &CancellationToken::new()).unwrap();
        let second = remover.compute(&first.rects, &CancellationToken::new()).unwrap();
        prop_assert_eq!(second.passes, 0);
        prop_assert!(second.cost < 1e-9, "cost = {}", second.cost);
    }

    #[test]
    fn one_way_fsa_moves_along_its_axis_only(
        rects in prop::collection::vec(rect_strategy(), 1..20),
        vertical in any::<bool>(),
    ) {
        let axis = if vertical { SweepAxis::Vertical } else { SweepAxis::Horizontal };
        let input = rect_map(rects);
        let remover = OverlapRemover::OneWayFsa(OneWayFsaParams {
            axis,
            ..OneWayFsaParams::default()
        });
        let out = remover.compute(&input, &CancellationToken::new()).unwrap();
        for (key, rect) in &out.rects {
            let before = input[key];
            match axis {
                SweepAxis::Horizontal => prop_assert!((rect.y - before.y).abs() < 1e-2),
                SweepAxis::Vertical => prop_assert!((rect.x - before.x).abs() < 1e-2),
            }
        }
        let defaults = OneWayFsaParams::default();
        assert_separated(&out.rects, defaults.horizontal_gap, defaults.vertical_gap);
    }

    #[test]
    fn compatibility_is_symmetric_and_bounded(a in segment(), b in segment()) {
        let ab = compatibility(a, b);
        let ba = compatibility(b, a);
        prop_assert!((ab - ba).abs() < 1e-12, "{} vs {}", ab, ba);
        prop_assert!((0.0..=1.0 + 1e-9).contains(&ab));
    }

    #[test]
    fn an_edge_is_fully_compatible_with_itself(a in segment()) {
        prop_assume!(a.0.distance(a.1) > 1e-3);
        prop_assert!((compatibility(a, a) - 1.0).abs() < 1e-9);
    }
}
