//! Property tests for the reconciliation engine.

use std::collections::HashMap;

use proptest::prelude::*;

use napkin_core::binder::{plan_offsets, AnchorPlan, PAIR_SPREAD};
use napkin_core::factory::{materialize, sanitize_geo};
use napkin_core::graph::GraphStore;
use napkin_core::mutation::RecordKind;
use napkin_core::{
    apply, region, Action, ApplyOptions, Context, Diagram, IdentifierMap, MutationRecord, Point, Rect,
};

fn grid_point() -> impl Strategy<Value = (f64, f64)> {
    (0..6i32, 0..6i32).prop_map(|(col, row)| (100.0 + 550.0 * col as f64, 150.0 + 450.0 * row as f64))
}

fn boxes(max: usize) -> impl Strategy<Value = Vec<(f64, f64, f64, f64)>> {
    prop::collection::vec((-500.0..2500.0f64, -500.0..2500.0f64, 10.0..400.0f64, 10.0..300.0f64), 1..max)
}

/// Shapes at the given positions, then connectors between shape handles.
fn build(points: &[(f64, f64)], links: &[(usize, usize)]) -> (Diagram, IdentifierMap) {
    let mut records: Vec<MutationRecord> = points
        .iter()
        .enumerate()
        .map(|(i, (x, y))| MutationRecord::new(i as i64, "geo").at(*x, *y))
        .collect();
    let n = points.len();
    for (j, (a, b)) in links.iter().enumerate() {
        records.push(
            MutationRecord::new((n + j) as i64, "arrow")
                .with_prop("from", (a % n) as i64)
                .with_prop("to", (b % n) as i64),
        );
    }
    let mut diagram = Diagram::new();
    let mut map = IdentifierMap::new();
    apply(&mut diagram, &records, &mut map, &[], ApplyOptions::default()).unwrap();
    (diagram, map)
}

proptest! {
    #[test]
    fn unsupported_kinds_default_alike(a in "[a-z]{3,12}", b in "[a-z]{3,12}") {
        let ra = MutationRecord::new(0, a.as_str());
        let rb = MutationRecord::new(0, b.as_str());
        prop_assume!(ra.record_kind() == RecordKind::Container && rb.record_kind() == RecordKind::Container);
        prop_assume!(sanitize_geo(&a) == sanitize_geo(&b));
        prop_assert_eq!(materialize(&ra).kind, materialize(&rb).kind);
    }

    #[test]
    fn delete_wins_over_edit(
        points in prop::collection::vec(grid_point(), 1..8),
        pick in any::<prop::sample::Index>(),
        edit_first in any::<bool>(),
    ) {
        let (mut diagram, _) = build(&points, &[]);
        let context = Context::for_diagram(&diagram);
        let mut map = context.map.clone();
        let target = pick.index(points.len()) as i64;

        let edit = MutationRecord::new(target, "geo").with_action(Action::Edit).with_prop("text", "edited");
        let delete = MutationRecord::new(target, "geo").with_action(Action::Delete);
        let records = if edit_first { vec![edit, delete] } else { vec![delete, edit] };

        let before = diagram.len();
        let report = apply(&mut diagram, &records, &mut map, &context.existing, ApplyOptions::default()).unwrap();
        prop_assert_eq!(diagram.len(), before - 1);
        prop_assert_eq!(report.edited, 0);
    }

    #[test]
    fn bundle_offsets_are_symmetric(
        directions in prop::collection::vec(any::<bool>(), 2..7),
        a in grid_point(),
        b in grid_point(),
    ) {
        prop_assume!(a != b);
        let records: Vec<MutationRecord> = directions
            .iter()
            .enumerate()
            .map(|(i, forward)| {
                let (from, to) = if *forward { (0, 1) } else { (1, 0) };
                MutationRecord::new(2 + i as i64, "arrow").with_prop("from", from).with_prop("to", to)
            })
            .collect();
        let refs: Vec<&MutationRecord> = records.iter().collect();
        let positions: HashMap<i64, Point> = [(0, Point::new(a.0, a.1)), (1, Point::new(b.0, b.1))].into();

        let offsets: Vec<(f64, f64)> = plan_offsets(&refs, &positions)
            .into_iter()
            .map(|plan| match plan {
                AnchorPlan::Offset { dx, dy } => (dx, dy),
                AnchorPlan::Centered => (f64::NAN, f64::NAN),
            })
            .collect();

        // exactly one axis carries the spread
        let along_x = offsets.iter().any(|(dx, _)| *dx != 0.0);
        let spread: Vec<f64> = offsets.iter().map(|(dx, dy)| if along_x { *dx } else { *dy }).collect();
        let other: Vec<f64> = offsets.iter().map(|(dx, dy)| if along_x { *dy } else { *dx }).collect();
        prop_assert!(other.iter().all(|v| *v == 0.0));

        let n = spread.len();
        prop_assert!((spread[0] + PAIR_SPREAD).abs() < 1e-9);
        prop_assert!((spread[n - 1] - PAIR_SPREAD).abs() < 1e-9);
        let step = 2.0 * PAIR_SPREAD / (n - 1) as f64;
        for i in 0..n {
            prop_assert!((spread[i] + spread[n - 1 - i]).abs() < 1e-9);
            if i > 0 {
                prop_assert!((spread[i] - spread[i - 1] - step).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn region_has_no_false_positives(
        shapes in boxes(12),
        area in (-500.0..2500.0f64, -500.0..2500.0f64, 1.0..1500.0f64, 1.0..1500.0f64),
    ) {
        let records: Vec<MutationRecord> = shapes
            .iter()
            .enumerate()
            .map(|(i, (x, y, w, h))| MutationRecord::new(i as i64, "geo").at(*x, *y).with_prop("w", *w).with_prop("h", *h))
            .collect();
        let mut diagram = Diagram::new();
        apply(&mut diagram, &records, &mut IdentifierMap::new(), &[], ApplyOptions::default()).unwrap();

        let bounds = Rect::new(area.0, area.1, area.2, area.3);
        let sub = region::extract(&diagram, &bounds);
        for shape in &sub.shapes {
            prop_assert!(shape.page_bounds().intersects(&bounds));
        }
        for shape in diagram.list_shapes() {
            prop_assert_eq!(sub.contains(&shape.id), shape.page_bounds().intersects(&bounds));
        }
    }

    #[test]
    fn handles_resolve_to_what_produced_them(
        points in prop::collection::vec(grid_point(), 1..8),
        links in prop::collection::vec((0..8usize, 0..8usize), 0..6),
    ) {
        let (diagram, _) = build(&points, &links);
        let context = Context::for_diagram(&diagram);
        prop_assert_eq!(context.existing.len(), diagram.len());
        for row in &context.existing {
            let id = context.map.get(row.handle).unwrap();
            prop_assert!(diagram.contains(id));
            prop_assert_eq!(context.map.handle_of(id), Some(row.handle));
            prop_assert_eq!(diagram.is_connector(id), row.kind == "arrow");
        }
        // building again yields the same numbering
        let again = Context::for_diagram(&diagram);
        prop_assert_eq!(again.map, context.map);
    }
}
