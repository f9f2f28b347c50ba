use napkin_core::graph::GraphStore;
use napkin_core::{
    apply, Action, ApplyOptions, ApplyReport, Context, Diagram, Geo, IdentifierMap, MutationRecord, Point, Rect,
    ShapeKind,
};

fn run(diagram: &mut Diagram, context: &mut Context, records: &[MutationRecord]) -> ApplyReport {
    let options = ApplyOptions::for_context(context);
    apply(diagram, records, &mut context.map, &context.existing, options).unwrap()
}

fn gateway_auth() -> Vec<MutationRecord> {
    vec![
        MutationRecord::new(0, "Container")
            .at(100.0, 100.0)
            .with_prop("text", "Gateway"),
        MutationRecord::new(1, "Container")
            .at(650.0, 100.0)
            .with_prop("text", "Auth"),
    ]
}

#[test]
fn from_scratch_add() {
    let mut diagram = Diagram::new();
    let mut records = gateway_auth();
    records.push(
        MutationRecord::new(2, "Connector")
            .with_prop("from", 0)
            .with_prop("to", 1)
            .with_prop("text", "auth"),
    );

    let mut map = IdentifierMap::new();
    let report = apply(&mut diagram, &records, &mut map, &[], ApplyOptions::default()).unwrap();

    assert_eq!(report.shapes_created, 2);
    assert_eq!(report.connectors_created, 1);
    assert_eq!(report.change_count(), 3);
    assert!(report.warnings.is_empty());

    let gateway = map.get(0).unwrap();
    let auth = map.get(1).unwrap();
    let connector = &diagram.connectors[0];
    let start = connector.start.as_ref().unwrap();
    let end = connector.end.as_ref().unwrap();
    assert_eq!(&start.target_id, gateway);
    assert_eq!(&end.target_id, auth);
    assert_eq!(start.anchor, Point::new(0.5, 0.5));
    assert_eq!(end.anchor, Point::new(0.5, 0.5));
    assert!(!start.precise && !end.precise);
    assert_eq!(connector.text.to_plain(), "auth");
}

#[test]
fn bidirectional_pair_is_spread_apart() {
    let mut diagram = Diagram::new();
    let mut records = gateway_auth();
    records.push(MutationRecord::new(2, "arrow").with_prop("from", 0).with_prop("to", 1));
    records.push(MutationRecord::new(3, "arrow").with_prop("from", 1).with_prop("to", 0));

    let mut map = IdentifierMap::new();
    apply(&mut diagram, &records, &mut map, &[], ApplyOptions::default()).unwrap();

    let forward = diagram.connector(map.get(2).unwrap()).unwrap();
    let back = diagram.connector(map.get(3).unwrap()).unwrap();
    for connector in [forward, back] {
        let start = connector.start.as_ref().unwrap();
        let end = connector.end.as_ref().unwrap();
        assert!(start.precise && end.precise);
        // side by side horizontally: spread along y, x stays centered
        assert_eq!(start.anchor.x, 0.5);
        assert_eq!(start.anchor, end.anchor);
    }
    let forward_dy = forward.start.as_ref().unwrap().anchor.y - 0.5;
    let back_dy = back.start.as_ref().unwrap().anchor.y - 0.5;
    assert!((forward_dy + 0.35).abs() < 1e-9);
    assert!((back_dy - 0.35).abs() < 1e-9);
}

#[test]
fn connector_to_existing_shapes_uses_context_positions() {
    let mut diagram = Diagram::new();
    let mut seed = IdentifierMap::new();
    let stacked = vec![
        MutationRecord::new(0, "geo").at(100.0, 150.0),
        MutationRecord::new(1, "geo").at(100.0, 600.0),
    ];
    apply(&mut diagram, &stacked, &mut seed, &[], ApplyOptions::default()).unwrap();

    let mut context = Context::for_diagram(&diagram);
    let records = vec![
        MutationRecord::new(2, "arrow").with_prop("from", 0).with_prop("to", 1),
        MutationRecord::new(3, "arrow").with_prop("from", "1").with_prop("to", "0"),
    ];
    let report = run(&mut diagram, &mut context, &records);
    assert_eq!(report.connectors_created, 2);

    let anchors: Vec<Point> = diagram
        .connectors
        .iter()
        .map(|c| c.start.as_ref().unwrap().anchor)
        .collect();
    // stacked vertically: spread along x
    assert!(anchors.iter().all(|a| a.y == 0.5));
    assert!((anchors[0].x - 0.15).abs() < 1e-9);
    assert!((anchors[1].x - 0.85).abs() < 1e-9);
}

#[test]
fn cylinder_becomes_ellipse() {
    let mut diagram = Diagram::new();
    let record = MutationRecord::new(0, "geo").with_prop("geo", "cylinder");
    apply(&mut diagram, &[record], &mut IdentifierMap::new(), &[], ApplyOptions::default()).unwrap();
    assert!(matches!(
        diagram.shapes[0].kind,
        ShapeKind::Container { geo: Geo::Ellipse, .. }
    ));
}

#[test]
fn scoped_delete_leaves_outside_untouched() {
    let mut diagram = Diagram::new();
    let mut seed = IdentifierMap::new();
    let mut records = vec![
        MutationRecord::new(0, "geo").at(100.0, 150.0).with_prop("text", "Inside"),
        MutationRecord::new(1, "geo").at(1200.0, 150.0).with_prop("text", "Outside"),
        MutationRecord::new(2, "geo").at(1200.0, 1050.0).with_prop("text", "Far"),
    ];
    records.push(MutationRecord::new(3, "arrow").with_prop("from", 0).with_prop("to", 1));
    apply(&mut diagram, &records, &mut seed, &[], ApplyOptions::default()).unwrap();

    let outside_ids: Vec<_> = [1, 2].iter().map(|h| seed.get(*h).unwrap().clone()).collect();
    let outside_before: Vec<_> = outside_ids.iter().map(|id| diagram.shape(id).unwrap().clone()).collect();

    let mut context = Context::for_region(&diagram, &Rect::new(0.0, 0.0, 500.0, 400.0));
    assert_eq!(context.existing.len(), 2);
    assert_eq!(context.existing[0].label, "Inside");
    assert_eq!(context.existing[1].kind, "arrow");

    let report = run(
        &mut diagram,
        &mut context,
        &[MutationRecord::new(0, "geo").with_action(Action::Delete)],
    );
    assert!(report.skip_zoom_to_fit);
    assert_eq!(report.deleted, 1);
    assert!(diagram.connectors.is_empty());
    assert_eq!(diagram.shapes.len(), 2);
    for (id, before) in outside_ids.iter().zip(&outside_before) {
        assert_eq!(diagram.shape(id), Some(before));
    }
}

#[test]
fn delete_then_edit_same_handle() {
    let mut diagram = Diagram::new();
    let mut seed = IdentifierMap::new();
    apply(&mut diagram, &gateway_auth(), &mut seed, &[], ApplyOptions::default()).unwrap();

    let mut context = Context::for_diagram(&diagram);
    let before = diagram.len();
    let records = vec![
        MutationRecord::new(1, "geo").with_action(Action::Edit).with_prop("text", "Renamed"),
        MutationRecord::new(1, "geo").with_action(Action::Delete),
    ];
    let report = run(&mut diagram, &mut context, &records);
    assert_eq!(diagram.len(), before - 1);
    assert_eq!(report.edited, 0);
    assert!(diagram.shapes.iter().all(|s| s.text.to_plain() != "Renamed"));
}

#[test]
fn wire_format_from_generator() {
    let raw = r#"[
        {"id": 0, "type": "text", "x": 300, "y": 30, "props": {"text": "My Diagram", "size": "xl"}},
        {"id": 1, "type": "geo", "x": 100, "y": 150, "props": {"w": 300, "h": 130, "geo": "rectangle", "text": "Service A", "color": "blue"}},
        {"id": 2, "type": "geo", "x": "650", "y": 150, "props": {"geo": "database", "text": "Store"}},
        {"id": 3, "type": "arrow", "props": {"from": 1, "to": 2, "text": "reads"}}
    ]"#;
    let records: Vec<MutationRecord> = serde_json::from_str(raw).unwrap();
    let mut diagram = Diagram::new();
    let mut map = IdentifierMap::new();
    let report = apply(&mut diagram, &records, &mut map, &[], ApplyOptions::default()).unwrap();

    assert_eq!(report.change_count(), 4);
    assert!(matches!(diagram.shapes[0].kind, ShapeKind::Text));
    assert!(matches!(
        diagram.shapes[1].kind,
        ShapeKind::Container { w, h, geo: Geo::Rectangle } if w == 300.0 && h == 130.0
    ));
    assert!(matches!(diagram.shapes[2].kind, ShapeKind::Container { geo: Geo::Ellipse, .. }));
    assert_eq!(diagram.shapes[2].x, 650.0);
    assert!(diagram.contains(map.get(3).unwrap()));
}

#[test]
fn replacing_the_newest_shape_gets_a_fresh_id() {
    let mut diagram = Diagram::new();
    let mut seed = IdentifierMap::new();
    apply(&mut diagram, &gateway_auth(), &mut seed, &[], ApplyOptions::default()).unwrap();
    let removed = seed.get(1).unwrap().clone();

    let mut context = Context::for_diagram(&diagram);
    let records = vec![
        MutationRecord::new(1, "geo").with_action(Action::Delete),
        MutationRecord::new(2, "note").at(650.0, 600.0).with_prop("text", "NEW"),
        MutationRecord::new(3, "arrow").with_prop("from", 0).with_prop("to", 1),
    ];
    let report = run(&mut diagram, &mut context, &records);

    let note = context.map.get(2).unwrap();
    assert_ne!(note, &removed);
    assert!(diagram.shape(&removed).is_none());
    // the deleted handle no longer resolves to the new note
    assert_eq!(context.map.handle_of(note), Some(2));
    assert_eq!(context.map.get(1), Some(&removed));
    assert_eq!(report.connectors_created, 1);
    assert!(diagram.connectors[0].end.is_none());
}
