//! Connector creation and endpoint binding.
//!
//! Connectors are always bound as one batch: two connectors between the same
//! pair of shapes (in either direction) would otherwise be drawn on top of
//! each other, and spotting such pairs needs the whole batch.

use std::collections::{BTreeMap, HashMap};

use crate::factory::{style_of, text_of};
use crate::geometry::{Axis, Point};
use crate::graph::{ConnectorDraft, GraphStore};
use crate::handles::{Handle, IdentifierMap};
use crate::mutation::MutationRecord;
use crate::reconcile::ApplyWarning;
use crate::{Binding, GraphError, ShapeId, Terminal};

/// Half-width of the band bundled connectors are spread across, in
/// normalized anchor units.
pub const PAIR_SPREAD: f64 = 0.35;

/// Where a connector attaches relative to the target center.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AnchorPlan {
    /// Lone connector: centered, renderer snaps to the edge.
    Centered,
    /// Member of a bundle: pinned at `(0.5 + dx, 0.5 + dy)`.
    Offset { dx: f64, dy: f64 },
}

impl AnchorPlan {
    pub fn binding(self, target_id: ShapeId) -> Binding {
        match self {
            AnchorPlan::Centered => Binding::centered(target_id),
            AnchorPlan::Offset { dx, dy } => Binding {
                target_id,
                anchor: Point::new(0.5 + dx, 0.5 + dy),
                precise: true,
            },
        }
    }
}

/// Evenly spaced offsets in `[-spread, +spread]` for a bundle of `n`.
pub fn spread_offsets(n: usize, spread: f64) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![0.0],
        _ => (0..n)
            .map(|i| -spread + 2.0 * spread * i as f64 / (n - 1) as f64)
            .collect(),
    }
}

/// Plan anchors for a batch of connector records, index-aligned with the
/// input. Connectors sharing an unordered endpoint pair form a bundle and
/// are spread across the axis orthogonal to the displacement between the
/// two shapes; a connector missing either endpoint is never bundled.
pub fn plan_offsets(
    connectors: &[&MutationRecord],
    positions: &HashMap<Handle, Point>,
) -> Vec<AnchorPlan> {
    let mut groups: BTreeMap<(Handle, Handle), Vec<usize>> = BTreeMap::new();
    for (i, record) in connectors.iter().enumerate() {
        if let (Some(a), Some(b)) = (
            record.endpoint(Terminal::Start),
            record.endpoint(Terminal::End),
        ) {
            groups.entry((a.min(b), a.max(b))).or_default().push(i);
        }
    }

    let mut plans = vec![AnchorPlan::Centered; connectors.len()];
    for ((a, b), members) in groups {
        if members.len() < 2 {
            continue;
        }
        let axis = match (positions.get(&a), positions.get(&b)) {
            (Some(pa), Some(pb)) => Axis::between(*pa, *pb),
            _ => Axis::Horizontal,
        };
        let offsets = spread_offsets(members.len(), PAIR_SPREAD);
        tracing::debug!(from = a, to = b, bundle = members.len(), ?axis, "separating connector bundle");
        for (index, offset) in members.into_iter().zip(offsets) {
            plans[index] = match axis {
                // shapes stacked vertically: spread side by side
                Axis::Vertical => AnchorPlan::Offset { dx: offset, dy: 0.0 },
                Axis::Horizontal => AnchorPlan::Offset { dx: 0.0, dy: offset },
            };
        }
    }
    plans
}

/// Create every connector in `connectors` and bind its ends. Returns the
/// number of connectors created. Unresolvable endpoints leave that end
/// dangling and are reported through `warnings`.
pub fn bind<G: GraphStore>(
    graph: &mut G,
    connectors: &[&MutationRecord],
    map: &mut IdentifierMap,
    positions: &HashMap<Handle, Point>,
    warnings: &mut Vec<ApplyWarning>,
) -> Result<usize, GraphError> {
    let plans = plan_offsets(connectors, positions);
    let mut created = 0;

    for (record, plan) in connectors.iter().zip(plans) {
        let start = resolve_endpoint(graph, record, Terminal::Start, map, warnings);
        let end = resolve_endpoint(graph, record, Terminal::End, map, warnings);

        let start_at = start.as_ref().map(|id| anchor_point(graph, id, plan));
        let end_at = end.as_ref().map(|id| anchor_point(graph, id, plan));
        let (start_point, end_point) = free_points(record, start_at.flatten(), end_at.flatten());

        let id = graph.create_connector(ConnectorDraft {
            start_point,
            end_point,
            text: record.properties.get("text").map(text_of).unwrap_or_default(),
            style: style_of(record),
        });
        if !map.contains(record.handle) {
            map.insert(record.handle, id.clone());
        }

        if let Some(target) = start {
            graph.create_binding(&id, Terminal::Start, plan.binding(target))?;
        }
        if let Some(target) = end {
            graph.create_binding(&id, Terminal::End, plan.binding(target))?;
        }
        created += 1;
    }

    Ok(created)
}

fn resolve_endpoint<G: GraphStore>(
    graph: &G,
    record: &MutationRecord,
    terminal: Terminal,
    map: &IdentifierMap,
    warnings: &mut Vec<ApplyWarning>,
) -> Option<ShapeId> {
    let target = record.endpoint(terminal);
    let resolved = target
        .and_then(|h| map.get(h))
        .filter(|id| graph.contains(id) && !graph.is_connector(id))
        .cloned();
    if resolved.is_none() {
        tracing::warn!(handle = record.handle, %terminal, ?target, "connector end left unbound");
        warnings.push(ApplyWarning::DanglingEndpoint {
            handle: record.handle,
            terminal,
            target,
        });
    }
    resolved
}

fn anchor_point<G: GraphStore>(graph: &G, id: &ShapeId, plan: AnchorPlan) -> Option<Point> {
    let bounds = graph.page_bounds(id)?;
    let anchor = plan.binding(id.clone()).anchor;
    Some(bounds.point_at(anchor.x, anchor.y))
}

/// Stored terminal positions. Bound ends use the anchor point; a dangling
/// end sits a short way off the other end, or at the record position when
/// neither end resolves.
fn free_points(record: &MutationRecord, start: Option<Point>, end: Option<Point>) -> (Point, Point) {
    const STUB: f64 = 150.0;
    match (start, end) {
        (Some(s), Some(e)) => (s, e),
        (Some(s), None) => (s, Point::new(s.x + STUB, s.y)),
        (None, Some(e)) => (Point::new(e.x - STUB, e.y), e),
        (None, None) => {
            let origin = Point::new(record.x.unwrap_or(100.0), record.y.unwrap_or(100.0));
            (origin, Point::new(origin.x + STUB, origin.y))
        }
    }
}
