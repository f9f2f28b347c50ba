use std::collections::HashSet;

use crate::geometry::Rect;
use crate::graph::GraphStore;
use crate::{ConnectorRecord, ShapeId, ShapeRecord};

/// A selection of graph records, shapes first then connectors, each in graph
/// order. Borrows from the graph; nothing is cloned.
#[derive(Debug, Clone, Default)]
pub struct Subgraph<'g> {
    pub shapes: Vec<&'g ShapeRecord>,
    pub connectors: Vec<&'g ConnectorRecord>,
}

impl<'g> Subgraph<'g> {
    pub fn whole<G: GraphStore>(graph: &'g G) -> Self {
        Self {
            shapes: graph.list_shapes(),
            connectors: graph.list_connectors(),
        }
    }

    pub fn len(&self) -> usize {
        self.shapes.len() + self.connectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, id: &ShapeId) -> bool {
        self.shapes.iter().any(|s| s.id == *id) || self.connectors.iter().any(|c| c.id == *id)
    }
}

/// Induced subgraph for a page-space region: shapes whose bounds overlap it,
/// plus connectors bound to one of those shapes or whose own bounds overlap
/// it (a path crossing the region with both ends outside still counts).
pub fn extract<'g, G: GraphStore>(graph: &'g G, bounds: &Rect) -> Subgraph<'g> {
    let shapes: Vec<&ShapeRecord> = graph
        .list_shapes()
        .into_iter()
        .filter(|s| s.page_bounds().intersects(bounds))
        .collect();
    let included: HashSet<&ShapeId> = shapes.iter().map(|s| &s.id).collect();

    let connectors: Vec<&ConnectorRecord> = graph
        .list_connectors()
        .into_iter()
        .filter(|c| {
            let touches_included = graph
                .bindings_of_connector(&c.id)
                .iter()
                .any(|(_, b)| included.contains(&b.target_id));
            touches_included
                || graph
                    .page_bounds(&c.id)
                    .is_some_and(|r| r.intersects(bounds))
        })
        .collect();

    tracing::debug!(
        shapes = shapes.len(),
        connectors = connectors.len(),
        "extracted region subgraph"
    );
    Subgraph { shapes, connectors }
}
