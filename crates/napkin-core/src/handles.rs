//! Translation between generator handles and stable graph ids.
//!
//! Handles are small integers handed to the generator for one round-trip.
//! A [`Context`] is built right before the generator is called and consumed
//! by the apply that follows; it is never kept past that.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::geometry::{Point, Rect};
use crate::graph::GraphStore;
use crate::region::{self, Subgraph};
use crate::{ShapeId, Terminal};

pub type Handle = i64;

/// Bidirectional handle <-> stable id mapping.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IdentifierMap {
    by_handle: HashMap<Handle, ShapeId>,
    by_id: HashMap<ShapeId, Handle>,
}

impl IdentifierMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, handle: Handle) -> Option<&ShapeId> {
        self.by_handle.get(&handle)
    }

    pub fn handle_of(&self, id: &ShapeId) -> Option<Handle> {
        self.by_id.get(id).copied()
    }

    pub fn contains(&self, handle: Handle) -> bool {
        self.by_handle.contains_key(&handle)
    }

    pub fn insert(&mut self, handle: Handle, id: ShapeId) {
        if let Some(old) = self.by_handle.insert(handle, id.clone()) {
            self.by_id.remove(&old);
        }
        if let Some(old_handle) = self.by_id.insert(id, handle) {
            if old_handle != handle {
                self.by_handle.remove(&old_handle);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.by_handle.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_handle.is_empty()
    }

    /// First handle above every mapped one; 0 for an empty map.
    pub fn next_handle(&self) -> Handle {
        self.by_handle.keys().max().map_or(0, |h| h + 1)
    }
}

/// One row of the "current contents" list handed to the generator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExistingShape {
    pub handle: Handle,
    pub kind: String,
    pub label: String,
    pub x: i64,
    pub y: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_handle: Option<Handle>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to_handle: Option<Handle>,
}

/// Everything one reconciliation call needs to know about existing content.
#[derive(Debug, Clone, Default)]
pub struct Context {
    pub map: IdentifierMap,
    pub existing: Vec<ExistingShape>,
    /// Built from a region rather than the whole diagram.
    pub scoped: bool,
}

impl Context {
    /// Empty context for a from-scratch apply.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn for_diagram<G: GraphStore>(graph: &G) -> Self {
        Self::build(graph, &Subgraph::whole(graph))
    }

    pub fn for_region<G: GraphStore>(graph: &G, bounds: &Rect) -> Self {
        let mut context = Self::build(graph, &region::extract(graph, bounds));
        context.scoped = true;
        context
    }

    /// Number shapes `0..k-1` in selection order, then connectors from `k`
    /// on. Shapes go first so every connector endpoint inside the selection
    /// already has a handle when its connector is numbered.
    pub fn build<G: GraphStore>(graph: &G, selection: &Subgraph<'_>) -> Self {
        let mut map = IdentifierMap::new();
        let mut existing = Vec::with_capacity(selection.len());
        let mut next: Handle = 0;

        for shape in &selection.shapes {
            map.insert(next, shape.id.clone());
            existing.push(ExistingShape {
                handle: next,
                kind: shape.kind.wire_name().to_string(),
                label: label_or_placeholder(&shape.text.to_plain(), shape.kind.display_name()),
                x: shape.x.round() as i64,
                y: shape.y.round() as i64,
                from_handle: None,
                to_handle: None,
            });
            next += 1;
        }

        for connector in &selection.connectors {
            let mut from_handle = None;
            let mut to_handle = None;
            for (terminal, binding) in graph.bindings_of_connector(&connector.id) {
                let handle = map.handle_of(&binding.target_id);
                match terminal {
                    Terminal::Start => from_handle = handle,
                    Terminal::End => to_handle = handle,
                }
            }
            let origin = graph.page_bounds(&connector.id).unwrap_or_default();
            map.insert(next, connector.id.clone());
            existing.push(ExistingShape {
                handle: next,
                kind: "arrow".to_string(),
                label: label_or_placeholder(&connector.text.to_plain(), "Connector"),
                x: origin.x.round() as i64,
                y: origin.y.round() as i64,
                from_handle,
                to_handle,
            });
            next += 1;
        }

        Self {
            map,
            existing,
            scoped: false,
        }
    }

    pub fn next_handle(&self) -> Handle {
        self.map.next_handle()
    }
}

/// Positions of existing content keyed by handle.
pub fn positions(existing: &[ExistingShape]) -> HashMap<Handle, Point> {
    existing
        .iter()
        .map(|e| (e.handle, Point::new(e.x as f64, e.y as f64)))
        .collect()
}

fn label_or_placeholder(text: &str, kind: &str) -> String {
    let text = text.trim();
    if text.is_empty() {
        format!("(unlabeled {})", kind)
    } else {
        text.to_string()
    }
}
