//! The graph surface the engine reads and writes, plus an in-memory
//! [`Diagram`] that implements it.
//!
//! The engine never owns the graph: hosts pass whatever store they keep
//! (an editor scene, a file-backed diagram, a test fake) by `&mut`.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::geometry::{Point, Rect};
use crate::{
    Binding, Color, ConnectorRecord, Dash, Fill, Geo, GraphError, RichText, ShapeId, ShapeKind,
    ShapeRecord, Size, Style, Terminal,
};

/// A non-connector shape about to be inserted; the store assigns the id.
#[derive(Debug, Clone, PartialEq)]
pub struct ShapeDraft {
    pub x: f64,
    pub y: f64,
    pub kind: ShapeKind,
    pub text: RichText,
    pub style: Style,
}

/// A connector about to be inserted, initially unbound at both ends.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectorDraft {
    pub start_point: Point,
    pub end_point: Point,
    pub text: RichText,
    pub style: Style,
}

/// What an edit may change on a record, beyond its text and style.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditTarget {
    /// Position, size and geometry.
    Container,
    /// Position only: text labels and notes.
    Shape,
    /// Neither; its ends follow the bindings.
    Connector,
}

/// Partial update: `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ShapePatch {
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub w: Option<f64>,
    pub h: Option<f64>,
    pub geo: Option<Geo>,
    pub text: Option<RichText>,
    pub color: Option<Color>,
    pub fill: Option<Fill>,
    pub dash: Option<Dash>,
    pub size: Option<Size>,
}

impl ShapePatch {
    pub fn is_empty(&self) -> bool {
        *self == ShapePatch::default()
    }

    /// Clear the fields `target` cannot take, returning their wire keys.
    pub fn retain_for(&mut self, target: EditTarget) -> Vec<&'static str> {
        let mut dropped = Vec::new();
        if target == EditTarget::Connector {
            clear(&mut self.x, "x", &mut dropped);
            clear(&mut self.y, "y", &mut dropped);
        }
        if target != EditTarget::Container {
            clear(&mut self.w, "w", &mut dropped);
            clear(&mut self.h, "h", &mut dropped);
            clear(&mut self.geo, "geo", &mut dropped);
        }
        dropped
    }

    fn apply_style(&self, style: &mut Style) {
        if let Some(color) = self.color {
            style.color = color;
        }
        if let Some(fill) = self.fill {
            style.fill = fill;
        }
        if let Some(dash) = self.dash {
            style.dash = dash;
        }
        if let Some(size) = self.size {
            style.size = size;
        }
    }
}

fn clear<T>(slot: &mut Option<T>, key: &'static str, dropped: &mut Vec<&'static str>) {
    if slot.take().is_some() {
        dropped.push(key);
    }
}

pub trait GraphStore {
    /// Non-connector shapes in insertion order.
    fn list_shapes(&self) -> Vec<&ShapeRecord>;

    /// Connectors in insertion order.
    fn list_connectors(&self) -> Vec<&ConnectorRecord>;

    /// Resolved bindings of a connector; empty for unknown ids.
    fn bindings_of_connector(&self, id: &ShapeId) -> Vec<(Terminal, &Binding)>;

    /// Page-space bounding box of a shape or connector.
    fn page_bounds(&self, id: &ShapeId) -> Option<Rect>;

    fn is_connector(&self, id: &ShapeId) -> bool;

    /// Which patch fields the record honors; `None` for unknown ids.
    fn edit_target(&self, id: &ShapeId) -> Option<EditTarget>;

    fn contains(&self, id: &ShapeId) -> bool {
        self.page_bounds(id).is_some()
    }

    fn create_shape(&mut self, draft: ShapeDraft) -> ShapeId;

    fn update_shape(&mut self, id: &ShapeId, patch: &ShapePatch) -> Result<(), GraphError>;

    /// Remove the given records and every connector bound to a removed shape.
    /// Unknown ids are ignored. Returns how many records were removed.
    fn delete_shapes(&mut self, ids: &[ShapeId]) -> usize;

    fn create_connector(&mut self, draft: ConnectorDraft) -> ShapeId;

    fn create_binding(
        &mut self,
        connector: &ShapeId,
        terminal: Terminal,
        binding: Binding,
    ) -> Result<(), GraphError>;
}

/// In-memory diagram, ordered by insertion.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Diagram {
    #[serde(default)]
    pub shapes: Vec<ShapeRecord>,
    #[serde(default)]
    pub connectors: Vec<ConnectorRecord>,
    /// Highest id sequence ever issued. Deletes never lower it.
    #[serde(default)]
    pub next_seq: u64,
}

impl Diagram {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.shapes.len() + self.connectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn shape(&self, id: &ShapeId) -> Option<&ShapeRecord> {
        self.shapes.iter().find(|s| s.id == *id)
    }

    pub fn connector(&self, id: &ShapeId) -> Option<&ConnectorRecord> {
        self.connectors.iter().find(|c| c.id == *id)
    }

    /// Next id of the form "shape:{N}". Files written before the counter
    /// existed start from the largest id on disk.
    fn next_id(&mut self) -> ShapeId {
        let on_disk = self
            .shapes
            .iter()
            .map(|s| &s.id)
            .chain(self.connectors.iter().map(|c| &c.id))
            .filter_map(|id| id.as_str().strip_prefix("shape:")?.parse::<u64>().ok())
            .max()
            .unwrap_or(0);
        self.next_seq = self.next_seq.max(on_disk) + 1;
        ShapeId::new(format!("shape:{}", self.next_seq))
    }

    /// Page position of one end of a connector: the anchor point on its
    /// bound target, else the stored free point.
    pub fn terminal_point(&self, connector: &ConnectorRecord, terminal: Terminal) -> Point {
        let free = match terminal {
            Terminal::Start => connector.start_point,
            Terminal::End => connector.end_point,
        };
        connector
            .binding(terminal)
            .and_then(|b| {
                let target = self.shape(&b.target_id)?;
                Some(target.page_bounds().point_at(b.anchor.x, b.anchor.y))
            })
            .unwrap_or(free)
    }

    fn connector_bounds(&self, connector: &ConnectorRecord) -> Rect {
        Rect::spanning(
            self.terminal_point(connector, Terminal::Start),
            self.terminal_point(connector, Terminal::End),
        )
    }
}

impl GraphStore for Diagram {
    fn list_shapes(&self) -> Vec<&ShapeRecord> {
        self.shapes.iter().collect()
    }

    fn list_connectors(&self) -> Vec<&ConnectorRecord> {
        self.connectors.iter().collect()
    }

    fn bindings_of_connector(&self, id: &ShapeId) -> Vec<(Terminal, &Binding)> {
        let Some(connector) = self.connector(id) else {
            return Vec::new();
        };
        [Terminal::Start, Terminal::End]
            .into_iter()
            .filter_map(|t| connector.binding(t).map(|b| (t, b)))
            .collect()
    }

    fn page_bounds(&self, id: &ShapeId) -> Option<Rect> {
        if let Some(shape) = self.shape(id) {
            return Some(shape.page_bounds());
        }
        self.connector(id).map(|c| self.connector_bounds(c))
    }

    fn is_connector(&self, id: &ShapeId) -> bool {
        self.connector(id).is_some()
    }

    fn edit_target(&self, id: &ShapeId) -> Option<EditTarget> {
        if let Some(shape) = self.shape(id) {
            return Some(match shape.kind {
                ShapeKind::Container { .. } => EditTarget::Container,
                ShapeKind::Text | ShapeKind::Note => EditTarget::Shape,
            });
        }
        self.connector(id).map(|_| EditTarget::Connector)
    }

    fn create_shape(&mut self, draft: ShapeDraft) -> ShapeId {
        let id = self.next_id();
        self.shapes.push(ShapeRecord {
            id: id.clone(),
            x: draft.x,
            y: draft.y,
            kind: draft.kind,
            text: draft.text,
            style: draft.style,
        });
        id
    }

    fn update_shape(&mut self, id: &ShapeId, patch: &ShapePatch) -> Result<(), GraphError> {
        if let Some(shape) = self.shapes.iter_mut().find(|s| s.id == *id) {
            if let Some(x) = patch.x {
                shape.x = x;
            }
            if let Some(y) = patch.y {
                shape.y = y;
            }
            if let ShapeKind::Container { w, h, geo } = &mut shape.kind {
                if let Some(pw) = patch.w {
                    *w = pw;
                }
                if let Some(ph) = patch.h {
                    *h = ph;
                }
                if let Some(pg) = patch.geo {
                    *geo = pg;
                }
            }
            if let Some(text) = &patch.text {
                shape.text = text.clone();
            }
            patch.apply_style(&mut shape.style);
            return Ok(());
        }
        if let Some(connector) = self.connectors.iter_mut().find(|c| c.id == *id) {
            if let Some(text) = &patch.text {
                connector.text = text.clone();
            }
            patch.apply_style(&mut connector.style);
            return Ok(());
        }
        Err(GraphError::NotFound(id.clone()))
    }

    fn delete_shapes(&mut self, ids: &[ShapeId]) -> usize {
        let doomed: HashSet<&ShapeId> = ids.iter().collect();
        let before = self.len();
        self.shapes.retain(|s| !doomed.contains(&s.id));
        self.connectors.retain(|c| {
            !doomed.contains(&c.id)
                && ![&c.start, &c.end]
                    .into_iter()
                    .flatten()
                    .any(|b| doomed.contains(&b.target_id))
        });
        before - self.len()
    }

    fn create_connector(&mut self, draft: ConnectorDraft) -> ShapeId {
        let id = self.next_id();
        self.connectors.push(ConnectorRecord {
            id: id.clone(),
            start_point: draft.start_point,
            end_point: draft.end_point,
            start: None,
            end: None,
            text: draft.text,
            style: draft.style,
        });
        id
    }

    fn create_binding(
        &mut self,
        connector: &ShapeId,
        terminal: Terminal,
        binding: Binding,
    ) -> Result<(), GraphError> {
        if self.shape(&binding.target_id).is_none() {
            return Err(if self.connector(&binding.target_id).is_some() {
                GraphError::NotBindable(binding.target_id)
            } else {
                GraphError::NotFound(binding.target_id)
            });
        }
        let record = self
            .connectors
            .iter_mut()
            .find(|c| c.id == *connector)
            .ok_or_else(|| {
                if self.shapes.iter().any(|s| s.id == *connector) {
                    GraphError::NotAConnector(connector.clone())
                } else {
                    GraphError::NotFound(connector.clone())
                }
            })?;
        match terminal {
            Terminal::Start => record.start = Some(binding),
            Terminal::End => record.end = Some(binding),
        }
        Ok(())
    }
}
