//! Applies a generator's mutation list to a graph.
//!
//! Phases always run delete, then edit, then add, whatever order the records
//! arrive in. Each call is synchronous and runs to completion; there is no
//! rollback, so if an edit or add fails the deletions already made stay
//! applied. Hosts that need all-or-nothing should apply to a copy and commit
//! it on success.

use std::collections::HashSet;
use std::fmt;

use serde::Serialize;

use crate::binder;
use crate::factory;
use crate::geometry::Point;
use crate::graph::GraphStore;
use crate::handles::{self, Context, ExistingShape, Handle, IdentifierMap};
use crate::mutation::{Action, MutationRecord};
use crate::{GraphError, ShapeId, Terminal};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplyOptions {
    /// Ask the host not to re-frame the view afterwards, keeping the rest
    /// of the canvas visually still. Set for region-scoped applies.
    pub skip_zoom_to_fit: bool,
}

impl ApplyOptions {
    /// Options matching how a context was built.
    pub fn for_context(context: &Context) -> Self {
        Self {
            skip_zoom_to_fit: context.scoped,
        }
    }
}

/// A record-level problem that was recovered from.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ApplyWarning {
    /// Delete or edit naming a handle the map does not know.
    UnresolvedHandle { handle: Handle, action: Action },
    /// Edit whose target was removed earlier in the same call.
    TargetGone { handle: Handle },
    /// Add reusing the handle of existing content.
    DuplicateAdd { handle: Handle },
    /// Edit property that was unknown, malformed, or not editable.
    IgnoredProperty { handle: Handle, key: String },
    /// Connector end that could not be bound.
    DanglingEndpoint {
        handle: Handle,
        terminal: Terminal,
        target: Option<Handle>,
    },
}

impl fmt::Display for ApplyWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApplyWarning::UnresolvedHandle { handle, action } => {
                write!(f, "#{}: {:?} target not found", handle, action)
            }
            ApplyWarning::TargetGone { handle } => {
                write!(f, "#{}: edit skipped, deleted in the same batch", handle)
            }
            ApplyWarning::DuplicateAdd { handle } => {
                write!(f, "#{}: already exists, add skipped", handle)
            }
            ApplyWarning::IgnoredProperty { handle, key } => {
                write!(f, "#{}: property '{}' ignored", handle, key)
            }
            ApplyWarning::DanglingEndpoint {
                handle,
                terminal,
                target: Some(target),
            } => write!(f, "#{}: {} not bound, #{} not found", handle, terminal, target),
            ApplyWarning::DanglingEndpoint {
                handle, terminal, ..
            } => write!(f, "#{}: {} not bound, no target given", handle, terminal),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyReport {
    pub shapes_created: usize,
    pub connectors_created: usize,
    pub deleted: usize,
    pub edited: usize,
    pub warnings: Vec<ApplyWarning>,
    pub skip_zoom_to_fit: bool,
}

impl ApplyReport {
    /// User-facing progress count; not used for anything else.
    pub fn change_count(&self) -> usize {
        self.shapes_created + self.connectors_created + self.deleted + self.edited
    }
}

/// Apply `records` to `graph`. `map` resolves handles and gains an entry for
/// each created shape; `existing` supplies positions of content already on
/// the graph for connector orientation.
pub fn apply<G: GraphStore>(
    graph: &mut G,
    records: &[MutationRecord],
    map: &mut IdentifierMap,
    existing: &[ExistingShape],
    options: ApplyOptions,
) -> Result<ApplyReport, GraphError> {
    let mut report = ApplyReport {
        skip_zoom_to_fit: options.skip_zoom_to_fit,
        ..Default::default()
    };

    report.deleted = delete_phase(graph, records, map, &mut report.warnings);
    report.edited = edit_phase(graph, records, map, &mut report.warnings)?;
    let (shapes, connectors) = add_phase(graph, records, map, existing, &mut report.warnings)?;
    report.shapes_created = shapes;
    report.connectors_created = connectors;

    tracing::info!(
        records = records.len(),
        changes = report.change_count(),
        deleted = report.deleted,
        edited = report.edited,
        shapes = report.shapes_created,
        connectors = report.connectors_created,
        warnings = report.warnings.len(),
        "applied mutations"
    );
    Ok(report)
}

fn delete_phase<G: GraphStore>(
    graph: &mut G,
    records: &[MutationRecord],
    map: &IdentifierMap,
    warnings: &mut Vec<ApplyWarning>,
) -> usize {
    let mut doomed: Vec<ShapeId> = Vec::new();
    let mut seen: HashSet<Handle> = HashSet::new();
    for record in records.iter().filter(|r| r.action == Action::Delete) {
        // repeated deletes of one handle are not unresolved references
        if !seen.insert(record.handle) {
            continue;
        }
        match map.get(record.handle) {
            Some(id) => doomed.push(id.clone()),
            None => {
                tracing::warn!(handle = record.handle, "delete target not found");
                warnings.push(ApplyWarning::UnresolvedHandle {
                    handle: record.handle,
                    action: Action::Delete,
                });
            }
        }
    }
    if doomed.is_empty() {
        return 0;
    }
    let present = doomed.iter().filter(|id| graph.contains(id)).count();
    let removed = graph.delete_shapes(&doomed);
    tracing::debug!(requested = doomed.len(), removed, "delete phase");
    present
}

fn edit_phase<G: GraphStore>(
    graph: &mut G,
    records: &[MutationRecord],
    map: &IdentifierMap,
    warnings: &mut Vec<ApplyWarning>,
) -> Result<usize, GraphError> {
    let mut edited = 0;
    for record in records.iter().filter(|r| r.action == Action::Edit) {
        let Some(id) = map.get(record.handle) else {
            tracing::warn!(handle = record.handle, "edit target not found");
            warnings.push(ApplyWarning::UnresolvedHandle {
                handle: record.handle,
                action: Action::Edit,
            });
            continue;
        };
        let Some(target) = graph.edit_target(id) else {
            warnings.push(ApplyWarning::TargetGone {
                handle: record.handle,
            });
            continue;
        };

        let mut out = factory::patch_from_record(record);
        let dropped = out.patch.retain_for(target);
        out.ignored.extend(dropped.into_iter().map(String::from));
        for key in out.ignored {
            tracing::warn!(handle = record.handle, key = key.as_str(), "edit property ignored");
            warnings.push(ApplyWarning::IgnoredProperty {
                handle: record.handle,
                key,
            });
        }
        if out.patch.is_empty() {
            continue;
        }
        graph.update_shape(id, &out.patch)?;
        edited += 1;
    }
    Ok(edited)
}

fn add_phase<G: GraphStore>(
    graph: &mut G,
    records: &[MutationRecord],
    map: &mut IdentifierMap,
    existing: &[ExistingShape],
    warnings: &mut Vec<ApplyWarning>,
) -> Result<(usize, usize), GraphError> {
    let (connectors, shapes): (Vec<&MutationRecord>, Vec<&MutationRecord>) = records
        .iter()
        .filter(|r| r.action == Action::Add)
        .partition(|r| r.is_connector());

    let mut positions = handles::positions(existing);

    let mut created = 0;
    for record in shapes {
        if map.contains(record.handle) {
            tracing::debug!(handle = record.handle, "add collides with existing content, skipped");
            warnings.push(ApplyWarning::DuplicateAdd {
                handle: record.handle,
            });
            continue;
        }
        let draft = factory::materialize(record);
        positions.insert(record.handle, Point::new(draft.x, draft.y));
        let id = graph.create_shape(draft);
        map.insert(record.handle, id);
        created += 1;
    }

    let connectors_created = binder::bind(graph, &connectors, map, &positions, warnings)?;
    Ok((created, connectors_created))
}
