//! Turns mutation records into shape drafts and patches.
//!
//! Every field has its own fallback, so a record missing or mangling one
//! attribute still produces a visible, well-formed shape.

use crate::graph::{ShapeDraft, ShapePatch};
use crate::mutation::{value_as_f64, MutationRecord, RecordKind};
use crate::{parse_token, Color, Dash, Fill, Geo, RichText, ShapeKind, Size, Style};

pub const DEFAULT_CONTAINER_W: f64 = 200.0;
pub const DEFAULT_CONTAINER_H: f64 = 100.0;

/// Map any geometry name onto the supported vocabulary.
pub fn sanitize_geo(raw: &str) -> Geo {
    if let Some(geo) = parse_token::<Geo>(raw) {
        return geo;
    }
    let geo = match raw.trim().to_ascii_lowercase().as_str() {
        "cylinder" | "database" | "db" | "barrel" | "circle" => Geo::Ellipse,
        "square" | "box" | "rect" => Geo::Rectangle,
        "parallelogram" => Geo::Trapezoid,
        _ => Geo::Rectangle,
    };
    tracing::debug!(requested = raw, coerced = ?geo, "unsupported geo kind");
    geo
}

/// Kind names that only say "a container" and carry no geometry hint.
fn is_generic_container_kind(kind: &str) -> bool {
    matches!(
        kind.trim().to_ascii_lowercase().as_str(),
        "" | "geo" | "container" | "shape"
    )
}

/// Build the draft for an add-phase, non-connector record.
pub fn materialize(record: &MutationRecord) -> ShapeDraft {
    let text = record
        .properties
        .get("text")
        .map(text_of)
        .unwrap_or_default();
    let style = style_of(record);

    let (kind, x, y) = match record.record_kind() {
        RecordKind::Text => (ShapeKind::Text, record.x.unwrap_or(100.0), record.y.unwrap_or(50.0)),
        RecordKind::Note => (ShapeKind::Note, record.x.unwrap_or(100.0), record.y.unwrap_or(100.0)),
        RecordKind::Container | RecordKind::Connector => {
            let geo = match record.str_prop("geo") {
                Some(g) => sanitize_geo(g),
                // a kind like "ellipse" or "database" doubles as the geometry
                None if !is_generic_container_kind(&record.kind) => sanitize_geo(&record.kind),
                None => Geo::Rectangle,
            };
            let kind = ShapeKind::Container {
                w: positive(record.num_prop("w")).unwrap_or(DEFAULT_CONTAINER_W),
                h: positive(record.num_prop("h")).unwrap_or(DEFAULT_CONTAINER_H),
                geo,
            };
            (kind, record.x.unwrap_or(100.0), record.y.unwrap_or(100.0))
        }
    };

    ShapeDraft {
        x,
        y,
        kind,
        text,
        style,
    }
}

fn positive(v: Option<f64>) -> Option<f64> {
    v.filter(|v| *v > 0.0)
}

pub(crate) fn text_of(value: &serde_json::Value) -> RichText {
    match value {
        serde_json::Value::String(s) => RichText::from_plain(s),
        serde_json::Value::Null => RichText::default(),
        other => RichText::from_plain(&other.to_string()),
    }
}

pub(crate) fn style_of(record: &MutationRecord) -> Style {
    Style {
        color: token_prop::<Color>(record, "color").unwrap_or_default(),
        fill: token_prop::<Fill>(record, "fill").unwrap_or_default(),
        dash: token_prop::<Dash>(record, "dash").unwrap_or_default(),
        size: token_prop::<Size>(record, "size").unwrap_or_default(),
    }
}

fn token_prop<T: serde::de::DeserializeOwned>(record: &MutationRecord, key: &str) -> Option<T> {
    let raw = record.str_prop(key)?;
    let parsed = parse_token::<T>(raw);
    if parsed.is_none() {
        tracing::debug!(handle = record.handle, key, value = raw, "unknown style value, using default");
    }
    parsed
}

/// Result of translating an edit record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EditPatch {
    pub patch: ShapePatch,
    /// Property keys that were present but could not be applied.
    pub ignored: Vec<String>,
}

/// Translate an edit record into a partial update. Only keys present in the
/// record are set. `from`/`to` never become properties: connector endpoints
/// are not editable in place.
pub fn patch_from_record(record: &MutationRecord) -> EditPatch {
    let mut out = EditPatch {
        patch: ShapePatch {
            x: record.x,
            y: record.y,
            ..Default::default()
        },
        ignored: Vec::new(),
    };
    let patch = &mut out.patch;

    for (key, value) in &record.properties {
        let applied = match key.as_str() {
            "from" | "to" => false,
            "text" => {
                patch.text = Some(text_of(value));
                true
            }
            "w" => set(&mut patch.w, positive(value_as_f64(value))),
            "h" => set(&mut patch.h, positive(value_as_f64(value))),
            "geo" => set(&mut patch.geo, value.as_str().map(sanitize_geo)),
            "color" => set(&mut patch.color, value.as_str().and_then(parse_token)),
            "fill" => set(&mut patch.fill, value.as_str().and_then(parse_token)),
            "dash" => set(&mut patch.dash, value.as_str().and_then(parse_token)),
            "size" => set(&mut patch.size, value.as_str().and_then(parse_token)),
            _ => false,
        };
        if !applied {
            out.ignored.push(key.clone());
        }
    }
    out
}

fn set<T>(slot: &mut Option<T>, value: Option<T>) -> bool {
    let ok = value.is_some();
    if ok {
        *slot = value;
    }
    ok
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("cylinder", Geo::Ellipse)]
    #[case("database", Geo::Ellipse)]
    #[case("barrel", Geo::Ellipse)]
    #[case("circle", Geo::Ellipse)]
    #[case("square", Geo::Rectangle)]
    #[case("box", Geo::Rectangle)]
    #[case("parallelogram", Geo::Trapezoid)]
    #[case("hexagon", Geo::Hexagon)]
    #[case("x-box", Geo::XBox)]
    #[case("Diamond", Geo::Diamond)]
    #[case("gear", Geo::Rectangle)]
    fn sanitizes_geo(#[case] raw: &str, #[case] expected: Geo) {
        assert_eq!(sanitize_geo(raw), expected);
    }

    #[test]
    fn container_defaults() {
        let draft = materialize(&MutationRecord::new(0, "geo"));
        assert_eq!((draft.x, draft.y), (100.0, 100.0));
        assert_eq!(
            draft.kind,
            ShapeKind::Container {
                w: 200.0,
                h: 100.0,
                geo: Geo::Rectangle
            }
        );
        assert_eq!(draft.style, Style::default());
        assert!(draft.text.is_blank());
    }

    #[rstest]
    #[case("text", ShapeKind::Text, (100.0, 50.0))]
    #[case("note", ShapeKind::Note, (100.0, 100.0))]
    fn per_kind_position_defaults(#[case] kind: &str, #[case] expected: ShapeKind, #[case] at: (f64, f64)) {
        let draft = materialize(&MutationRecord::new(0, kind));
        assert_eq!(draft.kind, expected);
        assert_eq!((draft.x, draft.y), at);
    }

    #[test]
    fn unknown_kind_with_geometry_name() {
        let draft = materialize(&MutationRecord::new(0, "database"));
        assert!(matches!(draft.kind, ShapeKind::Container { geo: Geo::Ellipse, .. }));
        let draft = materialize(&MutationRecord::new(0, "hologram"));
        assert!(matches!(draft.kind, ShapeKind::Container { geo: Geo::Rectangle, .. }));
    }

    #[test]
    fn one_bad_style_field_does_not_affect_others() {
        let record = MutationRecord::new(0, "geo")
            .with_prop("color", "chartreuse")
            .with_prop("fill", "solid")
            .with_prop("dash", "dotted")
            .with_prop("w", 300)
            .with_prop("h", -5)
            .with_prop("text", "Auth");
        let draft = materialize(&record);
        assert_eq!(draft.style.color, Color::Black);
        assert_eq!(draft.style.fill, Fill::Solid);
        assert_eq!(draft.style.dash, Dash::Dotted);
        assert_eq!(draft.style.size, Size::M);
        assert_eq!(draft.text.to_plain(), "Auth");
        assert!(matches!(draft.kind, ShapeKind::Container { w, h, .. } if w == 300.0 && h == 100.0));
    }

    #[test]
    fn patch_only_sets_present_keys() {
        let record = MutationRecord::new(2, "geo")
            .with_prop("color", "red")
            .with_prop("text", "Renamed")
            .with_prop("from", 0)
            .with_prop("rotation", 90);
        let out = patch_from_record(&record);
        assert_eq!(out.patch.color, Some(Color::Red));
        assert_eq!(out.patch.text, Some(RichText::from_plain("Renamed")));
        assert_eq!(out.patch.x, None);
        assert_eq!(out.patch.fill, None);
        let mut ignored = out.ignored.clone();
        ignored.sort();
        assert_eq!(ignored, vec!["from".to_string(), "rotation".to_string()]);
    }
}
