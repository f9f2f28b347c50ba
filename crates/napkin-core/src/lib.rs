pub mod binder;
pub mod error;
pub mod factory;
pub mod geometry;
pub mod graph;
pub mod handles;
pub mod mutation;
pub mod reconcile;
pub mod region;
pub mod rules;

pub use error::{GraphError, StoreError};
pub use geometry::{Axis, Point, Rect};
pub use graph::{Diagram, GraphStore};
pub use handles::{Context, ExistingShape, Handle, IdentifierMap};
pub use mutation::{Action, MutationRecord};
pub use reconcile::{apply, ApplyOptions, ApplyReport, ApplyWarning};
pub use region::Subgraph;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::PathBuf;

// --- Types ---

/// Stable graph identifier, shared by shapes and connectors. Never reused
/// within a diagram and independent of any generator round-trip.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShapeId(String);

impl ShapeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ShapeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Parse a lowercase wire token ("light-blue", "xl", ...) into one of the
/// vocabulary enums below. Unknown tokens yield `None`.
pub fn parse_token<T: DeserializeOwned>(token: &str) -> Option<T> {
    serde_json::from_value(serde_json::Value::String(token.trim().to_ascii_lowercase())).ok()
}

/// Geometry primitives the renderer understands.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "kebab-case")]
pub enum Geo {
    #[default]
    Rectangle,
    Ellipse,
    Diamond,
    Cloud,
    Hexagon,
    Octagon,
    Star,
    Triangle,
    Oval,
    Pentagon,
    Trapezoid,
    Rhombus,
    Heart,
    XBox,
    CheckBox,
    ArrowLeft,
    ArrowRight,
    ArrowUp,
    ArrowDown,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum Color {
    #[default]
    Black,
    Grey,
    White,
    Blue,
    Green,
    Red,
    Orange,
    Violet,
    Yellow,
    LightBlue,
    LightGreen,
    LightRed,
    LightViolet,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Fill {
    None,
    #[default]
    Semi,
    Solid,
    Pattern,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Dash {
    #[default]
    Draw,
    Solid,
    Dashed,
    Dotted,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Size {
    S,
    #[default]
    M,
    L,
    Xl,
}

impl Size {
    /// Font size in page units.
    pub fn font_size(self) -> f64 {
        match self {
            Size::S => 18.0,
            Size::M => 24.0,
            Size::L => 36.0,
            Size::Xl => 44.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct Style {
    pub color: Color,
    pub fill: Fill,
    pub dash: Dash,
    pub size: Size,
}

/// Rich-text content: one entry per paragraph.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct RichText {
    #[serde(default)]
    pub paragraphs: Vec<String>,
}

impl RichText {
    pub fn from_plain(text: &str) -> Self {
        if text.is_empty() {
            return Self::default();
        }
        Self {
            paragraphs: text.lines().map(str::to_string).collect(),
        }
    }

    pub fn to_plain(&self) -> String {
        self.paragraphs.join("\n")
    }

    pub fn is_blank(&self) -> bool {
        self.paragraphs.iter().all(|p| p.trim().is_empty())
    }
}

pub const NOTE_SIZE: f64 = 200.0;

/// Per-kind geometry of a non-connector shape.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ShapeKind {
    Container { w: f64, h: f64, geo: Geo },
    Text,
    Note,
}

impl ShapeKind {
    /// Name used in the generator vocabulary.
    pub fn wire_name(&self) -> &'static str {
        match self {
            ShapeKind::Container { .. } => "geo",
            ShapeKind::Text => "text",
            ShapeKind::Note => "note",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            ShapeKind::Container { .. } => "Container",
            ShapeKind::Text => "Text",
            ShapeKind::Note => "Note",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ShapeRecord {
    pub id: ShapeId,
    pub x: f64,
    pub y: f64,
    pub kind: ShapeKind,
    #[serde(default)]
    pub text: RichText,
    #[serde(default)]
    pub style: Style,
}

impl ShapeRecord {
    /// Bounding box in page coordinates. Text boxes are estimated from the
    /// font size since nothing here measures glyphs.
    pub fn page_bounds(&self) -> Rect {
        match &self.kind {
            ShapeKind::Container { w, h, .. } => Rect::new(self.x, self.y, *w, *h),
            ShapeKind::Note => Rect::new(self.x, self.y, NOTE_SIZE, NOTE_SIZE),
            ShapeKind::Text => {
                let font = self.style.size.font_size();
                let longest = self
                    .text
                    .paragraphs
                    .iter()
                    .map(|p| p.chars().count())
                    .max()
                    .unwrap_or(0)
                    .max(1);
                let lines = self.text.paragraphs.len().max(1);
                Rect::new(
                    self.x,
                    self.y,
                    longest as f64 * font * 0.6,
                    lines as f64 * font * 1.35,
                )
            }
        }
    }
}

/// Which end of a connector a binding belongs to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Terminal {
    Start,
    End,
}

impl fmt::Display for Terminal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Terminal::Start => "start",
            Terminal::End => "end",
        })
    }
}

/// Position normalized to a shape's bounding box; `(0.5, 0.5)` is the center.
pub type Anchor = Point;

/// Association from a connector end to a target shape.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Binding {
    pub target_id: ShapeId,
    pub anchor: Anchor,
    pub precise: bool,
}

impl Binding {
    /// Center anchor, leaving edge snapping to the renderer.
    pub fn centered(target_id: ShapeId) -> Self {
        Self {
            target_id,
            anchor: Point::new(0.5, 0.5),
            precise: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConnectorRecord {
    pub id: ShapeId,
    /// Page position of the start terminal, used while that end is unbound.
    pub start_point: Point,
    /// Page position of the end terminal, used while that end is unbound.
    pub end_point: Point,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<Binding>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<Binding>,
    #[serde(default)]
    pub text: RichText,
    #[serde(default)]
    pub style: Style,
}

impl ConnectorRecord {
    pub fn binding(&self, terminal: Terminal) -> Option<&Binding> {
        match terminal {
            Terminal::Start => self.start.as_ref(),
            Terminal::End => self.end.as_ref(),
        }
    }
}

// --- Storage ---

/// Resolve the napkin data directory: `$NAPKIN_HOME`, else `~/.napkin/`.
pub fn napkin_dir() -> PathBuf {
    if let Some(home) = std::env::var_os("NAPKIN_HOME") {
        return PathBuf::from(home);
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".napkin")
}

fn diagram_path(name: &str) -> PathBuf {
    napkin_dir().join(format!("{}.napkin", name))
}

/// List all diagram names (without .napkin extension), sorted.
pub fn list_diagrams() -> Result<Vec<String>, StoreError> {
    let dir = napkin_dir();
    if !dir.exists() {
        return Ok(vec![]);
    }
    let mut names: Vec<String> = fs::read_dir(&dir)?
        .filter_map(|entry| {
            let entry = entry.ok()?;
            let name = entry.file_name().to_string_lossy().to_string();
            name.strip_suffix(".napkin").map(|n| n.to_string())
        })
        .collect();
    names.sort();
    Ok(names)
}

/// Read a diagram. A name that was never written reads as an empty diagram.
pub fn read_diagram(name: &str) -> Result<Diagram, StoreError> {
    let path = diagram_path(name);
    if !path.exists() {
        return Ok(Diagram::default());
    }
    let raw = fs::read_to_string(&path)?;
    Ok(serde_json::from_str(&raw)?)
}

/// Write a diagram snapshot. Temp file + rename, so readers never observe a
/// half-written file.
pub fn write_diagram(name: &str, diagram: &Diagram) -> Result<(), StoreError> {
    let dir = napkin_dir();
    fs::create_dir_all(&dir)?;
    let json = serde_json::to_string_pretty(diagram)?;
    let tmp = dir.join(format!(".{}.napkin.tmp", name));
    fs::write(&tmp, json)?;
    fs::rename(&tmp, diagram_path(name))?;
    Ok(())
}

pub fn delete_diagram(name: &str) -> Result<(), StoreError> {
    let path = diagram_path(name);
    if path.exists() {
        fs::remove_file(&path)?;
    }
    Ok(())
}

// --- AI Settings ---

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct AiSettings {
    pub provider: String,
    pub api_key: String,
    pub model: String,
    /// Upper bound on one generator round-trip. Defaults to 60s when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

fn settings_path() -> PathBuf {
    napkin_dir().join("settings.json")
}

pub fn read_settings() -> AiSettings {
    let path = settings_path();
    if !path.exists() {
        return AiSettings::default();
    }
    fs::read_to_string(&path)
        .ok()
        .and_then(|s| serde_json::from_str(&s).ok())
        .unwrap_or_default()
}

pub fn write_settings(settings: &AiSettings) -> Result<(), StoreError> {
    fs::create_dir_all(napkin_dir())?;
    let json = serde_json::to_string_pretty(settings)?;
    fs::write(settings_path(), json)?;
    Ok(())
}

pub fn ai_configured(settings: &AiSettings) -> bool {
    !settings.provider.is_empty()
        && !settings.model.is_empty()
        && (settings.provider == "ollama" || !settings.api_key.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("light-blue", Some(Color::LightBlue))]
    #[case("Violet", Some(Color::Violet))]
    #[case(" red ", Some(Color::Red))]
    #[case("magenta", None)]
    fn parses_color_tokens(#[case] token: &str, #[case] expected: Option<Color>) {
        assert_eq!(parse_token::<Color>(token), expected);
    }

    #[test]
    fn style_fields_default_independently() {
        let style: Style = serde_json::from_str(r#"{"color":"blue"}"#).unwrap();
        assert_eq!(style.color, Color::Blue);
        assert_eq!(style.fill, Fill::Semi);
        assert_eq!(style.dash, Dash::Draw);
        assert_eq!(style.size, Size::M);
    }

    #[test]
    fn rich_text_round_trips_lines() {
        let text = RichText::from_plain("API Server\n(Rust)");
        assert_eq!(text.paragraphs, vec!["API Server", "(Rust)"]);
        assert_eq!(text.to_plain(), "API Server\n(Rust)");
        assert!(RichText::from_plain("").is_blank());
    }

    #[test]
    fn text_bounds_grow_with_content() {
        let short = ShapeRecord {
            id: ShapeId::new("shape:1"),
            x: 0.0,
            y: 0.0,
            kind: ShapeKind::Text,
            text: RichText::from_plain("Hi"),
            style: Style::default(),
        };
        let mut long = short.clone();
        long.text = RichText::from_plain("A much longer title");
        assert!(long.page_bounds().w > short.page_bounds().w);
        assert!(short.page_bounds().h > 0.0);
    }

    #[rstest]
    #[case("ollama", "", "llama3", true)]
    #[case("openai", "", "gpt-4o", false)]
    #[case("openai", "sk-1", "gpt-4o", true)]
    #[case("", "sk-1", "gpt-4o", false)]
    fn ai_configured_requires_key_except_ollama(
        #[case] provider: &str,
        #[case] api_key: &str,
        #[case] model: &str,
        #[case] expected: bool,
    ) {
        let settings = AiSettings {
            provider: provider.to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            timeout_secs: None,
        };
        assert_eq!(ai_configured(&settings), expected);
    }
}
