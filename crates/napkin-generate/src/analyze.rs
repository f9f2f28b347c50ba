//! Image analysis: the model reads a canvas snapshot and reports on it
//! instead of drawing. Optimize recommendations carry a prompt that can be
//! fed straight back into [`crate::generate`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use napkin_core::AiSettings;

use crate::parse::{extract_json_object, strip_fences};
use crate::{engine, EnvelopeError, GenerateError, GenerateMode, GenerateRequest};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalyzeMode {
    /// Locate and name the elements in the image.
    Label,
    /// Redraw the sketch as Mermaid code.
    Cleanup,
    /// Prioritized improvement ideas.
    Suggest,
    /// Markdown walkthrough of what is shown.
    Explain,
    /// Architecture review with actionable diagram prompts.
    Optimize,
}

impl AnalyzeMode {
    pub const ALL: [AnalyzeMode; 5] = [
        AnalyzeMode::Label,
        AnalyzeMode::Cleanup,
        AnalyzeMode::Suggest,
        AnalyzeMode::Explain,
        AnalyzeMode::Optimize,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            AnalyzeMode::Label => "label",
            AnalyzeMode::Cleanup => "cleanup",
            AnalyzeMode::Suggest => "suggest",
            AnalyzeMode::Explain => "explain",
            AnalyzeMode::Optimize => "optimize",
        }
    }

    /// System instructions for this mode.
    pub fn instructions(self) -> &'static str {
        match self {
            AnalyzeMode::Label => LABEL,
            AnalyzeMode::Cleanup => CLEANUP,
            AnalyzeMode::Suggest => SUGGEST,
            AnalyzeMode::Explain => EXPLAIN,
            AnalyzeMode::Optimize => OPTIMIZE,
        }
    }
}

impl fmt::Display for AnalyzeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown analysis mode '{0}': expected label, cleanup, suggest, explain or optimize")]
pub struct UnknownMode(pub String);

impl FromStr for AnalyzeMode {
    type Err = UnknownMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|m| m.as_str() == wanted)
            .ok_or_else(|| UnknownMode(s.to_string()))
    }
}

// --- Results ---

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum Priority {
    High,
    #[default]
    Medium,
    Low,
}

impl From<String> for Priority {
    fn from(raw: String) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "high" => Priority::High,
            "low" => Priority::Low,
            _ => Priority::Medium,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum Category {
    Performance,
    Security,
    Structure,
    Scalability,
    #[default]
    Other,
}

impl From<String> for Category {
    fn from(raw: String) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "performance" => Category::Performance,
            "security" => Category::Security,
            "structure" => Category::Structure,
            "scalability" => Category::Scalability,
            _ => Category::Other,
        }
    }
}

/// One element found in the image; positions are fractions of its size.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ElementLabel {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub description: String,
    pub x_percent: f64,
    pub y_percent: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Suggestion {
    pub title: String,
    pub description: String,
    pub priority: Priority,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Suggestions {
    pub suggestions: Vec<Suggestion>,
    pub overall_assessment: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Recommendation {
    pub title: String,
    pub description: String,
    pub priority: Priority,
    pub category: Category,
    /// Instruction for the diagram generator that applies this change.
    pub diagram_prompt: String,
}

impl Recommendation {
    /// A prompt-mode generation request that applies this recommendation,
    /// seeing the same canvas snapshot that was analyzed.
    pub fn to_request(&self, image_base64: Option<String>) -> GenerateRequest {
        GenerateRequest {
            mode: GenerateMode::Prompt,
            prompt: self.diagram_prompt.clone(),
            image_base64,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Optimization {
    pub summary: String,
    pub recommendations: Vec<Recommendation>,
}

#[derive(Debug, Deserialize)]
struct LabelEnvelope {
    #[serde(default)]
    labels: Vec<ElementLabel>,
}

/// A parsed analysis, serialized as `{"mode": ..., "result": ...}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "mode", content = "result", rename_all = "lowercase")]
pub enum Analysis {
    Label(Vec<ElementLabel>),
    /// Mermaid source.
    Cleanup(String),
    Suggest(Suggestions),
    /// Markdown.
    Explain(String),
    Optimize(Optimization),
}

impl Analysis {
    pub fn mode(&self) -> AnalyzeMode {
        match self {
            Analysis::Label(_) => AnalyzeMode::Label,
            Analysis::Cleanup(_) => AnalyzeMode::Cleanup,
            Analysis::Suggest(_) => AnalyzeMode::Suggest,
            Analysis::Explain(_) => AnalyzeMode::Explain,
            Analysis::Optimize(_) => AnalyzeMode::Optimize,
        }
    }
}

/// Read a raw model reply for `mode`. JSON modes accept fenced output or
/// surrounding prose; text modes keep the reply as is, minus fences.
pub fn parse_analysis(mode: AnalyzeMode, raw: &str) -> Result<Analysis, EnvelopeError> {
    let text = strip_fences(raw);
    if text.is_empty() {
        return Err(EnvelopeError::Empty);
    }
    let analysis = match mode {
        AnalyzeMode::Cleanup => Analysis::Cleanup(text.to_string()),
        AnalyzeMode::Explain => Analysis::Explain(raw.trim().to_string()),
        AnalyzeMode::Label => Analysis::Label(json_body::<LabelEnvelope>(text)?.labels),
        AnalyzeMode::Suggest => Analysis::Suggest(json_body(text)?),
        AnalyzeMode::Optimize => Analysis::Optimize(json_body(text)?),
    };
    Ok(analysis)
}

fn json_body<T: serde::de::DeserializeOwned>(text: &str) -> Result<T, EnvelopeError> {
    let body = extract_json_object(text).ok_or_else(|| EnvelopeError::Unreadable("no JSON object".into()))?;
    serde_json::from_str(body).map_err(|e| EnvelopeError::Unreadable(e.to_string()))
}

/// Analyze a canvas snapshot (base64 PNG) in the given mode.
pub async fn analyze(
    settings: &AiSettings,
    mode: AnalyzeMode,
    image_base64: &str,
) -> Result<Analysis, GenerateError> {
    if !napkin_core::ai_configured(settings) {
        return Err(GenerateError::NotConfigured);
    }
    let image = engine::decode_image(image_base64)?;

    tracing::info!(provider = %settings.provider, model = %settings.model, %mode, "calling analyzer");
    let raw = crate::with_timeout(
        settings,
        engine::complete(settings, mode.instructions(), ANALYZE_REQUEST, Some(image)),
    )
    .await?;

    tracing::debug!(raw = %raw, "analyzer output");
    Ok(parse_analysis(mode, &raw)?)
}

const ANALYZE_REQUEST: &str = "Analyze the attached canvas image.";

const LABEL: &str = r#"You are looking at a whiteboard canvas. Find every distinct element in the image: shapes, text blocks, drawings, icons, arrows, groups.

For each one report:
- name: a short descriptive name
- type: its category, such as "shape", "text", "diagram", "icon", "arrow" or "group"
- description: one sentence on what it represents
- x_percent, y_percent: its position as fractions 0-1 of the image width and height, measured from the top-left corner

Reply with JSON only, no markdown fences:
{"labels": [{"name": "...", "type": "...", "description": "...", "x_percent": 0.5, "y_percent": 0.3}]}"#;

const CLEANUP: &str = r#"You are looking at a hand-drawn diagram, flowchart or sketch. Redraw it as clean Mermaid.js code.

Work out the relationships, flows and structure the drawing shows and pick the Mermaid diagram type that fits best (flowchart, sequence, class, state, er, ...).

Mermaid syntax rules:
- Flowchart node labels containing parentheses, angle brackets, braces, pipes, '#', '&' or line breaks must be double-quoted inside the shape brackets: A["Frontend Canvas<br/>(React)"], never A[Frontend Canvas<br>(React)].
- Write line breaks as <br/>, not <br>.
- Plain labels without special characters need no quotes: A[Simple Label].

Reply with the Mermaid code only, starting with the diagram type keyword (flowchart TD, sequenceDiagram, ...). No fences, no explanation."#;

const SUGGEST: &str = r#"You are reviewing the content of a whiteboard canvas. Suggest concrete improvements.

Look at clarity and readability, missing elements or connections, better ways to organize the information, gaps in the design or its logic, and conventions that apply to this kind of content.

Reply with JSON only, no markdown fences:
{"suggestions": [{"title": "...", "description": "...", "priority": "high|medium|low"}], "overall_assessment": "one or two sentences on the content as a whole"}"#;

const EXPLAIN: &str = r#"You are explaining the content of a whiteboard canvas to someone who has not seen it.

Cover the overall purpose and context, the key elements and how they relate, the flow or logic being communicated, and any notable patterns.

Reply in well-structured markdown with headers and bullet points where they help."#;

const OPTIMIZE: &str = r#"You are reviewing an architecture diagram. Recommend optimizations.

Evaluate performance bottlenecks, security gaps, structure (coupling, cohesion, separation of concerns) and scalability limits.

Every recommendation must carry a "diagram_prompt": an instruction for a diagram generator that can add, edit and delete shapes and arrows on this canvas. Be concrete about which shapes to add, remove, move or reconnect, for example "Add a load balancer between the client and the API server and connect it to both".

Reply with JSON only, no markdown fences:
{"summary": "current state and what needs attention", "recommendations": [{"title": "...", "description": "the issue and how to fix it", "priority": "high|medium|low", "category": "performance|security|structure|scalability", "diagram_prompt": "..."}]}"#;
