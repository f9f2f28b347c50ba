use std::sync::Arc;

use rmcp::{
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{CallToolResult, Content, ServerCapabilities, ServerInfo},
    schemars, tool, tool_handler, tool_router, ErrorData as McpError, ServerHandler, ServiceExt,
};
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing_subscriber::EnvFilter;

use napkin_core::{
    rules, ApplyOptions, ApplyReport, Context, Diagram, MutationRecord, Rect,
};
use napkin_generate::{Analysis, AnalyzeMode, GenerateMode, GenerateRequest};

fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= 128
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
        && !name.starts_with('.')
}

fn validate_name(name: &str) -> Result<(), McpError> {
    if is_valid_name(name) {
        Ok(())
    } else {
        Err(McpError::invalid_params(
            format!("Invalid diagram name '{}': use letters, digits, '-', '_' or '.'", name),
            None,
        ))
    }
}

fn context_for(diagram: &Diagram, region: Option<&Rect>) -> Context {
    match region {
        Some(bounds) => Context::for_region(diagram, bounds),
        None => Context::for_diagram(diagram),
    }
}

// --- Requests ---

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct NameRequest {
    /// Diagram name (file stem under the napkin data dir)
    name: String,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct GetContextRequest {
    name: String,
    /// Page-space rectangle to scope to; whole diagram when omitted
    region: Option<Rect>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct ApplyMutationsRequest {
    name: String,
    /// Generator output: a JSON array of records, fenced or bare
    mutations: String,
    /// Must match the region used for get_context, if any
    region: Option<Rect>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct GenerateDiagramRequest {
    name: String,
    prompt: String,
    region: Option<Rect>,
    /// PNG snapshot of the canvas, base64 encoded
    image_base64: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct TransformRequest {
    name: String,
    /// PNG of the sketch, base64 encoded
    image_base64: String,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct AnalyzeRequest {
    /// One of: label, cleanup, suggest, explain, optimize
    mode: String,
    /// PNG of the canvas, base64 encoded
    image_base64: String,
}

// --- Server ---

#[derive(Clone)]
pub struct NapkinServer {
    tool_router: ToolRouter<Self>,
    /// Held from context build through save: one reconciliation at a time.
    busy: Arc<Mutex<()>>,
}

#[tool_router]
impl NapkinServer {
    pub fn new() -> Self {
        Self {
            tool_router: Self::tool_router(),
            busy: Arc::new(Mutex::new(())),
        }
    }

    #[tool(description = "List all stored diagrams")]
    fn list_diagrams(&self) -> Result<CallToolResult, McpError> {
        match napkin_core::list_diagrams() {
            Ok(names) => {
                let text = if names.is_empty() {
                    "No diagrams found. Use generate or apply_mutations to create one.".to_string()
                } else {
                    names.join("\n")
                };
                Ok(CallToolResult::success(vec![Content::text(text)]))
            }
            Err(e) => Ok(CallToolResult::error(vec![Content::text(e.to_string())])),
        }
    }

    #[tool(
        description = "Get the full JSON content of a diagram: {shapes: [{id, x, y, type, text, style, ...}], connectors: [{id, startPoint, endPoint, start?, end?, text, style}]}. A missing diagram reads as empty."
    )]
    fn get_diagram(&self, Parameters(req): Parameters<NameRequest>) -> Result<CallToolResult, McpError> {
        validate_name(&req.name)?;
        match napkin_core::read_diagram(&req.name) {
            Ok(diagram) => {
                let json = serde_json::to_string_pretty(&diagram)
                    .unwrap_or_else(|e| format!("Serialization error: {}", e));
                Ok(CallToolResult::success(vec![Content::text(json)]))
            }
            Err(e) => Ok(CallToolResult::error(vec![Content::text(format!(
                "Failed to read diagram '{}': {}",
                req.name, e
            ))])),
        }
    }

    #[tool(description = "Delete a diagram")]
    async fn delete_diagram(&self, Parameters(req): Parameters<NameRequest>) -> Result<CallToolResult, McpError> {
        validate_name(&req.name)?;
        let _guard = self.busy.lock().await;
        match napkin_core::delete_diagram(&req.name) {
            Ok(()) => Ok(CallToolResult::success(vec![Content::text(format!(
                "Deleted '{}'",
                req.name
            ))])),
            Err(e) => Ok(CallToolResult::error(vec![Content::text(e.to_string())])),
        }
    }

    #[tool(description = "Get the record vocabulary and layout rules for diagram mutations")]
    fn get_rules(&self) -> Result<CallToolResult, McpError> {
        Ok(CallToolResult::success(vec![Content::text(rules_text())]))
    }

    #[tool(
        description = "Get the numbered list of existing content to write mutations against. Returns {existing: [{handle, kind, label, x, y, fromHandle?, toHandle?}], nextHandle}. Handles are only valid for the very next apply_mutations call with the same region."
    )]
    fn get_context(&self, Parameters(req): Parameters<GetContextRequest>) -> Result<CallToolResult, McpError> {
        validate_name(&req.name)?;
        let diagram = match napkin_core::read_diagram(&req.name) {
            Ok(d) => d,
            Err(e) => return Ok(CallToolResult::error(vec![Content::text(e.to_string())])),
        };
        let context = context_for(&diagram, req.region.as_ref());
        let body = serde_json::json!({
            "existing": &context.existing,
            "nextHandle": context.next_handle(),
        });
        let json = serde_json::to_string_pretty(&body).unwrap_or_else(|e| format!("Serialization error: {}", e));
        Ok(CallToolResult::success(vec![Content::text(json)]))
    }

    #[tool(
        description = "Apply a mutation list (add/edit/delete records referencing handles from get_context) to a diagram. Deletes run first, then edits, then adds. Unresolvable records are skipped and reported as warnings."
    )]
    async fn apply_mutations(
        &self,
        Parameters(req): Parameters<ApplyMutationsRequest>,
    ) -> Result<CallToolResult, McpError> {
        validate_name(&req.name)?;
        let records = match napkin_generate::parse_mutations(&req.mutations) {
            Ok(r) => r,
            Err(e) => {
                return Ok(CallToolResult::error(vec![Content::text(format!(
                    "Could not read mutations: {}",
                    e
                ))]))
            }
        };

        let _guard = self.busy.lock().await;
        let mut diagram = match napkin_core::read_diagram(&req.name) {
            Ok(d) => d,
            Err(e) => return Ok(CallToolResult::error(vec![Content::text(e.to_string())])),
        };
        let mut context = context_for(&diagram, req.region.as_ref());
        Ok(commit(&req.name, &mut diagram, &mut context, &records))
    }

    #[tool(
        description = "Generate or modify a diagram from a text prompt using the configured AI provider. With an existing diagram the model sees its content (optionally scoped to a region) and may add, edit or delete."
    )]
    async fn generate(
        &self,
        Parameters(req): Parameters<GenerateDiagramRequest>,
    ) -> Result<CallToolResult, McpError> {
        validate_name(&req.name)?;
        let request = GenerateRequest {
            mode: GenerateMode::Prompt,
            prompt: req.prompt,
            image_base64: req.image_base64,
        };
        Ok(self.run_generator(&req.name, request, req.region).await)
    }

    #[tool(
        description = "Turn a sketch or annotated screenshot (base64 PNG) into clean diagram shapes added to the named diagram"
    )]
    async fn transform(&self, Parameters(req): Parameters<TransformRequest>) -> Result<CallToolResult, McpError> {
        validate_name(&req.name)?;
        let request = GenerateRequest {
            mode: GenerateMode::Transform,
            prompt: String::new(),
            image_base64: Some(req.image_base64),
        };
        Ok(self.run_generator(&req.name, request, None).await)
    }

    #[tool(
        description = "Analyze a canvas image (base64 PNG) without changing any diagram. Modes: label (find elements), cleanup (Mermaid code), suggest (improvements), explain (markdown), optimize (architecture review; each recommendation's diagram_prompt can be passed to generate). Returns {mode, result}."
    )]
    async fn analyze(&self, Parameters(req): Parameters<AnalyzeRequest>) -> Result<CallToolResult, McpError> {
        let mode: AnalyzeMode = req
            .mode
            .parse()
            .map_err(|e: napkin_generate::analyze::UnknownMode| McpError::invalid_params(e.to_string(), None))?;
        let settings = napkin_core::read_settings();
        match napkin_generate::analyze(&settings, mode, &req.image_base64).await {
            Ok(analysis) => Ok(CallToolResult::success(vec![Content::text(render_analysis(&analysis))])),
            Err(e) => {
                tracing::warn!(%mode, error = %e, "analysis failed");
                Ok(CallToolResult::error(vec![Content::text(e.to_string())]))
            }
        }
    }
}

impl NapkinServer {
    async fn run_generator(&self, name: &str, request: GenerateRequest, region: Option<Rect>) -> CallToolResult {
        let settings = napkin_core::read_settings();
        let _guard = self.busy.lock().await;

        let mut diagram = match napkin_core::read_diagram(name) {
            Ok(d) => d,
            Err(e) => return CallToolResult::error(vec![Content::text(e.to_string())]),
        };
        let mut context = match request.mode {
            // transform always draws from scratch, new handles must not collide
            GenerateMode::Transform => Context::empty(),
            GenerateMode::Prompt => context_for(&diagram, region.as_ref()),
        };

        let records = match napkin_generate::generate(&settings, &request, &context).await {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(diagram = name, error = %e, "generation failed");
                return CallToolResult::error(vec![Content::text(e.to_string())]);
            }
        };
        commit(name, &mut diagram, &mut context, &records)
    }
}

/// Apply and save. The diagram is only written when apply succeeds, so a
/// failed batch never reaches disk.
fn commit(name: &str, diagram: &mut Diagram, context: &mut Context, records: &[MutationRecord]) -> CallToolResult {
    let options = ApplyOptions::for_context(context);
    let report = match napkin_core::apply(diagram, records, &mut context.map, &context.existing, options) {
        Ok(r) => r,
        Err(e) => {
            tracing::warn!(diagram = name, error = %e, "apply failed, diagram left unchanged");
            return CallToolResult::error(vec![Content::text(format!("Apply failed: {}", e))]);
        }
    };
    if let Err(e) = napkin_core::write_diagram(name, diagram) {
        return CallToolResult::error(vec![Content::text(format!("Failed to save '{}': {}", name, e))]);
    }
    CallToolResult::success(vec![Content::text(summarize(&report))])
}

fn summarize(report: &ApplyReport) -> String {
    let mut out = format!(
        "Applied {} change(s): {} shape(s) and {} connector(s) added, {} edited, {} deleted.",
        report.change_count(),
        report.shapes_created,
        report.connectors_created,
        report.edited,
        report.deleted
    );
    if report.skip_zoom_to_fit {
        out.push_str("\nskipZoomToFit: true");
    }
    if !report.warnings.is_empty() {
        out.push_str("\nWarnings:");
        for warning in &report.warnings {
            out.push_str("\n- ");
            out.push_str(&warning.to_string());
        }
    }
    out
}

/// Text modes are returned as is; the rest as `{mode, result}` JSON.
fn render_analysis(analysis: &Analysis) -> String {
    match analysis {
        Analysis::Cleanup(text) | Analysis::Explain(text) => text.clone(),
        other => serde_json::to_string_pretty(other).unwrap_or_else(|e| format!("Serialization error: {}", e)),
    }
}

fn rules_text() -> String {
    format!("{}\n{}\n{}", rules::SHAPE_TYPES, rules::LAYOUT_RULES, rules::EDIT_RULES)
}

#[tool_handler]
impl ServerHandler for NapkinServer {
    fn get_info(&self) -> ServerInfo {
        let instructions = format!("{}\n\n## Records\n{}", INSTRUCTIONS, rules_text());
        ServerInfo {
            instructions: Some(instructions.into()),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}

const INSTRUCTIONS: &str = r#"napkin keeps whiteboard diagrams as .napkin files (JSON) and edits them with mutation lists.

## Workflow
1. `list_diagrams` to see what exists.
2. `get_context` for the diagram (pass `region` to work on part of it). Every existing shape and arrow gets a small integer handle.
3. Write a JSON array of records using those handles and call `apply_mutations` with the same `region`.
4. Or let the configured AI provider do steps 2-3: `generate` with a prompt, or `transform` with a sketch image.
5. `analyze` reviews a canvas image without touching any diagram. In `optimize` mode each recommendation has a `diagram_prompt`; pass it to `generate` to apply it.

Handles are throwaway: fetch a fresh context before every apply. A record referencing an unknown handle is skipped with a warning, never an error."#;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // stdout carries the protocol
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_env("NAPKIN_LOG").unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    tracing::info!(data_dir = %napkin_core::napkin_dir().display(), "starting napkin-mcp");
    let service = NapkinServer::new()
        .serve(rmcp::transport::io::stdio())
        .await
        .inspect_err(|e| tracing::error!(error = %e, "MCP server error"))?;
    service.waiting().await?;
    Ok(())
}
