//! Generator adapter: prompt construction, the LLM round-trip and parsing of
//! the reply into mutation records. [`analyze`] reuses the same round-trip to
//! report on a canvas image instead of drawing.

pub mod analyze;
pub mod engine;
mod parse;
mod prompt;

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use napkin_core::{AiSettings, Context, MutationRecord};

pub use analyze::{analyze, Analysis, AnalyzeMode, Recommendation};
pub use parse::{parse_mutations, EnvelopeError};
pub use prompt::{system_prompt, user_message};

const DEFAULT_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerateMode {
    /// Text prompt, optionally with a snapshot of the current canvas.
    #[default]
    Prompt,
    /// Sketch-to-diagram from an image alone.
    Transform,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerateRequest {
    pub mode: GenerateMode,
    pub prompt: String,
    /// PNG, base64 encoded. Required for `Transform`.
    pub image_base64: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum GenerateError {
    #[error("AI is not configured: set provider, model and API key in settings.json")]
    NotConfigured,
    #[error("unknown provider: {0}")]
    UnknownProvider(String),
    #[error("transform needs an image")]
    MissingImage,
    #[error("invalid image: {0}")]
    Image(String),
    #[error("generator call failed: {0}")]
    Upstream(String),
    #[error("generator timed out after {0}s")]
    Timeout(u64),
    #[error(transparent)]
    Envelope(#[from] EnvelopeError),
}

/// Ask the generator for a mutation list against `context`.
///
/// The whole call fails as one unit: a transport error, timeout or
/// unreadable reply yields no records at all.
pub async fn generate(
    settings: &AiSettings,
    request: &GenerateRequest,
    context: &Context,
) -> Result<Vec<MutationRecord>, GenerateError> {
    if !napkin_core::ai_configured(settings) {
        return Err(GenerateError::NotConfigured);
    }

    let image = match (&request.image_base64, request.mode) {
        (Some(data), _) => Some(engine::decode_image(data)?),
        (None, GenerateMode::Transform) => return Err(GenerateError::MissingImage),
        (None, GenerateMode::Prompt) => None,
    };

    let system = system_prompt(request.mode);
    let user_msg = user_message(request, context);

    tracing::info!(
        provider = %settings.provider,
        model = %settings.model,
        mode = ?request.mode,
        existing = context.existing.len(),
        image = image.is_some(),
        "calling generator"
    );

    let raw = with_timeout(settings, engine::complete(settings, &system, &user_msg, image)).await?;

    tracing::debug!(raw = %raw, "generator output");
    let records = parse_mutations(&raw)?;
    tracing::info!(records = records.len(), "parsed generator output");
    Ok(records)
}

/// Bound one model round-trip by the configured timeout.
async fn with_timeout<T>(
    settings: &AiSettings,
    call: impl Future<Output = Result<T, GenerateError>>,
) -> Result<T, GenerateError> {
    let secs = settings.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS);
    tokio::time::timeout(Duration::from_secs(secs), call)
        .await
        .map_err(|_| GenerateError::Timeout(secs))?
}
