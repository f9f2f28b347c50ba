use base64::Engine as _;
use llm::builder::{LLMBackend, LLMBuilder};
use llm::chat::{ChatMessage, ImageMime};

use napkin_core::AiSettings;

use crate::GenerateError;

fn map_backend(provider: &str) -> Result<LLMBackend, GenerateError> {
    match provider {
        "openai" => Ok(LLMBackend::OpenAI),
        "anthropic" => Ok(LLMBackend::Anthropic),
        "google" => Ok(LLMBackend::Google),
        "ollama" => Ok(LLMBackend::Ollama),
        "groq" => Ok(LLMBackend::Groq),
        "mistral" => Ok(LLMBackend::Mistral),
        "deepseek" => Ok(LLMBackend::DeepSeek),
        other => Err(GenerateError::UnknownProvider(other.to_string())),
    }
}

/// Decode a base64 PNG, tolerating a `data:image/png;base64,` prefix.
pub fn decode_image(image_base64: &str) -> Result<Vec<u8>, GenerateError> {
    let payload = image_base64
        .split_once("base64,")
        .map_or(image_base64, |(_, data)| data)
        .trim();
    base64::engine::general_purpose::STANDARD
        .decode(payload)
        .map_err(|e| GenerateError::Image(e.to_string()))
}

/// One chat round-trip; returns the raw reply text.
pub async fn complete(
    settings: &AiSettings,
    system: &str,
    user_msg: &str,
    image: Option<Vec<u8>>,
) -> Result<String, GenerateError> {
    let backend = map_backend(&settings.provider)?;

    let mut builder = LLMBuilder::new()
        .backend(backend)
        .model(&settings.model)
        .system(system);

    if !settings.api_key.is_empty() {
        builder = builder.api_key(&settings.api_key);
    }

    let llm = builder
        .build()
        .map_err(|e| GenerateError::Upstream(format!("build LLM: {e}")))?;

    let mut messages = Vec::with_capacity(2);
    if let Some(bytes) = image {
        messages.push(ChatMessage::user().image(ImageMime::PNG, bytes).build());
    }
    messages.push(ChatMessage::user().content(user_msg).build());

    let response = llm
        .chat(&messages)
        .await
        .map_err(|e| GenerateError::Upstream(format!("chat: {e}")))?;

    match response.text() {
        Some(text) if !text.trim().is_empty() => Ok(text),
        _ => Err(GenerateError::Envelope(crate::EnvelopeError::Empty)),
    }
}
