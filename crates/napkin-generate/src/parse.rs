use napkin_core::MutationRecord;

/// The generator's reply could not be read as a mutation list.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EnvelopeError {
    #[error("generator returned no text")]
    Empty,
    #[error("no mutation records found in generator output")]
    NoRecords,
    #[error("generator reply is not the expected JSON: {0}")]
    Unreadable(String),
}

/// Parse raw generator output into mutation records.
///
/// Accepts the array wrapped in markdown fences or surrounded by prose. When
/// the array as a whole does not parse, each top-level `{...}` object is
/// tried on its own and the ones that parse are kept.
pub fn parse_mutations(raw: &str) -> Result<Vec<MutationRecord>, EnvelopeError> {
    let text = strip_fences(raw);
    if text.is_empty() {
        return Err(EnvelopeError::Empty);
    }

    let body = extract_json_array(text).unwrap_or(text);
    if let Ok(records) = serde_json::from_str::<Vec<MutationRecord>>(body) {
        return Ok(records);
    }

    let records = parse_objects(body);
    tracing::warn!(recovered = records.len(), "malformed mutation array, parsed objects one by one");
    if records.is_empty() {
        return Err(EnvelopeError::NoRecords);
    }
    Ok(records)
}

pub(crate) fn strip_fences(raw: &str) -> &str {
    let mut text = raw.trim();
    if let Some(rest) = text.strip_prefix("```") {
        // drop the info string ("json") up to the first newline
        text = rest.split_once('\n').map_or("", |(_, body)| body);
        text = text.trim_end();
        text = text.strip_suffix("```").unwrap_or(text);
    }
    text.trim()
}

/// Outermost `[...]` slice, if any.
fn extract_json_array(text: &str) -> Option<&str> {
    let start = text.find('[')?;
    let end = text.rfind(']')?;
    if end <= start {
        return None;
    }
    Some(&text[start..=end])
}

/// Outermost `{...}` slice, if any.
pub(crate) fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }
    Some(&text[start..=end])
}

/// Scan for balanced top-level objects, ignoring braces inside strings.
fn parse_objects(text: &str) -> Vec<MutationRecord> {
    let mut records = Vec::new();
    let mut depth = 0usize;
    let mut start = None;
    let mut in_string = false;
    let mut escaped = false;

    for (i, ch) in text.char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => {
                if depth == 0 {
                    start = Some(i);
                }
                depth += 1;
            }
            '}' if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    if let Some(s) = start.take() {
                        match serde_json::from_str::<MutationRecord>(&text[s..=i]) {
                            Ok(record) => records.push(record),
                            Err(e) => tracing::debug!(error = %e, "skipping unparseable record"),
                        }
                    }
                }
            }
            _ => {}
        }
    }
    records
}
