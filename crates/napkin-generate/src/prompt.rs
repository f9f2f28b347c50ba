use napkin_core::rules::{EDIT_RULES, LAYOUT_RULES, SHAPE_TYPES};
use napkin_core::Context;

use crate::{GenerateMode, GenerateRequest};

pub fn system_prompt(mode: GenerateMode) -> String {
    let lead = match mode {
        GenerateMode::Prompt => {
            "You are a diagram generator. The user describes what they want drawn on a canvas; \
             answer with a JSON array of records to create or change.\n"
        }
        GenerateMode::Transform => {
            "You turn a picture of a canvas into a clean diagram. The image may hold hand-drawn \
             sketches, handwriting, rough flowcharts or a screenshot with markup on top.\n\
             Read everything visible: shapes, text, connections, notes and annotations. Keep the \
             meaning and the relationships (connected things get arrows) and keep the spatial \
             arrangement roughly as drawn. Turn handwriting into readable labels and rough \
             outlines into proper shapes. Add a title summarizing the content.\n"
        }
    };

    let mut out = String::with_capacity(lead.len() + SHAPE_TYPES.len() + LAYOUT_RULES.len() + 2);
    out.push_str(lead);
    out.push('\n');
    out.push_str(SHAPE_TYPES);
    out.push('\n');
    out.push_str(LAYOUT_RULES);
    out
}

/// Build the user turn. An empty context asks for a fresh diagram; otherwise
/// the existing content is listed and the action vocabulary explained.
pub fn user_message(request: &GenerateRequest, context: &Context) -> String {
    let mut out = String::with_capacity(1024);

    if context.existing.is_empty() || request.mode == GenerateMode::Transform {
        match request.mode {
            GenerateMode::Prompt => {
                out.push_str("User request: ");
                out.push_str(request.prompt.trim());
            }
            GenerateMode::Transform => {
                out.push_str("Convert the attached canvas image into diagram records.");
                if !request.prompt.trim().is_empty() {
                    out.push_str("\nNotes from the user: ");
                    out.push_str(request.prompt.trim());
                }
            }
        }
        return out;
    }

    let existing = serde_json::to_string(&context.existing).unwrap_or_else(|_| "[]".to_string());

    out.push_str("The canvas already has content");
    if request.image_base64.is_some() {
        out.push_str(" (see the attached image)");
    }
    out.push_str(". Change or extend it as the user asks.\n\n");
    out.push_str("User request: \"");
    out.push_str(request.prompt.trim());
    out.push_str("\"\n\n");
    out.push_str("Existing records (reference them by \"handle\" in id/from/to):\n");
    out.push_str(&existing);
    out.push_str("\n\n");
    out.push_str(EDIT_RULES);
    out.push_str(&format!(
        "New ids start at {}. Only output records the request touches.\n\
         New shapes must not overlap existing ones: keep 550px horizontally and 450px \
         vertically from every position listed above.\n",
        context.next_handle()
    ));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use napkin_core::{ExistingShape, IdentifierMap, ShapeId};

    fn request(prompt: &str) -> GenerateRequest {
        GenerateRequest {
            mode: GenerateMode::Prompt,
            prompt: prompt.to_string(),
            image_base64: None,
        }
    }

    fn context_with_two() -> Context {
        let mut map = IdentifierMap::new();
        map.insert(0, ShapeId::new("shape:1"));
        map.insert(1, ShapeId::new("shape:2"));
        let row = |handle, label: &str, x| ExistingShape {
            handle,
            kind: "geo".into(),
            label: label.into(),
            x,
            y: 150,
            from_handle: None,
            to_handle: None,
        };
        Context {
            map,
            existing: vec![row(0, "Gateway", 100), row(1, "Auth", 650)],
            scoped: false,
        }
    }

    #[test]
    fn fresh_diagram_has_no_action_vocabulary() {
        let msg = user_message(&request("draw a login flow"), &Context::empty());
        assert_eq!(msg, "User request: draw a login flow");
    }

    #[test]
    fn context_lists_existing_and_next_handle() {
        let msg = user_message(&request("add a database"), &context_with_two());
        assert!(msg.contains("\"label\":\"Gateway\""));
        assert!(msg.contains("New ids start at 2."));
        assert!(msg.contains("\"delete\""));
        assert!(!msg.contains("attached image"));
    }

    #[test]
    fn transform_ignores_context() {
        let req = GenerateRequest {
            mode: GenerateMode::Transform,
            prompt: String::new(),
            image_base64: Some("AAAA".into()),
        };
        let msg = user_message(&req, &context_with_two());
        assert!(!msg.contains("Gateway"));
        assert!(msg.starts_with("Convert the attached canvas image"));
    }

    #[test]
    fn system_prompts_share_the_vocabulary() {
        for mode in [GenerateMode::Prompt, GenerateMode::Transform] {
            let prompt = system_prompt(mode);
            assert!(prompt.contains("\"arrow\""));
            assert!(prompt.contains("x=100, 650, 1200, 1750"));
        }
        assert!(system_prompt(GenerateMode::Transform).contains("hand-drawn"));
    }
}
