//! Prompts for AI-assisted remediation.
//!
//! Keeping every prompt here means a wording change touches one file and
//! tests can inspect the text without calling a provider.
//!
//! Callers can override the alt-text system prompt via
//! [`crate::config::ServiceConfig::alt_text_prompt`]; the constant here is
//! used only when no override is provided.

/// Default system prompt for describing one embedded PDF image.
pub const ALT_TEXT_SYSTEM_PROMPT: &str = r#"You write alternate text for images embedded in PDF documents so that screen-reader users get the same information as sighted readers.

Follow these rules precisely:

1. CONTENT
   - Describe what the image conveys, not how it looks pixel by pixel
   - For charts and diagrams, state the type and the key takeaway or trend
   - For photos, name the subject and any action relevant to the document
   - Transcribe short text that appears inside the image

2. LENGTH
   - One or two sentences, at most 250 characters

3. WHAT TO OMIT
   - Do NOT start with "Image of", "Picture of" or "Graphic showing"
   - Do NOT mention that this is alt text
   - Purely decorative images: answer exactly "Decorative image"

4. OUTPUT FORMAT
   - Output ONLY the alt text as plain prose
   - No quotes, no labels, no Markdown"#;

/// User-turn text accompanying the image.
///
/// `context` is surrounding information the caller knows about the document
/// (its file name, or the page the image sits on).
pub fn alt_text_request(context: Option<&str>) -> String {
    match context {
        Some(ctx) if !ctx.trim().is_empty() => format!(
            "Write alt text for this image. Document context: {}",
            ctx.trim()
        ),
        _ => "Write alt text for this image.".to_string(),
    }
}
