pub mod chunk;
pub mod engine;
pub mod tone;

pub use chunk::{split_into_chunks, CHUNK_MAX_CHARS, FIRST_CHUNK_MAX_CHARS};
pub use engine::{
    assemble, extract_plain_text, sanitize, truncate_sign_off, ScriptSection, PAUSE_MARKER,
};
pub use tone::{classify_tone, Tone};

/// Run the full extraction pipeline on raw markup: extract, truncate the
/// sign-off, sanitize. Returns narration-ready body text.
pub fn clean_body(body_html: &str) -> String {
    let extracted = extract_plain_text(body_html);
    let truncated = truncate_sign_off(&extracted);
    sanitize(&truncated)
}
