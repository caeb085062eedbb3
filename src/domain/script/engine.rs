use super::tone::Tone;
use html2text::from_read;

/// Spoken pause between named sections of an assembled script
pub const PAUSE_MARKER: &str = "\n\n...\n\n";

/// Fraction of trailing lines scanned for a letter-style sign-off
const SIGN_OFF_WINDOW: f32 = 0.4;

/// A named (or anonymous) section of the spoken script
#[derive(Debug, Clone)]
pub struct ScriptSection {
    pub heading: Option<String>,
    pub text: String,
}

/// Convert structured markup to plain readable text.
///
/// Style and script blocks are discarded; meaningful image alt-text survives as
/// a spoken annotation.
pub fn extract_plain_text(html: &str) -> String {
    let block_pattern =
        regex::Regex::new(r"(?is)<(style|script)\b[^>]*>.*?</(style|script)>").unwrap();
    let without_blocks = block_pattern.replace_all(html, " ");

    // Surface alt text before tag stripping so it reads as an annotation
    let img_pattern = regex::Regex::new(r#"(?i)<img\b[^>]*\balt\s*=\s*["']([^"']+)["'][^>]*>"#)
        .unwrap();
    let with_annotations = img_pattern.replace_all(&without_blocks, " Image: $1. ");

    let plain_text = from_read(with_annotations.as_bytes(), usize::MAX);

    // html2text leaves markdown-style link targets and emphasis markers behind
    let link_target_pattern = regex::Regex::new(r"\[([^\]]*)\]\([^)]*\)").unwrap();
    let without_targets = link_target_pattern.replace_all(&plain_text, "$1");

    without_targets.replace("**", "").replace('*', "")
}

/// Drop a trailing letter-style valediction and everything after it.
///
/// Only the last 40% of lines are considered so a "Best," mid-article does not
/// truncate real content.
pub fn truncate_sign_off(text: &str) -> String {
    let lines: Vec<&str> = text.lines().collect();
    if lines.is_empty() {
        return text.to_string();
    }

    let sign_off_pattern = regex::Regex::new(
        r"(?i)^\s*(best|cheers|regards|warm regards|kind regards|warmly|sincerely|thanks|thank you|yours|talk soon|take care|until next time)\s*,?\s*$",
    )
    .unwrap();

    let window_start = ((lines.len() as f32) * (1.0 - SIGN_OFF_WINDOW)) as usize;

    for (index, line) in lines.iter().enumerate().skip(window_start) {
        if sign_off_pattern.is_match(line) {
            return lines[..index].join("\n").trim_end().to_string();
        }
    }

    text.to_string()
}

/// Rewrite non-narratable artifacts into spoken placeholders and strip
/// boilerplate lines.
pub fn sanitize(text: &str) -> String {
    let url_pattern = regex::Regex::new(r"https?://[^\s)>\]]+").unwrap();
    let sanitized = url_pattern.replace_all(text, "referenced link");

    let email_pattern = regex::Regex::new(r"\b[\w.+-]+@[\w-]+\.[\w.-]+\b").unwrap();
    let sanitized = email_pattern.replace_all(&sanitized, "contact email");

    let cta_pattern = regex::Regex::new(
        r"(?i)\b(click here( to [\w\s]{1,30})?|subscribe now|sign up (now|today)|buy now|order now|tap here)\b",
    )
    .unwrap();
    let sanitized = cta_pattern.replace_all(&sanitized, "see the details");

    let boilerplate_pattern = regex::Regex::new(
        r"(?i)(unsubscribe|view (this email )?in( your)? browser|update your preferences|follow us on|find us on|facebook|twitter|instagram|linkedin|forwarded this email|sent with \w+|was this email forwarded|manage your subscription|copyright \u{00a9}|all rights reserved)",
    )
    .unwrap();

    let kept_lines: Vec<&str> = sanitized
        .lines()
        .filter(|line| !boilerplate_pattern.is_match(line))
        .collect();

    let whitespace_pattern = regex::Regex::new(r"[ \t]+").unwrap();
    let joined = kept_lines.join("\n");
    let normalized = whitespace_pattern.replace_all(&joined, " ");
    let blank_pattern = regex::Regex::new(r"\n{3,}").unwrap();

    blank_pattern
        .replace_all(&normalized, "\n\n")
        .trim()
        .to_string()
}

/// Assemble the spoken-word script: a tone-specific opening hook, then the
/// sections joined by an explicit pause marker.
pub fn assemble(title: &str, sections: &[ScriptSection], tone: Tone) -> String {
    let first_text = sections.first().map(|s| s.text.as_str()).unwrap_or("");
    let hook = opening_hook(title, first_text, tone);

    let mut parts = vec![hook];
    for section in sections {
        let mut text = String::new();
        if let Some(heading) = &section.heading {
            text.push_str(heading);
            text.push_str(". ");
        }
        text.push_str(section.text.trim());
        parts.push(text);
    }

    parts.join(PAUSE_MARKER)
}

/// Opening hook: tone phrase + title + first sentence, capped at two sentences.
fn opening_hook(title: &str, body: &str, tone: Tone) -> String {
    let lead_in = format!("{} {}.", tone.hook_phrase(), title.trim());
    let first_sentence = first_sentence_of(body);

    match first_sentence {
        Some(sentence) => format!("{} {}", lead_in, sentence),
        None => lead_in,
    }
}

fn first_sentence_of(text: &str) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }

    let sentence_end = regex::Regex::new(r"[.!?]").unwrap();
    match sentence_end.find(trimmed) {
        Some(mat) => Some(trimmed[..mat.end()].trim().to_string()),
        None => Some(format!("{}.", trimmed.chars().take(200).collect::<String>())),
    }
}
