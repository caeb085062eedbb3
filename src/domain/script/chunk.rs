/// Character cap for the first chunk; small so the first audio bytes land fast.
pub const FIRST_CHUNK_MAX_CHARS: usize = 420;

/// Character cap for every subsequent chunk.
pub const CHUNK_MAX_CHARS: usize = 2500;

/// Split an assembled script into speech chunks.
///
/// The first chunk is capped tightly for fast perceived start; later chunks use
/// the full provider budget. Splits prefer sentence boundaries and fall back to
/// hard character slicing only when a single sentence exceeds its limit.
/// Concatenating the chunks in order reproduces the script's word sequence.
pub fn split_into_chunks(script: &str) -> Vec<String> {
    let trimmed = script.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }

    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut limit = FIRST_CHUNK_MAX_CHARS;

    for sentence in split_sentences(trimmed) {
        if sentence.len() > limit && current.is_empty() {
            // A single sentence over the cap gets hard-sliced
            for piece in hard_slice(&sentence, limit) {
                chunks.push(piece);
                limit = CHUNK_MAX_CHARS;
            }
            continue;
        }

        if !current.is_empty() && current.len() + sentence.len() + 1 > limit {
            chunks.push(current.trim().to_string());
            current = String::new();
            limit = CHUNK_MAX_CHARS;

            if sentence.len() > limit {
                for piece in hard_slice(&sentence, limit) {
                    chunks.push(piece);
                }
                continue;
            }
        }

        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(&sentence);
    }

    if !current.trim().is_empty() {
        chunks.push(current.trim().to_string());
    }

    chunks
}

/// Sentence-ish segments, whitespace-normalized, punctuation kept.
fn split_sentences(text: &str) -> Vec<String> {
    let sentence_pattern = regex::Regex::new(r"[.!?]+(\s+|$)").unwrap();
    let normalized = regex::Regex::new(r"\s+")
        .unwrap()
        .replace_all(text, " ")
        .to_string();

    let mut sentences = Vec::new();
    let mut last_end = 0;

    for mat in sentence_pattern.find_iter(&normalized) {
        let sentence = normalized[last_end..mat.end()].trim().to_string();
        if !sentence.is_empty() {
            sentences.push(sentence);
        }
        last_end = mat.end();
    }

    if last_end < normalized.len() {
        let remainder = normalized[last_end..].trim().to_string();
        if !remainder.is_empty() {
            sentences.push(remainder);
        }
    }

    sentences
}

fn hard_slice(sentence: &str, first_limit: usize) -> Vec<String> {
    let chars: Vec<char> = sentence.chars().collect();
    let mut pieces = Vec::new();
    let mut start = 0;
    let mut limit = first_limit;

    while start < chars.len() {
        let end = (start + limit).min(chars.len());
        pieces.push(chars[start..end].iter().collect());
        start = end;
        limit = CHUNK_MAX_CHARS;
    }

    pieces
}
