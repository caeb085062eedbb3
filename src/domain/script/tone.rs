use serde::{Deserialize, Serialize};

/// Minimum keyword signals required before a tone beats the default
const MIN_SIGNALS: usize = 2;

const ACADEMIC_SIGNALS: &[&str] = &[
    "study",
    "research",
    "hypothesis",
    "evidence",
    "analysis",
    "methodology",
    "findings",
    "peer-reviewed",
    "experiment",
    "data suggests",
];

const WITTY_SIGNALS: &[&str] = &[
    "hilarious",
    "joke",
    "funny",
    "lol",
    "meme",
    "absurd",
    "ridiculous",
    "plot twist",
    "spoiler",
    "honestly though",
];

const PROFESSIONAL_SIGNALS: &[&str] = &[
    "quarter",
    "revenue",
    "market",
    "strategy",
    "stakeholder",
    "roadmap",
    "launch",
    "partnership",
    "industry",
    "forecast",
];

/// Narration tone, inferred from small keyword sets over the sanitized body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tone {
    Academic,
    Witty,
    Professional,
}

impl Tone {
    /// Tone-specific phrase that opens the narration hook
    pub fn hook_phrase(&self) -> &'static str {
        match self {
            Tone::Academic => "Let's examine today's reading:",
            Tone::Witty => "Buckle up, here comes",
            Tone::Professional => "Here's what you need to know from",
        }
    }
}

impl std::fmt::Display for Tone {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Tone::Academic => "academic",
            Tone::Witty => "witty",
            Tone::Professional => "professional",
        };
        write!(f, "{}", s)
    }
}

/// Pick the tone with at least two matching signals, defaulting to
/// professional. Ties are broken in favor of the more specific tones first.
pub fn classify_tone(text: &str) -> Tone {
    let lowered = text.to_lowercase();

    let academic = count_signals(&lowered, ACADEMIC_SIGNALS);
    let witty = count_signals(&lowered, WITTY_SIGNALS);
    let professional = count_signals(&lowered, PROFESSIONAL_SIGNALS);

    let best = [
        (Tone::Academic, academic),
        (Tone::Witty, witty),
        (Tone::Professional, professional),
    ]
    .into_iter()
    .max_by_key(|(_, count)| *count);

    match best {
        Some((tone, count)) if count >= MIN_SIGNALS => tone,
        _ => Tone::Professional,
    }
}

fn count_signals(lowered: &str, signals: &[&str]) -> usize {
    signals.iter().filter(|s| lowered.contains(*s)).count()
}
