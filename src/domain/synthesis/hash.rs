use sha2::{Digest, Sha256};

/// Canonical content hash: sha256 over the normalized title, sender, date,
/// body and mode. Normalization collapses whitespace and folds case so
/// formatting-only differences still share cached audio across accounts.
pub fn content_hash(title: &str, sender: &str, date: &str, body: &str, mode: &str) -> String {
    let mut hasher = Sha256::new();
    for field in [title, sender, date, body, mode] {
        hasher.update(normalize(field).as_bytes());
        hasher.update(b"\n");
    }
    format!("{:x}", hasher.finalize())
}

fn normalize(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}
