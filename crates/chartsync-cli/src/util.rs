//! Shared utility functions for CLI commands

/// Shorten a `sha256:<hex>` digest for display
///
/// Keeps the algorithm prefix and at most `max_len` hex characters.
#[must_use]
pub fn short_digest(digest: &str, max_len: usize) -> String {
    let (algorithm, hash) = digest.split_once(':').unwrap_or(("", digest));
    let hash = hash.get(..max_len).unwrap_or(hash);
    if algorithm.is_empty() {
        hash.to_string()
    } else {
        format!("{}:{}", algorithm, hash)
    }
}
