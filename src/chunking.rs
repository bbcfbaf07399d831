//! Fixed-width text chunking.
//!
//! Boundaries are hard character cuts with no overlap and no sentence or
//! paragraph awareness. Leading whitespace is skipped between cuts, so no
//! chunk starts with whitespace and whitespace-only segments never appear.
//! Concatenating the chunks in order reconstructs the input minus the
//! whitespace skipped at cut points.

/// Splits `text` into contiguous chunks of at most `max_chars` characters.
///
/// Deterministic: the same input and `max_chars` always yield the same
/// sequence. Empty input (or `max_chars == 0`) yields an empty vec rather
/// than an error. Cuts land on `char` boundaries, never inside a UTF-8
/// sequence.
///
/// ```
/// use marketbrief::chunking::chunk_text;
///
/// let chunks = chunk_text("ALPHA BETA GAMMA", 5);
/// assert_eq!(chunks, vec!["ALPHA", "BETA ", "GAMMA"]);
/// ```
pub fn chunk_text(text: &str, max_chars: usize) -> Vec<String> {
    if max_chars == 0 {
        return Vec::new();
    }

    let mut chunks = Vec::new();
    let mut rest = text;

    loop {
        rest = rest.trim_start();
        if rest.is_empty() {
            break;
        }

        let cut = rest
            .char_indices()
            .nth(max_chars)
            .map(|(idx, _)| idx)
            .unwrap_or(rest.len());

        let (chunk, tail) = rest.split_at(cut);
        chunks.push(chunk.to_string());
        rest = tail;
    }

    chunks
}
