//! Overlapping, boundary-aware text chunking

use ka_core::{Result, validate_chunking};

/// Boundaries tried in order when a window has to be cut short.
const SEPARATORS: [&[char]; 4] = [&['\n', '\n'], &['\n'], &['.', ' '], &[' ']];

/// Split `text` into chunks of at most `chunk_size` characters.
///
/// Consecutive chunks share exactly `overlap` characters: each chunk after the
/// first starts `overlap` characters before the end of its predecessor. Where a
/// window would cut through a paragraph, line, sentence or word, it is pulled
/// back to the nearest such boundary in its second half. Lengths are counted in
/// `char`s.
pub fn split(text: &str, chunk_size: usize, overlap: usize) -> Result<Vec<String>> {
    validate_chunking(chunk_size, overlap)?;

    let chars: Vec<char> = text.chars().collect();
    let mut chunks = Vec::new();
    let mut start = 0;

    while start < chars.len() {
        let hard_end = (start + chunk_size).min(chars.len());
        let end = if hard_end == chars.len() {
            hard_end
        } else {
            let min_end = (start + overlap + 1).max(start + chunk_size / 2);
            find_boundary(&chars, min_end, hard_end).unwrap_or(hard_end)
        };

        chunks.push(chars[start..end].iter().collect());

        if end == chars.len() {
            break;
        }

        start = end - overlap;
    }

    Ok(chunks)
}

/// Latest end position in `[min_end, hard_end]` that falls right after a separator.
fn find_boundary(chars: &[char], min_end: usize, hard_end: usize) -> Option<usize> {
    SEPARATORS.iter().find_map(|sep| {
        (min_end.max(sep.len())..=hard_end)
            .rev()
            .find(|&end| chars[end - sep.len()..end] == **sep)
    })
}
