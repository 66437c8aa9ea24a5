//! Small text helpers shared by the services

/// First `max_chars` characters of `text`, with an ellipsis when cut, for logs.
pub fn preview(text: &str, max_chars: usize) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(max_chars).collect();
    if chars.next().is_some() {
        format!("{}...", head)
    } else {
        head
    }
}
