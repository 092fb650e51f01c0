/// Normalize text for the low-length check, following the SlimPajama recipe.
///
/// The text is lower-cased, ASCII punctuation is removed and whitespace runs
/// are collapsed into single spaces with both ends trimmed. The result is only
/// used to decide whether a record is long enough; the tokenizer always sees
/// the original text.
pub fn normalize_text(text: &str) -> String {
    let stripped: String = text
        .to_lowercase()
        .chars()
        .filter(|c| !c.is_ascii_punctuation())
        .collect();

    stripped
        .split(is_separator)
        .filter(|word| !word.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Unicode whitespace plus the ASCII file/group/record/unit separators.
fn is_separator(c: char) -> bool {
    c.is_whitespace() || ('\x1c'..='\x1f').contains(&c)
}

/// Number of characters left after [`normalize_text`].
pub fn normalized_len(text: &str) -> usize {
    normalize_text(text).chars().count()
}

/// Returns `true` when the record is long enough to be worth tokenizing.
///
/// A threshold of zero accepts everything, including empty text.
pub fn passes_character_filter(text: &str, min_characters: usize) -> bool {
    if min_characters == 0 {
        return true;
    }
    normalized_len(text) >= min_characters
}
