use crate::error::ChatError;

/// Separator placed between words of the encoded query.
const WORD_SEPARATOR: &str = "%20";

/// Symbols that carry meaning in financial queries and survive encoding.
const KEPT_SYMBOLS: &[char] = &['?', '$', '%', '+', '€', '£', '¥'];

/// Whitespace and other punctuation split words: `year-over-year` searches
/// as three words rather than one.
fn is_separator(c: char) -> bool {
    !(c.is_alphanumeric() || KEPT_SYMBOLS.contains(&c))
}

/// Turn a raw user query into a string that can be pasted into the search
/// URL's `q=` component.
pub fn sanitize(query: &str) -> Result<String, ChatError> {
    let words: Vec<&str> = query
        .split(is_separator)
        .filter(|word| !word.is_empty())
        .collect();

    if !words.iter().any(|w| w.chars().any(char::is_alphanumeric)) {
        return Err(ChatError::invalid_query(format!(
            "nothing searchable in {:?}",
            query
        )));
    }

    Ok(words
        .iter()
        .map(|w| urlencoding::encode(w).into_owned())
        .collect::<Vec<_>>()
        .join(WORD_SEPARATOR))
}
