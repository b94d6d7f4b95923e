use serde::{Deserialize, Serialize};

/// One headline from the search page, in relevance order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    /// Absolute http(s) URL.
    pub link: String,
}

/// Plain text pulled from one article page. Empty when the page had no
/// paragraphs or could not be fetched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Article {
    pub link: String,
    pub text: String,
}

impl Article {
    pub fn empty(link: &str) -> Self {
        Self {
            link: link.to_string(),
            text: String::new(),
        }
    }
}
