use reqwest::Url;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;

use super::types::SearchResult;

/// Headline elements on the search results page, in ranking order.
const HEADLINE_SELECTOR: &str = "h3.article__headline";
const LINK_SELECTOR: &str = "a[href]";
const PARAGRAPH_SELECTOR: &str = "p";

pub(crate) fn compact_ws(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn element_text(elem: ElementRef<'_>) -> String {
    compact_ws(&elem.text().collect::<String>())
}

/// Resolve a headline href against the search page. Only http(s) targets
/// are fetchable.
fn resolve_link(base: &Url, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') {
        return None;
    }
    let url = base.join(href).ok()?;
    matches!(url.scheme(), "http" | "https").then(|| url.to_string())
}

/// Pull up to `limit` (title, link) pairs out of a search results page.
/// Headlines without a usable link are skipped.
pub fn extract_search_results(html: &str, base: &Url, limit: usize) -> Vec<SearchResult> {
    let document = Html::parse_document(html);
    let (Ok(headline_sel), Ok(link_sel)) = (
        Selector::parse(HEADLINE_SELECTOR),
        Selector::parse(LINK_SELECTOR),
    ) else {
        return Vec::new();
    };

    let mut results = Vec::new();
    for headline in document.select(&headline_sel) {
        if results.len() >= limit {
            break;
        }
        let Some(anchor) = headline.select(&link_sel).next() else {
            debug!("headline without link skipped");
            continue;
        };
        let href = anchor.value().attr("href").unwrap_or("");
        let Some(link) = resolve_link(base, href) else {
            debug!(href, "unusable headline link skipped");
            continue;
        };
        results.push(SearchResult {
            title: element_text(headline),
            link,
        });
    }
    results
}

/// Body text of an article page: every `<p>`, trimmed and whitespace-collapsed,
/// joined by single spaces. Pages without paragraphs yield an empty string.
pub fn extract_article_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let Ok(paragraph_sel) = Selector::parse(PARAGRAPH_SELECTOR) else {
        return String::new();
    };

    document
        .select(&paragraph_sel)
        .map(element_text)
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://www.marketwatch.com").unwrap()
    }

    const SEARCH_PAGE: &str = r#"
        <html><body>
          <h3 class="article__headline"><a href="https://www.marketwatch.com/story/one">Inflation  cools</a></h3>
          <h3 class="other"><a href="https://example.com/not-a-result">Ad</a></h3>
          <h3 class="article__headline">No link here</h3>
          <h3 class="article__headline"><a href="/story/two">Fed holds rates</a></h3>
          <h3 class="article__headline"><a href="https://www.marketwatch.com/story/three">Gold rallies</a></h3>
        </body></html>
    "#;

    #[test]
    fn test_search_results_in_document_order() {
        let results = extract_search_results(SEARCH_PAGE, &base(), 5);
        let links: Vec<_> = results.iter().map(|r| r.link.as_str()).collect();
        assert_eq!(
            links,
            vec![
                "https://www.marketwatch.com/story/one",
                "https://www.marketwatch.com/story/two",
                "https://www.marketwatch.com/story/three",
            ]
        );
        assert_eq!(results[0].title, "Inflation cools");
    }

    #[test]
    fn test_search_results_respect_limit() {
        let results = extract_search_results(SEARCH_PAGE, &base(), 2);
        assert_eq!(results.len(), 2);
        assert_eq!(results[1].title, "Fed holds rates");
    }

    #[test]
    fn test_search_results_skip_non_http_links() {
        let html = r##"
            <h3 class="article__headline"><a href="javascript:void(0)">x</a></h3>
            <h3 class="article__headline"><a href="#top">y</a></h3>
            <h3 class="article__headline"><a href="mailto:a@b.c">z</a></h3>
        "##;
        assert!(extract_search_results(html, &base(), 5).is_empty());
    }

    #[test]
    fn test_article_text_normalizes_whitespace() {
        let html = "<html><body>\
            <p>  The   rate\n is <b>3%</b>. </p>\
            <div>ignored</div>\
            <p>\t</p>\
            <p>Prices rose.</p>\
            </body></html>";
        assert_eq!(extract_article_text(html), "The rate is 3%. Prices rose.");
    }

    #[test]
    fn test_article_without_paragraphs_is_empty() {
        let html = "<html><body><div>Subscribe to continue reading</div></body></html>";
        assert_eq!(extract_article_text(html), "");
    }

    #[test]
    fn test_malformed_html_does_not_fail() {
        assert_eq!(extract_article_text("<p>unclosed <b>bold"), "unclosed bold");
    }
}
