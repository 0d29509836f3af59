//! Web search over the DuckDuckGo HTML results page.
//!
//! No API key is needed; the page is scraped for title, snippet and URL
//! markers. When the markup changes or the request is blocked the search
//! returns a [`ToolError`] and the caller degrades to error text.

use std::time::Duration;

use async_trait::async_trait;

use super::{SearchBackend, ToolError};

const DDG_HTML_ENDPOINT: &str = "https://html.duckduckgo.com/html/";
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

/// One parsed result entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

/// Search the web through DuckDuckGo's HTML endpoint.
pub struct WebSearch {
    client: reqwest::Client,
    endpoint: String,
    max_results: usize,
}

impl WebSearch {
    /// Keep at most `max_results` entries per search.
    pub fn new(max_results: usize) -> Self {
        Self::with_endpoint(DDG_HTML_ENDPOINT, max_results)
    }

    /// Point the scraper at a different results page (e.g. a local mirror).
    pub fn with_endpoint(endpoint: impl Into<String>, max_results: usize) -> Self {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            client,
            endpoint: endpoint.into(),
            max_results,
        }
    }

}

#[async_trait]
impl SearchBackend for WebSearch {
    fn name(&self) -> &str {
        "web_search"
    }

    async fn search(&self, query: &str) -> Result<String, ToolError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(ToolError::InvalidInput("empty search query".to_string()));
        }

        let url = format!("{}?q={}", self.endpoint, urlencoding::encode(query));
        tracing::debug!("Web search: {}", url);

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ToolError::Status {
                status: status.as_u16(),
                body: body.chars().take(200).collect(),
            });
        }
        let html = response.text().await?;

        if html.contains("anomaly-modal") || html.contains("Unfortunately, bots") {
            return Err(ToolError::Blocked(
                "DuckDuckGo answered with a CAPTCHA page".to_string(),
            ));
        }

        let hits = extract_ddg_results(&html, self.max_results);
        tracing::debug!("Web search '{}' parsed {} results", query, hits.len());
        Ok(format_digest(query, &hits))
    }
}

/// Format parsed results as the plain-text digest handed to the model.
pub fn format_digest(query: &str, hits: &[SearchHit]) -> String {
    if hits.is_empty() {
        return format!("No search results found for query: {}", query);
    }

    let mut output = format!("Search results for '{}':\n\n", query);
    for (i, hit) in hits.iter().enumerate() {
        output.push_str(&format!("{}. {}\n", i + 1, hit.title));
        if !hit.snippet.is_empty() {
            output.push_str(&format!("   {}\n", hit.snippet));
        }
        output.push_str(&format!("   URL: {}\n\n", hit.url));
    }
    output
}

/// Extract up to `max_results` entries from a DuckDuckGo HTML results page.
///
/// Each entry starts at a `result__a` title link; its snippet and display
/// URL are looked up only up to the next title link. Sponsored entries are
/// skipped.
pub fn extract_ddg_results(html: &str, max_results: usize) -> Vec<SearchHit> {
    let mut results = Vec::new();

    for chunk in html.split("class=\"result__a\"").skip(1) {
        if results.len() >= max_results {
            break;
        }

        let title = element_text(chunk).unwrap_or_default();
        if title.is_empty() {
            continue;
        }

        let href = opening_tag_attr(chunk, "href").map(|h| resolve_ddg_link(&h));
        if href.as_deref().is_some_and(|h| h.contains("duckduckgo.com/y.js")) {
            continue;
        }

        let snippet = chunk
            .split("class=\"result__snippet\"")
            .nth(1)
            .and_then(element_text)
            .unwrap_or_default();

        let url = href
            .filter(|h| !h.is_empty())
            .or_else(|| {
                chunk
                    .split("class=\"result__url\"")
                    .nth(1)
                    .and_then(element_text)
            })
            .unwrap_or_default();

        results.push(SearchHit {
            title,
            url,
            snippet,
        });
    }

    results
}

/// Text content of the element whose opening tag `rest` is positioned in.
fn element_text(rest: &str) -> Option<String> {
    let start = rest.find('>')? + 1;
    let inner = &rest[start..];
    let end = inner.find("</a>").or_else(|| inner.find("</"))?;
    let text = strip_tags(&inner[..end]);
    let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
    Some(html_decode(&text))
}

/// Attribute value from the remainder of the opening tag.
fn opening_tag_attr(rest: &str, attr: &str) -> Option<String> {
    let tag = &rest[..rest.find('>')?];
    let marker = format!("{}=\"", attr);
    let start = tag.find(&marker)? + marker.len();
    let end = tag[start..].find('"')?;
    Some(tag[start..start + end].to_string())
}

/// Unwrap DuckDuckGo's `/l/?uddg=<encoded>` redirect links.
fn resolve_ddg_link(href: &str) -> String {
    let href = html_decode(href);
    if let Some(pos) = href.find("uddg=") {
        let encoded = href[pos + 5..].split('&').next().unwrap_or_default();
        if let Ok(decoded) = urlencoding::decode(encoded) {
            return decoded.into_owned();
        }
    }
    if href.starts_with("//") {
        format!("https:{}", href)
    } else {
        href
    }
}

fn strip_tags(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut in_tag = false;
    for c in s.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    out
}

/// Basic HTML entity decoding.
pub(crate) fn html_decode(s: &str) -> String {
    s.replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#x27;", "'")
        .replace("&#39;", "'")
        .replace("&nbsp;", " ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
<div class="result results_links results_links_deep result--ad">
  <div class="links_main links_deep result__body">
    <h2 class="result__title"><a rel="nofollow" class="result__a" href="https://duckduckgo.com/y.js?ad_provider=x">Sponsored battery deals</a></h2>
  </div>
</div>
<div class="result results_links results_links_deep web-result">
  <div class="links_main links_deep result__body">
    <h2 class="result__title">
      <a rel="nofollow" class="result__a" href="//duckduckgo.com/l/?uddg=https%3A%2F%2Fexample.com%2Frecycling&amp;rut=abc">EV Battery <b>Recycling</b> Explained</a>
    </h2>
    <div class="result__extras__url"><a class="result__url" href="x">example.com/recycling</a></div>
    <a class="result__snippet" href="x">Lithium recovery rates reached <b>95%</b> in 2024 &amp; rising.</a>
  </div>
</div>
<div class="result results_links results_links_deep web-result">
  <div class="links_main links_deep result__body">
    <h2 class="result__title"><a rel="nofollow" class="result__a" href="https://news.example.org/story">Recyclers expand capacity</a></h2>
  </div>
</div>
<div class="result results_links results_links_deep web-result">
  <div class="links_main links_deep result__body">
    <h2 class="result__title"><a rel="nofollow" class="result__a" href="https://third.example.net/">Third result</a></h2>
    <a class="result__snippet" href="x">Another snippet.</a>
  </div>
</div>
"#;

    #[test]
    fn test_extract_results() {
        let hits = extract_ddg_results(PAGE, 10);
        assert_eq!(hits.len(), 3);

        assert_eq!(hits[0].title, "EV Battery Recycling Explained");
        assert_eq!(hits[0].url, "https://example.com/recycling");
        assert_eq!(
            hits[0].snippet,
            "Lithium recovery rates reached 95% in 2024 & rising."
        );

        // A result without a snippet must not borrow the next entry's snippet.
        assert_eq!(hits[1].title, "Recyclers expand capacity");
        assert_eq!(hits[1].snippet, "");
        assert_eq!(hits[1].url, "https://news.example.org/story");
    }

    #[test]
    fn test_extract_respects_max_results() {
        let hits = extract_ddg_results(PAGE, 2);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[1].title, "Recyclers expand capacity");
    }

    #[test]
    fn test_no_results_digest() {
        let hits = extract_ddg_results("<html><body>nothing here</body></html>", 5);
        assert!(hits.is_empty());
        let digest = format_digest("obscure query", &hits);
        assert_eq!(digest, "No search results found for query: obscure query");
    }

    #[test]
    fn test_digest_format() {
        let hits = vec![
            SearchHit {
                title: "Title A".to_string(),
                url: "https://a.example".to_string(),
                snippet: "Snippet A".to_string(),
            },
            SearchHit {
                title: "Title B".to_string(),
                url: "https://b.example".to_string(),
                snippet: String::new(),
            },
        ];
        let digest = format_digest("q", &hits);
        assert_eq!(
            digest,
            "Search results for 'q':\n\n1. Title A\n   Snippet A\n   URL: https://a.example\n\n2. Title B\n   URL: https://b.example\n\n"
        );
    }

    #[test]
    fn test_resolve_ddg_link() {
        assert_eq!(
            resolve_ddg_link("//duckduckgo.com/l/?uddg=https%3A%2F%2Fa.example%2Fx%3Fy%3D1&amp;rut=z"),
            "https://a.example/x?y=1"
        );
        assert_eq!(resolve_ddg_link("//example.com/x"), "https://example.com/x");
    }

    #[tokio::test]
    async fn test_empty_query_is_rejected() {
        let search = WebSearch::new(5);
        let err = search.search("   ").await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidInput(_)));
    }
}
