use std::collections::{HashMap, HashSet};
use std::sync::Mutex as StdMutex;
use std::time::Duration;

use futures::FutureExt;
use futures::future::BoxFuture;
use reqwest::Client;
use scraper::{Html, Selector};
use tracing::debug;
use url::Url;

use crate::error::{ExploreError, Result};

/// Opaque identifier for a graph vertex. URLs in production, but the
/// engine performs no normalization and compares nodes by exact value.
pub type Node = String;

/// Link-extraction plug-in point.
///
/// `expand` may return duplicates, nodes the engine has already seen, or
/// nothing at all; deduplication is the engine's job, not the
/// extractor's. An `Err` is treated like an empty batch whose failure is
/// counted in the run stats.
pub trait Extractor: Send + Sync {
    fn expand<'a>(&'a self, node: &'a str) -> BoxFuture<'a, Result<Vec<Node>>>;
}

/// Extractor that fetches a page over HTTP and returns the resolved
/// `a[href]` links found in it.
///
/// Non-HTML responses and non-success statuses expand to an empty batch;
/// only transport-level failures surface as errors.
pub struct HttpExtractor {
    client: Client,
    same_host_only: bool,
}

impl HttpExtractor {
    pub fn new() -> Result<Self> {
        Self::with_timeout(10)
    }

    pub fn with_timeout(timeout_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("strider/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(timeout_secs.div_ceil(2)))
            .pool_max_idle_per_host(50)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(60))
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()?;

        Ok(Self {
            client,
            same_host_only: true,
        })
    }

    /// When true (the default), links leaving the fetched page's host
    /// are dropped instead of being handed back for scheduling.
    pub fn with_same_host_only(mut self, same_host_only: bool) -> Self {
        self.same_host_only = same_host_only;
        self
    }

    async fn fetch_links(&self, node: &str) -> Result<Vec<Node>> {
        let url = Url::parse(node)
            .map_err(|e| ExploreError::InvalidUrl(format!("{}: {}", node, e)))?;

        debug!("fetching {}", url);
        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            debug!("{} returned {}, treating as a leaf", node, status);
            return Ok(Vec::new());
        }

        let is_html = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .map(|ct| ct.contains("text/html"))
            .unwrap_or(false);
        if !is_html {
            return Ok(Vec::new());
        }

        let body = response.text().await?;
        Ok(extract_links(&body, node, self.same_host_only))
    }
}

impl Extractor for HttpExtractor {
    fn expand<'a>(&'a self, node: &'a str) -> BoxFuture<'a, Result<Vec<Node>>> {
        self.fetch_links(node).boxed()
    }
}

/// Extracts and resolves `a[href]` links from an HTML document.
fn extract_links(html: &str, page_url: &str, same_host_only: bool) -> Vec<Node> {
    let document = Html::parse_document(html);
    let selector = Selector::parse("a[href]").unwrap();

    let Ok(base) = Url::parse(page_url) else {
        return Vec::new();
    };
    let base_host = base.host_str().map(str::to_string);

    let mut links = Vec::new();
    for element in document.select(&selector) {
        let Some(href) = element.value().attr("href") else {
            continue;
        };
        let Some(resolved) = resolve_link(&base, href) else {
            continue;
        };
        if same_host_only {
            let host = Url::parse(&resolved)
                .ok()
                .and_then(|u| u.host_str().map(str::to_string));
            if host != base_host {
                debug!("dropping cross-host link {}", resolved);
                continue;
            }
        }
        links.push(resolved);
    }
    links
}

/// Resolves one href against the page URL. Fragment-only links and
/// non-navigable schemes are skipped; fragments are stripped so the same
/// page is not rediscovered under different anchors.
fn resolve_link(base: &Url, href: &str) -> Option<String> {
    if href.is_empty()
        || href.starts_with('#')
        || href.starts_with("javascript:")
        || href.starts_with("mailto:")
        || href.starts_with("tel:")
    {
        return None;
    }

    let mut resolved = base.join(href).ok()?;
    resolved.set_fragment(None);

    match resolved.scheme() {
        "http" | "https" => Some(resolved.to_string()),
        _ => None,
    }
}

/// Deterministic extractor backed by an in-memory adjacency map.
///
/// Stands in for the network in tests and demos: nodes absent from the
/// map expand to nothing, optional latency simulates a slow fetch, nodes
/// in the failure set return an error, and every invocation is counted
/// so tests can assert each node is expanded at most once.
#[derive(Default)]
pub struct FixtureExtractor {
    graph: HashMap<Node, Vec<Node>>,
    failures: HashSet<Node>,
    latency: Option<Duration>,
    calls: StdMutex<HashMap<Node, usize>>,
}

impl FixtureExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_edges<I, S>(edges: I) -> Self
    where
        I: IntoIterator<Item = (S, Vec<S>)>,
        S: Into<Node>,
    {
        let graph = edges
            .into_iter()
            .map(|(node, links)| {
                (node.into(), links.into_iter().map(Into::into).collect())
            })
            .collect();
        Self {
            graph,
            ..Self::default()
        }
    }

    /// Nodes whose expansion should fail with an extraction error.
    pub fn with_failures<I, S>(mut self, nodes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Node>,
    {
        self.failures = nodes.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Number of times `expand` was invoked for `node`.
    pub fn call_count(&self, node: &str) -> usize {
        self.calls.lock().unwrap().get(node).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().values().sum()
    }
}

impl Extractor for FixtureExtractor {
    fn expand<'a>(&'a self, node: &'a str) -> BoxFuture<'a, Result<Vec<Node>>> {
        async move {
            {
                let mut calls = self.calls.lock().unwrap();
                *calls.entry(node.to_string()).or_insert(0) += 1;
            }
            if let Some(latency) = self.latency {
                tokio::time::sleep(latency).await;
            }
            if self.failures.contains(node) {
                return Err(ExploreError::ExtractionFailed(format!(
                    "simulated fetch failure for {}",
                    node
                )));
            }
            Ok(self.graph.get(node).cloned().unwrap_or_default())
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_resolve_absolute_link() {
        let base = Url::parse("https://example.com/page").unwrap();
        let result = resolve_link(&base, "https://other.com");
        assert_eq!(result, Some("https://other.com/".to_string()));
    }

    #[test]
    fn test_resolve_relative_link() {
        let base = Url::parse("https://example.com/page").unwrap();
        let result = resolve_link(&base, "/docs");
        assert_eq!(result, Some("https://example.com/docs".to_string()));
    }

    #[test]
    fn test_resolve_strips_fragment() {
        let base = Url::parse("https://example.com/page").unwrap();
        let result = resolve_link(&base, "/docs#install");
        assert_eq!(result, Some("https://example.com/docs".to_string()));
    }

    #[test]
    fn test_skip_anchor() {
        let base = Url::parse("https://example.com/page").unwrap();
        assert_eq!(resolve_link(&base, "#section"), None);
    }

    #[test]
    fn test_skip_mailto_and_friends() {
        let base = Url::parse("https://example.com/page").unwrap();
        assert_eq!(resolve_link(&base, "mailto:test@example.com"), None);
        assert_eq!(resolve_link(&base, "tel:+1234567890"), None);
        assert_eq!(resolve_link(&base, "javascript:void(0)"), None);
        assert_eq!(resolve_link(&base, ""), None);
    }

    #[test]
    fn test_skip_non_http_scheme() {
        let base = Url::parse("https://example.com/page").unwrap();
        assert_eq!(resolve_link(&base, "ftp://example.com/file"), None);
    }

    #[test]
    fn test_extract_links_same_host_filter() {
        let html = r#"<html><body>
            <a href="/local">Local</a>
            <a href="https://elsewhere.org/away">External</a>
        </body></html>"#;

        let same_host = extract_links(html, "https://example.com/", true);
        assert_eq!(same_host, vec!["https://example.com/local".to_string()]);

        let all_hosts = extract_links(html, "https://example.com/", false);
        assert_eq!(all_hosts.len(), 2);
    }

    #[tokio::test]
    async fn test_http_extractor_finds_links() {
        let mock_server = MockServer::start().await;

        let html = format!(
            r##"<html><body>
                <a href="{}/page1">Page 1</a>
                <a href="/page2">Page 2</a>
                <a href="#top">Anchor</a>
            </body></html>"##,
            mock_server.uri()
        );

        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/html")
                    .set_body_bytes(html.as_bytes()),
            )
            .mount(&mock_server)
            .await;

        let extractor = HttpExtractor::new().unwrap();
        let links = extractor
            .expand(&format!("{}/", mock_server.uri()))
            .await
            .unwrap();

        assert_eq!(
            links,
            vec![
                format!("{}/page1", mock_server.uri()),
                format!("{}/page2", mock_server.uri()),
            ]
        );
    }

    #[tokio::test]
    async fn test_http_extractor_ignores_non_html() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/data.json"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "application/json")
                    .set_body_bytes(br#"{"a": "http://example.com"}"#),
            )
            .mount(&mock_server)
            .await;

        let extractor = HttpExtractor::new().unwrap();
        let links = extractor
            .expand(&format!("{}/data.json", mock_server.uri()))
            .await
            .unwrap();

        assert!(links.is_empty());
    }

    #[tokio::test]
    async fn test_http_extractor_treats_error_status_as_leaf() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mock_server)
            .await;

        let extractor = HttpExtractor::new().unwrap();
        let links = extractor
            .expand(&format!("{}/missing", mock_server.uri()))
            .await
            .unwrap();

        assert!(links.is_empty());
    }

    #[tokio::test]
    async fn test_http_extractor_rejects_unparseable_node() {
        let extractor = HttpExtractor::new().unwrap();
        let result = extractor.expand("not a url").await;
        assert!(matches!(result, Err(ExploreError::InvalidUrl(_))));
    }

    #[tokio::test]
    async fn test_fixture_extractor_counts_calls() {
        let fixture = FixtureExtractor::from_edges([("a", vec!["b", "c"])]);

        assert_eq!(fixture.expand("a").await.unwrap(), vec!["b", "c"]);
        assert!(fixture.expand("b").await.unwrap().is_empty());
        assert_eq!(fixture.expand("a").await.unwrap().len(), 2);

        assert_eq!(fixture.call_count("a"), 2);
        assert_eq!(fixture.call_count("b"), 1);
        assert_eq!(fixture.call_count("c"), 0);
        assert_eq!(fixture.total_calls(), 3);
    }

    #[tokio::test]
    async fn test_fixture_extractor_failures() {
        let fixture =
            FixtureExtractor::from_edges([("a", vec!["b"])]).with_failures(["b"]);

        assert!(fixture.expand("a").await.is_ok());
        assert!(matches!(
            fixture.expand("b").await,
            Err(ExploreError::ExtractionFailed(_))
        ));
    }
}
