// src/fetch/mod.rs
// =============================================================================
// Page fetching and extraction.
//
// Submodules:
// - http: downloads pages (status handling, retry with backoff)
// - extract: turns HTML into title, body text and article links
//
// PageFetcher ties the two together: URL in, ExtractedPage out. It follows
// redirects itself, one hop at a time, and every hop has to stay on the
// site and pass the robots.txt gate before it is requested.
// =============================================================================

mod extract;
mod http;

pub use extract::{ExtractedPage, Extractor, InvalidSelector, ParseError};
pub use http::{
    build_client, build_policy_client, fetch_page, fetch_with_retry, FetchError, Hop, MAX_REDIRECTS,
};

use crate::backoff::ExponentialBackoff;
use crate::policy::PolicyGate;
use reqwest::Client;
use std::sync::Arc;
use tracing::debug;
use url::Url;

pub struct PageFetcher {
    client: Client,
    extractor: Extractor,
    gate: Arc<PolicyGate>,
    agent: String,
    retries: u32,
    backoff: ExponentialBackoff,
}

impl PageFetcher {
    // Parameters:
    //   gate: vets every redirect target
    //   agent: user agent matched against robots.txt on each hop
    pub fn new(
        client: Client,
        extractor: Extractor,
        gate: Arc<PolicyGate>,
        agent: impl Into<String>,
        retries: u32,
    ) -> Self {
        Self {
            client,
            extractor,
            gate,
            agent: agent.into(),
            retries,
            backoff: ExponentialBackoff::default(),
        }
    }

    pub fn with_backoff(mut self, backoff: ExponentialBackoff) -> Self {
        self.backoff = backoff;
        self
    }

    // Downloads `url` and extracts its title, text and article links
    //
    // Relative links are resolved against the URL the page was finally
    // served from, not the one that was asked for.
    pub async fn fetch_and_extract(&self, url: &str) -> Result<ExtractedPage, FetchError> {
        let mut current = Url::parse(url).map_err(|e| FetchError::InvalidUrl(format!("{url}: {e}")))?;
        let mut hops = 0;

        let html = loop {
            match fetch_with_retry(&self.client, &current, self.retries, self.backoff).await? {
                Hop::Page(html) => break html,
                Hop::Redirect(next) => {
                    hops += 1;
                    if hops > MAX_REDIRECTS {
                        return Err(FetchError::TooManyRedirects);
                    }
                    self.check_hop(&next)?;
                    debug!(from = %current, to = %next, "following redirect");
                    current = next;
                }
            }
        };

        Ok(self.extractor.extract(&html, &current)?)
    }

    // A redirect target gets the same checks as a link from the frontier
    fn check_hop(&self, next: &Url) -> Result<(), FetchError> {
        if !self.gate.is_same_site(next) {
            return Err(FetchError::OffSiteRedirect(next.to_string()));
        }
        if !self.gate.is_permitted(next.as_str(), &self.agent) {
            return Err(FetchError::RedirectDisallowed(next.to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExtractRules;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const AGENT: &str = "wikicrawl/0.1";

    fn fetcher_with_gate(server: &MockServer, gate: PolicyGate) -> PageFetcher {
        let site = Url::parse(&server.uri()).unwrap();
        let extractor = Extractor::new(&site, &ExtractRules::default()).unwrap();
        let client = Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .unwrap();
        PageFetcher::new(client, extractor, Arc::new(gate), AGENT, 0)
    }

    async fn fetcher_for(server: &MockServer) -> PageFetcher {
        let site = Url::parse(&server.uri()).unwrap();
        fetcher_with_gate(server, PolicyGate::allow_all(&site))
    }

    async fn mount_redirect(server: &MockServer, from: &str, to: &str) {
        Mock::given(method("GET"))
            .and(path(from))
            .respond_with(ResponseTemplate::new(301).insert_header("Location", to))
            .mount(server)
            .await;
    }

    async fn requests_to(server: &MockServer, wanted: &str) -> usize {
        server
            .received_requests()
            .await
            .unwrap()
            .iter()
            .filter(|r| r.url.path() == wanted)
            .count()
    }

    #[tokio::test]
    async fn test_fetch_and_extract() {
        let server = MockServer::start().await;
        let html = r#"<h1 id="firstHeading">Alpha</h1>
            <div id="mw-content-text"><p>Body <a href="/wiki/Beta">beta</a></p></div>"#;
        Mock::given(method("GET"))
            .and(path("/wiki/Alpha"))
            .respond_with(ResponseTemplate::new(200).set_body_string(html))
            .mount(&server)
            .await;

        let fetcher = fetcher_for(&server).await;
        let page = fetcher
            .fetch_and_extract(&format!("{}/wiki/Alpha", server.uri()))
            .await
            .unwrap();

        assert_eq!(page.title, "Alpha");
        assert_eq!(page.content, "Body beta");
        assert_eq!(page.links, vec![format!("{}/wiki/Beta", server.uri())]);
    }

    #[tokio::test]
    async fn test_unrecognized_page_is_parse_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<p>login required</p>"))
            .mount(&server)
            .await;

        let fetcher = fetcher_for(&server).await;
        let err = fetcher
            .fetch_and_extract(&format!("{}/wiki/Wall", server.uri()))
            .await
            .unwrap_err();

        assert!(matches!(err, FetchError::Parse(ParseError::MissingTitle)));
    }

    #[tokio::test]
    async fn test_invalid_url() {
        let server = MockServer::start().await;
        let fetcher = fetcher_for(&server).await;
        let err = fetcher.fetch_and_extract("no scheme").await.unwrap_err();
        assert!(matches!(err, FetchError::InvalidUrl(_)));
    }

    #[tokio::test]
    async fn test_allowed_redirect_is_followed() {
        let server = MockServer::start().await;
        mount_redirect(&server, "/wiki/Alias", "/wiki/Target").await;
        let html = r#"<h1 id="firstHeading">Target</h1>
            <div id="mw-content-text"><p>moved <a href="Sibling">s</a></p></div>"#;
        Mock::given(method("GET"))
            .and(path("/wiki/Target"))
            .respond_with(ResponseTemplate::new(200).set_body_string(html))
            .mount(&server)
            .await;

        let fetcher = fetcher_for(&server).await;
        let page = fetcher
            .fetch_and_extract(&format!("{}/wiki/Alias", server.uri()))
            .await
            .unwrap();

        assert_eq!(page.title, "Target");
        // Relative links resolve against where the page was served from
        assert_eq!(page.links, vec![format!("{}/wiki/Sibling", server.uri())]);
    }

    #[tokio::test]
    async fn test_redirect_into_disallowed_path_is_not_requested() {
        let server = MockServer::start().await;
        mount_redirect(&server, "/wiki/Alias", "/wiki/Secret").await;
        Mock::given(method("GET"))
            .and(path("/wiki/Secret"))
            .respond_with(ResponseTemplate::new(200).set_body_string("secret"))
            .mount(&server)
            .await;

        let site = Url::parse(&server.uri()).unwrap();
        let gate = PolicyGate::from_robots_txt(&site, "User-agent: *\nDisallow: /wiki/Secret\n");
        let fetcher = fetcher_with_gate(&server, gate);
        let err = fetcher
            .fetch_and_extract(&format!("{}/wiki/Alias", server.uri()))
            .await
            .unwrap_err();

        assert!(matches!(err, FetchError::RedirectDisallowed(ref to) if to.ends_with("/wiki/Secret")));
        assert_eq!(requests_to(&server, "/wiki/Secret").await, 0);
    }

    #[tokio::test]
    async fn test_off_site_redirect_is_refused() {
        let server = MockServer::start().await;
        let elsewhere = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("elsewhere"))
            .mount(&elsewhere)
            .await;
        mount_redirect(&server, "/wiki/Out", &format!("{}/wiki/Out", elsewhere.uri())).await;

        let fetcher = fetcher_for(&server).await;
        let err = fetcher
            .fetch_and_extract(&format!("{}/wiki/Out", server.uri()))
            .await
            .unwrap_err();

        assert!(matches!(err, FetchError::OffSiteRedirect(_)));
        assert!(elsewhere.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_redirect_loop_is_bounded() {
        let server = MockServer::start().await;
        mount_redirect(&server, "/wiki/Ping", "/wiki/Pong").await;
        mount_redirect(&server, "/wiki/Pong", "/wiki/Ping").await;

        let fetcher = fetcher_for(&server).await;
        let err = fetcher
            .fetch_and_extract(&format!("{}/wiki/Ping", server.uri()))
            .await
            .unwrap_err();

        assert!(matches!(err, FetchError::TooManyRedirects));
        // The first request plus MAX_REDIRECTS followed hops
        assert_eq!(
            server.received_requests().await.unwrap().len(),
            MAX_REDIRECTS + 1
        );
    }
}
