// src/fetch/http.rs
// =============================================================================
// This module downloads article pages.
//
// Key functionality:
// - One shared reqwest Client (connection pooling, user agent, timeout)
// - Redirects are NOT followed by the client; a 3xx comes back as
//   Hop::Redirect so the caller can vet the next URL before requesting it
// - Non-2xx, non-3xx responses become FetchError::Http(status)
// - Transport problems become FetchError::Network
// - Transient failures (network errors, 429, 5xx) are retried with
//   exponential backoff; everything else fails immediately
// =============================================================================

use super::extract::ParseError;
use crate::backoff::ExponentialBackoff;
use crate::config::CrawlConfig;
use reqwest::header::LOCATION;
use reqwest::{Client, StatusCode};
use thiserror::Error;
use tracing::debug;
use url::Url;

/// How many redirects one page fetch may follow
pub const MAX_REDIRECTS: usize = 5;

/// Why a page could not be turned into a record
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP {0}")]
    Http(u16),
    #[error("network error: {0}")]
    Network(String),
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
    #[error("redirect to {0} is disallowed by robots.txt")]
    RedirectDisallowed(String),
    #[error("redirect to {0} leaves the site")]
    OffSiteRedirect(String),
    #[error("too many redirects")]
    TooManyRedirects,
    #[error(transparent)]
    Parse(#[from] ParseError),
}

impl FetchError {
    // Worth another attempt?
    pub fn is_transient(&self) -> bool {
        match self {
            FetchError::Network(_) => true,
            FetchError::Http(code) => {
                *code == StatusCode::TOO_MANY_REQUESTS.as_u16() || (500..600).contains(code)
            }
            FetchError::InvalidUrl(_)
            | FetchError::RedirectDisallowed(_)
            | FetchError::OffSiteRedirect(_)
            | FetchError::TooManyRedirects
            | FetchError::Parse(_) => false,
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(error: reqwest::Error) -> Self {
        match error.status() {
            Some(status) => FetchError::Http(status.as_u16()),
            None => FetchError::Network(error.to_string()),
        }
    }
}

/// What a single request produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Hop {
    /// A 2xx response body
    Page(String),
    /// A 3xx response, with `Location` resolved against the request URL
    Redirect(Url),
}

// Builds the client every worker shares for article pages
//
// Redirects are switched off here: each hop has to pass the same-site and
// robots.txt checks, which only the caller can do.
pub fn build_client(config: &CrawlConfig) -> reqwest::Result<Client> {
    Client::builder()
        .user_agent(config.user_agent.as_str())
        .timeout(config.timeout)
        .redirect(reqwest::redirect::Policy::none())
        .build()
}

// Builds the client used for the one robots.txt request
//
// robots.txt itself is allowed to redirect (http -> https is common).
pub fn build_policy_client(config: &CrawlConfig) -> reqwest::Result<Client> {
    Client::builder()
        .user_agent(config.user_agent.as_str())
        .timeout(config.timeout)
        .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
        .build()
}

// Sends one GET and returns either the page or where it redirects to
pub async fn fetch_page(client: &Client, url: &Url) -> Result<Hop, FetchError> {
    let response = client.get(url.clone()).send().await?;
    let status = response.status();

    if status.is_redirection() {
        // A 3xx without a usable Location (304, for one) is just a bad status
        let location = response
            .headers()
            .get(LOCATION)
            .and_then(|value| value.to_str().ok())
            .ok_or(FetchError::Http(status.as_u16()))?;
        let next = url
            .join(location)
            .map_err(|e| FetchError::InvalidUrl(format!("{location}: {e}")))?;
        return Ok(Hop::Redirect(next));
    }

    if !status.is_success() {
        return Err(FetchError::Http(status.as_u16()));
    }

    Ok(Hop::Page(response.text().await?))
}

// Fetches a page, retrying transient failures up to `retries` extra times
pub async fn fetch_with_retry(
    client: &Client,
    url: &Url,
    retries: u32,
    backoff: ExponentialBackoff,
) -> Result<Hop, FetchError> {
    let mut attempt = 0;
    loop {
        match fetch_page(client, url).await {
            Err(e) if e.is_transient() && attempt < retries => {
                let wait = backoff.delay(attempt);
                debug!(url = %url, error = %e, attempt, ?wait, "transient fetch failure, retrying");
                tokio::time::sleep(wait).await;
                attempt += 1;
            }
            result => return result,
        }
    }
}
