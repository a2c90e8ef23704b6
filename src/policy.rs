// src/policy.rs
// =============================================================================
// The policy gate: robots.txt evaluation for the crawled site.
//
// robots.txt is fetched exactly once per crawl and then shared read-only by
// every worker, so no locking is needed.
//
// How the fetch result maps to rules:
// - 2xx with a UTF-8 body      -> parsed rules (Google's matcher)
// - 401 / 403                  -> everything disallowed
// - any other 4xx (e.g. 404)   -> everything allowed (the site has no policy)
// - 5xx, transport failure, or
//   a body that isn't UTF-8    -> everything disallowed (fail closed)
//
// Failing closed is deliberate: if we can't read the site's policy we don't
// get to guess what it says.
// =============================================================================

use reqwest::{Client, StatusCode};
use robotstxt::DefaultMatcher;
use thiserror::Error;
use tracing::{debug, info, warn};
use url::{Origin, Url};

/// Why robots.txt could not be turned into rules
#[derive(Debug, Error)]
pub enum PolicyFetchError {
    #[error("robots.txt unreachable: {0}")]
    Unreachable(String),
    #[error("robots.txt returned HTTP {0}")]
    Status(u16),
    #[error("robots.txt body is not valid UTF-8")]
    Unparsable,
}

#[derive(Debug, Clone)]
enum Rules {
    AllowAll,
    DenyAll,
    Parsed(String),
}

#[derive(Debug, Clone)]
pub struct PolicyGate {
    origin: Origin,
    rules: Rules,
    fail_closed: bool,
}

impl PolicyGate {
    // Gate built from a robots.txt body we already have
    pub fn from_robots_txt(site: &Url, body: impl Into<String>) -> Self {
        Self::with_rules(site, Rules::Parsed(body.into()))
    }

    pub fn allow_all(site: &Url) -> Self {
        Self::with_rules(site, Rules::AllowAll)
    }

    pub fn deny_all(site: &Url) -> Self {
        Self::with_rules(site, Rules::DenyAll)
    }

    fn with_rules(site: &Url, rules: Rules) -> Self {
        Self {
            origin: site.origin(),
            rules,
            fail_closed: false,
        }
    }

    // Fetches `/robots.txt` from the site once and builds the gate
    //
    // Never fails: a policy we can't read becomes a deny-all gate.
    pub async fn load(client: &Client, site: &Url) -> Self {
        let robots_url = match site.join("/robots.txt") {
            Ok(url) => url,
            Err(e) => {
                warn!(site = %site, error = %e, "cannot build robots.txt URL, disallowing all");
                return Self::failed_closed(site);
            }
        };

        match fetch_rules(client, robots_url.clone()).await {
            Ok(rules) => {
                info!(url = %robots_url, policy = rules.describe(), "loaded robots policy");
                Self::with_rules(site, rules)
            }
            Err(e) => {
                warn!(url = %robots_url, error = %e, "robots policy unavailable, disallowing all");
                Self::failed_closed(site)
            }
        }
    }

    fn failed_closed(site: &Url) -> Self {
        Self {
            fail_closed: true,
            ..Self::deny_all(site)
        }
    }

    /// True when the gate denies everything because robots.txt was unusable
    pub fn is_fail_closed(&self) -> bool {
        self.fail_closed
    }

    /// True when `url` is on the site this gate speaks for
    pub fn is_same_site(&self, url: &Url) -> bool {
        url.origin() == self.origin
    }

    // Whether `agent` may fetch `url`
    //
    // URLs on another origin are never permitted; this gate only speaks
    // for its own site.
    pub fn is_permitted(&self, url: &str, agent: &str) -> bool {
        let Ok(parsed) = Url::parse(url) else {
            return false;
        };
        if parsed.origin() != self.origin {
            debug!(url, "off-site URL rejected by policy gate");
            return false;
        }

        match &self.rules {
            Rules::AllowAll => true,
            Rules::DenyAll => false,
            Rules::Parsed(body) => {
                DefaultMatcher::default().one_agent_allowed_by_robots(body, agent_token(agent), url)
            }
        }
    }
}

impl Rules {
    fn describe(&self) -> &'static str {
        match self {
            Rules::AllowAll => "allow-all",
            Rules::DenyAll => "deny-all",
            Rules::Parsed(_) => "parsed",
        }
    }
}

async fn fetch_rules(client: &Client, robots_url: Url) -> Result<Rules, PolicyFetchError> {
    let response = client
        .get(robots_url)
        .send()
        .await
        .map_err(|e| PolicyFetchError::Unreachable(e.to_string()))?;

    let status = response.status();
    if status.is_success() {
        let bytes = response
            .bytes()
            .await
            .map_err(|e| PolicyFetchError::Unreachable(e.to_string()))?;
        let body = String::from_utf8(bytes.to_vec()).map_err(|_| PolicyFetchError::Unparsable)?;
        Ok(Rules::Parsed(body))
    } else if matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
        Ok(Rules::DenyAll)
    } else if status.is_client_error() {
        Ok(Rules::AllowAll)
    } else {
        Err(PolicyFetchError::Status(status.as_u16()))
    }
}

// robots.txt groups are keyed by product token, so "wikicrawl/0.1 (+info)"
// is matched as "wikicrawl"
fn agent_token(agent: &str) -> &str {
    let end = agent
        .find(|c: char| !(c.is_ascii_alphabetic() || c == '-' || c == '_'))
        .unwrap_or(agent.len());
    if end == 0 {
        "*"
    } else {
        &agent[..end]
    }
}
