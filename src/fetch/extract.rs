// src/fetch/extract.rs
// =============================================================================
// This module pulls the useful parts out of an article's HTML.
//
// What we extract:
// - title:   text of the page heading (h1#firstHeading by default)
// - content: text of every paragraph inside the article body, joined by spaces
// - links:   absolute URLs of other articles on the same site
//
// Only the article body container is searched for paragraphs and links, so
// navigation menus, footers and sidebars never leak into a record.
//
// A page without a heading or without a body container is a ParseError.
// A page with a body but no article links is perfectly valid.
// =============================================================================

use crate::config::ExtractRules;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use thiserror::Error;
use url::Url;

/// The page structure wasn't what we expected
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("page has no title element")]
    MissingTitle,
    #[error("page has no content region")]
    MissingContent,
}

/// A user-supplied CSS selector that doesn't parse
#[derive(Debug, Clone, Error)]
#[error("invalid CSS selector '{0}'")]
pub struct InvalidSelector(pub String);

/// Everything we keep from one article
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedPage {
    pub title: String,
    pub content: String,
    pub links: Vec<String>,
}

// Compiled selectors plus the site the links must stay on
#[derive(Debug)]
pub struct Extractor {
    site: Url,
    article_prefix: String,
    content: Selector,
    title: Selector,
    paragraph: Selector,
    anchor: Selector,
}

impl Extractor {
    pub fn new(site: &Url, rules: &ExtractRules) -> Result<Self, InvalidSelector> {
        Ok(Self {
            site: site.clone(),
            article_prefix: rules.article_prefix.clone(),
            content: compile(&rules.content_selector)?,
            title: compile(&rules.title_selector)?,
            paragraph: compile(&rules.paragraph_selector)?,
            // Constant selector, known to be valid
            anchor: Selector::parse("a[href]").unwrap(),
        })
    }

    // Parses one page
    //
    // Parameters:
    //   html: the raw page markup
    //   page_url: where the page came from (relative links resolve against it)
    pub fn extract(&self, html: &str, page_url: &Url) -> Result<ExtractedPage, ParseError> {
        let document = Html::parse_document(html);

        let title = document
            .select(&self.title)
            .next()
            .map(element_text)
            .filter(|t| !t.is_empty())
            .ok_or(ParseError::MissingTitle)?;

        let region = document
            .select(&self.content)
            .next()
            .ok_or(ParseError::MissingContent)?;

        let content = region
            .select(&self.paragraph)
            .map(|p| p.text().collect::<String>().trim().to_string())
            .filter(|p| !p.is_empty())
            .collect::<Vec<_>>()
            .join(" ");

        Ok(ExtractedPage {
            title,
            content,
            links: self.article_links(region, page_url),
        })
    }

    // Collects article links from the body, first occurrence wins
    fn article_links(&self, region: ElementRef<'_>, page_url: &Url) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut links = Vec::new();

        for element in region.select(&self.anchor) {
            let Some(href) = element.value().attr("href") else {
                continue;
            };
            if let Some(link) = self.resolve_article_link(page_url, href) {
                if seen.insert(link.clone()) {
                    links.push(link);
                }
            }
        }

        links
    }

    // Resolves an href and keeps it only if it points at an article
    //
    // Rejected:
    // - anchors and non-HTTP schemes (mailto:, javascript:, ...)
    // - anything on another origin
    // - paths outside the article prefix, or the bare prefix itself
    // - namespaced targets like /wiki/Special:Random or /wiki/File%3Ax.png
    // - URLs with a query string (edit links, old revisions)
    //
    // `base` is the URL the page was served from, as in a browser. For the
    // root-relative /wiki/... hrefs MediaWiki emits this is the same as
    // joining onto the site root.
    pub fn resolve_article_link(&self, base: &Url, href: &str) -> Option<String> {
        let href = href.trim();
        if href.is_empty()
            || href.starts_with('#')
            || href.starts_with("mailto:")
            || href.starts_with("tel:")
            || href.starts_with("javascript:")
        {
            return None;
        }

        let mut url = base.join(href).ok()?;
        url.set_fragment(None);

        if url.origin() != self.site.origin() || url.query().is_some() {
            return None;
        }

        let title = url.path().strip_prefix(self.article_prefix.as_str())?;
        if title.is_empty() || title.contains(':') || title.to_ascii_lowercase().contains("%3a") {
            return None;
        }

        Some(url.to_string())
    }
}

fn compile(selector: &str) -> Result<Selector, InvalidSelector> {
    Selector::parse(selector).map_err(|_| InvalidSelector(selector.to_string()))
}

// Text of an element with whitespace runs collapsed
fn element_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

// -----------------------------------------------------------------------------
// NOTES:
//
// 1. Why scope everything to the content region?
//    - MediaWiki pages repeat dozens of navigation links on every page
//    - Following those would turn a topical crawl into a crawl of the sidebar
//
// 2. Why is a missing heading an error rather than an empty title?
//    - An error page or a login wall usually has neither
//    - Storing it as an "article" with an empty title would poison the data
//
// 3. Why does ParseError derive PartialEq?
//    - Tests compare errors directly with assert_eq!
// -----------------------------------------------------------------------------
