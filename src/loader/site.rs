//! Web page loader using the `scraper` crate.
//!
//! Fetches the page and keeps its `<title>` plus every visible text node of
//! the `<body>`. Script, style and template contents are dropped. Pages that
//! answer with an anti-bot interstitial are passed through as-is; the prompt
//! tells the model how to react to them.

use std::time::Duration;

use scraper::{Html, Selector};

use super::error::LoadResult;
use super::fetch::fetch_text;
use super::{DocumentLoader, DocumentType, LoaderSettings, RawInput, require_url};

/// Elements whose text never reaches the reader.
const HIDDEN_TAGS: &[&str] = &["script", "style", "noscript", "template", "svg", "head"];

/// Web page loader backed by `ureq` + `scraper`.
pub struct SiteLoader {
    timeout: Duration,
}

impl SiteLoader {
    pub fn new(settings: &LoaderSettings) -> Self {
        Self {
            timeout: settings.http_timeout,
        }
    }
}

impl DocumentLoader for SiteLoader {
    fn load(&self, input: &RawInput) -> LoadResult<String> {
        let url = require_url(DocumentType::Site, input)?;
        let html = fetch_text(url, self.timeout)?;
        Ok(extract_page_text(&html))
    }
}

/// Reduce an HTML page to its title and visible text, one text run per line.
pub fn extract_page_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let mut lines = Vec::new();

    if let Ok(sel) = Selector::parse("title") {
        if let Some(el) = document.select(&sel).next() {
            let title = collapse_whitespace(&el.text().collect::<String>());
            if !title.is_empty() {
                lines.push(title);
            }
        }
    }

    let body = Selector::parse("body")
        .ok()
        .and_then(|sel| document.select(&sel).next())
        .unwrap_or_else(|| document.root_element());

    for node in body.descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let hidden = node.ancestors().any(|a| {
            a.value()
                .as_element()
                .is_some_and(|e| HIDDEN_TAGS.contains(&e.name()))
        });
        if hidden {
            continue;
        }
        let run = collapse_whitespace(text);
        if !run.is_empty() {
            lines.push(run);
        }
    }

    lines.join("\n")
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
