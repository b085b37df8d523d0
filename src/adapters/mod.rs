//! Site adapters: one implementation of `SiteAdapter` per supported site.

pub mod nifty;

use cached_client::Fetcher;
use encoding_rs::Encoding;
use error::AdapterError;
use regex::Regex;
use reqwest::Url;
use std::borrow::Cow;
use story::Story;
use tracing::Span;

pub use self::nifty::NiftyOrgAdapter;

/// Capabilities every site adapter provides to the downloader.
pub trait SiteAdapter {
    fn site_domain(&self) -> &'static str;

    fn accept_domains(&self) -> &'static [&'static str];

    /// Space separated list of story URLs the adapter understands.
    fn site_example_urls(&self) -> &'static str;

    fn site_url_pattern(&self) -> &Regex;

    /// Whether chapter pages may be served from the page cache.
    fn use_pagecache(&self) -> bool {
        false
    }

    fn story(&self) -> &Story;

    /// Fetches the story's landing page and fills in metadata and the chapter list.
    fn extract_chapter_urls_and_metadata(&mut self) -> Result<(), AdapterError>;

    /// Returns one chapter as a complete, pretty-printed HTML document.
    fn get_chapter_text(&self, url: &Url) -> Result<String, AdapterError>;
}

/// Per-story settings shared by all adapters.
#[derive(Debug, Clone)]
pub struct AdapterConfig {
    /// The user confirmed they may download adult content.
    pub is_adult: bool,
    /// Encodings tried in order when decoding pages; the first one that decodes without errors wins.
    pub decode: Vec<&'static Encoding>,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            is_adult: false,
            decode: ["windows-1252", "utf-8", "iso-8859-1"]
                .iter()
                .filter_map(|label| Encoding::for_label(label.as_bytes()))
                .collect(),
        }
    }
}

/// Decodes `body` with the first encoding that accepts it without replacement characters.
pub fn decode_page(body: &[u8], encodings: &[&'static Encoding]) -> Option<String> {
    encodings
        .iter()
        .find_map(|encoding| encoding.decode_without_bom_handling_and_without_replacement(body))
        .map(Cow::into_owned)
}

/// Picks the adapter responsible for `url` based on its host.
pub fn adapter_for_url<'a>(
    url: &str,
    config: AdapterConfig,
    fetcher: &'a dyn Fetcher,
    span: Span,
) -> Result<Box<dyn SiteAdapter + 'a>, AdapterError> {
    let parsed = Url::parse(url).map_err(|_| AdapterError::UnknownSite(url.to_string()))?;
    let host = parsed.host_str().unwrap_or_default();

    if NiftyOrgAdapter::ACCEPT_DOMAINS.contains(&host) {
        Ok(Box::new(NiftyOrgAdapter::new(url, config, fetcher, span)?))
    } else {
        Err(AdapterError::UnknownSite(url.to_string()))
    }
}
