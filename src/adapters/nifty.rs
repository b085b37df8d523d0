//! Adapter for www.nifty.org.
//!
//! Stories are either a single plain-text page, or a directory whose index
//! lists every part newest first. The server redirects to the directory form
//! (trailing `/`) only for multi-part works.

use super::{decode_page, AdapterConfig, SiteAdapter};
use cached_client::{Fetcher, RawPage};
use chrono::NaiveDate;
use dates::last_modified;
use error::AdapterError;
use html_utils::{parse, prettify};
use normalize::{html_shell, normalize_text, normalize_title};
use regex::Regex;
use reqwest::{StatusCode, Url};
use scraper::{ElementRef, Html, Selector};
use story::{ChapterDescriptor, Story};
use tracing::{debug, warn, Span};

lazy_static! {
    static ref URL_PATTERN: Regex = Regex::new(
        r"^https?://www\.nifty\.org/nifty/(?P<genre>[a-zA-Z0-9_-]+)/(?P<category>[a-zA-Z0-9_-]+)/(?P<title>[a-zA-Z0-9_-]+)/?$"
    ).unwrap();
    static ref FROM_LINE_REGEX: Regex = Regex::new(r"From:(?P<author>.*)").unwrap();
    static ref EMAIL_REGEX: Regex = Regex::new(r"(?P<author>[a-zA-Z0-9_.+-]+@[a-zA-Z0-9-]+\.[a-zA-Z0-9-.]+)").unwrap();
    static ref ANCHOR_TEXT_REGEX: Regex = Regex::new(r"<a.*?>(?P<author>|.*)</a>").unwrap();
}

lazy_static! {
    static ref CHAPTER_LINK_SELECTOR: Selector = Selector::parse("td > a").unwrap();
    static ref META_AUTHOR_SELECTOR: Selector = Selector::parse(r#"meta[name="author"]"#).unwrap();
    static ref EMAIL_LINK_SELECTOR: Selector = Selector::parse("a[email]").unwrap();
}

/// Outcome of looking at a story's landing page.
#[derive(Debug, PartialEq)]
pub enum Discovery {
    SinglePage,
    /// Chapters in reading order.
    MultiChapter(Vec<ChapterDescriptor>),
}

/// Decides whether a landing page is a chapter index and, if so, lists its chapters.
///
/// `final_url` is the URL after redirects; only index pages end in `/`.
/// Index pages list the newest part first, so the links are reversed.
pub fn discover(landing_page: &str, final_url: &Url) -> Discovery {
    if !final_url.as_str().ends_with('/') {
        return Discovery::SinglePage;
    }

    let doc = Html::parse_document(landing_page);
    let links: Vec<ElementRef> = doc.select(&CHAPTER_LINK_SELECTOR).collect();
    let chapters = links
        .into_iter()
        .rev()
        .filter_map(|link| {
            let href = match link.value().attr("href") {
                Some(href) => href,
                None => {
                    warn!("Skipping chapter link without href");
                    return None;
                }
            };
            match final_url.join(href) {
                Ok(url) => Some(ChapterDescriptor {
                    title: normalize_title(&link.text().collect::<String>()),
                    url,
                }),
                Err(err) => {
                    warn!(href, error = %err, "Skipping unresolvable chapter link");
                    None
                }
            }
        })
        .collect();

    Discovery::MultiChapter(chapters)
}

/// Guesses the author of a story page. Never fails; falls back to `"Unknown"`.
///
/// Most stories are e-mails, so a `From:` line wins. It is returned untrimmed.
pub fn find_author(text: &str) -> String {
    if let Some(captures) = FROM_LINE_REGEX.captures(text) {
        return captures["author"].to_string();
    }

    let doc = parse(text);
    if let Some(content) = doc
        .select(&META_AUTHOR_SELECTOR)
        .next()
        .and_then(|meta| meta.value().attr("content"))
    {
        return content.to_string();
    }
    if let Some(email) = doc
        .select(&EMAIL_LINK_SELECTOR)
        .next()
        .and_then(|link| link.value().attr("email"))
    {
        return email.to_string();
    }

    if let Some(captures) = EMAIL_REGEX.captures(text) {
        return captures["author"].to_string();
    }
    if let Some(captures) = ANCHOR_TEXT_REGEX.captures(text) {
        return captures["author"].to_string();
    }

    "Unknown".to_string()
}

/// Genre, category and title slug taken from a story URL.
#[derive(Debug)]
struct StoryPath {
    genre: String,
    category: String,
    slug: String,
}

pub struct NiftyOrgAdapter<'a> {
    url: Url,
    path: StoryPath,
    config: AdapterConfig,
    fetcher: &'a dyn Fetcher,
    story: Story,
    span: Span,
}

impl<'a> NiftyOrgAdapter<'a> {
    pub const SITE_DOMAIN: &'static str = "www.nifty.org";
    pub const ACCEPT_DOMAINS: &'static [&'static str] = &["www.nifty.org"];
    pub const SITE_EXAMPLE_URLS: &'static str =
        "http://www.nifty.org/nifty/genre/category/multi-part-story/ http://www.nifty.org/nifty/genre/category/story-title";

    /// Creates the adapter for one story. Log events are recorded inside `span`.
    pub fn new(url: &str, config: AdapterConfig, fetcher: &'a dyn Fetcher, span: Span) -> Result<Self, AdapterError> {
        let invalid = || AdapterError::InvalidStoryUrl {
            url: url.to_string(),
            site: Self::SITE_DOMAIN,
            example: Self::SITE_EXAMPLE_URLS,
        };
        let captures = URL_PATTERN.captures(url).ok_or_else(invalid)?;
        let path = StoryPath {
            genre: captures["genre"].to_string(),
            category: captures["category"].to_string(),
            slug: captures["title"].to_string(),
        };
        let url = Url::parse(url).map_err(|_| invalid())?;

        Ok(Self {
            url,
            path,
            config,
            fetcher,
            story: Story::new("nifty"),
            span,
        })
    }

    fn decode(&self, page: &RawPage) -> Result<String, AdapterError> {
        decode_page(&page.body, &self.config.decode).ok_or_else(|| AdapterError::FailedToDownload(page.final_url.clone()))
    }

    /// Fetches `url` bypassing the cache, reading its date from `last-modified`.
    fn fetch_dated(&self, url: &Url) -> Result<(RawPage, NaiveDate), AdapterError> {
        let page = self.fetcher.fetch(url, false)?.into_contents();
        let date = last_modified(&page.headers).map_err(|source| AdapterError::Date {
            url: url.clone(),
            source,
        })?;
        Ok((page, date))
    }

    fn fetch_landing_page(&self) -> Result<(RawPage, NaiveDate), AdapterError> {
        match self.fetch_dated(&self.url) {
            Err(AdapterError::Fetch(ref err)) if err.status() == Some(StatusCode::NOT_FOUND) => {
                Err(AdapterError::StoryDoesNotExist(self.url.clone()))
            }
            other => other,
        }
    }

    fn chapter_html(&self, url: &Url) -> Result<String, AdapterError> {
        let res = self.fetcher.fetch(url, self.use_pagecache())?;
        debug!(%url, cached = res.is_cached(), "Fetched chapter");
        let page = self.decode(res.contents())?;

        let doc = if page.contains("</html>") {
            parse(&page)
        } else {
            let body = normalize_text(&page);
            parse(&html_shell(&self.story.title, &self.story.author, &body))
        };
        Ok(prettify(&doc))
    }
}

impl<'a> SiteAdapter for NiftyOrgAdapter<'a> {
    fn site_domain(&self) -> &'static str {
        Self::SITE_DOMAIN
    }

    fn accept_domains(&self) -> &'static [&'static str] {
        Self::ACCEPT_DOMAINS
    }

    fn site_example_urls(&self) -> &'static str {
        Self::SITE_EXAMPLE_URLS
    }

    fn site_url_pattern(&self) -> &Regex {
        &URL_PATTERN
    }

    fn use_pagecache(&self) -> bool {
        true
    }

    fn story(&self) -> &Story {
        &self.story
    }

    fn extract_chapter_urls_and_metadata(&mut self) -> Result<(), AdapterError> {
        let _entered = self.span.enter();

        let mut story = Story::new("nifty");
        story.set_genre(&self.path.genre);
        story.set_category(&self.path.category);
        story.set_title(&normalize_title(&self.path.slug));

        if !self.config.is_adult {
            return Err(AdapterError::AdultCheckRequired(self.url.clone()));
        }

        let (landing, updated) = self.fetch_landing_page()?;
        story.date_updated = Some(updated);
        let landing_text = self.decode(&landing)?;

        match discover(&landing_text, &landing.final_url) {
            Discovery::SinglePage => {
                let title = story.title.clone();
                story.add_chapter(&title, self.url.clone());
                story.date_published = Some(updated);
                story.set_author(&find_author(&landing_text));
            }
            Discovery::MultiChapter(chapters) => {
                let last_url = match chapters.last() {
                    Some(last) => last.url.clone(),
                    None => return Err(AdapterError::EmptyStory(self.url.clone())),
                };
                for chapter in chapters {
                    story.add_chapter(&chapter.title, chapter.url);
                }

                let (last_page, published) = self.fetch_dated(&last_url)?;
                story.date_published = Some(published);
                story.set_author(&find_author(&self.decode(&last_page)?));
            }
        }

        story.num_chapters = story.chapters.len();
        debug!(?story, "Story");
        self.story = story;
        Ok(())
    }

    fn get_chapter_text(&self, url: &Url) -> Result<String, AdapterError> {
        let _entered = self.span.enter();
        debug!(%url, "Getting chapter text");

        self.chapter_html(url).map_err(|err| {
            warn!(%url, error = %err, "Chapter download failed");
            AdapterError::FailedToDownload(url.clone())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cached_client::{FetchError, Resource};
    use reqwest::header::{HeaderMap, HeaderValue, LAST_MODIFIED};
    use std::cell::RefCell;
    use std::collections::HashMap;

    const SINGLE_URL: &str = "http://www.nifty.org/nifty/gay/camping/summer-camp";
    const MULTI_URL: &str = "http://www.nifty.org/nifty/gay/camping/long-story/";

    /// Serves canned pages keyed by requested URL and records every request.
    #[derive(Default)]
    struct StubFetcher {
        pages: HashMap<String, Result<RawPage, StatusCode>>,
        requests: RefCell<Vec<(String, bool)>>,
    }

    impl StubFetcher {
        fn with_page(mut self, url: &str, final_url: &str, body: &str, modified: Option<&'static str>) -> Self {
            let mut headers = HeaderMap::new();
            if let Some(modified) = modified {
                headers.insert(LAST_MODIFIED, HeaderValue::from_static(modified));
            }
            let page = RawPage {
                body: body.as_bytes().to_vec(),
                final_url: Url::parse(final_url).unwrap(),
                headers,
            };
            self.pages.insert(url.to_string(), Ok(page));
            self
        }

        fn with_status(mut self, url: &str, status: StatusCode) -> Self {
            self.pages.insert(url.to_string(), Err(status));
            self
        }
    }

    impl Fetcher for StubFetcher {
        fn fetch(&self, url: &Url, use_cache: bool) -> Result<Resource<RawPage>, FetchError> {
            self.requests.borrow_mut().push((url.to_string(), use_cache));
            match self.pages.get(url.as_str()) {
                Some(Ok(page)) => Ok(Resource::Fetched(page.clone())),
                Some(Err(status)) => Err(FetchError::Status {
                    status: *status,
                    url: url.clone(),
                }),
                None => Err(FetchError::Status {
                    status: StatusCode::NOT_FOUND,
                    url: url.clone(),
                }),
            }
        }
    }

    fn adult() -> AdapterConfig {
        AdapterConfig {
            is_adult: true,
            ..AdapterConfig::default()
        }
    }

    fn adapter<'a>(url: &str, fetcher: &'a StubFetcher) -> NiftyOrgAdapter<'a> {
        NiftyOrgAdapter::new(url, adult(), fetcher, Span::none()).unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(y, m, d)
    }

    fn index_page(parts: &[&str]) -> String {
        let rows: String = parts
            .iter()
            .map(|part| format!("<tr><td><a href=\"{part}\">{part}</a></td><td>12K</td></tr>"))
            .collect();
        format!("<html><body><table>{rows}</table></body></html>")
    }

    #[test]
    fn test_url_pattern() {
        assert!(URL_PATTERN.is_match("http://www.nifty.org/nifty/gay/college/story-title"));
        assert!(URL_PATTERN.is_match("https://www.nifty.org/nifty/gay/college/multi_part-2/"));
        assert!(!URL_PATTERN.is_match("http://www.nifty.org/nifty/gay/college"));
        assert!(!URL_PATTERN.is_match("http://nifty.org/nifty/gay/college/story"));
        assert!(!URL_PATTERN.is_match("http://www.nifty.org/nifty/gay/college/story/part-1"));

        let captures = URL_PATTERN.captures("http://www.nifty.org/nifty/bisexual/high-school/my_story").unwrap();
        assert_eq!("bisexual", &captures["genre"]);
        assert_eq!("high-school", &captures["category"]);
        assert_eq!("my_story", &captures["title"]);
    }

    #[test]
    fn test_site_descriptors() {
        let fetcher = StubFetcher::default();
        let adapter = adapter(SINGLE_URL, &fetcher);
        assert_eq!("www.nifty.org", adapter.site_domain());
        assert_eq!(&["www.nifty.org"], adapter.accept_domains());
        for example in adapter.site_example_urls().split(' ') {
            assert!(adapter.site_url_pattern().is_match(example), "{} does not match", example);
        }
    }

    #[test]
    fn test_new_rejects_foreign_url() {
        let fetcher = StubFetcher::default();
        let result = NiftyOrgAdapter::new("http://www.nifty.org/about", adult(), &fetcher, Span::none());
        assert!(matches!(result, Err(AdapterError::InvalidStoryUrl { .. })));
    }

    #[test]
    fn test_single_page_story() {
        let fetcher = StubFetcher::default().with_page(
            SINGLE_URL,
            SINGLE_URL,
            "Date: Mon, 1 Jan 2018\nFrom: A. Writer\nSubject: Summer Camp\n\nIt was hot.\n",
            Some("Mon, 01 Jan 2018 00:00:00 GMT"),
        );
        let mut adapter = adapter(SINGLE_URL, &fetcher);
        adapter.extract_chapter_urls_and_metadata().unwrap();

        let story = adapter.story();
        assert_eq!("Summer Camp", story.title);
        assert_eq!("gay", story.genre);
        assert_eq!("camping", story.category);
        assert_eq!("A. Writer", story.author);
        assert_eq!(date(2018, 1, 1), story.date_published);
        assert_eq!(date(2018, 1, 1), story.date_updated);
        assert_eq!(1, story.num_chapters);
        assert_eq!(
            vec![ChapterDescriptor {
                title: "Summer Camp".to_string(),
                url: Url::parse(SINGLE_URL).unwrap(),
            }],
            story.chapters
        );
        assert_eq!(vec![(SINGLE_URL.to_string(), false)], *fetcher.requests.borrow());
    }

    #[test]
    fn test_multi_chapter_story_is_put_in_reading_order() {
        let parts = ["long-story-5", "long-story-4", "long-story-3", "long-story-2", "long-story-1"];
        let last = format!("{MULTI_URL}long-story-5");
        let fetcher = StubFetcher::default()
            .with_page(MULTI_URL, MULTI_URL, &index_page(&parts), Some("Sat, 06 May 2017 01:14:25 GMT"))
            .with_page(&last, &last, "From: someone@example.com\n\nThe end.", Some("Fri, 05 May 2017 10:00:00 GMT"));
        let mut adapter = adapter(MULTI_URL, &fetcher);
        adapter.extract_chapter_urls_and_metadata().unwrap();

        let story = adapter.story();
        let titles: Vec<&str> = story.chapters.iter().map(|c| c.title.as_str()).collect();
        assert_eq!(
            vec!["Long Story 1", "Long Story 2", "Long Story 3", "Long Story 4", "Long Story 5"],
            titles
        );
        assert_eq!(format!("{MULTI_URL}long-story-1"), story.chapters[0].url.as_str());
        assert_eq!(5, story.num_chapters);
        assert_eq!("Long Story", story.title);
        assert_eq!("someone@example.com", story.author);
        assert_eq!(date(2017, 5, 5), story.date_published);
        assert_eq!(date(2017, 5, 6), story.date_updated);
        assert_eq!(
            vec![(MULTI_URL.to_string(), false), (last, false)],
            *fetcher.requests.borrow()
        );
    }

    #[test]
    fn test_redirect_decides_multi_chapter() {
        let requested = "http://www.nifty.org/nifty/gay/camping/long-story";
        let part = format!("{MULTI_URL}long-story-1");
        let fetcher = StubFetcher::default()
            .with_page(requested, MULTI_URL, &index_page(&["long-story-1"]), Some("Sat, 06 May 2017 01:14:25 GMT"))
            .with_page(&part, &part, "From: B. Writer\n", Some("Sat, 06 May 2017 01:14:25 GMT"));
        let mut adapter = adapter(requested, &fetcher);
        adapter.extract_chapter_urls_and_metadata().unwrap();

        assert_eq!(1, adapter.story().num_chapters);
        assert_eq!(part, adapter.story().chapters[0].url.as_str());
        assert_eq!("B. Writer", adapter.story().author);
    }

    #[test]
    fn test_trailing_slash_without_redirect_is_single_page() {
        let requested = "http://www.nifty.org/nifty/gay/camping/summer-camp/";
        let fetcher = StubFetcher::default().with_page(
            requested,
            SINGLE_URL,
            "<td><a href=\"nope\">nope</a></td>",
            Some("Sat, 06 May 2017 01:14:25 GMT"),
        );
        let mut adapter = adapter(requested, &fetcher);
        adapter.extract_chapter_urls_and_metadata().unwrap();

        assert_eq!(1, adapter.story().num_chapters);
        assert_eq!(requested, adapter.story().chapters[0].url.as_str());
        assert_eq!("nope", adapter.story().author);
    }

    #[test]
    fn test_empty_index_is_empty_story() {
        let fetcher = StubFetcher::default().with_page(
            MULTI_URL,
            MULTI_URL,
            "<html><body><p>Nothing here</p></body></html>",
            Some("Sat, 06 May 2017 01:14:25 GMT"),
        );
        let mut adapter = adapter(MULTI_URL, &fetcher);
        let result = adapter.extract_chapter_urls_and_metadata();

        assert!(matches!(result, Err(AdapterError::EmptyStory(_))));
        assert_eq!(0, adapter.story().num_chapters);
        assert!(adapter.story().title.is_empty());
    }

    #[test]
    fn test_not_found() {
        let fetcher = StubFetcher::default().with_status(SINGLE_URL, StatusCode::NOT_FOUND);
        let result = adapter(SINGLE_URL, &fetcher).extract_chapter_urls_and_metadata();
        assert!(matches!(result, Err(AdapterError::StoryDoesNotExist(_))));
    }

    #[test]
    fn test_other_http_errors_propagate() {
        let fetcher = StubFetcher::default().with_status(SINGLE_URL, StatusCode::INTERNAL_SERVER_ERROR);
        let result = adapter(SINGLE_URL, &fetcher).extract_chapter_urls_and_metadata();
        match result {
            Err(AdapterError::Fetch(err)) => assert_eq!(Some(StatusCode::INTERNAL_SERVER_ERROR), err.status()),
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn test_missing_last_modified_fails() {
        let fetcher = StubFetcher::default().with_page(SINGLE_URL, SINGLE_URL, "From: A\n", None);
        let result = adapter(SINGLE_URL, &fetcher).extract_chapter_urls_and_metadata();
        assert!(matches!(result, Err(AdapterError::Date { .. })));
    }

    #[test]
    fn test_adult_check_happens_before_fetching() {
        let fetcher = StubFetcher::default();
        let mut adapter = NiftyOrgAdapter::new(SINGLE_URL, AdapterConfig::default(), &fetcher, Span::none()).unwrap();
        let result = adapter.extract_chapter_urls_and_metadata();

        assert!(matches!(result, Err(AdapterError::AdultCheckRequired(_))));
        assert!(fetcher.requests.borrow().is_empty());
    }

    #[test]
    fn test_discover_skips_links_outside_tables_and_without_href() {
        let page = "<a href=\"top\">top</a><table><tr><td><a>no href</a></td><td><a href=\"b-2.html\">b-2.html</a></td><td><a href=\"b-1.html\">b-1.html</a></td></tr></table>";
        let discovery = discover(page, &Url::parse(MULTI_URL).unwrap());
        let expected = ["b-1.html", "b-2.html"]
            .iter()
            .map(|part| ChapterDescriptor {
                title: normalize_title(part),
                url: Url::parse(MULTI_URL).unwrap().join(part).unwrap(),
            })
            .collect();
        assert_eq!(Discovery::MultiChapter(expected), discovery);
    }

    #[test]
    fn test_find_author_from_line() {
        assert_eq!(" Jane Doe", find_author("From: Jane Doe\nSubject: x\n"));
    }

    #[test]
    fn test_find_author_meta() {
        let page = r#"<html><head><meta name="author" content="J. Smith"></head><body>x@y.com</body></html>"#;
        assert_eq!("J. Smith", find_author(page));
    }

    #[test]
    fn test_find_author_email_attribute() {
        let page = r##"<p>By <a email="writer@example.com" href="#">the writer</a></p>"##;
        assert_eq!("writer@example.com", find_author(page));
    }

    #[test]
    fn test_find_author_bare_email() {
        assert_eq!("writer.one+nifty@mail.example.org", find_author("Write me at writer.one+nifty@mail.example.org, thanks"));
    }

    #[test]
    fn test_find_author_link_text() {
        assert_eq!("The Writer", find_author(r#"<p>Story by <a href="/bio">The Writer</a></p>"#));
    }

    #[test]
    fn test_find_author_unknown() {
        assert_eq!("Unknown", find_author("Just a story with no byline."));
    }

    #[test]
    fn test_plain_text_chapter() {
        let fetcher = StubFetcher::default()
            .with_page(SINGLE_URL, SINGLE_URL, "From: A. Writer\n\nHello!\nIt was hot.\n", Some("Mon, 01 Jan 2018 00:00:00 GMT"));
        let mut adapter = adapter(SINGLE_URL, &fetcher);
        adapter.extract_chapter_urls_and_metadata().unwrap();

        let url = Url::parse(SINGLE_URL).unwrap();
        let html = adapter.get_chapter_text(&url).unwrap();
        assert!(html.starts_with("<!DOCTYPE html>\n<html>\n <head>\n  <title>\n   Summer Camp\n  </title>\n"));
        assert!(html.contains(r#"<meta content="A. Writer" name="author">"#));
        assert!(html.contains("Hello."));
        let body = &html[html.find("<body>").unwrap()..];
        assert!(!body.contains('!'));
        assert_eq!(Some(&(SINGLE_URL.to_string(), true)), fetcher.requests.borrow().last());
    }

    #[test]
    fn test_html_chapter_is_prettified() {
        let part = format!("{MULTI_URL}part-1.html");
        let fetcher = StubFetcher::default().with_page(
            &part,
            &part,
            "<html><body><p>Wow!</p></body></html>",
            None,
        );
        let adapter = adapter(MULTI_URL, &fetcher);
        let html = adapter.get_chapter_text(&Url::parse(&part).unwrap()).unwrap();
        assert_eq!(
            "<!DOCTYPE html>\n<html>\n <head>\n </head>\n <body>\n  <p>\n   Wow!\n  </p>\n </body>\n</html>\n",
            html
        );
    }

    #[test]
    fn test_chapter_failure_names_url() {
        let fetcher = StubFetcher::default().with_status(SINGLE_URL, StatusCode::BAD_GATEWAY);
        let adapter = adapter(SINGLE_URL, &fetcher);
        let err = adapter.get_chapter_text(&Url::parse(SINGLE_URL).unwrap()).unwrap_err();
        assert_eq!(
            format!("Error downloading chapter at url {SINGLE_URL}! Only html and plain text is supported."),
            err.to_string()
        );
    }
}
