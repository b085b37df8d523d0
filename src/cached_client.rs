use reqwest::blocking::Client;
use reqwest::header::HeaderMap;
use reqwest::{StatusCode, Url};
use std::fs::create_dir_all;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("HTTP error {status} for {url}")]
    Status { status: StatusCode, url: Url },
    #[error("could not retrieve page {url}")]
    Request {
        url: Url,
        #[source]
        source: reqwest::Error,
    },
    #[error("cache error for {url}")]
    Cache {
        url: Url,
        #[source]
        source: std::io::Error,
    },
}

impl FetchError {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            FetchError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Undecoded page body together with where it actually came from.
#[derive(Debug, Clone)]
pub struct RawPage {
    pub body: Vec<u8>,
    /// URL after redirects.
    pub final_url: Url,
    pub headers: HeaderMap,
}

/// Wraps the response from a `Fetcher` to allow the consumer
/// to find out whether the resource was fetched or obtained from cache.
#[derive(Debug)]
pub enum Resource<T> {
    Fetched(T),
    Cached(T),
}

impl<T> Resource<T> {
    pub fn contents(&self) -> &T {
        match self {
            Resource::Fetched(contents) => contents,
            Resource::Cached(contents) => contents,
        }
    }

    pub fn into_contents(self) -> T {
        match self {
            Resource::Fetched(contents) => contents,
            Resource::Cached(contents) => contents,
        }
    }

    pub fn is_cached(&self) -> bool {
        match self {
            Resource::Fetched(_) => false,
            Resource::Cached(_) => true,
        }
    }
}

/// Source of pages for site adapters.
pub trait Fetcher {
    /// Retrieves `url`. With `use_cache`, a previously stored body may be returned
    /// instead; such pages carry no headers and report `url` as their final URL.
    fn fetch(&self, url: &Url, use_cache: bool) -> Result<Resource<RawPage>, FetchError>;
}

/// Wrapper around `reqwest::Client` that caches page bodies in the provided directory.
pub struct CachedClient {
    client: Client,
    cache_dir: Option<PathBuf>,
}

impl CachedClient {
    pub fn new(cache_dir: Option<PathBuf>) -> Result<Self, std::io::Error> {
        if let Some(ref cache_path) = cache_dir {
            create_dir_all(cache_path)?;
        }

        Ok(Self {
            client: Client::new(),
            cache_dir: cache_dir,
        })
    }

    pub fn fetch_uncached(&self, url: &Url) -> Result<RawPage, FetchError> {
        let request_error = |source| FetchError::Request {
            url: url.clone(),
            source,
        };
        let response = self.client.get(url.clone()).send().map_err(request_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status,
                url: url.clone(),
            });
        }

        let final_url = response.url().clone();
        let headers = response.headers().clone();
        let body = response.bytes().map_err(request_error)?.to_vec();

        Ok(RawPage {
            body,
            final_url,
            headers,
        })
    }
}

impl Fetcher for CachedClient {
    fn fetch(&self, url: &Url, use_cache: bool) -> Result<Resource<RawPage>, FetchError> {
        let cache_error = |source| FetchError::Cache {
            url: url.clone(),
            source,
        };
        Ok(match self.cache_dir {
            // Cache directory exists.
            Some(ref cache_path) => {
                let cached_file = cache_path.join(url.to_string().replace("/", "%2F"));
                if use_cache && cached_file.exists() {
                    let body = std::fs::read(&cached_file).map_err(cache_error)?;
                    Resource::Cached(RawPage {
                        body,
                        final_url: url.clone(),
                        headers: HeaderMap::new(),
                    })
                } else {
                    let page = self.fetch_uncached(url)?;
                    std::fs::write(cached_file, &page.body).map_err(cache_error)?;
                    Resource::Fetched(page)
                }
            }
            // No cache directory, fetch directly.
            None => Resource::Fetched(self.fetch_uncached(url)?),
        })
    }
}

#[test]
fn test_cached_page_is_served_from_disk() {
    let tmp = tempfile::tempdir().unwrap();
    let dir = tmp.path().join("cache");
    let client = CachedClient::new(Some(dir.clone())).unwrap();
    let url = Url::parse("http://www.nifty.org/nifty/gay/college/story-title").unwrap();
    std::fs::write(dir.join(url.to_string().replace("/", "%2F")), b"cached body").unwrap();

    let res = client.fetch(&url, true).unwrap();
    assert!(res.is_cached());
    assert_eq!(b"cached body".to_vec(), res.contents().body);
    assert_eq!(url, res.contents().final_url);
    assert!(res.contents().headers.is_empty());
}

#[test]
fn test_status_accessor() {
    let err = FetchError::Status {
        status: StatusCode::NOT_FOUND,
        url: Url::parse("http://www.nifty.org/nifty/a/b/c").unwrap(),
    };
    assert_eq!(Some(StatusCode::NOT_FOUND), err.status());
    assert_eq!("HTTP error 404 Not Found for http://www.nifty.org/nifty/a/b/c", err.to_string());
}
