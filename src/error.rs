use cached_client::FetchError;
use dates::DateError;
use reqwest::Url;

/// Failures an adapter reports to its caller.
#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    /// The story is adult content and the user has not confirmed being an adult.
    #[error("story at {0} requires confirmation of adult status (pass --is-adult)")]
    AdultCheckRequired(Url),
    #[error("story at {0} does not exist")]
    StoryDoesNotExist(Url),
    #[error("story at {0} has no chapters")]
    EmptyStory(Url),
    #[error("Error downloading chapter at url {0}! Only html and plain text is supported.")]
    FailedToDownload(Url),
    #[error("{url} is not a valid story URL for {site}, e.g. {example}")]
    InvalidStoryUrl {
        url: String,
        site: &'static str,
        example: &'static str,
    },
    #[error("no adapter accepts {0}")]
    UnknownSite(String),
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("invalid date for {url}")]
    Date {
        url: Url,
        #[source]
        source: DateError,
    },
}
