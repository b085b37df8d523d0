use chrono::{DateTime, NaiveDate};
use reqwest::header::{HeaderMap, LAST_MODIFIED};

#[derive(Debug, thiserror::Error)]
pub enum DateError {
    #[error("response has no last-modified header")]
    MissingHeader,
    #[error("cannot parse date {value:?}")]
    Malformed {
        value: String,
        #[source]
        source: chrono::ParseError,
    },
}

/// Parses an HTTP date such as `Sat, 06 May 2017 01:14:25 GMT`, keeping only the calendar date.
pub fn parse_long_date(value: &str) -> Result<NaiveDate, DateError> {
    DateTime::parse_from_rfc2822(value.trim())
        .map(|date| date.date_naive())
        .map_err(|source| DateError::Malformed {
            value: value.to_string(),
            source,
        })
}

/// Reads the `last-modified` header of a response as a calendar date.
pub fn last_modified(headers: &HeaderMap) -> Result<NaiveDate, DateError> {
    let value = headers.get(LAST_MODIFIED).ok_or(DateError::MissingHeader)?;
    parse_long_date(&String::from_utf8_lossy(value.as_bytes()))
}

#[test]
fn test_parse_long_date() {
    assert_eq!(
        NaiveDate::from_ymd_opt(2017, 5, 6).unwrap(),
        parse_long_date("Sat, 06 May 2017 01:14:25 GMT").unwrap()
    );
}

#[test]
fn test_parse_long_date_discards_time() {
    assert_eq!(
        NaiveDate::from_ymd_opt(2018, 1, 1).unwrap(),
        parse_long_date("Mon, 01 Jan 2018 23:59:59 GMT").unwrap()
    );
}

#[test]
fn test_parse_long_date_rejects_garbage() {
    assert!(matches!(parse_long_date("yesterday"), Err(DateError::Malformed { .. })));
}

#[test]
fn test_missing_header() {
    assert!(matches!(last_modified(&HeaderMap::new()), Err(DateError::MissingHeader)));
}

#[test]
fn test_non_ascii_header_is_reported() {
    use reqwest::header::HeaderValue;

    let mut headers = HeaderMap::new();
    headers.insert(LAST_MODIFIED, HeaderValue::from_bytes(b"Mon, 01 Jan 2018 \xff").unwrap());
    match last_modified(&headers) {
        Err(DateError::Malformed { value, .. }) => assert_eq!("Mon, 01 Jan 2018 \u{fffd}", value),
        other => panic!("unexpected result {:?}", other),
    }
}
