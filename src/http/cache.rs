//! Conditional request module
//!
//! `ETag` / `Last-Modified` validators and `If-None-Match` /
//! `If-Modified-Since` evaluation.

use chrono::{DateTime, TimeZone, Utc};
use std::time::{SystemTime, UNIX_EPOCH};

/// IMF-fixdate layout used by `Last-Modified` and `Date`
const HTTP_DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";

/// Validators describing one version of a file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Validators {
    pub etag: String,
    /// Modification time truncated to whole seconds
    pub last_modified: Option<DateTime<Utc>>,
}

impl Validators {
    /// Build validators from file size and modification time
    pub fn new(len: u64, modified: Option<SystemTime>) -> Self {
        let last_modified = modified.and_then(to_utc_seconds);
        Self {
            etag: generate_etag(len, last_modified),
            last_modified,
        }
    }

    /// `Last-Modified` header value, if the modification time is known
    pub fn last_modified_header(&self) -> Option<String> {
        self.last_modified.map(|t| format_http_date(&t))
    }

    /// Whether the client's cached copy is still current (answer 304)
    ///
    /// `If-None-Match` takes precedence; `If-Modified-Since` is only
    /// consulted when it is absent.
    pub fn is_not_modified(&self, if_none_match: Option<&str>, if_modified_since: Option<&str>) -> bool {
        if if_none_match.is_some() {
            return check_etag_match(if_none_match, &self.etag);
        }

        match (if_modified_since.and_then(parse_http_date), self.last_modified) {
            (Some(since), Some(modified)) => modified <= since,
            _ => false,
        }
    }
}

/// Generate a strong `ETag` from size and modification time
///
/// # Returns
/// Quoted `ETag` string, e.g. `"65f1c2a0-1f4"`
pub fn generate_etag(len: u64, modified: Option<DateTime<Utc>>) -> String {
    let secs = modified.map_or(0, |t| t.timestamp());
    format!("\"{secs:x}-{len:x}\"")
}

/// Check if client's `If-None-Match` header matches the server's `ETag`
///
/// Supports a single `ETag`, a comma separated list, weak tags (`W/"..."`),
/// and the wildcard `*`.
pub fn check_etag_match(if_none_match: Option<&str>, etag: &str) -> bool {
    if_none_match.is_some_and(|client_etag| {
        client_etag.split(',').any(|e| {
            let e = e.trim();
            e == "*" || e.strip_prefix("W/").unwrap_or(e) == etag
        })
    })
}

pub fn format_http_date(time: &DateTime<Utc>) -> String {
    time.format(HTTP_DATE_FORMAT).to_string()
}

/// Parse an HTTP date (IMF-fixdate or RFC 2822 style)
pub fn parse_http_date(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    DateTime::parse_from_rfc2822(value)
        .map(|t| t.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            chrono::NaiveDateTime::parse_from_str(value, HTTP_DATE_FORMAT)
                .ok()
                .map(|t| t.and_utc())
        })
}

fn to_utc_seconds(time: SystemTime) -> Option<DateTime<Utc>> {
    let secs = time.duration_since(UNIX_EPOCH).ok()?.as_secs();
    Utc.timestamp_opt(i64::try_from(secs).ok()?, 0).single()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn sample() -> Validators {
        Validators::new(500, Some(UNIX_EPOCH + Duration::from_secs(784_887_151)))
    }

    #[test]
    fn test_etag_shape() {
        let v = sample();
        assert!(v.etag.starts_with('"'));
        assert!(v.etag.ends_with('"'));
        assert!(v.etag.ends_with("-1f4\""));
    }

    #[test]
    fn test_etag_changes_with_content() {
        let a = Validators::new(10, Some(UNIX_EPOCH + Duration::from_secs(100)));
        let b = Validators::new(11, Some(UNIX_EPOCH + Duration::from_secs(100)));
        let c = Validators::new(10, Some(UNIX_EPOCH + Duration::from_secs(101)));
        assert_ne!(a.etag, b.etag);
        assert_ne!(a.etag, c.etag);
        assert_eq!(a, Validators::new(10, Some(UNIX_EPOCH + Duration::from_secs(100))));
    }

    #[test]
    fn test_check_etag_match() {
        let etag = "\"abc123\"";
        assert!(check_etag_match(Some("\"abc123\""), etag));
        assert!(check_etag_match(Some("\"xyz\", \"abc123\""), etag));
        assert!(check_etag_match(Some("W/\"abc123\""), etag));
        assert!(check_etag_match(Some("*"), etag));
        assert!(!check_etag_match(Some("\"different\""), etag));
        assert!(!check_etag_match(None, etag));
    }

    #[test]
    fn test_http_date_format() {
        let v = sample();
        assert_eq!(
            v.last_modified_header().as_deref(),
            Some("Tue, 15 Nov 1994 08:12:31 GMT")
        );
        let parsed = parse_http_date("Tue, 15 Nov 1994 08:12:31 GMT").unwrap();
        assert_eq!(Some(parsed), v.last_modified);
        assert!(parse_http_date("yesterday").is_none());
    }

    #[test]
    fn test_if_modified_since() {
        let v = sample();
        assert!(v.is_not_modified(None, Some("Tue, 15 Nov 1994 08:12:31 GMT")));
        assert!(v.is_not_modified(None, Some("Wed, 16 Nov 1994 00:00:00 GMT")));
        assert!(!v.is_not_modified(None, Some("Mon, 14 Nov 1994 00:00:00 GMT")));
        assert!(!v.is_not_modified(None, Some("garbage")));
        assert!(!v.is_not_modified(None, None));
    }

    #[test]
    fn test_if_none_match_takes_precedence() {
        let v = sample();
        let fresh_date = Some("Wed, 16 Nov 1994 00:00:00 GMT");
        assert!(!v.is_not_modified(Some("\"other\""), fresh_date));
        assert!(v.is_not_modified(Some(&v.etag), None));
    }
}
