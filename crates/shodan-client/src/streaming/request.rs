//! Stream request construction

use url::Url;

use super::filter::StreamFilter;
use crate::error::Result;

/// Query parameter carrying the API key
pub(crate) const KEY_PARAM: &str = "key";

/// Build the authenticated URL for a stream filter.
///
/// The filter path is appended to `base` (any path prefix on `base` is kept)
/// and the API key is attached as the `key` query parameter.
pub fn build_stream_url(base: &Url, filter: &StreamFilter, api_key: &str) -> Result<Url> {
    let path = filter.path()?;
    with_key(base, &path, api_key)
}

/// Append `path` to `base` and attach the API key
pub(crate) fn with_key(base: &Url, path: &str, api_key: &str) -> Result<Url> {
    let mut url = Url::parse(&format!("{}{}", base.as_str().trim_end_matches('/'), path))?;
    url.query_pairs_mut().append_pair(KEY_PARAM, api_key);
    Ok(url)
}

/// Render a URL for logs with the API key masked
pub(crate) fn redacted(url: &Url) -> String {
    let mut shown = url.clone();
    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| {
            if k == KEY_PARAM {
                (k.into_owned(), "***".to_string())
            } else {
                (k.into_owned(), v.into_owned())
            }
        })
        .collect();
    if pairs.is_empty() {
        return shown.to_string();
    }
    shown.query_pairs_mut().clear().extend_pairs(pairs);
    shown.to_string()
}
