//! Default output filename derived from the URL.

/// Used when the URL path yields nothing usable.
pub const DEFAULT_OUTPUT_NAME: &str = "download.bin";

/// Last non-empty path segment of `url`, made safe as a single file name.
///
/// Falls back to [`DEFAULT_OUTPUT_NAME`] for root paths, `.`/`..`, or URLs that
/// do not parse.
pub fn output_name_from_url(url: &str) -> String {
    url::Url::parse(url)
        .ok()
        .and_then(|u| {
            u.path_segments()?
                .filter(|s| !s.is_empty())
                .last()
                .map(sanitize)
        })
        .filter(|s| !s.is_empty() && s != "." && s != "..")
        .unwrap_or_else(|| DEFAULT_OUTPUT_NAME.to_string())
}

/// Replace separators and control characters, strip leading dots (no hidden or
/// relative names).
fn sanitize(segment: &str) -> String {
    let cleaned: String = segment
        .chars()
        .map(|c| match c {
            '/' | '\\' | '\0' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    cleaned.trim_start_matches('.').trim().to_string()
}
