use crate::UrlError;
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, CONTROLS};
use url::Url;

/// Percent-encode set used to re-escape path segments after decoding.
/// Anything outside this set is left unescaped; this is what makes
/// decode-then-reencode collapse unnecessary escapes like `%2D` into `-`.
const RE_ENCODE: &AsciiSet = &CONTROLS.add(b' ').add(b'%').add(b'?').add(b'#');

/// Normalizes a URL to a canonical form.
///
/// # Normalization steps
///
/// 1. Parse the URL; reject if malformed.
/// 2. Validate scheme is http or https (scheme is never rewritten).
/// 3. Lowercase the host.
/// 4. Strip an explicit port matching the scheme's default (80/http,
///    443/https).
/// 5. Normalize the path: decode unnecessarily percent-encoded
///    characters, remove `.`/`..` segments, collapse repeated slashes,
///    drop a trailing slash (except root).
/// 6. Remove the fragment.
///
/// Query strings are left untouched — no tracking-parameter removal, no
/// reordering. A `www.` prefix is left untouched too; it's part of the
/// host, not noise.
///
/// # Examples
///
/// ```
/// use sumi_ripple::url::normalize_url;
///
/// let url = normalize_url("HTTP://Example.COM:80/a/../b/").unwrap();
/// assert_eq!(url.as_str(), "http://example.com/b");
/// ```
pub fn normalize_url(url_str: &str) -> Result<Url, UrlError> {
    let mut url = Url::parse(url_str).map_err(|e| UrlError::Parse(e.to_string()))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(format!(
            "only http and https schemes are supported, got: {}",
            url.scheme()
        )));
    }

    let host = url.host_str().ok_or(UrlError::MissingDomain)?.to_lowercase();
    url.set_host(Some(&host))
        .map_err(|e| UrlError::Malformed(format!("failed to set host: {}", e)))?;

    strip_default_port(&mut url);

    let normalized_path = normalize_path(url.path())?;
    url.set_path(&normalized_path);

    url.set_fragment(None);

    Ok(url)
}

/// Strips an explicit port matching the scheme's default, since
/// `https://h:443/` and `https://h/` name the same origin.
fn strip_default_port(url: &mut Url) {
    let is_default = matches!(
        (url.scheme(), url.port()),
        ("http", Some(80)) | ("https", Some(443))
    );
    if is_default {
        let _ = url.set_port(None);
    }
}

/// Decodes unnecessary percent-escapes, removes `.`/`..` segments,
/// collapses repeated slashes, and drops a trailing slash (except root).
fn normalize_path(path: &str) -> Result<String, UrlError> {
    let decoded = percent_decode_str(path)
        .decode_utf8()
        .map_err(|e| UrlError::Malformed(format!("invalid percent-encoding: {}", e)))?;

    if decoded.chars().any(|c| c.is_control()) {
        return Err(UrlError::Malformed(
            "path contains a control character".to_string(),
        ));
    }

    let mut segments: Vec<&str> = Vec::new();
    for segment in decoded.split('/') {
        match segment {
            "" | "." => continue,
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }

    if segments.is_empty() {
        return Ok("/".to_string());
    }

    let rebuilt = segments
        .iter()
        .map(|s| utf8_percent_encode(s, RE_ENCODE).to_string())
        .collect::<Vec<_>>()
        .join("/");

    Ok(format!("/{}", rebuilt))
}
