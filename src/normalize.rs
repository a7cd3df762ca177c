//! URL canonicalization used by the extractor and the visited-set gate.

use crate::error::CrawlError;
use url::Url;

/// Canonicalizes an absolute URL for visited-set membership.
///
/// Drops the fragment and strips trailing slashes from the path (`/a/` ->
/// `/a`, `/` -> ``). Scheme, authority, and query are left untouched.
///
/// `norm` is idempotent: `norm(norm(u)) == norm(u)`.
pub fn normalize(url: &Url) -> Url {
    let mut out = url.clone();
    out.set_fragment(None);

    // `url` always serializes a bare root path as "/", so "https://h" and
    // "https://h/" already parse identically; only a path longer than the
    // bare root needs its trailing slash(es) stripped.
    if out.path().len() > 1 && out.path().ends_with('/') {
        let trimmed = out.path().trim_end_matches('/').to_string();
        out.set_path(&trimmed);
    }

    out
}

/// Parses and canonicalizes a URL string in one step.
pub fn parse_and_normalize(raw: &str) -> Result<Url, CrawlError> {
    let parsed = Url::parse(raw).map_err(|e| CrawlError::InvalidArgument(format!("{raw}: {e}")))?;
    Ok(normalize(&parsed))
}

/// Two URLs are same-host iff their authority (`host:port`) matches exactly.
/// Subdomains are not same-host; default ports are not inferred. `url`
/// already folds domain hosts to lowercase for `http`/`https` at parse
/// time, so this comparison is effectively case-sensitive on whatever
/// `Url::host_str` returns — see DESIGN.md for the Open Question this
/// resolves.
pub fn same_host(a: &Url, b: &Url) -> bool {
    a.host_str() == b.host_str() && a.port() == b.port()
}
