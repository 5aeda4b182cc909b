//! Canonical URL construction for archive lookups.

use url::{Position, Url};

/// Combine a relative request URI with the tunnel target.
///
/// Path, query and fragment come from `request_uri`; scheme, host and port
/// from `target_uri`. A default port (80 for http, 443 for https) is
/// dropped so the result matches URLs recorded without one.
///
/// An origin-form `request_uri` is appended verbatim, so a path starting
/// with `//` stays a path on the target host.
pub fn canonicalize(request_uri: &str, target_uri: &str) -> Result<String, url::ParseError> {
    let base = Url::parse(target_uri)?;
    if !base.has_host() {
        return Err(url::ParseError::EmptyHost);
    }
    let joined = if request_uri.starts_with('/') {
        Url::parse(&format!("{}{}", &base[..Position::BeforePath], request_uri))?
    } else {
        base.join(request_uri)?
    };
    Ok(joined.into())
}
