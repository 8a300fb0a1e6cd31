//! Token and share-link parsing
//!
//! Every entry point that takes a token also accepts:
//! - an API retrieval URL: `https://host/api/download/{token}`
//! - a share link: `https://host/download/{token}?key={hex}`
//! - the bare token itself

use drift_core::{DriftError, DriftResult};

/// Path marker that precedes the token in every retrieval URL
pub const DOWNLOAD_MARKER: &str = "/download/";

/// A parsed share link: the retrieval token and, when present, the hex key.
#[derive(Clone, PartialEq, Eq)]
pub struct ShareLink {
    pub token: String,
    pub key_hex: Option<String>,
}

impl ShareLink {
    pub fn parse(input: &str) -> DriftResult<Self> {
        let input = input.trim();
        let token = normalize_token(input)?;
        let key_hex = query_param(input, "key")
            .filter(|k| !k.is_empty())
            .map(str::to_string);
        Ok(Self { token, key_hex })
    }
}

impl std::str::FromStr for ShareLink {
    type Err = DriftError;

    fn from_str(s: &str) -> DriftResult<Self> {
        Self::parse(s)
    }
}

impl std::fmt::Debug for ShareLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShareLink")
            .field("token", &self.token)
            .field("key_hex", &self.key_hex.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// Extract the token: the segment after the last `/download/` marker,
/// ending at the next `/`, `?` or `#`. Input without the marker must be a
/// bare token.
pub fn normalize_token(input: &str) -> DriftResult<String> {
    let input = input.trim();

    let token = match input.rsplit_once(DOWNLOAD_MARKER) {
        Some((_, rest)) => rest
            .split(['/', '?', '#'])
            .next()
            .unwrap_or_default(),
        None => {
            if input.contains("://") {
                return Err(DriftError::InvalidLink(format!(
                    "no {DOWNLOAD_MARKER} segment in {input}"
                )));
            }
            input
        }
    };

    if token.is_empty() {
        return Err(DriftError::InvalidLink("empty token".into()));
    }
    if token
        .chars()
        .any(|c| c.is_whitespace() || matches!(c, '/' | '?' | '#' | '&'))
    {
        return Err(DriftError::InvalidLink(format!("malformed token {token:?}")));
    }
    Ok(token.to_string())
}

fn query_param<'a>(input: &'a str, name: &str) -> Option<&'a str> {
    let (_, query) = input.split_once('?')?;
    let query = query.split('#').next().unwrap_or_default();
    query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(k, _)| *k == name)
        .map(|(_, v)| v)
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &str = "00112233445566778899aabbccddeeff00112233445566778899aabbccddeeff";

    #[test]
    fn bare_token_passes_through() {
        assert_eq!(normalize_token("eyJhbGciOi.abc-123_x").unwrap(), "eyJhbGciOi.abc-123_x");
        assert_eq!(normalize_token("  tok  ").unwrap(), "tok");
    }

    #[test]
    fn api_url_yields_token() {
        let url = "https://api.example.com/api/download/eyJ0.payload.sig";
        assert_eq!(normalize_token(url).unwrap(), "eyJ0.payload.sig");
    }

    #[test]
    fn info_suffix_and_query_are_dropped() {
        assert_eq!(
            normalize_token("https://h/api/download/tok/info").unwrap(),
            "tok"
        );
        assert_eq!(
            normalize_token(&format!("https://h/download/tok?key={KEY}")).unwrap(),
            "tok"
        );
        assert_eq!(normalize_token("/download/tok#frag").unwrap(), "tok");
    }

    #[test]
    fn link_and_bare_token_agree() {
        let link = format!("https://drift.example.com/download/abc.def?key={KEY}");
        let from_link = normalize_token(&link).unwrap();
        assert_eq!(from_link, normalize_token(&from_link).unwrap());
    }

    #[test]
    fn rejects_empty_and_markerless_urls() {
        assert!(matches!(normalize_token(""), Err(DriftError::InvalidLink(_))));
        assert!(matches!(
            normalize_token("https://h/download/"),
            Err(DriftError::InvalidLink(_))
        ));
        assert!(matches!(
            normalize_token("https://h/files/tok"),
            Err(DriftError::InvalidLink(_))
        ));
        assert!(normalize_token("two words").is_err());
    }

    #[test]
    fn share_link_carries_key() {
        let link: ShareLink = format!("https://drift.example.com/download/tok?key={KEY}")
            .parse()
            .unwrap();
        assert_eq!(link.token, "tok");
        assert_eq!(link.key_hex.as_deref(), Some(KEY));
        assert!(!format!("{link:?}").contains(KEY));
    }

    #[test]
    fn share_link_without_key() {
        let link = ShareLink::parse("https://h/api/download/tok").unwrap();
        assert_eq!(link.token, "tok");
        assert_eq!(link.key_hex, None);

        let link = ShareLink::parse("https://h/download/tok?key=").unwrap();
        assert_eq!(link.key_hex, None);
    }
}
