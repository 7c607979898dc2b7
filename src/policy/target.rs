//! Request-target parsing.
//!
//! Accepts the forms a proxy reports for an HTTP request: an absolute path
//! (`/a/b?x=1`), an absolute URI (`https://host/a/b?x=1`) or the asterisk
//! form (`*`). Anything else, control characters and malformed percent
//! escapes are rejected. Paths are never normalized: `/x/../deny-me/` is
//! kept as written in both forms.

use std::borrow::Cow;

/// Why a request target was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TargetError {
    #[error("empty request target")]
    Empty,

    #[error("invalid control character in request target")]
    ControlCharacter,

    #[error("request target is neither an absolute path nor an absolute URI: {0:?}")]
    NotRequestForm(String),

    #[error("invalid percent escape {0:?} in request target")]
    InvalidEscape(String),

    #[error("invalid absolute URI: {0}")]
    InvalidUri(#[from] url::ParseError),
}

/// A successfully parsed request target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestTarget {
    raw: String,
    path: String,
    query: Option<String>,
}

impl RequestTarget {
    pub fn parse(raw: &str) -> Result<Self, TargetError> {
        if raw.is_empty() {
            return Err(TargetError::Empty);
        }
        if raw.bytes().any(|b| b < 0x20 || b == 0x7f) {
            return Err(TargetError::ControlCharacter);
        }

        if raw == "*" {
            return Ok(Self {
                raw: raw.to_string(),
                path: raw.to_string(),
                query: None,
            });
        }

        let (before_query, query) = match raw.split_once('?') {
            Some((head, query)) => (head, Some(query.to_string())),
            None => (raw, None),
        };

        let path = if raw.starts_with('/') {
            before_query
        } else if has_scheme(raw) {
            // Validates scheme and authority; the path is taken verbatim.
            url::Url::parse(raw)?;
            raw_uri_path(before_query)
        } else {
            return Err(TargetError::NotRequestForm(raw.to_string()));
        };

        Ok(Self {
            raw: raw.to_string(),
            path: decode_path(path)?.into_owned(),
            query,
        })
    }

    /// The target exactly as received.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Percent-decoded path, without the query.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }
}

/// `scheme ":"` where scheme is `ALPHA *( ALPHA / DIGIT / "+" / "-" / "." )`.
fn has_scheme(raw: &str) -> bool {
    let Some((scheme, _)) = raw.split_once(':') else {
        return false;
    };
    let mut chars = scheme.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

/// Path of an absolute URI (query already removed), without dot-segment removal.
fn raw_uri_path(uri: &str) -> &str {
    let rest = match uri.split_once(':') {
        Some((_, rest)) => rest,
        None => return "",
    };
    match rest.strip_prefix("//") {
        Some(authority_and_path) => authority_and_path
            .find('/')
            .map_or("", |at| &authority_and_path[at..]),
        // Opaque URIs such as `mailto:x` carry no path.
        None if rest.starts_with('/') => rest,
        None => "",
    }
}

fn decode_path(path: &str) -> Result<Cow<'_, str>, TargetError> {
    let bytes = path.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let escape = bytes.get(i + 1..i + 3);
            match escape {
                Some([hi, lo]) if hi.is_ascii_hexdigit() && lo.is_ascii_hexdigit() => i += 3,
                _ => {
                    let end = (i + 3).min(bytes.len());
                    return Err(TargetError::InvalidEscape(
                        String::from_utf8_lossy(&bytes[i..end]).into_owned(),
                    ));
                }
            }
        } else {
            i += 1;
        }
    }

    let decoded = urlencoding::decode_binary(bytes);
    Ok(match decoded {
        Cow::Borrowed(_) => Cow::Borrowed(path),
        Cow::Owned(bytes) => Cow::Owned(String::from_utf8_lossy(&bytes).into_owned()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absolute_path_with_query() {
        let target = RequestTarget::parse("/deny-me/?a=1&b=2").unwrap();
        assert_eq!(target.path(), "/deny-me/");
        assert_eq!(target.query(), Some("a=1&b=2"));
        assert_eq!(target.as_str(), "/deny-me/?a=1&b=2");
    }

    #[test]
    fn percent_escapes_are_decoded() {
        let target = RequestTarget::parse("/deny%2Dme/").unwrap();
        assert_eq!(target.path(), "/deny-me/");
    }

    #[test]
    fn absolute_uri_is_accepted() {
        let target = RequestTarget::parse("https://example.com/ok?x=1").unwrap();
        assert_eq!(target.path(), "/ok");
        assert_eq!(target.query(), Some("x=1"));
    }

    #[test]
    fn absolute_uri_path_is_not_normalized() {
        let uri = RequestTarget::parse("http://h/x/../deny-me/?a=1").unwrap();
        let path = RequestTarget::parse("/x/../deny-me/?a=1").unwrap();
        assert_eq!(uri.path(), "/x/../deny-me/");
        assert_eq!(uri.path(), path.path());
        assert_eq!(uri.query(), Some("a=1"));
    }

    #[test]
    fn absolute_uri_without_path() {
        let target = RequestTarget::parse("http://example.com?x=1").unwrap();
        assert_eq!(target.path(), "");
        assert_eq!(target.query(), Some("x=1"));
    }

    #[test]
    fn absolute_uri_path_escapes_are_checked() {
        assert!(matches!(
            RequestTarget::parse("http://h/bad%zz"),
            Err(TargetError::InvalidEscape(_))
        ));
    }

    #[test]
    fn asterisk_form_is_accepted() {
        let target = RequestTarget::parse("*").unwrap();
        assert_eq!(target.path(), "*");
        assert_eq!(target.query(), None);
    }

    #[test]
    fn rejects_malformed_targets() {
        assert_eq!(RequestTarget::parse(""), Err(TargetError::Empty));
        assert!(matches!(
            RequestTarget::parse("not a uri###"),
            Err(TargetError::NotRequestForm(_))
        ));
        assert!(matches!(
            RequestTarget::parse("relative/path"),
            Err(TargetError::NotRequestForm(_))
        ));
        assert_eq!(
            RequestTarget::parse("/bad\nline"),
            Err(TargetError::ControlCharacter)
        );
        assert!(matches!(
            RequestTarget::parse("/bad%zzescape"),
            Err(TargetError::InvalidEscape(_))
        ));
        assert!(matches!(
            RequestTarget::parse("/trailing%2"),
            Err(TargetError::InvalidEscape(_))
        ));
    }
}
