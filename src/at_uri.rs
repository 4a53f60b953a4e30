use std::fmt;
use thiserror::Error;

const AT_SCHEME: &str = "at://";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AtUriError {
    #[error("not an at:// URI: {0}")]
    MissingScheme(String),
    #[error("at:// URI has no authority: {0}")]
    EmptyAuthority(String),
    #[error("at:// URI has no record key: {0}")]
    MissingRecordKey(String),
}

/// A parsed `at://<authority>/<collection>/<rkey>` record identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AtUri {
    authority: String,
    collection: Option<String>,
    rkey: Option<String>,
}

impl AtUri {
    pub fn parse(uri: &str) -> Result<Self, AtUriError> {
        let rest = uri
            .strip_prefix(AT_SCHEME)
            .ok_or_else(|| AtUriError::MissingScheme(uri.to_string()))?;

        // Query and fragment are not part of record addressing
        let rest = rest.split(['?', '#']).next().unwrap_or_default();
        let mut segments = rest.split('/').filter(|s| !s.is_empty());

        let authority = segments
            .next()
            .ok_or_else(|| AtUriError::EmptyAuthority(uri.to_string()))?
            .to_string();
        let collection = segments.next().map(str::to_string);
        let rkey = segments.next().map(str::to_string);

        Ok(Self {
            authority,
            collection,
            rkey,
        })
    }

    /// The repository owner, normally a DID.
    pub fn authority(&self) -> &str {
        &self.authority
    }

    #[allow(dead_code)] // Used in tests
    pub fn collection(&self) -> Option<&str> {
        self.collection.as_deref()
    }

    pub fn rkey(&self) -> Option<&str> {
        self.rkey.as_deref()
    }

    /// Record key, or an error for URIs that only address a repo or collection.
    pub fn require_rkey(&self) -> Result<&str, AtUriError> {
        self.rkey()
            .ok_or_else(|| AtUriError::MissingRecordKey(self.to_string()))
    }
}

impl fmt::Display for AtUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", AT_SCHEME, self.authority)?;
        if let Some(collection) = &self.collection {
            write!(f, "/{}", collection)?;
        }
        if let Some(rkey) = &self.rkey {
            write!(f, "/{}", rkey)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_record_uri() {
        let uri = AtUri::parse("at://did:plc:abc123/app.bsky.feed.post/3kxyz").unwrap();
        assert_eq!(uri.authority(), "did:plc:abc123");
        assert_eq!(uri.collection(), Some("app.bsky.feed.post"));
        assert_eq!(uri.rkey(), Some("3kxyz"));
        assert_eq!(uri.to_string(), "at://did:plc:abc123/app.bsky.feed.post/3kxyz");
    }

    #[test]
    fn test_parse_repo_only_uri() {
        let uri = AtUri::parse("at://did:plc:abc123").unwrap();
        assert_eq!(uri.authority(), "did:plc:abc123");
        assert_eq!(uri.collection(), None);
        assert!(matches!(
            uri.require_rkey(),
            Err(AtUriError::MissingRecordKey(_))
        ));
    }

    #[test]
    fn test_parse_rejects_other_schemes() {
        assert!(matches!(
            AtUri::parse("https://bsky.app/profile/alice"),
            Err(AtUriError::MissingScheme(_))
        ));
        assert!(matches!(
            AtUri::parse("at://"),
            Err(AtUriError::EmptyAuthority(_))
        ));
    }

    #[test]
    fn test_parse_ignores_fragment() {
        let uri = AtUri::parse("at://did:plc:abc/app.bsky.feed.post/3k#frag").unwrap();
        assert_eq!(uri.rkey(), Some("3k"));
    }
}
