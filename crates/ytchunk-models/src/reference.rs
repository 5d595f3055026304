//! Durable object references.

use std::fmt;

use serde::{Deserialize, Serialize};
use url::Url;

/// A storage object URL with its query and fragment removed.
///
/// Presigned write URLs carry credentials in the query string; the
/// durable form is what gets handed back to callers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DurableReference(String);

impl DurableReference {
    /// Strip the query and fragment from a signed URL.
    pub fn from_signed_url(signed: &str) -> Self {
        match Url::parse(signed) {
            Ok(mut url) => {
                url.set_query(None);
                url.set_fragment(None);
                Self(url.to_string())
            }
            // Not parseable: fall back to cutting at the first '?' or '#'
            Err(_) => {
                let end = signed.find(['?', '#']).unwrap_or(signed.len());
                Self(signed[..end].to_string())
            }
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for DurableReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_presigned_query() {
        let signed = "https://bucket.s3.us-east-1.amazonaws.com/4f1c2a.mp4?X-Amz-Algorithm=AWS4-HMAC-SHA256&X-Amz-Signature=abc";
        let reference = DurableReference::from_signed_url(signed);
        assert_eq!(
            reference.as_str(),
            "https://bucket.s3.us-east-1.amazonaws.com/4f1c2a.mp4"
        );
        assert!(!reference.as_str().contains('?'));
    }

    #[test]
    fn test_strips_fragment() {
        let reference = DurableReference::from_signed_url("http://127.0.0.1:9000/b/k.mp4#frag");
        assert_eq!(reference.as_str(), "http://127.0.0.1:9000/b/k.mp4");
    }

    #[test]
    fn test_unparseable_url_is_cut_at_query() {
        let reference = DurableReference::from_signed_url("bucket/key.mp4?sig=1");
        assert_eq!(reference.as_str(), "bucket/key.mp4");
    }

    #[test]
    fn test_serializes_as_plain_string() {
        let reference = DurableReference::from_signed_url("https://h/k.mp4?a=b");
        assert_eq!(serde_json::to_string(&reference).unwrap(), "\"https://h/k.mp4\"");
    }
}
