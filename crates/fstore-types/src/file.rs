use serde::{Deserialize, Serialize};

use crate::digest::Digest;

/// Detailed description of one stored file, as produced by a detailed listing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    /// File name (the name index key).
    pub name: String,
    /// Hex-encoded content digest.
    pub digest: String,
    /// Payload size in bytes.
    pub size: u64,
    /// Number of whitespace-delimited words in the payload.
    pub word_count: u64,
}

impl FileRecord {
    pub fn new(name: impl Into<String>, digest: &Digest, size: u64, word_count: u64) -> Self {
        Self {
            name: name.into(),
            digest: digest.to_hex(),
            size,
            word_count,
        }
    }
}

/// Result of listing the store, in name index order.
///
/// Serializes as a bare JSON array: either of names or of [`FileRecord`]s.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Listing {
    Names(Vec<String>),
    Details(Vec<FileRecord>),
}

impl Listing {
    pub fn len(&self) -> usize {
        match self {
            Self::Names(names) => names.len(),
            Self::Details(records) => records.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// File names in listing order, regardless of detail level.
    pub fn names(&self) -> Vec<&str> {
        match self {
            Self::Names(names) => names.iter().map(String::as_str).collect(),
            Self::Details(records) => records.iter().map(|r| r.name.as_str()).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_carries_hex_digest() {
        let digest = Digest::of(b"payload");
        let record = FileRecord::new("a.txt", &digest, 7, 1);
        assert_eq!(record.digest, digest.to_hex());
    }

    #[test]
    fn names_listing_serializes_as_string_array() {
        let listing = Listing::Names(vec!["a".into(), "b".into()]);
        assert_eq!(serde_json::to_string(&listing).unwrap(), r#"["a","b"]"#);
    }

    #[test]
    fn details_listing_serializes_as_object_array() {
        let digest = Digest::of(b"x");
        let listing = Listing::Details(vec![FileRecord::new("x", &digest, 1, 1)]);
        let json: serde_json::Value = serde_json::to_value(&listing).unwrap();
        assert_eq!(json[0]["name"], "x");
        assert_eq!(json[0]["size"], 1);
        assert_eq!(json[0]["word_count"], 1);
    }

    #[test]
    fn untagged_listing_deserializes_both_shapes() {
        let names: Listing = serde_json::from_str(r#"["one"]"#).unwrap();
        assert_eq!(names.names(), vec!["one"]);

        let details: Listing = serde_json::from_str(
            r#"[{"name":"two","digest":"00","size":3,"word_count":1}]"#,
        )
        .unwrap();
        assert!(matches!(details, Listing::Details(_)));
        assert_eq!(details.len(), 1);
    }
}
