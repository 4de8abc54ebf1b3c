//! The durability command record and its line-delimited JSON codec.
//!
//! One line per command in the AOF and SNAP files. The encoding is
//! self-describing: a decoder never needs to know in advance whether a
//! line is a `Set` or a `Del`.

use serde::{Deserialize, Serialize};

use crate::item::CacheItem;

/// A single durability-log entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "UPPERCASE")]
pub enum Command {
    Set { key: String, item: CacheItem },
    Del { key: String },
}

impl Command {
    #[must_use]
    pub fn key(&self) -> &str {
        match self {
            Self::Set { key, .. } | Self::Del { key } => key,
        }
    }

    /// Encodes this command as a single line (no trailing newline).
    ///
    /// # Errors
    ///
    /// Returns an error only if the item's value cannot be represented by
    /// `serde_json` -- this cannot happen for the `Vec<u8>` value type used
    /// here, but the fallible signature keeps the call site honest.
    pub fn encode(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Decodes a single line previously produced by [`encode`](Self::encode).
    ///
    /// # Errors
    ///
    /// Returns an error if `line` is not valid JSON or does not match the
    /// expected shape. The durability coordinator treats this as fatal
    /// during recovery.
    pub fn decode(line: &str) -> serde_json::Result<Self> {
        serde_json::from_str(line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_item() -> CacheItem {
        CacheItem {
            value: b"hello".to_vec(),
            expires_at: 1_700_000_060,
            persistent: false,
        }
    }

    #[test]
    fn set_round_trips() {
        let cmd = Command::Set {
            key: "k".to_string(),
            item: sample_item(),
        };
        let encoded = cmd.encode().unwrap();
        let decoded = Command::decode(&encoded).unwrap();
        assert_eq!(cmd, decoded);
    }

    #[test]
    fn del_round_trips() {
        let cmd = Command::Del {
            key: "k".to_string(),
        };
        let encoded = cmd.encode().unwrap();
        let decoded = Command::decode(&encoded).unwrap();
        assert_eq!(cmd, decoded);
    }

    #[test]
    fn persistent_item_round_trips() {
        let cmd = Command::Set {
            key: "forever".to_string(),
            item: CacheItem {
                value: vec![],
                expires_at: 0,
                persistent: true,
            },
        };
        let encoded = cmd.encode().unwrap();
        let decoded = Command::decode(&encoded).unwrap();
        assert_eq!(cmd, decoded);
    }

    #[test]
    fn malformed_line_is_rejected() {
        assert!(Command::decode("not json").is_err());
        assert!(Command::decode("{}").is_err());
    }

    #[test]
    fn key_accessor_covers_both_variants() {
        assert_eq!(
            Command::Del {
                key: "x".to_string()
            }
            .key(),
            "x"
        );
        assert_eq!(
            Command::Set {
                key: "y".to_string(),
                item: sample_item(),
            }
            .key(),
            "y"
        );
    }
}
