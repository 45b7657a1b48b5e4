// ============================================================
// Layer 3 — Dataset Split
// ============================================================
// A named partition of the dataset. The split decides which
// record files under the data directory are read:
//
//   all    → every "*.tfrecord"
//   train  → "*train.tfrecord"
//   valid  → "*valid.tfrecord"
//   test   → "*test.tfrecord"

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::error::VocoderError;

/// Extension shared by every record file.
pub const RECORD_EXTENSION: &str = ".tfrecord";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Split {
    #[default]
    All,
    Train,
    Valid,
    Test,
}

impl Split {
    pub fn as_str(&self) -> &'static str {
        match self {
            Split::All => "all",
            Split::Train => "train",
            Split::Valid => "valid",
            Split::Test => "test",
        }
    }

    /// Glob-style description of the files this split reads.
    pub fn file_pattern(&self) -> String {
        match self {
            Split::All => format!("*{RECORD_EXTENSION}"),
            other => format!("*{}{RECORD_EXTENSION}", other.as_str()),
        }
    }

    /// True when `file_name` matches this split's pattern.
    pub fn matches(&self, file_name: &str) -> bool {
        match self {
            Split::All => file_name.ends_with(RECORD_EXTENSION),
            other => file_name.ends_with(&format!("{}{RECORD_EXTENSION}", other.as_str())),
        }
    }
}

impl FromStr for Split {
    type Err = VocoderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(Split::All),
            "train" => Ok(Split::Train),
            "valid" => Ok(Split::Valid),
            "test" => Ok(Split::Test),
            other => Err(VocoderError::InvalidSplit(other.to_string())),
        }
    }
}

impl fmt::Display for Split {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_train_only_matches_train_files() {
        let split = Split::Train;
        assert!(split.matches("data_train.tfrecord"));
        assert!(!split.matches("data_valid.tfrecord"));
        assert!(!split.matches("data_test.tfrecord"));
        assert!(!split.matches("data_train.csv"));
    }

    #[test]
    fn test_all_matches_every_record_file() {
        for name in ["a_train.tfrecord", "b_valid.tfrecord", "c.tfrecord"] {
            assert!(Split::All.matches(name));
        }
        assert!(!Split::All.matches("metadata.pickle"));
    }

    #[test]
    fn test_patterns() {
        assert_eq!(Split::All.file_pattern(), "*.tfrecord");
        assert_eq!(Split::Valid.file_pattern(), "*valid.tfrecord");
    }

    #[test]
    fn test_parse_rejects_unknown() {
        assert_eq!("test".parse::<Split>().unwrap(), Split::Test);
        assert!(matches!("eval".parse::<Split>(), Err(VocoderError::InvalidSplit(_))));
    }
}
