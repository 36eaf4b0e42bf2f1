use std::fmt;

use serde::{Deserialize, Serialize};

/// Whether a creator is a two-field (first/last) or single-field name.
///
/// The wire form uses `name` for single-field creators; internally that maps
/// to `last_name` with `SingleField` mode, so the two wire shapes hash and
/// compare identically when they denote the same name data.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NameMode {
    #[default]
    TwoField,
    SingleField,
}

/// The name data of a creator, the unit of per-library deduplication.
///
/// Creators are shared rows: every item whose creator matches this data
/// exactly references the same creator row, found via [`CreatorData::hash`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CreatorData {
    pub first_name: String,
    pub last_name: String,
    pub mode: NameMode,
}

impl CreatorData {
    pub fn two_field(first: impl Into<String>, last: impl Into<String>) -> Self {
        Self {
            first_name: first.into(),
            last_name: last.into(),
            mode: NameMode::TwoField,
        }
    }

    pub fn single_field(name: impl Into<String>) -> Self {
        Self {
            first_name: String::new(),
            last_name: name.into(),
            mode: NameMode::SingleField,
        }
    }

    /// Returns `true` if both name fields are empty.
    pub fn is_empty(&self) -> bool {
        self.first_name.is_empty() && self.last_name.is_empty()
    }

    /// Content hash used for library-wide creator dedup lookups.
    ///
    /// Length-prefixed so `("ab", "c")` and `("a", "bc")` hash differently.
    pub fn hash(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&(self.first_name.len() as u64).to_le_bytes());
        hasher.update(self.first_name.as_bytes());
        hasher.update(&(self.last_name.len() as u64).to_le_bytes());
        hasher.update(self.last_name.as_bytes());
        hasher.update(&[match self.mode {
            NameMode::TwoField => 0u8,
            NameMode::SingleField => 1u8,
        }]);
        hex::encode(hasher.finalize().as_bytes())
    }
}

impl fmt::Display for CreatorData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.mode {
            NameMode::SingleField => f.write_str(&self.last_name),
            NameMode::TwoField if self.first_name.is_empty() => f.write_str(&self.last_name),
            NameMode::TwoField => write!(f, "{}, {}", self.last_name, self.first_name),
        }
    }
}
