use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Alphabet for server-assigned keys. Excludes characters that are easy to
/// misread (0/O, 1/I/L) while still matching the accepted `[A-Z0-9]{8}` form.
const KEY_ALPHABET: &[u8] = b"23456789ABCDEFGHJKMNPQRSTUVWXYZ";

/// Public identifier of an object within a library.
///
/// Eight characters matching `[A-Z0-9]{8}`, immutable for the object's
/// lifetime. Keys may be client-assigned (sync upload) or server-assigned
/// (see [`ObjectKey::generate`]). `(LibraryId, ObjectKey)` is unique and
/// stable; the mapping to the internal [`ObjectId`] is cached but always
/// re-derivable from the store.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ObjectKey([u8; 8]);

impl ObjectKey {
    /// Parse and validate a key string.
    pub fn parse(s: &str) -> Result<Self, TypeError> {
        let bytes = s.as_bytes();
        if bytes.len() != 8 {
            return Err(TypeError::InvalidKey(s.to_string()));
        }
        let mut arr = [0u8; 8];
        for (slot, &b) in arr.iter_mut().zip(bytes) {
            if !b.is_ascii_uppercase() && !b.is_ascii_digit() {
                return Err(TypeError::InvalidKey(s.to_string()));
            }
            *slot = b;
        }
        Ok(Self(arr))
    }

    /// Generate a fresh server-assigned key.
    ///
    /// Uniqueness within a library is the caller's responsibility (checked
    /// against the identity resolver before registration).
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        let mut arr = [0u8; 8];
        for slot in &mut arr {
            *slot = KEY_ALPHABET[rng.gen_range(0..KEY_ALPHABET.len())];
        }
        Self(arr)
    }

    /// The key as a string slice.
    pub fn as_str(&self) -> &str {
        // Validated ASCII on construction.
        std::str::from_utf8(&self.0).expect("key is ASCII")
    }
}

impl fmt::Debug for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectKey({})", self.as_str())
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for ObjectKey {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<ObjectKey> for String {
    fn from(key: ObjectKey) -> Self {
        key.as_str().to_string()
    }
}

/// Internal numeric identifier of an object.
///
/// Assigned at creation from a per-shard sequence, stable, never reused.
/// Not exposed through the public API; the wire identity of an object is its
/// [`ObjectKey`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectId(i64);

impl ObjectId {
    /// Wrap a raw id, rejecting non-positive values.
    pub fn new(id: i64) -> Result<Self, TypeError> {
        if id <= 0 {
            return Err(TypeError::InvalidObjectId(id));
        }
        Ok(Self(id))
    }

    /// The raw numeric value.
    pub fn get(&self) -> i64 {
        self.0
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectId({})", self.0)
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn parse_accepts_uppercase_alphanumeric() {
        let key = ObjectKey::parse("ABCD1234").unwrap();
        assert_eq!(key.as_str(), "ABCD1234");
    }

    #[test]
    fn parse_rejects_lowercase() {
        assert!(ObjectKey::parse("abcd1234").is_err());
    }

    #[test]
    fn parse_rejects_wrong_length() {
        assert!(ObjectKey::parse("ABC123").is_err());
        assert!(ObjectKey::parse("ABCD12345").is_err());
        assert!(ObjectKey::parse("").is_err());
    }

    #[test]
    fn parse_rejects_non_ascii() {
        assert!(ObjectKey::parse("ÀBCD1234").is_err());
    }

    #[test]
    fn generated_keys_are_valid() {
        for _ in 0..100 {
            let key = ObjectKey::generate();
            assert!(ObjectKey::parse(key.as_str()).is_ok());
        }
    }

    #[test]
    fn serde_roundtrip() {
        let key = ObjectKey::parse("ZXCV0987").unwrap();
        let json = serde_json::to_string(&key).unwrap();
        assert_eq!(json, "\"ZXCV0987\"");
        let parsed: ObjectKey = serde_json::from_str(&json).unwrap();
        assert_eq!(key, parsed);
    }

    #[test]
    fn serde_rejects_invalid_key() {
        assert!(serde_json::from_str::<ObjectKey>("\"bad key!\"").is_err());
    }

    #[test]
    fn object_id_rejects_non_positive() {
        assert!(ObjectId::new(0).is_err());
        assert!(ObjectId::new(-5).is_err());
        assert_eq!(ObjectId::new(42).unwrap().get(), 42);
    }

    proptest! {
        #[test]
        fn parse_roundtrips_valid_keys(s in "[A-Z0-9]{8}") {
            let key = ObjectKey::parse(&s).unwrap();
            prop_assert_eq!(key.as_str(), s.as_str());
        }

        #[test]
        fn parse_never_panics(s in ".*") {
            let _ = ObjectKey::parse(&s);
        }
    }
}
