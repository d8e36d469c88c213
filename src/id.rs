//! Resource identifiers.
//!
//! Every stored document is keyed by a 12-byte [`ObjectId`], rendered as 24
//! lowercase hex characters. The first four bytes are the creation time in
//! seconds, so ids sort roughly by insertion order.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::OnceLock;

use chrono::Utc;
use rand::Rng;
use serde::{Deserialize, Serialize};

const ID_BYTES: usize = 12;
const ID_HEX_LEN: usize = ID_BYTES * 2;

/// Returns `true` when `s` has the shape of a stored identifier.
///
/// Blank strings, strings of the wrong length and strings containing
/// anything other than hex digits are rejected. No store access happens.
pub fn is_valid_id(s: &str) -> bool {
    s.len() == ID_HEX_LEN && s.bytes().all(|b| b.is_ascii_hexdigit())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ObjectId([u8; ID_BYTES]);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("`{0}` is not a valid object id")]
pub struct InvalidObjectId(pub String);

struct Generator {
    process: [u8; 5],
    counter: AtomicU32,
}

fn generator() -> &'static Generator {
    static GENERATOR: OnceLock<Generator> = OnceLock::new();
    GENERATOR.get_or_init(|| {
        let mut rng = rand::thread_rng();
        Generator {
            process: rng.gen(),
            counter: AtomicU32::new(rng.gen_range(0..0x007f_ffff)),
        }
    })
}

impl ObjectId {
    pub fn new() -> Self {
        let generator = generator();
        let seconds = u32::try_from(Utc::now().timestamp()).unwrap_or(u32::MAX);
        let count = generator.counter.fetch_add(1, Ordering::Relaxed) & 0x00ff_ffff;

        let mut bytes = [0u8; ID_BYTES];
        bytes[..4].copy_from_slice(&seconds.to_be_bytes());
        bytes[4..9].copy_from_slice(&generator.process);
        bytes[9..].copy_from_slice(&count.to_be_bytes()[1..]);
        Self(bytes)
    }

    pub fn parse(s: &str) -> Result<Self, InvalidObjectId> {
        if !is_valid_id(s) {
            return Err(InvalidObjectId(s.to_owned()));
        }
        let mut bytes = [0u8; ID_BYTES];
        hex::decode_to_slice(s, &mut bytes).map_err(|_| InvalidObjectId(s.to_owned()))?;
        Ok(Self(bytes))
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl Default for ObjectId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for ObjectId {
    type Err = InvalidObjectId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ObjectId {
    type Error = InvalidObjectId;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ObjectId> for String {
    fn from(id: ObjectId) -> Self {
        id.to_hex()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("")]
    #[case("   ")]
    #[case("                        ")]
    #[case("not-an-id")]
    #[case("65f1c2a9b4e8d7f6a5b4c3d")]
    #[case("65f1c2a9b4e8d7f6a5b4c3d2e")]
    #[case("65f1c2a9b4e8d7f6a5b4c3dz")]
    #[case("123e4567-e89b-12d3-a456-426614174000")]
    fn rejects_malformed_ids(#[case] raw: &str) {
        assert!(!is_valid_id(raw));
        assert!(ObjectId::parse(raw).is_err());
    }

    #[test]
    fn fresh_ids_are_valid_and_distinct() {
        let first = ObjectId::new();
        let second = ObjectId::new();
        assert!(is_valid_id(&first.to_string()));
        assert_ne!(first, second);
        assert_eq!(ObjectId::parse(&first.to_string()), Ok(first));
    }

    #[test]
    fn parsing_accepts_upper_case_and_renders_lower_case() {
        let id = ObjectId::parse("65F1C2A9B4E8D7F6A5B4C3D2").expect("valid id");
        assert_eq!(id.to_string(), "65f1c2a9b4e8d7f6a5b4c3d2");
    }

    #[test]
    fn serde_uses_hex_strings() {
        let id = ObjectId::new();
        let json = serde_json::to_value(id).expect("serialize");
        assert_eq!(json, serde_json::Value::String(id.to_string()));
        let err = serde_json::from_value::<ObjectId>(serde_json::json!("zz"));
        assert!(err.is_err());
    }

    #[test]
    fn later_ids_sort_after_earlier_ones() {
        let ids: Vec<ObjectId> = (0..50).map(|_| ObjectId::new()).collect();
        let mut sorted = ids.clone();
        sorted.sort();
        assert_eq!(ids, sorted);
    }
}
