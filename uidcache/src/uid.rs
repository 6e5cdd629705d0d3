//! Stable identifiers attached to host entities
//!
//! A UID is a 10-character lowercase hexadecimal token. It is generated once,
//! stored by the host as a plain string attribute, and never recycled: an
//! orphaned UID simply stops resolving.

use crate::error::{Result, UidCacheError};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Length of a well-formed UID in characters
pub const UID_LEN: usize = 10;

const HEX_DIGITS: &[u8; 16] = b"0123456789abcdef";

/// Generate a fresh UID.
///
/// No uniqueness check is made against existing UIDs; with 16^10 possible
/// values the collision risk is accepted. Callers that need a guarantee
/// re-generate on observed collision (see [`crate::resolver::Resolver::assign`]).
pub fn generate_uid() -> Uid {
    let mut rng = rand::thread_rng();
    let token: String = (0..UID_LEN)
        .map(|_| HEX_DIGITS[rng.gen_range(0..HEX_DIGITS.len())] as char)
        .collect();
    Uid(token)
}

/// True iff `s` is exactly 10 characters, all in `[0-9a-f]`.
pub fn is_valid_format(s: &str) -> bool {
    s.len() == UID_LEN && s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

/// A stable identifier attached to a host entity
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Uid(String);

impl Uid {
    /// Generate a fresh, well-formed UID
    pub fn generate() -> Self {
        generate_uid()
    }

    /// Parse a UID, rejecting anything that is not 10 lowercase hex characters
    pub fn parse(value: &str) -> Result<Self> {
        if is_valid_format(value) {
            Ok(Uid(value.to_string()))
        } else {
            Err(UidCacheError::InvalidUid {
                value: value.to_string(),
            })
        }
    }

    /// Accept a UID read back from a host document.
    ///
    /// Documents may carry identifiers written by older versions, so any
    /// non-blank string is kept as an opaque identity. A blank attribute is the
    /// host's "unset" value and yields `None`.
    pub fn from_persisted(value: impl Into<String>) -> Option<Self> {
        let value = value.into();
        if value.trim().is_empty() {
            None
        } else {
            Some(Uid(value))
        }
    }

    /// Whether this UID matches the canonical generated format
    pub fn is_well_formed(&self) -> bool {
        is_valid_format(&self.0)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for Uid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Uid {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Identity of a container that UIDs are looked up in (a material's node
/// tree, a node group, ...). The same UID string in two scopes names two
/// different entities.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScopeId(String);

impl ScopeId {
    pub fn new(id: impl Into<String>) -> Self {
        ScopeId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ScopeId {
    fn from(id: &str) -> Self {
        ScopeId(id.to_string())
    }
}

impl From<String> for ScopeId {
    fn from(id: String) -> Self {
        ScopeId(id)
    }
}

/// Cache key for a resolution: a UID qualified by the scope it lives in
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScopedUid {
    pub scope: ScopeId,
    pub uid: Uid,
}

impl ScopedUid {
    pub fn new(scope: ScopeId, uid: Uid) -> Self {
        Self { scope, uid }
    }
}

impl fmt::Display for ScopedUid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.scope, self.uid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_generated_uid_is_valid() {
        for _ in 0..1_000 {
            let uid = generate_uid();
            assert!(is_valid_format(uid.as_str()), "bad uid: {}", uid);
            assert!(uid.is_well_formed());
        }
    }

    #[test]
    fn test_generated_uids_do_not_repeat() {
        let mut seen = HashSet::with_capacity(100_000);
        for _ in 0..100_000 {
            assert!(seen.insert(generate_uid()));
        }
    }

    #[test]
    fn test_is_valid_format() {
        assert!(is_valid_format("0123456789"));
        assert!(is_valid_format("abcdef0123"));
        assert!(!is_valid_format("ABCDEF0123"));
        assert!(!is_valid_format("abcdef012"));
        assert!(!is_valid_format("abcdef01234"));
        assert!(!is_valid_format("abcdefg123"));
        assert!(!is_valid_format(""));
        // multi-byte characters must not sneak past the length check
        assert!(!is_valid_format("ééééé"));
    }

    #[test]
    fn test_parse() {
        let uid = Uid::parse("00ff00ff00").unwrap();
        assert_eq!(uid.as_str(), "00ff00ff00");

        let err = Uid::parse("not-a-uid").unwrap_err();
        assert!(matches!(err, UidCacheError::InvalidUid { .. }));
    }

    #[test]
    fn test_from_persisted() {
        assert!(Uid::from_persisted("").is_none());
        assert!(Uid::from_persisted("   ").is_none());

        let legacy = Uid::from_persisted("u0").unwrap();
        assert_eq!(legacy.as_str(), "u0");
        assert!(!legacy.is_well_formed());
    }

    #[test]
    fn test_scoped_uid_display() {
        let key = ScopedUid::new(ScopeId::from("Material"), Uid::parse("0123456789").unwrap());
        assert_eq!(key.to_string(), "Material/0123456789");
    }

    #[test]
    fn test_serde_is_transparent() {
        let uid = Uid::parse("0123456789").unwrap();
        assert_eq!(serde_json::to_string(&uid).unwrap(), "\"0123456789\"");
    }
}
