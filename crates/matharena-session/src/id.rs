//! Identifier newtypes.
//!
//! Both ids are plain `u64`s underneath. Wrapping them means a function
//! taking `(SessionId, UserId)` can't be called with the arguments swapped.

use std::fmt;
use std::str::FromStr;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::ParseSessionIdError;

/// Identifies one game session.
///
/// Displays as bare decimal digits so it can travel through URLs and JSON
/// strings and be parsed back with [`str::parse`].
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct SessionId(pub u64);

impl SessionId {
    /// A random id, for sessions that weren't assigned one by a store.
    pub fn random() -> Self {
        Self(rand::rng().random())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SessionId {
    type Err = ParseSessionIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse()
            .map(SessionId)
            .map_err(|_| ParseSessionIdError(s.to_string()))
    }
}

/// Identifies the player who owns a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub u64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "U-{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_id_display_then_parse_round_trips() {
        let id = SessionId(9_007_199_254_740_993);
        assert_eq!(id.to_string().parse::<SessionId>(), Ok(id));
    }

    #[test]
    fn test_session_id_parse_rejects_garbage() {
        let err = "abc".parse::<SessionId>().unwrap_err();
        assert_eq!(err, ParseSessionIdError("abc".into()));
        assert!("-1".parse::<SessionId>().is_err());
        assert!("".parse::<SessionId>().is_err());
    }

    #[test]
    fn test_session_id_random_is_not_constant() {
        // 64 random bits: two equal draws in a row would mean a broken RNG.
        assert_ne!(SessionId::random(), SessionId::random());
    }

    #[test]
    fn test_user_id_display() {
        assert_eq!(UserId(7).to_string(), "U-7");
    }

    #[test]
    fn test_ids_serialize_transparently() {
        assert_eq!(serde_json::to_string(&SessionId(42)).unwrap(), "42");
        assert_eq!(serde_json::to_string(&UserId(3)).unwrap(), "3");
    }
}
