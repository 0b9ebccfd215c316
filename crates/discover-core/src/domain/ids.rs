//! Strongly-typed ULID identifiers.
//!
//! `Id<T>` shares one implementation across id kinds while the marker type
//! `T` keeps them apart at compile time: a `CorrelationId` cannot be passed
//! where a `SuggestionId` is expected.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;
use ulid::Ulid;

/// Marker trait providing the display prefix of an id kind.
pub trait IdMarker: Send + Sync + 'static {
    fn prefix() -> &'static str;
}

#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent, bound = "")]
pub struct Id<T: IdMarker> {
    ulid: Ulid,
    #[serde(skip)]
    _marker: PhantomData<T>,
}

impl<T: IdMarker> Id<T> {
    pub fn from_ulid(ulid: Ulid) -> Self {
        Self {
            ulid,
            _marker: PhantomData,
        }
    }

    pub fn as_ulid(&self) -> Ulid {
        self.ulid
    }
}

impl<T: IdMarker> From<Ulid> for Id<T> {
    fn from(ulid: Ulid) -> Self {
        Self::from_ulid(ulid)
    }
}

impl<T: IdMarker> fmt::Display for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", T::prefix(), self.ulid)
    }
}

/// Marker for the per-dispatch correlation id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Correlation {}

impl IdMarker for Correlation {
    fn prefix() -> &'static str {
        "corr-"
    }
}

/// Marker for persisted suggestions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SuggestionMarker {}

impl IdMarker for SuggestionMarker {
    fn prefix() -> &'static str {
        "suggestion-"
    }
}

/// Ties log events of one handler invocation together.
pub type CorrelationId = Id<Correlation>;

/// ULIDs sort by creation time, so newer suggestions compare greater.
pub type SuggestionId = Id<SuggestionMarker>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_uses_kind_prefix() {
        let ulid = Ulid::new();
        let corr = CorrelationId::from_ulid(ulid);
        let sugg = SuggestionId::from_ulid(ulid);

        assert_eq!(corr.to_string(), format!("corr-{ulid}"));
        assert_eq!(sugg.to_string(), format!("suggestion-{ulid}"));
    }

    #[test]
    fn serializes_as_bare_ulid() {
        let ulid = Ulid::new();
        let id = SuggestionId::from_ulid(ulid);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{ulid}\""));

        let back: SuggestionId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }
}
