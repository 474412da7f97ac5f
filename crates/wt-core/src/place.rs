//! Place (world) identifiers.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Prefix shared by every world id.
const WORLD_PREFIX: &str = "wrld_";

/// Length of the hex-and-hyphen token following the prefix.
const WORLD_TOKEN_LEN: usize = 36;

/// Base URL used to link to a world.
const WORLD_URL_BASE: &str = "https://vrch.at/";

/// Stable identifier of a visited world, e.g. `wrld_4432ea9b-729c-46e3-8eaf-846aa0a37fdd`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PlaceId(String);

/// Error for strings that are not world ids.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid place id: {0}")]
pub struct PlaceIdError(String);

impl PlaceId {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Public link for this world.
    #[must_use]
    pub fn url(&self) -> String {
        place_url(&self.0)
    }

    fn is_valid(s: &str) -> bool {
        s.strip_prefix(WORLD_PREFIX).is_some_and(|token| {
            token.len() == WORLD_TOKEN_LEN
                && token
                    .bytes()
                    .all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f' | b'-'))
        })
    }
}

/// Link for a raw stored id, which is not re-validated.
pub(crate) fn place_url(id: &str) -> String {
    format!("{WORLD_URL_BASE}{id}")
}

impl fmt::Display for PlaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for PlaceId {
    type Err = PlaceIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if Self::is_valid(s) {
            Ok(Self(s.to_string()))
        } else {
            Err(PlaceIdError(s.to_string()))
        }
    }
}

impl AsRef<str> for PlaceId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_world_id() {
        let id: PlaceId = "wrld_4432ea9b-729c-46e3-8eaf-846aa0a37fdd"
            .parse()
            .expect("should parse");
        assert_eq!(id.as_str(), "wrld_4432ea9b-729c-46e3-8eaf-846aa0a37fdd");
        assert_eq!(
            id.url(),
            "https://vrch.at/wrld_4432ea9b-729c-46e3-8eaf-846aa0a37fdd"
        );
    }

    #[test]
    fn rejects_wrong_prefix_or_length() {
        assert!("usr_4432ea9b-729c-46e3-8eaf-846aa0a37fdd".parse::<PlaceId>().is_err());
        assert!("wrld_4432ea9b".parse::<PlaceId>().is_err());
        assert!("wrld_4432EA9B-729C-46E3-8EAF-846AA0A37FDD".parse::<PlaceId>().is_err());
    }

    #[test]
    fn error_names_the_input() {
        let err = "nope".parse::<PlaceId>().unwrap_err();
        assert_eq!(err.to_string(), "invalid place id: nope");
    }
}
