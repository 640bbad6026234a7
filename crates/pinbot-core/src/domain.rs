use std::fmt;

use crate::{errors::Error, Result};

/// Telegram chat id (numeric).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ChatId(pub i64);

/// A validated 6-digit postal (PIN) code.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PostalCode(String);

impl PostalCode {
    pub const LEN: usize = 6;

    /// Accepts exactly six ASCII digits. No trimming happens here; callers that
    /// take free text from users are expected to trim first.
    pub fn parse(raw: &str) -> Result<Self> {
        if raw.len() == Self::LEN && raw.bytes().all(|b| b.is_ascii_digit()) {
            Ok(Self(raw.to_string()))
        } else {
            Err(Error::InvalidInput(raw.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PostalCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Base delivery indicator from the master directory.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeliveryFlag {
    Yes,
    No,
    Unknown,
}

impl DeliveryFlag {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_uppercase().as_str() {
            "Y" | "YES" | "TRUE" | "1" => Self::Yes,
            "N" | "NO" | "FALSE" | "0" => Self::No,
            _ => Self::Unknown,
        }
    }
}

/// One row of the master directory: a named area registered under a code.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AreaRecord {
    pub postal_code: String,
    /// May be blank.
    pub area_name: String,
    pub delivery_flag: DeliveryFlag,
    pub city: String,
    pub state: String,
}

/// How a negative-area source's rows are matched against a code.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MatchMode {
    /// Any row for the code blocks the entire code.
    CodeOnly,
    /// Rows name individual areas; a blank area still blocks the entire code.
    CodeAndArea,
}

/// A row produced by a negative-area source.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExclusionEntry {
    pub source_id: String,
    pub postal_code: String,
    /// `None` or blank blocks the whole code.
    pub area_name: Option<String>,
}

/// Presence of a code in the hard-block list disqualifies it unconditionally.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HardBlockEntry {
    pub postal_code: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AreaVerdict {
    pub area_name: String,
    pub serviceable: bool,
}

/// Result of resolving one postal code. Built fresh per query.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServiceabilityReport {
    pub postal_code: PostalCode,
    pub city: String,
    pub state: String,
    pub serviceable_areas: Vec<String>,
    pub non_serviceable_areas: Vec<String>,
    pub hard_blocked: bool,
    pub overall_deliverable: bool,
}

/// Outcome of a successful (well-formed) query.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Resolution {
    Found(ServiceabilityReport),
    /// The code is well-formed but has no directory rows.
    NotFound(PostalCode),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn postal_code_requires_six_ascii_digits() {
        assert!(PostalCode::parse("110086").is_ok());
        assert!(PostalCode::parse("12345").is_err());
        assert!(PostalCode::parse("1234567").is_err());
        assert!(PostalCode::parse("11008a").is_err());
        assert!(PostalCode::parse(" 110086").is_err());
        assert!(PostalCode::parse("").is_err());
        // Non-ASCII digits (Devanagari) are rejected.
        assert!(PostalCode::parse("११००८६").is_err());
    }

    #[test]
    fn delivery_flag_parsing_is_lenient() {
        assert_eq!(DeliveryFlag::parse(" y "), DeliveryFlag::Yes);
        assert_eq!(DeliveryFlag::parse("YES"), DeliveryFlag::Yes);
        assert_eq!(DeliveryFlag::parse("n"), DeliveryFlag::No);
        assert_eq!(DeliveryFlag::parse(""), DeliveryFlag::Unknown);
        assert_eq!(DeliveryFlag::parse("maybe"), DeliveryFlag::Unknown);
    }
}
