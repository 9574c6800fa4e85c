use crate::{ConceptId, PersonId};
use chrono::NaiveDate;
use serde::{de, Deserialize, Deserializer};
use std::{fs, io, path::Path};

/// Converts a not found error to Ok(false)
pub fn path_exists(path: &Path) -> io::Result<bool> {
    match fs::metadata(path) {
        Ok(_) => Ok(true),
        Err(e) if matches!(e.kind(), io::ErrorKind::NotFound) => Ok(false),
        Err(e) => Err(e),
    }
}

// Helpers for serde to parse fields with quirks.

/// Era tables exported from databases write missing values as "", "null" or "NULL".
fn is_null(s: &str) -> bool {
    s.is_empty() || s.eq_ignore_ascii_case("null")
}

/// Parse an identifier, mapping 'null' and the empty string to `None`.
pub fn optional_id<'de, D>(d: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let s: String = Deserialize::deserialize(d)?;
    let s = s.trim();
    if is_null(s) {
        return Ok(None);
    }
    s.parse::<u64>()
        .map(Some)
        .map_err(|e| de::Error::custom(format!("invalid identifier `{}`: {}", s, e)))
}

/// Parse a date (yyyy-mm-dd), mapping 'null' and the empty string to `None`.
///
/// A trailing midnight time (as written by some database exports) is accepted and dropped.
pub fn optional_date<'de, D>(d: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    let s: String = Deserialize::deserialize(d)?;
    let s = s.trim();
    if is_null(s) {
        return Ok(None);
    }
    let date_part = s
        .strip_suffix("00:00:00")
        .map(str::trim_end)
        .unwrap_or(s);
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d")
        .map(Some)
        .map_err(|e| de::Error::custom(format!("invalid date `{}`: {}", s, e)))
}

/// Label an era in log messages.
pub fn describe_era(person_id: Option<PersonId>, concept_id: Option<ConceptId>) -> String {
    match (person_id, concept_id) {
        (Some(p), Some(c)) => format!("person {} concept {}", p, c),
        (Some(p), None) => format!("person {} (no concept)", p),
        (None, Some(c)) => format!("concept {} (no person)", c),
        (None, None) => "unidentified era".to_string(),
    }
}
