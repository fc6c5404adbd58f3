use chrono::{DateTime, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Label the service and the shells use for the user's root folder.
pub const HOME_LABEL: &str = "Home";

/// Which folder a listing, upload or delete targets.
///
/// `Home` is the user's root; on the wire it means "omit the `dir` parameter".
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum FolderKey {
    #[default]
    Home,
    Named(String),
}

impl FolderKey {
    /// Parse a user-typed folder label. Blank input and the exact `Home`
    /// label map to the root; anything else, `home` included, is a subfolder.
    pub fn parse(label: &str) -> Self {
        let trimmed = label.trim();
        if trimmed.is_empty() || trimmed == HOME_LABEL {
            FolderKey::Home
        } else {
            FolderKey::Named(trimmed.to_string())
        }
    }

    /// A subfolder name exactly as `/subdirs` reported it.
    pub fn subfolder(name: &str) -> Self {
        FolderKey::Named(name.to_string())
    }

    pub fn is_home(&self) -> bool {
        matches!(self, FolderKey::Home)
    }

    /// Value of the `dir` query parameter, if any.
    pub fn dir(&self) -> Option<&str> {
        match self {
            FolderKey::Home => None,
            FolderKey::Named(name) => Some(name),
        }
    }
}

impl fmt::Display for FolderKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FolderKey::Home => f.write_str(HOME_LABEL),
            FolderKey::Named(name) => f.write_str(name),
        }
    }
}

impl From<&str> for FolderKey {
    fn from(label: &str) -> Self {
        FolderKey::parse(label)
    }
}

/// A file as reported by `/files`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileEntry {
    pub name: String,
    pub size: u64,
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub created: NaiveDateTime,
}

/// One line of the user's activity history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityRecord {
    pub action: String,
    pub filename: String,
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub timestamp: NaiveDateTime,
}

/// Who the session acts for. The username is passed through to every request
/// and never interpreted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContext {
    pub username: String,
}

impl SessionContext {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawTimestamp {
    Text(String),
    Seconds(f64),
}

/// Accepts the service's offset-less ISO-8601 timestamps, RFC 3339 values,
/// and numeric Unix seconds.
pub(crate) fn parse_timestamp(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    if let Ok(with_offset) = DateTime::parse_from_rfc3339(text) {
        return Some(with_offset.naive_utc());
    }
    NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()
}

fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<NaiveDateTime, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    match RawTimestamp::deserialize(deserializer)? {
        RawTimestamp::Text(text) => parse_timestamp(&text)
            .ok_or_else(|| D::Error::custom(format!("invalid timestamp: {text}"))),
        RawTimestamp::Seconds(secs) => {
            let whole = secs.floor();
            let nanos = ((secs - whole) * 1e9) as u32;
            let whole = whole as i64;
            DateTime::from_timestamp(whole, nanos)
                .map(|dt| dt.naive_utc())
                .ok_or_else(|| D::Error::custom(format!("timestamp out of range: {secs}")))
        }
    }
}
