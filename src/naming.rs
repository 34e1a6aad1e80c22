//! Storage names double as the metadata store: the upload timestamp and the
//! original filename are encoded into the on-disk name, so there is no index
//! to keep in sync. Everything that knows the layout of a storage name lives
//! in this module.

use std::fmt;

/// Joins the timestamp prefix to the original filename.
pub const SEPARATOR: char = '-';

/// Prefix for pasted text notes.
pub const TEXT_PREFIX: &str = "text_";

/// Extension for pasted text notes.
pub const TEXT_EXTENSION: &str = ".txt";

/// Directory under the storage root for writes that are not yet complete.
/// It is never an item.
pub const STAGING_DIR: &str = ".staging";

#[derive(Debug, Clone, PartialEq, Eq)]
enum ItemKind {
    File(String),
    Text,
}

/// A storage name being generated for a new item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageName {
    kind: ItemKind,
    timestamp: i64,
}

impl StorageName {
    /// Name for an uploaded file. Returns `None` when the original filename
    /// has nothing usable left after sanitizing.
    pub fn for_file(original_name: &str, timestamp: i64) -> Option<Self> {
        sanitize_filename(original_name).map(|name| StorageName {
            kind: ItemKind::File(name),
            timestamp,
        })
    }

    /// Name for a pasted text note.
    pub fn for_text(timestamp: i64) -> Self {
        StorageName {
            kind: ItemKind::Text,
            timestamp,
        }
    }

    /// Epoch milliseconds embedded in the name.
    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    /// Same item, different timestamp. Used to step past an occupied name.
    pub fn with_timestamp(&self, timestamp: i64) -> Self {
        StorageName {
            kind: self.kind.clone(),
            timestamp,
        }
    }

    /// Human-facing name: the original filename, or the whole synthetic
    /// name for text notes.
    pub fn display_name(&self) -> String {
        match &self.kind {
            ItemKind::File(name) => name.clone(),
            ItemKind::Text => self.to_string(),
        }
    }
}

impl fmt::Display for StorageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ItemKind::File(name) => write!(f, "{}{}{}", self.timestamp, SEPARATOR, name),
            ItemKind::Text => write!(f, "{}{}{}", TEXT_PREFIX, self.timestamp, TEXT_EXTENSION),
        }
    }
}

/// What can be recovered from an existing storage name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedName {
    pub display_name: String,
    /// `None` when the name carries no usable timestamp; callers fall back
    /// to filesystem metadata.
    pub upload_time: Option<i64>,
}

/// Inverse of [`StorageName`]'s `Display`.
///
/// Text notes keep their full name for display. For everything else the
/// part before the first separator is only treated as a timestamp (and
/// stripped) when it is all digits, so foreign files such as `my-notes.md`
/// keep their name intact.
pub fn parse(storage_name: &str) -> ParsedName {
    if let Some(rest) = storage_name.strip_prefix(TEXT_PREFIX) {
        return ParsedName {
            display_name: storage_name.to_string(),
            upload_time: leading_millis(rest),
        };
    }

    if let Some((prefix, original)) = storage_name.split_once(SEPARATOR) {
        if !prefix.is_empty() && prefix.bytes().all(|b| b.is_ascii_digit()) {
            return ParsedName {
                display_name: original.to_string(),
                upload_time: leading_millis(prefix),
            };
        }
    }

    ParsedName {
        display_name: storage_name.to_string(),
        upload_time: None,
    }
}

/// Parses the run of ASCII digits at the start of `s`. Zero counts as
/// missing.
fn leading_millis(s: &str) -> Option<i64> {
    let end = s
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(s.len());
    s[..end].parse::<i64>().ok().filter(|ts| *ts > 0)
}

/// Reduces a client-supplied filename to a single safe path component:
/// directories and control characters are dropped and surrounding
/// whitespace is trimmed.
pub fn sanitize_filename(original: &str) -> Option<String> {
    let base = original.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = base.chars().filter(|c| !c.is_control()).collect();
    let cleaned = cleaned.trim();

    match cleaned {
        "" | "." | ".." => None,
        name => Some(name.to_string()),
    }
}

/// Whether `name` may address an item directly under the storage root.
///
/// Rejects anything that could escape the root or reach the staging area.
pub fn is_valid_storage_name(name: &str) -> bool {
    !matches!(name, "" | "." | ".." | STAGING_DIR) && !name.contains(['/', '\\', '\0'])
}
