// src/models.rs

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Items larger than this are never transferred (6 GiB).
pub const MAX_ITEM_SIZE: u64 = 6 * 1024 * 1024 * 1024;

/// The kind of media attached to a message.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Video,
    Document,
    Other,
}

/// Media metadata as delivered by the listing collaborator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RawMedia {
    pub kind: MediaKind,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub file_name: Option<String>,
}

/// One message of a collection's history, media or not.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RawMessage {
    pub id: u64,
    #[serde(default)]
    pub media: Option<RawMedia>,
}

/// A media-bearing message scheduled for transfer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Item {
    pub id: u64,
    /// Size announced by the source, in bytes.
    pub size: u64,
    pub kind: MediaKind,
    pub file_name: Option<String>,
    pub collection_id: i64,
}

impl Item {
    /// Builds an item from a raw message, or `None` when it carries no media.
    pub fn from_message(message: &RawMessage, collection_id: i64) -> Option<Self> {
        let media = message.media.as_ref()?;
        Some(Self {
            id: message.id,
            size: media.size,
            kind: media.kind,
            file_name: media.file_name.clone(),
            collection_id,
        })
    }

    pub fn is_oversize(&self, ceiling: u64) -> bool {
        self.size > ceiling
    }

    /// Local file name for this item: the source name prefixed with the item id,
    /// so distinct items never share a path and a re-fetch lands on the same one.
    pub fn local_file_name(&self) -> String {
        let name = self
            .file_name
            .as_deref()
            .and_then(|name| Path::new(name).file_name())
            .and_then(|name| name.to_str())
            .filter(|name| !name.is_empty());
        match name {
            Some(name) => format!("{}_{}", self.id, name),
            None => format!("{}.bin", self.id),
        }
    }
}

/// How a collection is named for humans and on disk.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum DisplayName {
    Titled(String),
    PersonName(String, String),
    IdOnly(i64),
}

impl DisplayName {
    /// Picks the first applicable name: title, then first/last name, then the id.
    pub fn resolve(
        id: i64,
        title: Option<&str>,
        first_name: Option<&str>,
        last_name: Option<&str>,
    ) -> Self {
        fn non_empty(s: Option<&str>) -> Option<&str> {
            s.map(str::trim).filter(|s| !s.is_empty())
        }

        if let Some(title) = non_empty(title) {
            return Self::Titled(title.to_string());
        }
        match (non_empty(first_name), non_empty(last_name)) {
            (None, None) => Self::IdOnly(id),
            (first, last) => Self::PersonName(
                first.unwrap_or_default().to_string(),
                last.unwrap_or_default().to_string(),
            ),
        }
    }
}

impl fmt::Display for DisplayName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Titled(title) => f.write_str(title),
            Self::PersonName(first, last) if last.is_empty() => f.write_str(first),
            Self::PersonName(first, last) if first.is_empty() => f.write_str(last),
            Self::PersonName(first, last) => write!(f, "{first} {last}"),
            Self::IdOnly(id) => write!(f, "ID {id}"),
        }
    }
}

/// The channel, group or user whose media is being archived.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Collection {
    pub id: i64,
    pub name: DisplayName,
}

impl Collection {
    pub fn new(id: i64, name: DisplayName) -> Self {
        Self { id, name }
    }

    pub fn display_name(&self) -> String {
        self.name.to_string()
    }

    /// Whether `choice` names this collection: its display name, its title,
    /// "first last", or its id.
    pub fn matches(&self, choice: &str) -> bool {
        let choice = choice.trim();
        if choice == self.id.to_string() || choice == self.display_name() {
            return true;
        }
        match &self.name {
            DisplayName::Titled(title) => title == choice,
            DisplayName::PersonName(first, last) => format!("{first} {last}") == choice,
            DisplayName::IdOnly(_) => false,
        }
    }

    /// The display name made safe for use as one path component.
    pub fn folder_name(&self) -> String {
        let cleaned: String = self
            .display_name()
            .chars()
            .map(|c| match c {
                '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
                c if c.is_control() => '_',
                c => c,
            })
            .collect();
        let cleaned = cleaned.trim().trim_matches('.').to_string();
        if cleaned.is_empty() {
            format!("collection_{}", self.id)
        } else {
            cleaned
        }
    }
}

/// Picks a collection from a listing by 1-based index, name or id.
pub fn select_collection<'a>(collections: &'a [Collection], choice: &str) -> Option<&'a Collection> {
    let choice = choice.trim();
    if let Ok(index) = choice.parse::<usize>() {
        if (1..=collections.len()).contains(&index) {
            return Some(&collections[index - 1]);
        }
    }
    collections.iter().find(|collection| collection.matches(choice))
}

/// The terminal state of one item in one scheduling cycle.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum TransferOutcome {
    Completed,
    SkippedOversize,
    SkippedDuplicate,
    FailedHash,
    FailedIntegrity,
    FailedTransfer,
}

impl TransferOutcome {
    pub fn is_failure(self) -> bool {
        matches!(
            self,
            Self::FailedHash | Self::FailedIntegrity | Self::FailedTransfer
        )
    }
}

/// What the archiver reports for each item it finishes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OutcomeRecord {
    pub file_index: usize,
    pub total_files: usize,
    pub item_id: u64,
    pub collection: String,
    pub outcome: TransferOutcome,
    pub detail: Option<String>,
}
