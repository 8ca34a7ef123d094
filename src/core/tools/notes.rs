//! Diary note storage.
//!
//! [`InMemoryNoteStore`] keeps paragraphs in memory and, when given a path,
//! mirrors them to a JSON snapshot after every write. Search is keyword
//! overlap: a note matches when it contains the whole query or any of its
//! significant words, and notes with more hits come first.

use async_trait::async_trait;
use parking_lot::RwLock;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use time::Date;
use tracing::{debug, info};

use super::dates::{format_date, parse_iso_date};
use super::{ToolError, ToolResult};

static PARAGRAPH_BREAK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n[ \t]*\n").expect("valid paragraph pattern"));

static WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\p{L}\p{N}']+").expect("valid word pattern"));

const STOP_WORDS: &[&str] = &[
    "the", "and", "what", "was", "were", "did", "does", "who", "whom", "when", "where", "why",
    "how", "for", "with", "from", "that", "this", "have", "has", "had", "are", "you", "your",
    "about", "into", "any", "all", "can", "is", "am", "my", "me", "i", "a", "an", "of", "to",
    "in", "on", "at", "it", "do",
];

/// One stored paragraph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    #[serde(with = "iso_date")]
    pub date: Date,
    pub text: String,
}

mod iso_date {
    use super::{format_date, parse_iso_date};
    use serde::{Deserialize, Deserializer, Serializer, de::Error};
    use time::Date;

    pub fn serialize<S: Serializer>(date: &Date, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format_date(*date))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Date, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse_iso_date(&raw).ok_or_else(|| D::Error::custom(format!("invalid date: {raw}")))
    }
}

#[async_trait]
pub trait NoteStore: Send + Sync {
    /// Store `text` under `date`. Returns the number of paragraphs written.
    async fn append(&self, date: Date, text: &str) -> ToolResult<usize>;

    /// Notes relevant to `query`, optionally restricted to one date.
    async fn search(&self, query: &str, date: Option<Date>) -> ToolResult<Vec<Note>>;
}

/// Split text into non-empty paragraphs on blank lines.
pub fn split_paragraphs(text: &str) -> Vec<String> {
    PARAGRAPH_BREAK
        .split(text)
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}

fn keywords(query: &str) -> Vec<String> {
    WORD.find_iter(&query.to_lowercase())
        .map(|m| m.as_str().trim_matches('\'').to_string())
        .filter(|w| w.chars().count() >= 2 && !STOP_WORDS.contains(&w.as_str()))
        .collect()
}

fn score(note: &str, query: &str, keywords: &[String]) -> usize {
    let haystack = note.to_lowercase();
    let phrase = query.trim().to_lowercase();
    let mut hits = keywords
        .iter()
        .filter(|k| haystack.contains(k.as_str()))
        .count();
    if !phrase.is_empty() && haystack.contains(&phrase) {
        hits += keywords.len() + 1;
    }
    hits
}

#[derive(Debug, Default)]
pub struct InMemoryNoteStore {
    notes: RwLock<Vec<Note>>,
    snapshot: Option<PathBuf>,
}

impl InMemoryNoteStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a store backed by a JSON snapshot, loading it if it exists.
    pub async fn open(path: impl AsRef<Path>) -> ToolResult<Self> {
        let path = path.as_ref().to_path_buf();
        let notes = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => serde_json::from_str::<Vec<Note>>(&contents).map_err(|e| {
                ToolError::Storage(format!(
                    "Failed to parse notes snapshot {}: {e}",
                    path.display()
                ))
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => {
                return Err(ToolError::Storage(format!(
                    "Failed to read notes snapshot {}: {e}",
                    path.display()
                )));
            }
        };

        info!(path = %path.display(), notes = notes.len(), "Loaded diary notes");
        Ok(Self {
            notes: RwLock::new(notes),
            snapshot: Some(path),
        })
    }

    pub fn len(&self) -> usize {
        self.notes.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.read().is_empty()
    }

    async fn persist(&self) -> ToolResult<()> {
        let Some(path) = &self.snapshot else {
            return Ok(());
        };
        let contents = {
            let notes = self.notes.read();
            serde_json::to_string_pretty(&*notes)
                .map_err(|e| ToolError::Storage(format!("Failed to encode notes: {e}")))?
        };
        tokio::fs::write(path, contents).await.map_err(|e| {
            ToolError::Storage(format!("Failed to write notes snapshot {}: {e}", path.display()))
        })
    }
}

#[async_trait]
impl NoteStore for InMemoryNoteStore {
    async fn append(&self, date: Date, text: &str) -> ToolResult<usize> {
        let paragraphs = split_paragraphs(text);
        if paragraphs.is_empty() {
            return Err(ToolError::InvalidArgument("notes are empty".to_string()));
        }

        let count = paragraphs.len();
        {
            let mut notes = self.notes.write();
            notes.extend(paragraphs.into_iter().map(|text| Note { date, text }));
        }
        debug!(paragraphs = count, date = %format_date(date), "Stored diary notes");

        self.persist().await?;
        Ok(count)
    }

    async fn search(&self, query: &str, date: Option<Date>) -> ToolResult<Vec<Note>> {
        let keywords = keywords(query);
        let notes = self.notes.read();

        let mut scored: Vec<(usize, &Note)> = notes
            .iter()
            .filter(|note| date.is_none_or(|d| note.date == d))
            .map(|note| (score(&note.text, query, &keywords), note))
            .filter(|(hits, _)| *hits > 0)
            .collect();
        // Stable, so equally scored notes keep insertion order
        scored.sort_by(|a, b| b.0.cmp(&a.0));

        Ok(scored.into_iter().map(|(_, note)| note.clone()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use time::macros::date;

    #[test]
    fn test_split_paragraphs() {
        assert_eq!(
            split_paragraphs("first\n \nsecond\n\nthird"),
            vec!["first", "second", "third"]
        );
        assert_eq!(split_paragraphs("one line\nstill one"), vec!["one line\nstill one"]);
        assert!(split_paragraphs(" \n \n ").is_empty());
    }

    #[test]
    fn test_keywords_drop_stop_words() {
        assert_eq!(keywords("What is my daughter's name?"), vec!["daughter's", "name"]);
    }

    #[tokio::test]
    async fn test_append_and_search() {
        let store = InMemoryNoteStore::new();
        store
            .append(date!(2025 - 01 - 10), "My daughter's name is Shyla\n \nI went for a walk")
            .await
            .unwrap();
        store
            .append(date!(2025 - 01 - 11), "Saw a dog on my walk")
            .await
            .unwrap();
        assert_eq!(store.len(), 3);

        let found = store.search("what is my daughter's name", None).await.unwrap();
        assert_eq!(found.len(), 1);
        assert!(found[0].text.contains("Shyla"));

        let walks = store.search("walk", None).await.unwrap();
        assert_eq!(walks.len(), 2);

        let dated = store
            .search("walk", Some(date!(2025 - 01 - 11)))
            .await
            .unwrap();
        assert_eq!(dated.len(), 1);
        assert!(dated[0].text.contains("dog"));

        assert!(store.search("spaceship", None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_append_empty_rejected() {
        let store = InMemoryNoteStore::new();
        assert!(store.append(date!(2025 - 01 - 10), "  ").await.is_err());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_snapshot_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("notes.json");

        let store = InMemoryNoteStore::open(&path).await.unwrap();
        assert!(store.is_empty());
        store
            .append(date!(2025 - 02 - 01), "Bought flowers")
            .await
            .unwrap();

        let reopened = InMemoryNoteStore::open(&path).await.unwrap();
        assert_eq!(reopened.len(), 1);
        let found = reopened.search("flowers", None).await.unwrap();
        assert_eq!(found[0].date, date!(2025 - 02 - 01));
    }

    #[tokio::test]
    async fn test_corrupt_snapshot() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("notes.json");
        std::fs::write(&path, "not json").unwrap();

        let result = InMemoryNoteStore::open(&path).await;
        assert!(matches!(result, Err(ToolError::Storage(_))));
    }
}
