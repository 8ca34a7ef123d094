//! Diary tools: `write_to_diary` and `find_in_diary`.

use async_trait::async_trait;
use serde_json::{Value, json};
use std::sync::Arc;
use time::Date;

use super::dates::{format_date, resolve_date, today};
use super::handler::{FunctionDeclaration, ToolHandler, require_string, string_argument};
use super::notes::NoteStore;
use super::{ToolError, ToolResult};
use crate::core::live::ToolArguments;

pub const WRITE_TO_DIARY: &str = "write_to_diary";
pub const FIND_IN_DIARY: &str = "find_in_diary";

pub const SAVED_TO_DIARY: &str = "Saved to diary";
pub const NOTHING_FOUND: &str = "Nothing Found";

/// Date value meaning "search the whole diary".
const ALL_DATES: &str = "all";

/// Clock used to stamp and resolve dates. Tests pin it.
pub type Clock = Arc<dyn Fn() -> Date + Send + Sync>;

fn system_clock() -> Clock {
    Arc::new(today)
}

pub struct WriteToDiaryTool {
    store: Arc<dyn NoteStore>,
    clock: Clock,
}

impl WriteToDiaryTool {
    pub fn new(store: Arc<dyn NoteStore>) -> Self {
        Self {
            store,
            clock: system_clock(),
        }
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }
}

#[async_trait]
impl ToolHandler for WriteToDiaryTool {
    fn name(&self) -> &str {
        WRITE_TO_DIARY
    }

    fn declaration(&self) -> FunctionDeclaration {
        FunctionDeclaration {
            name: WRITE_TO_DIARY.to_string(),
            description: "Write notes to the personal daily diary or take notes.".to_string(),
            parameters: json!({
                "type": "OBJECT",
                "properties": {
                    "notes": {
                        "type": "STRING",
                        "description": "The notes to write to the diary."
                    }
                },
                "required": self.required_arguments()
            }),
        }
    }

    fn required_arguments(&self) -> &[&'static str] {
        &["notes"]
    }

    async fn execute(&self, arguments: ToolArguments) -> ToolResult<Value> {
        let notes = require_string(&arguments, "notes")?;
        self.store.append((self.clock)(), &notes).await?;
        Ok(Value::String(SAVED_TO_DIARY.to_string()))
    }
}

pub struct FindInDiaryTool {
    store: Arc<dyn NoteStore>,
    clock: Clock,
}

impl FindInDiaryTool {
    pub fn new(store: Arc<dyn NoteStore>) -> Self {
        Self {
            store,
            clock: system_clock(),
        }
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// `None` searches every date.
    fn date_filter(&self, arguments: &ToolArguments) -> ToolResult<Option<Date>> {
        let Some(raw) = string_argument(arguments, "date") else {
            return Ok(None);
        };
        if raw.eq_ignore_ascii_case(ALL_DATES) {
            return Ok(None);
        }
        resolve_date(&raw, (self.clock)())
            .map(Some)
            .ok_or_else(|| ToolError::InvalidArgument(format!("unrecognised date '{raw}'")))
    }
}

#[async_trait]
impl ToolHandler for FindInDiaryTool {
    fn name(&self) -> &str {
        FIND_IN_DIARY
    }

    fn declaration(&self) -> FunctionDeclaration {
        FunctionDeclaration {
            name: FIND_IN_DIARY.to_string(),
            description: "Search the personal daily diary for past information. If no date is \
                specified, search the entire diary. Convert 'yesterday' or 'today' to the exact \
                date. Use this tool when the query contains 'me', 'my', or 'I'. Do not offer \
                further assistance after providing the answer."
                .to_string(),
            parameters: json!({
                "type": "OBJECT",
                "properties": {
                    "query": {
                        "type": "STRING",
                        "description": "The query string to search the diary."
                    },
                    "date": {
                        "type": "STRING",
                        "description": "The date to search for (YYYY-MM-DD)."
                    }
                },
                "required": self.required_arguments()
            }),
        }
    }

    fn required_arguments(&self) -> &[&'static str] {
        &["query"]
    }

    async fn execute(&self, arguments: ToolArguments) -> ToolResult<Value> {
        let query = require_string(&arguments, "query")?;
        let date = self.date_filter(&arguments)?;

        let notes = self.store.search(&query, date).await?;
        if notes.is_empty() {
            return Ok(Value::String(NOTHING_FOUND.to_string()));
        }

        let answer = notes
            .iter()
            .map(|note| format!("{}: {}", format_date(note.date), note.text))
            .collect::<Vec<_>>()
            .join("\n");
        Ok(Value::String(answer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::tools::notes::InMemoryNoteStore;
    use time::macros::date;

    fn fixed_clock() -> Clock {
        Arc::new(|| date!(2025 - 01 - 15))
    }

    fn args(value: Value) -> ToolArguments {
        value.as_object().cloned().unwrap()
    }

    fn tools() -> (WriteToDiaryTool, FindInDiaryTool) {
        let store: Arc<dyn NoteStore> = Arc::new(InMemoryNoteStore::new());
        (
            WriteToDiaryTool::new(store.clone()).with_clock(fixed_clock()),
            FindInDiaryTool::new(store).with_clock(fixed_clock()),
        )
    }

    #[test]
    fn test_declarations_list_required_arguments() {
        let (write, find) = tools();
        assert_eq!(write.declaration().parameters["required"], json!(["notes"]));
        assert_eq!(find.declaration().parameters["required"], json!(["query"]));
        assert_eq!(find.declaration().name, FIND_IN_DIARY);
    }

    #[tokio::test]
    async fn test_write_then_find() {
        let (write, find) = tools();

        let saved = write
            .execute(args(json!({"notes": "Met Anna for coffee"})))
            .await
            .unwrap();
        assert_eq!(saved, json!(SAVED_TO_DIARY));

        let found = find
            .execute(args(json!({"query": "coffee"})))
            .await
            .unwrap();
        assert_eq!(found, json!("2025-01-15: Met Anna for coffee"));
    }

    #[tokio::test]
    async fn test_find_by_relative_date() {
        let (write, find) = tools();
        write
            .execute(args(json!({"notes": "Dentist appointment"})))
            .await
            .unwrap();

        let today = find
            .execute(args(json!({"query": "dentist", "date": "today"})))
            .await
            .unwrap();
        assert!(today.as_str().unwrap().contains("Dentist"));

        let yesterday = find
            .execute(args(json!({"query": "dentist", "date": "yesterday"})))
            .await
            .unwrap();
        assert_eq!(yesterday, json!(NOTHING_FOUND));

        let all = find
            .execute(args(json!({"query": "dentist", "date": "ALL"})))
            .await
            .unwrap();
        assert!(all.as_str().unwrap().contains("Dentist"));
    }

    #[tokio::test]
    async fn test_find_nothing() {
        let (_, find) = tools();
        let found = find.execute(args(json!({"query": "holiday"}))).await.unwrap();
        assert_eq!(found, json!(NOTHING_FOUND));
    }

    #[tokio::test]
    async fn test_find_bad_date() {
        let (_, find) = tools();
        let result = find
            .execute(args(json!({"query": "x", "date": "when pigs fly"})))
            .await;
        assert!(matches!(result, Err(ToolError::InvalidArgument(_))));
    }

    #[test]
    fn test_validation() {
        let (write, find) = tools();
        assert!(write.validate(&args(json!({"notes": ""}))).is_err());
        assert!(find.validate(&args(json!({"date": "today"}))).is_err());
        assert!(find.validate(&args(json!({"query": "x"}))).is_ok());
    }
}
