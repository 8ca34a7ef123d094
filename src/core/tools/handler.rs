use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use super::{ToolError, ToolResult};
use crate::core::live::ToolArguments;

/// Function declaration advertised to the model at setup.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FunctionDeclaration {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// A tool the model can invoke during a session.
///
/// The dispatcher calls `validate`, then `execute`, then `format_result`.
/// Handlers are shared across sessions and must not keep per-session state.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    fn name(&self) -> &str;

    fn declaration(&self) -> FunctionDeclaration;

    /// Argument keys that must be present and non-empty.
    fn required_arguments(&self) -> &[&'static str] {
        &[]
    }

    fn validate(&self, arguments: &ToolArguments) -> ToolResult<()> {
        for key in self.required_arguments() {
            if !has_value(arguments, key) {
                return Err(ToolError::MissingArgument((*key).to_string()));
            }
        }
        Ok(())
    }

    async fn execute(&self, arguments: ToolArguments) -> ToolResult<Value>;

    fn format_result(&self, raw: Value) -> Value {
        raw
    }
}

/// Whether `key` holds something other than null, an empty string or an
/// empty collection.
pub fn has_value(arguments: &ToolArguments, key: &str) -> bool {
    match arguments.get(key) {
        None | Some(Value::Null) => false,
        Some(Value::String(s)) => !s.trim().is_empty(),
        Some(Value::Array(a)) => !a.is_empty(),
        Some(Value::Object(o)) => !o.is_empty(),
        Some(_) => true,
    }
}

/// String argument, trimmed. `None` when absent, null or blank.
pub fn string_argument(arguments: &ToolArguments, key: &str) -> Option<String> {
    match arguments.get(key) {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}

/// Required string argument.
pub fn require_string(arguments: &ToolArguments, key: &str) -> ToolResult<String> {
    string_argument(arguments, key).ok_or_else(|| ToolError::MissingArgument(key.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Echo;

    #[async_trait]
    impl ToolHandler for Echo {
        fn name(&self) -> &str {
            "echo"
        }

        fn declaration(&self) -> FunctionDeclaration {
            FunctionDeclaration {
                name: "echo".to_string(),
                description: "Echo".to_string(),
                parameters: json!({}),
            }
        }

        fn required_arguments(&self) -> &[&'static str] {
            &["text"]
        }

        async fn execute(&self, arguments: ToolArguments) -> ToolResult<Value> {
            Ok(Value::Object(arguments))
        }
    }

    fn args(value: Value) -> ToolArguments {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_default_validate() {
        assert!(Echo.validate(&args(json!({"text": "hi"}))).is_ok());
        assert!(matches!(
            Echo.validate(&args(json!({}))),
            Err(ToolError::MissingArgument(k)) if k == "text"
        ));
        assert!(Echo.validate(&args(json!({"text": "  "}))).is_err());
        assert!(Echo.validate(&args(json!({"text": null}))).is_err());
    }

    #[test]
    fn test_string_argument() {
        let a = args(json!({"a": " x ", "b": 3, "c": true}));
        assert_eq!(string_argument(&a, "a"), Some("x".to_string()));
        assert_eq!(string_argument(&a, "b"), Some("3".to_string()));
        assert_eq!(string_argument(&a, "c"), None);
        assert!(require_string(&a, "missing").is_err());
    }
}
