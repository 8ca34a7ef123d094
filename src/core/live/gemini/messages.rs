//! Gemini Live wire messages.
//!
//! Client messages are externally tagged objects (`{"realtimeInput": {...}}`).
//! Server messages carry exactly one populated top-level field.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::core::live::base::{
    ContentPart, LiveEvent, LiveInput, ToolCallRequest, ToolCallResult,
};

// =============================================================================
// Client -> Gemini
// =============================================================================

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum GeminiClientMessage {
    Setup(Map<String, Value>),
    RealtimeInput(RealtimeInput),
    ClientContent(ClientContent),
    ToolResponse(ToolResponse),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Blob {
    #[serde(alias = "mime_type")]
    pub mime_type: String,
    pub data: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RealtimeInput {
    pub media_chunks: Vec<Blob>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TextPart {
    pub text: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Turn {
    pub role: String,
    pub parts: Vec<TextPart>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientContent {
    pub turns: Vec<Turn>,
    pub turn_complete: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct FunctionResponse {
    pub id: String,
    pub name: String,
    pub response: Value,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolResponse {
    pub function_responses: Vec<FunctionResponse>,
}

impl From<LiveInput> for GeminiClientMessage {
    fn from(input: LiveInput) -> Self {
        match input {
            LiveInput::Media { mime_type, data } => {
                GeminiClientMessage::RealtimeInput(RealtimeInput {
                    media_chunks: vec![Blob { mime_type, data }],
                })
            }
            LiveInput::Text { text, end_of_turn } => {
                GeminiClientMessage::ClientContent(ClientContent {
                    turns: vec![Turn {
                        role: "user".to_string(),
                        parts: vec![TextPart { text }],
                    }],
                    turn_complete: end_of_turn,
                })
            }
            LiveInput::ToolResponses(results) => GeminiClientMessage::ToolResponse(ToolResponse {
                function_responses: results.iter().map(FunctionResponse::from).collect(),
            }),
        }
    }
}

impl From<&ToolCallResult> for FunctionResponse {
    fn from(result: &ToolCallResult) -> Self {
        Self {
            id: result.call_id.clone(),
            name: result.name.clone(),
            response: result.response_payload(),
        }
    }
}

// =============================================================================
// Gemini -> Client
// =============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GeminiServerMessage {
    #[serde(alias = "setup_complete")]
    pub setup_complete: Option<Value>,
    #[serde(alias = "server_content")]
    pub server_content: Option<ServerContent>,
    #[serde(alias = "tool_call")]
    pub tool_call: Option<ToolCall>,
    #[serde(alias = "tool_call_cancellation")]
    pub tool_call_cancellation: Option<ToolCallCancellation>,
    #[serde(alias = "go_away")]
    pub go_away: Option<GoAway>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerContent {
    #[serde(alias = "model_turn")]
    pub model_turn: Option<ModelTurn>,
    #[serde(alias = "turn_complete")]
    pub turn_complete: bool,
    pub interrupted: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ModelTurn {
    pub parts: Vec<Part>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Part {
    pub text: Option<String>,
    #[serde(alias = "inline_data")]
    pub inline_data: Option<Blob>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ToolCall {
    #[serde(alias = "function_calls")]
    pub function_calls: Vec<FunctionCall>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FunctionCall {
    pub id: Option<String>,
    pub name: String,
    pub args: Option<Map<String, Value>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ToolCallCancellation {
    pub ids: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GoAway {
    #[serde(alias = "time_left")]
    pub time_left: Option<String>,
}

impl GeminiServerMessage {
    /// Convert to a provider-neutral event. `None` for messages the bridge
    /// does not act on (usage metadata and the like).
    pub fn into_event(self) -> Option<LiveEvent> {
        if self.setup_complete.is_some() {
            return Some(LiveEvent::SetupComplete);
        }

        if let Some(tool_call) = self.tool_call {
            let requests = tool_call
                .function_calls
                .into_iter()
                .map(|call| {
                    ToolCallRequest::new(
                        call.id.unwrap_or_default(),
                        call.name,
                        call.args.unwrap_or_default(),
                    )
                })
                .collect();
            return Some(LiveEvent::ToolCall(requests));
        }

        if let Some(content) = self.server_content {
            let parts = content
                .model_turn
                .map(|turn| {
                    turn.parts
                        .into_iter()
                        .filter_map(|part| {
                            if let Some(text) = part.text {
                                Some(ContentPart::Text(text))
                            } else {
                                part.inline_data.map(|blob| ContentPart::InlineData {
                                    mime_type: blob.mime_type,
                                    data: blob.data,
                                })
                            }
                        })
                        .collect()
                })
                .unwrap_or_default();
            return Some(LiveEvent::Content {
                parts,
                turn_complete: content.turn_complete,
                interrupted: content.interrupted,
            });
        }

        if let Some(cancellation) = self.tool_call_cancellation {
            return Some(LiveEvent::ToolCallCancellation(cancellation.ids));
        }

        self.go_away.map(|go_away| LiveEvent::GoAway {
            time_left: go_away.time_left,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_media_input_shape() {
        let message = GeminiClientMessage::from(LiveInput::Media {
            mime_type: "audio/pcm".to_string(),
            data: "AAAA".to_string(),
        });
        assert_eq!(
            serde_json::to_value(&message).unwrap(),
            json!({"realtimeInput": {"mediaChunks": [{"mimeType": "audio/pcm", "data": "AAAA"}]}})
        );
    }

    #[test]
    fn test_text_input_shape() {
        let message = GeminiClientMessage::from(LiveInput::Text {
            text: "hello".to_string(),
            end_of_turn: true,
        });
        assert_eq!(
            serde_json::to_value(&message).unwrap(),
            json!({"clientContent": {
                "turns": [{"role": "user", "parts": [{"text": "hello"}]}],
                "turnComplete": true
            }})
        );
    }

    #[test]
    fn test_tool_response_shape() {
        let request = ToolCallRequest::new("c1", "get_exchange_rate", Map::new());
        let message = GeminiClientMessage::from(LiveInput::ToolResponses(vec![
            ToolCallResult::success(&request, json!({"rates": {"EUR": 0.9}})),
        ]));
        assert_eq!(
            serde_json::to_value(&message).unwrap(),
            json!({"toolResponse": {"functionResponses": [
                {"id": "c1", "name": "get_exchange_rate", "response": {"result": {"rates": {"EUR": 0.9}}}}
            ]}})
        );
    }

    #[test]
    fn test_setup_message_shape() {
        let mut body = Map::new();
        body.insert("model".to_string(), json!("models/x"));
        let message = GeminiClientMessage::Setup(body);
        assert_eq!(
            serde_json::to_value(&message).unwrap(),
            json!({"setup": {"model": "models/x"}})
        );
    }

    #[test]
    fn test_parse_setup_complete() {
        let message: GeminiServerMessage = serde_json::from_str(r#"{"setupComplete": {}}"#).unwrap();
        assert_eq!(message.into_event(), Some(LiveEvent::SetupComplete));
    }

    #[test]
    fn test_parse_content_with_turn_complete() {
        let raw = r#"{"serverContent": {
            "modelTurn": {"parts": [
                {"text": "hi"},
                {"inlineData": {"mimeType": "audio/pcm;rate=24000", "data": "UklG"}}
            ]},
            "turnComplete": true
        }}"#;
        let message: GeminiServerMessage = serde_json::from_str(raw).unwrap();
        assert_eq!(
            message.into_event(),
            Some(LiveEvent::Content {
                parts: vec![
                    ContentPart::Text("hi".to_string()),
                    ContentPart::InlineData {
                        mime_type: "audio/pcm;rate=24000".to_string(),
                        data: "UklG".to_string(),
                    },
                ],
                turn_complete: true,
                interrupted: false,
            })
        );
    }

    #[test]
    fn test_parse_tool_call_keeps_argument_order() {
        let raw = r#"{"toolCall": {"functionCalls": [
            {"id": "a", "name": "get_exchange_rate",
             "args": {"currency_from": "USD", "currency_date": "latest", "currency_to": "EUR"}}
        ]}}"#;
        let message: GeminiServerMessage = serde_json::from_str(raw).unwrap();
        let Some(LiveEvent::ToolCall(requests)) = message.into_event() else {
            panic!("expected tool call");
        };
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].call_id, "a");
        let keys: Vec<&str> = requests[0].arguments.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["currency_from", "currency_date", "currency_to"]);
    }

    #[test]
    fn test_parse_snake_case_variant() {
        let raw = r#"{"server_content": {"turn_complete": true}}"#;
        let message: GeminiServerMessage = serde_json::from_str(raw).unwrap();
        assert_eq!(
            message.into_event(),
            Some(LiveEvent::Content {
                parts: vec![],
                turn_complete: true,
                interrupted: false
            })
        );
    }

    #[test]
    fn test_parse_cancellation_and_go_away() {
        let message: GeminiServerMessage =
            serde_json::from_str(r#"{"toolCallCancellation": {"ids": ["x"]}}"#).unwrap();
        assert_eq!(
            message.into_event(),
            Some(LiveEvent::ToolCallCancellation(vec!["x".to_string()]))
        );

        let message: GeminiServerMessage =
            serde_json::from_str(r#"{"goAway": {"timeLeft": "10s"}}"#).unwrap();
        assert_eq!(
            message.into_event(),
            Some(LiveEvent::GoAway {
                time_left: Some("10s".to_string())
            })
        );
    }

    #[test]
    fn test_usage_metadata_is_ignored() {
        let message: GeminiServerMessage =
            serde_json::from_str(r#"{"usageMetadata": {"totalTokenCount": 5}}"#).unwrap();
        assert_eq!(message.into_event(), None);
    }
}
