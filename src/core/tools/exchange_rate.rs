//! `get_exchange_rate` tool backed by the Frankfurter REST API.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use super::dates::{format_date, resolve_date, today};
use super::handler::{FunctionDeclaration, ToolHandler, require_string, string_argument};
use super::{ToolError, ToolResult};
use crate::core::live::ToolArguments;

pub const GET_EXCHANGE_RATE: &str = "get_exchange_rate";

pub const DEFAULT_EXCHANGE_RATE_URL: &str = "https://api.frankfurter.app";

/// Date value asking for the most recent published rates.
const LATEST: &str = "latest";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Thin client over `GET <base>/<date>?from=<from>[&to=<to>]`.
#[derive(Debug, Clone)]
pub struct ExchangeRateClient {
    http: Client,
    base_url: String,
}

impl ExchangeRateClient {
    pub fn new(base_url: impl Into<String>) -> ToolResult<Self> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ToolError::Registration(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self::with_client(http, base_url))
    }

    pub fn with_client(http: Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetch rates for `date` (`YYYY-MM-DD` or `latest`).
    pub async fn rates(&self, from: &str, to: Option<&str>, date: &str) -> ToolResult<Value> {
        let url = format!("{}/{}", self.base_url, date);
        let mut query = vec![("from", from)];
        if let Some(to) = to {
            query.push(("to", to));
        }

        debug!(url = %url, from = %from, to = ?to, "Requesting exchange rates");
        let response = self
            .http
            .get(&url)
            .query(&query)
            .send()
            .await
            .map_err(|e| ToolError::Upstream(format!("exchange rate request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ToolError::Upstream(format!(
                "exchange rate service returned {status}: {body}"
            )));
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| ToolError::Upstream(format!("invalid exchange rate response: {e}")))
    }
}

pub struct GetExchangeRateTool {
    client: ExchangeRateClient,
}

impl GetExchangeRateTool {
    pub fn new(client: ExchangeRateClient) -> Self {
        Self { client }
    }

    fn rate_date(raw: &str) -> ToolResult<String> {
        if raw.eq_ignore_ascii_case(LATEST) {
            return Ok(LATEST.to_string());
        }
        resolve_date(raw, today())
            .map(format_date)
            .ok_or_else(|| ToolError::InvalidArgument(format!("unrecognised date '{raw}'")))
    }
}

#[async_trait]
impl ToolHandler for GetExchangeRateTool {
    fn name(&self) -> &str {
        GET_EXCHANGE_RATE
    }

    fn declaration(&self) -> FunctionDeclaration {
        FunctionDeclaration {
            name: GET_EXCHANGE_RATE.to_string(),
            description: "Get the exchange rate for currencies between countries".to_string(),
            parameters: json!({
                "type": "OBJECT",
                "properties": {
                    "currency_date": {
                        "type": "STRING",
                        "description": "A date that must always be in YYYY-MM-DD format or the value 'latest' if a time period is not specified"
                    },
                    "currency_from": {
                        "type": "STRING",
                        "description": "The currency to convert from in ISO 4217 format"
                    },
                    "currency_to": {
                        "type": "STRING",
                        "description": "The currency to convert to in ISO 4217 format"
                    }
                },
                "required": self.required_arguments()
            }),
        }
    }

    fn required_arguments(&self) -> &[&'static str] {
        &["currency_from", "currency_date"]
    }

    async fn execute(&self, arguments: ToolArguments) -> ToolResult<Value> {
        let from = require_string(&arguments, "currency_from")?.to_uppercase();
        let to = string_argument(&arguments, "currency_to").map(|c| c.to_uppercase());
        let date = Self::rate_date(&require_string(&arguments, "currency_date")?)?;

        self.client.rates(&from, to.as_deref(), &date).await
    }
}

/// Shared handle for registering the tool.
pub fn exchange_rate_tool(client: ExchangeRateClient) -> Arc<dyn ToolHandler> {
    Arc::new(GetExchangeRateTool::new(client))
}
