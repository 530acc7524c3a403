//! Remote extraction oracle.
//!
//! The oracle is an optional, untrusted extraction backend. [`RemoteOracleParser`]
//! always computes the local result first, makes at most one remote call with
//! a hard timeout, and falls back to the local result on any failure.

use std::future::Future;
use std::time::Duration;

use lazy_static::lazy_static;
use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::amounts::detect_currency;
use super::patterns::{NUMBER, VAT_PERCENTAGE};
use super::DocumentParser;
use crate::error::OracleError;
use crate::models::config::{OracleConfig, DEFAULT_ORACLE_INSTRUCTIONS};
use crate::models::document::{
    Column, ParseResult, ParseSource, SummaryLine, TableRow, TableSchema,
};

/// Keys of which a salvaged payload must carry at least one.
const PAYLOAD_KEYS: [&str; 3] = ["invoice_data", "table_data", "summary_data"];

lazy_static! {
    static ref FENCED_BLOCK: Regex = Regex::new(r"(?s)```[a-zA-Z]*\s*(.*?)```").unwrap();
    static ref OUTER_OBJECT: Regex = Regex::new(r"(?s)\{.*\}").unwrap();
}

/// A single extraction request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OracleRequest {
    pub instructions: String,
    pub document_text: String,
}

/// Transport to a remote extraction backend.
pub trait OracleClient: Send + Sync {
    /// Send one request and return the raw response text.
    fn complete(
        &self,
        request: &OracleRequest,
    ) -> impl Future<Output = Result<String, OracleError>> + Send;
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f64,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

/// OpenAI-compatible chat-completions client.
#[derive(Debug, Clone)]
pub struct HttpOracleClient {
    client: Client,
    endpoint: String,
    model: String,
    api_key: String,
    timeout: Duration,
}

impl HttpOracleClient {
    /// Build a client from configuration. The API key is read from the
    /// environment variable named in the config.
    pub fn from_config(config: &OracleConfig) -> Result<Self, OracleError> {
        let api_key = config.api_key().ok_or_else(|| {
            OracleError::NotConfigured(format!("environment variable {} is not set", config.api_key_env))
        })?;

        if config.endpoint.trim().is_empty() {
            return Err(OracleError::NotConfigured("empty endpoint".to_string()));
        }

        let timeout = Duration::from_secs(config.timeout_secs);
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| OracleError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
            api_key,
            timeout,
        })
    }
}

impl HttpOracleClient {
    /// Client-level timeouts report the configured limit.
    fn request_error(&self, err: reqwest::Error) -> OracleError {
        if err.is_timeout() {
            OracleError::Timeout(self.timeout.as_millis() as u64)
        } else {
            OracleError::Transport(err.to_string())
        }
    }
}

impl OracleClient for HttpOracleClient {
    async fn complete(&self, request: &OracleRequest) -> Result<String, OracleError> {
        let body = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &request.instructions,
                },
                ChatMessage {
                    role: "user",
                    content: &request.document_text,
                },
            ],
            temperature: 0.0,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.request_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(OracleError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| self.request_error(e))?;
        chat.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| OracleError::Payload("response has no choices".to_string()))
    }
}

/// Recover the extraction object from a free-form oracle response.
///
/// Tries, in order: the whole response as JSON, the outermost `{...}` block
/// (inside a code fence if there is one), then every balanced `{...}` block
/// in turn. The object must carry at least one of `invoice_data`,
/// `table_data` or `summary_data`.
pub fn salvage_json(response: &str) -> Option<Map<String, Value>> {
    let response = response.trim();

    if let Some(object) = parse_object(response) {
        return Some(object);
    }

    let fenced = FENCED_BLOCK
        .captures(response)
        .and_then(|caps| caps.get(1))
        .map_or(response, |m| m.as_str());
    if let Some(object) = OUTER_OBJECT.find(fenced).and_then(|m| parse_object(m.as_str())) {
        debug!("Salvaged oracle payload from outermost object");
        return Some(object);
    }

    balanced_objects(response).find_map(parse_object)
}

fn parse_object(candidate: &str) -> Option<Map<String, Value>> {
    match serde_json::from_str::<Value>(candidate) {
        Ok(Value::Object(map)) if PAYLOAD_KEYS.iter().any(|key| map.contains_key(*key)) => {
            Some(map)
        }
        _ => None,
    }
}

/// Every balanced `{...}` slice, by start position. Braces inside JSON
/// strings are ignored.
fn balanced_objects(text: &str) -> impl Iterator<Item = &str> {
    text.match_indices('{').filter_map(move |(start, _)| {
        let mut depth = 0usize;
        let mut in_string = false;
        let mut escaped = false;

        for (offset, c) in text[start..].char_indices() {
            if in_string {
                match c {
                    _ if escaped => escaped = false,
                    '\\' => escaped = true,
                    '"' => in_string = false,
                    _ => {}
                }
                continue;
            }

            match c {
                '"' => in_string = true,
                '{' => depth += 1,
                '}' => {
                    depth -= 1;
                    if depth == 0 {
                        return Some(&text[start..start + offset + 1]);
                    }
                }
                _ => {}
            }
        }

        None
    })
}

/// Oracle-backed parser with a local parser as its degradation path.
pub struct RemoteOracleParser<C, P> {
    client: C,
    local: P,
    instructions: String,
    timeout: Duration,
}

impl<C: OracleClient, P: DocumentParser> RemoteOracleParser<C, P> {
    pub fn new(client: C, local: P) -> Self {
        Self {
            client,
            local,
            instructions: DEFAULT_ORACLE_INSTRUCTIONS.to_string(),
            timeout: Duration::from_secs(30),
        }
    }

    /// Hard limit for the remote call.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = instructions.into();
        self
    }

    pub fn name(&self) -> &'static str {
        "oracle"
    }

    /// Parse `text`, preferring the oracle's answer.
    pub async fn parse(&self, text: &str) -> ParseResult {
        let (_keep_open, cancel) = watch::channel(false);
        self.parse_cancellable(text, cancel).await
    }

    /// Like [`parse`](Self::parse), abandoning the remote call as soon as
    /// `cancel` turns `true`.
    pub async fn parse_cancellable(&self, text: &str, cancel: watch::Receiver<bool>) -> ParseResult {
        let mut local = self.local.parse(text);
        if text.trim().is_empty() {
            return local;
        }

        match self.query(text, cancel).await {
            Ok(payload) => {
                info!("Oracle extraction succeeded");
                merge(local, &payload)
            }
            Err(err) => {
                warn!("Oracle extraction failed, using {} result: {}", self.local.name(), err);
                local.warnings.push(format!("oracle fallback: {err}"));
                local
            }
        }
    }

    async fn query(
        &self,
        text: &str,
        mut cancel: watch::Receiver<bool>,
    ) -> Result<Map<String, Value>, OracleError> {
        let request = OracleRequest {
            instructions: self.instructions.clone(),
            document_text: text.to_string(),
        };

        let response = tokio::select! {
            outcome = tokio::time::timeout(self.timeout, self.client.complete(&request)) => match outcome {
                Ok(result) => result?,
                Err(_) => return Err(OracleError::Timeout(self.timeout.as_millis() as u64)),
            },
            _ = cancelled(&mut cancel) => return Err(OracleError::Cancelled),
        };

        salvage_json(&response).ok_or_else(|| {
            OracleError::Payload(format!("no extraction object in {} bytes of response", response.len()))
        })
    }
}

/// Resolves once the flag turns `true`; never resolves if the sender is gone.
async fn cancelled(cancel: &mut watch::Receiver<bool>) {
    loop {
        if *cancel.borrow_and_update() {
            return;
        }
        if cancel.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// Overlay the oracle payload on the local result. Entities stay local.
fn merge(mut result: ParseResult, payload: &Map<String, Value>) -> ParseResult {
    result.source = ParseSource::Oracle;
    result.warnings.clear();

    if let Some(Value::Object(fields)) = payload.get("invoice_data") {
        for (key, value) in fields {
            let Some(value) = cell_text(value) else {
                continue;
            };
            match key.to_lowercase().replace(' ', "_").as_str() {
                "invoice_number" | "invoice_no" | "number" => {
                    result.metadata.invoice_number = Some(value)
                }
                "date" | "invoice_date" => result.metadata.date = Some(value),
                "due_date" => result.metadata.due_date = Some(value),
                "customer" | "bill_to" => result.metadata.customer = Some(value),
                other => debug!("Ignoring oracle invoice field '{}'", other),
            }
        }
    }

    if let Some(Value::Array(rows)) = payload.get("table_data") {
        result.rows = rows
            .iter()
            .filter_map(Value::as_object)
            .map(|cells| {
                cells.iter().fold(TableRow::new(), |row, (key, value)| {
                    match (Column::from_label(key), cell_text(value)) {
                        (Some(column), Some(text)) => row.with(column, text),
                        _ => row,
                    }
                })
            })
            .filter(|row| !row.is_empty())
            .collect();
        result.schema = TableSchema::new(
            result
                .rows
                .iter()
                .flat_map(|row| row.iter().map(|(column, _)| *column)),
        );
        result.raw_headers.clear();
    }

    if let Some(summary) = payload.get("summary_data") {
        result.summary = summary_lines(summary);
    }

    result
}

fn summary_lines(summary: &Value) -> Vec<SummaryLine> {
    let pairs: Vec<(String, String)> = match summary {
        Value::Array(items) => items
            .iter()
            .filter_map(Value::as_object)
            .filter_map(|item| {
                let label = item.get("label").and_then(cell_text)?;
                let amount = item.get("amount").and_then(cell_text)?;
                Some((label, amount))
            })
            .collect(),
        Value::Object(fields) => fields
            .iter()
            .filter_map(|(label, amount)| Some((label.clone(), cell_text(amount)?)))
            .collect(),
        _ => Vec::new(),
    };

    pairs
        .into_iter()
        .map(|(label, amount)| SummaryLine {
            percentage: VAT_PERCENTAGE
                .captures(&label)
                .map(|caps| caps["percent"].to_string()),
            currency: detect_currency(&amount),
            amount: NUMBER
                .find(&amount)
                .map_or_else(|| amount.clone(), |m| m.as_str().to_string()),
            label,
        })
        .collect()
}

fn cell_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) if s.trim().is_empty() => None,
        Value::String(s) => Some(s.trim().to_string()),
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::structure::DocumentStructureExtractor;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const TEXT: &str = "Invoice #: 77\nDate Description Charges\n12-08-29 Cleaning $30\nTotal: $30.00";

    enum Behavior {
        Reply(&'static str),
        Status(u16),
        Hang,
    }

    struct FakeClient {
        behavior: Behavior,
        calls: AtomicUsize,
    }

    impl FakeClient {
        fn new(behavior: Behavior) -> Self {
            Self {
                behavior,
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl OracleClient for FakeClient {
        async fn complete(&self, _request: &OracleRequest) -> Result<String, OracleError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.behavior {
                Behavior::Reply(text) => Ok(text.to_string()),
                Behavior::Status(status) => Err(OracleError::Status {
                    status,
                    body: "boom".to_string(),
                }),
                Behavior::Hang => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Ok(String::new())
                }
            }
        }
    }

    fn parser(behavior: Behavior) -> RemoteOracleParser<FakeClient, DocumentStructureExtractor> {
        RemoteOracleParser::new(FakeClient::new(behavior), DocumentStructureExtractor::new())
    }

    #[test]
    fn test_salvage_direct() {
        let map = salvage_json(r#" {"invoice_data": {"date": "2023-01-15"}} "#).unwrap();
        assert!(map.contains_key("invoice_data"));
    }

    #[test]
    fn test_salvage_fenced_in_prose() {
        let response = "Sure! Here it is:\n```json\n{\"summary_data\": []}\n```\nAnything else?";
        assert!(salvage_json(response).unwrap().contains_key("summary_data"));
    }

    #[test]
    fn test_salvage_balanced_after_noise() {
        let response = r#"Note {not json} then {"table_data": [{"Description": "a {b}"}]} bye"#;
        let map = salvage_json(response).unwrap();
        assert_eq!(map["table_data"][0]["Description"], "a {b}");
    }

    #[test]
    fn test_salvage_rejects_unrelated_objects() {
        assert_eq!(salvage_json(r#"{"answer": 42}"#), None);
        assert_eq!(salvage_json("no json at all"), None);
        assert_eq!(salvage_json("{ broken"), None);
    }

    #[tokio::test]
    async fn test_oracle_result_overrides_local() {
        let parser = parser(Behavior::Reply(
            r#"Result: {"invoice_data": {"invoice_number": "INV-9", "customer": "Globex"},
                "table_data": [{"Item": "Audit", "Qty": 2, "Total": "$900.00"}],
                "summary_data": [{"label": "VAT (20%)", "amount": "$150.00"}]}"#,
        ));
        let result = parser.parse(TEXT).await;

        assert_eq!(result.source, ParseSource::Oracle);
        assert_eq!(result.metadata.invoice_number.as_deref(), Some("INV-9"));
        assert_eq!(result.metadata.customer.as_deref(), Some("Globex"));
        assert_eq!(
            result.schema.columns(),
            &[Column::Description, Column::Quantity, Column::Amount]
        );
        assert_eq!(result.rows[0].get(Column::Quantity), Some("2"));
        assert_eq!(
            result.summary,
            vec![SummaryLine {
                label: "VAT (20%)".to_string(),
                amount: "150.00".to_string(),
                currency: Some(crate::models::document::Currency::Usd),
                percentage: Some("20".to_string()),
            }]
        );
        assert!(!result.entities.amounts.is_empty());
        assert_eq!(parser.client.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_status_error_falls_back_without_retry() {
        let parser = parser(Behavior::Status(503));
        let result = parser.parse(TEXT).await;
        let local = DocumentStructureExtractor::new().parse(TEXT);

        assert_eq!(result.source, ParseSource::Local);
        assert_eq!(result.rows, local.rows);
        assert_eq!(result.metadata, local.metadata);
        assert!(result.warnings.iter().any(|w| w.contains("503")));
        assert_eq!(parser.client.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unsalvageable_payload_falls_back() {
        let result = parser(Behavior::Reply("I could not read the document.")).parse(TEXT).await;
        assert_eq!(result.source, ParseSource::Local);
        assert_eq!(result.rows.len(), 1);
    }

    #[tokio::test]
    async fn test_timeout_falls_back() {
        let parser = parser(Behavior::Hang).with_timeout(Duration::from_millis(20));
        let result = parser.parse(TEXT).await;

        assert_eq!(result.source, ParseSource::Local);
        assert!(result.warnings.iter().any(|w| w.contains("timed out")));
    }

    #[tokio::test]
    async fn test_cancellation_falls_back() {
        let parser = parser(Behavior::Hang);
        let (tx, rx) = watch::channel(false);

        let cancel = async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            tx.send(true).unwrap();
        };
        let (result, ()) = tokio::join!(parser.parse_cancellable(TEXT, rx), cancel);

        assert_eq!(result.source, ParseSource::Local);
        assert!(result.warnings.iter().any(|w| w.contains("cancelled")));
    }

    #[test]
    fn test_summary_object_keeps_document_order() {
        let payload = salvage_json(
            r#"{"summary_data": {"Subtotal": "$100.00", "VAT (20%)": "$20.00", "Total": "$120.00"}}"#,
        )
        .unwrap();
        let summary = summary_lines(&payload["summary_data"]);

        let labels: Vec<&str> = summary.iter().map(|s| s.label.as_str()).collect();
        assert_eq!(labels, ["Subtotal", "VAT (20%)", "Total"]);
        assert_eq!(summary[1].percentage.as_deref(), Some("20"));
    }

    #[tokio::test]
    async fn test_http_timeout_reports_configured_limit() {
        // Accepts connections into the backlog but never answers.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let timeout = Duration::from_millis(200);
        let client = HttpOracleClient {
            client: Client::builder().timeout(timeout).build().unwrap(),
            endpoint: format!("http://{}/v1/chat/completions", listener.local_addr().unwrap()),
            model: "test".to_string(),
            api_key: "key".to_string(),
            timeout,
        };

        let request = OracleRequest {
            instructions: DEFAULT_ORACLE_INSTRUCTIONS.to_string(),
            document_text: TEXT.to_string(),
        };
        let err = client.complete(&request).await.unwrap_err();

        assert!(matches!(err, OracleError::Timeout(200)), "got {err:?}");
        assert_eq!(err.to_string(), "oracle call timed out after 200ms");
    }

    #[tokio::test]
    async fn test_blank_input_skips_remote_call() {
        let parser = parser(Behavior::Reply(r#"{"summary_data": []}"#));
        let result = parser.parse("  \n").await;

        assert!(result.is_empty());
        assert_eq!(parser.client.calls.load(Ordering::SeqCst), 0);
    }
}
