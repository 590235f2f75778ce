//! Assistant service client.
//!
//! Every operation is a single request/response exchange with no retries.
//! Failures are classified into transport, server-reported and malformed
//! responses so callers can render them distinctly.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use super::types::{
    EmailRequest, EmailsRequest, EnhanceRequest, EnhancedEmail, IndexAck, IndexRequest,
    QueryAnswer, QueryRequest, QueryScope, SuggestedReply, Summary, Tone,
};
use crate::config::AssistantConfig;
use crate::error::{AssistantError, ConfigError};
use crate::mail::parser::{event_from_record, mail_item_from_record};
use crate::mail::{CalendarEvent, MailItem};

pub const ENHANCE_EMAIL: &str = "/enhanceEmail";
pub const SUMMARIZE_EMAIL: &str = "/summarizeEmail";
pub const SUGGEST_RESPONSE: &str = "/suggestResponse";
pub const SUMMARIZE_UNREAD: &str = "/summarizeUnreadEmails";
pub const INDEX_OUTLOOK: &str = "/index/outlook";
pub const HEALTH: &str = "/health";

/// Remote assistant operations.
#[async_trait]
pub trait AssistantClient: Send + Sync {
    async fn enhance_compose(&self, text: &str, tone: Tone)
    -> Result<EnhancedEmail, AssistantError>;

    async fn summarize(&self, item: &MailItem) -> Result<Summary, AssistantError>;

    async fn suggest_reply(&self, item: &MailItem) -> Result<SuggestedReply, AssistantError>;

    /// One digest over many unread items.
    async fn summarize_unread(&self, items: &[MailItem]) -> Result<Summary, AssistantError>;

    async fn query_indexed(
        &self,
        question: &str,
        scope: QueryScope,
    ) -> Result<QueryAnswer, AssistantError>;

    async fn index_items(
        &self,
        mail: &[MailItem],
        events: &[CalendarEvent],
    ) -> Result<IndexAck, AssistantError>;

    async fn health(&self) -> Result<(), AssistantError>;
}

/// `AssistantClient` over HTTP + JSON.
pub struct HttpAssistantClient {
    base_url: String,
    client: reqwest::Client,
}

impl HttpAssistantClient {
    pub fn new(config: AssistantConfig) -> Result<Self, ConfigError> {
        if !(config.base_url.starts_with("http://") || config.base_url.starts_with("https://")) {
            return Err(ConfigError::InvalidValue {
                key: "MAIL_TRIAGE_ASSISTANT_URL".into(),
                message: format!("expected an http(s) URL, got {:?}", config.base_url),
            });
        }
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;
        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn post<B: Serialize + ?Sized>(
        &self,
        endpoint: &str,
        body: &B,
    ) -> Result<Value, AssistantError> {
        let url = format!("{}{}", self.base_url, endpoint);
        debug!(endpoint, "Assistant request");
        let request = self.client.post(&url).json(body);
        self.exchange(endpoint, request).await
    }

    async fn exchange(
        &self,
        endpoint: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<Value, AssistantError> {
        let network = |e: reqwest::Error| AssistantError::Network {
            endpoint: endpoint.to_string(),
            reason: e.to_string(),
        };

        let resp = request.send().await.map_err(network)?;
        let status = resp.status();
        let text = resp.text().await.map_err(network)?;

        let result = classify(endpoint, status, &text);
        if let Err(e) = &result {
            warn!(endpoint, error = %e, "Assistant request failed");
        }
        result
    }
}

/// Classify one HTTP exchange into a JSON body or an `AssistantError`.
pub(crate) fn classify(
    endpoint: &str,
    status: StatusCode,
    body: &str,
) -> Result<Value, AssistantError> {
    let parsed: Result<Value, _> = serde_json::from_str(body);

    if !status.is_success() {
        let message = parsed
            .ok()
            .as_ref()
            .and_then(|v| v.get("error"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| {
                status
                    .canonical_reason()
                    .unwrap_or("request failed")
                    .to_string()
            });
        return Err(AssistantError::ServerError {
            endpoint: endpoint.to_string(),
            status: status.as_u16(),
            message,
        });
    }

    let value = parsed.map_err(|e| AssistantError::Malformed {
        endpoint: endpoint.to_string(),
        reason: format!("invalid JSON: {e}"),
    })?;

    if value.get("success").and_then(Value::as_bool) == Some(false) {
        let message = value
            .get("error")
            .and_then(Value::as_str)
            .unwrap_or("service reported failure")
            .to_string();
        return Err(AssistantError::ServerError {
            endpoint: endpoint.to_string(),
            status: status.as_u16(),
            message,
        });
    }

    Ok(value)
}

fn required_text(endpoint: &str, value: &Value, key: &str) -> Result<String, AssistantError> {
    value
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .ok_or_else(|| AssistantError::Malformed {
            endpoint: endpoint.to_string(),
            reason: format!("missing or empty `{key}`"),
        })
}

fn flag(value: &Value, key: &str) -> bool {
    value.get(key).and_then(Value::as_bool).unwrap_or(false)
}

fn records<'a>(value: &'a Value, key: &str) -> impl Iterator<Item = &'a Value> {
    value
        .get(key)
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
}

fn count(value: &Value, key: &str) -> usize {
    value
        .get(key)
        .and_then(Value::as_u64)
        .map(|n| n as usize)
        .unwrap_or(0)
}

pub(crate) fn enhanced_from(value: &Value) -> Result<EnhancedEmail, AssistantError> {
    Ok(EnhancedEmail {
        subject: required_text(ENHANCE_EMAIL, value, "subject")?,
        body: required_text(ENHANCE_EMAIL, value, "body")?,
        was_enhanced: flag(value, "enhanced"),
        used_fallback: flag(value, "fallback"),
    })
}

pub(crate) fn answer_from(endpoint: &str, value: &Value) -> Result<QueryAnswer, AssistantError> {
    Ok(QueryAnswer {
        answer: required_text(endpoint, value, "answer")?,
        context_used: flag(value, "context_used"),
        relevant_mail: records(value, "relevant_emails")
            .filter_map(mail_item_from_record)
            .collect(),
        relevant_events: records(value, "relevant_events")
            .filter_map(event_from_record)
            .collect(),
    })
}

#[async_trait]
impl AssistantClient for HttpAssistantClient {
    async fn enhance_compose(
        &self,
        text: &str,
        tone: Tone,
    ) -> Result<EnhancedEmail, AssistantError> {
        let value = self
            .post(ENHANCE_EMAIL, &EnhanceRequest { text, tone })
            .await?;
        enhanced_from(&value)
    }

    async fn summarize(&self, item: &MailItem) -> Result<Summary, AssistantError> {
        let value = self
            .post(SUMMARIZE_EMAIL, &EmailRequest { email: item })
            .await?;
        Ok(Summary {
            text: required_text(SUMMARIZE_EMAIL, &value, "summary")?,
        })
    }

    async fn suggest_reply(&self, item: &MailItem) -> Result<SuggestedReply, AssistantError> {
        let value = self
            .post(SUGGEST_RESPONSE, &EmailRequest { email: item })
            .await?;
        Ok(SuggestedReply {
            text: required_text(SUGGEST_RESPONSE, &value, "response")?,
        })
    }

    async fn summarize_unread(&self, items: &[MailItem]) -> Result<Summary, AssistantError> {
        let value = self
            .post(SUMMARIZE_UNREAD, &EmailsRequest { emails: items })
            .await?;
        Ok(Summary {
            text: required_text(SUMMARIZE_UNREAD, &value, "summary")?,
        })
    }

    async fn query_indexed(
        &self,
        question: &str,
        scope: QueryScope,
    ) -> Result<QueryAnswer, AssistantError> {
        let request = QueryRequest {
            query: question,
            use_outlook_data: true,
        };
        let value = self.post(scope.endpoint(), &request).await?;
        answer_from(scope.endpoint(), &value)
    }

    async fn index_items(
        &self,
        mail: &[MailItem],
        events: &[CalendarEvent],
    ) -> Result<IndexAck, AssistantError> {
        let value = self
            .post(
                INDEX_OUTLOOK,
                &IndexRequest {
                    emails: mail,
                    events,
                },
            )
            .await?;
        Ok(IndexAck {
            indexed_emails: count(&value, "indexed_emails"),
            indexed_events: count(&value, "indexed_events"),
            message: value
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string),
        })
    }

    async fn health(&self) -> Result<(), AssistantError> {
        let url = format!("{}{}", self.base_url, HEALTH);
        self.exchange(HEALTH, self.client.get(&url)).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_success_uses_error_field() {
        let err = classify(
            SUMMARIZE_EMAIL,
            StatusCode::INTERNAL_SERVER_ERROR,
            r#"{"error": "OpenAI API error: quota"}"#,
        )
        .unwrap_err();
        assert_eq!(
            err,
            AssistantError::ServerError {
                endpoint: SUMMARIZE_EMAIL.into(),
                status: 500,
                message: "OpenAI API error: quota".into(),
            }
        );
    }

    #[test]
    fn non_success_without_json_uses_reason_phrase() {
        let err = classify(SUMMARIZE_EMAIL, StatusCode::BAD_GATEWAY, "<html>").unwrap_err();
        match err {
            AssistantError::ServerError {
                status, message, ..
            } => {
                assert_eq!(status, 502);
                assert_eq!(message, "Bad Gateway");
            }
            other => panic!("expected ServerError, got {other:?}"),
        }
    }

    #[test]
    fn success_false_is_server_error() {
        let err = classify(
            "/query/inbox",
            StatusCode::OK,
            r#"{"success": false, "error": "index empty"}"#,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            AssistantError::ServerError { status: 200, ref message, .. } if message == "index empty"
        ));
    }

    #[test]
    fn undecodable_body_is_malformed() {
        let err = classify(SUMMARIZE_EMAIL, StatusCode::OK, "summary: hi").unwrap_err();
        assert!(matches!(err, AssistantError::Malformed { .. }));
        assert_eq!(err.endpoint(), SUMMARIZE_EMAIL);
    }

    #[test]
    fn enhance_requires_subject_and_body() {
        let value = serde_json::json!({"subject": "Hi", "body": "  "});
        assert!(matches!(
            enhanced_from(&value),
            Err(AssistantError::Malformed { .. })
        ));

        let value = serde_json::json!({"subject": "Hi", "body": "Text", "fallback": true});
        let enhanced = enhanced_from(&value).unwrap();
        assert!(!enhanced.was_enhanced);
        assert!(enhanced.used_fallback);
    }

    #[test]
    fn answer_maps_relevant_items_tolerantly() {
        let value = serde_json::json!({
            "success": true,
            "answer": "Two meetings tomorrow",
            "context_used": true,
            "relevant_emails": [{"subject": "Agenda", "sender": "Dana"}, 7],
            "relevant_events": [{"subject": "Standup", "start": "2026-03-02T09:00:00"}]
        });
        let answer = answer_from("/query/combined", &value).unwrap();
        assert!(answer.context_used);
        assert_eq!(answer.relevant_mail.len(), 1);
        assert_eq!(answer.relevant_mail[0].sender, "Dana");
        assert_eq!(answer.relevant_events[0].subject, "Standup");
    }

    #[test]
    fn answer_without_context_defaults_false() {
        let value = serde_json::json!({"answer": "No idea"});
        let answer = answer_from("/query/inbox", &value).unwrap();
        assert!(!answer.context_used);
        assert!(answer.relevant_mail.is_empty());
    }

    #[test]
    fn base_url_must_be_http() {
        let result = HttpAssistantClient::new(AssistantConfig {
            base_url: "localhost:8385".into(),
            ..Default::default()
        });
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn base_url_trailing_slash_trimmed() {
        let client = HttpAssistantClient::new(AssistantConfig {
            base_url: "http://localhost:8385/".into(),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(client.base_url(), "http://localhost:8385");
    }
}
