//! HTTP host adapter over the structured REST API and the legacy EWS endpoint.
//!
//! Token issuance is external: the adapter hands out the pre-issued token from
//! `MailboxConfig`. Compose writes create a draft message through the REST API.

use async_trait::async_trait;
use tracing::{debug, info};

use super::{AccessToken, ComposeContent, MailHost, UnreadQuery};
use crate::config::MailboxConfig;
use crate::error::HostError;

pub struct HttpMailHost {
    config: MailboxConfig,
    client: reqwest::Client,
}

impl HttpMailHost {
    pub fn new(config: MailboxConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    fn rest_url(&self, capability: &str) -> Result<&str, HostError> {
        self.config
            .rest_url
            .as_deref()
            .ok_or_else(|| HostError::Unsupported {
                capability: capability.to_string(),
            })
    }

    fn token(&self) -> Result<AccessToken, HostError> {
        self.config
            .access_token
            .clone()
            .map(AccessToken::from)
            .ok_or_else(|| HostError::TokenUnavailable {
                reason: "MAILBOX_ACCESS_TOKEN is not set".into(),
            })
    }
}

fn request_failed(operation: &str, e: reqwest::Error) -> HostError {
    HostError::RequestFailed {
        operation: operation.to_string(),
        reason: e.to_string(),
    }
}

async fn read_body(operation: &str, resp: reqwest::Response) -> Result<String, HostError> {
    let status = resp.status();
    if !status.is_success() {
        return Err(HostError::Http {
            operation: operation.to_string(),
            status: status.as_u16(),
        });
    }
    resp.text().await.map_err(|e| request_failed(operation, e))
}

#[async_trait]
impl MailHost for HttpMailHost {
    fn is_connected(&self) -> bool {
        self.config.rest_url.is_some() || self.config.ews_url.is_some()
    }

    async fn acquire_token(&self) -> Result<AccessToken, HostError> {
        self.token()
    }

    async fn query_unread(
        &self,
        token: &AccessToken,
        query: &UnreadQuery,
    ) -> Result<String, HostError> {
        let url = format!("{}{}", self.rest_url("structured query")?, query.to_path());
        debug!(folder = %query.folder, top = query.top, "Structured unread query");

        let resp = self
            .client
            .get(&url)
            .bearer_auth(token.expose())
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| request_failed("query_unread", e))?;

        read_body("query_unread", resp).await
    }

    async fn legacy_request(&self, envelope: &str) -> Result<String, HostError> {
        let url = self
            .config
            .ews_url
            .as_deref()
            .ok_or_else(|| HostError::Unsupported {
                capability: "legacy protocol".into(),
            })?;

        let mut request = self
            .client
            .post(url)
            .header("Content-Type", "text/xml; charset=utf-8")
            .body(envelope.to_string());
        if let Ok(token) = self.token() {
            request = request.bearer_auth(token.expose());
        }

        let resp = request
            .send()
            .await
            .map_err(|e| request_failed("legacy_request", e))?;

        read_body("legacy_request", resp).await
    }

    async fn write_compose(&self, content: &ComposeContent) -> Result<(), HostError> {
        let url = format!("{}/v2.0/me/messages", self.rest_url("compose")?);
        let token = self.token()?;

        let mut draft = serde_json::json!({
            "Body": { "ContentType": "HTML", "Content": content.body_html },
        });
        if let Some(subject) = &content.subject {
            draft["Subject"] = serde_json::Value::String(subject.clone());
        }

        let resp = self
            .client
            .post(&url)
            .bearer_auth(token.expose())
            .json(&draft)
            .send()
            .await
            .map_err(|e| request_failed("write_compose", e))?;

        read_body("write_compose", resp).await?;
        info!("Draft written to compose surface");
        Ok(())
    }
}
