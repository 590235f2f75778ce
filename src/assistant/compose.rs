//! Compose fallback policy.
//!
//! Drafting never fails: when the assistant cannot enhance the prompt, a
//! local template stands in and the result is marked as such.

use std::sync::Arc;

use tracing::{info, warn};

use super::client::AssistantClient;
use super::types::Tone;
use crate::error::ComposeError;
use crate::host::{ComposeContent, MailHost};

/// Prompts containing this word get the canned invitation ("ice cream").
pub const INVITATION_TRIGGER: &str = "גלידה";
pub const INVITATION_SUBJECT: &str = "הזמנה לגלידה! 🍦";
pub const INVITATION_BODY: &str =
    "היי!\n\nאני מזמינה אתכם לגלידה מחר בערב!\n\nאשמח לאישורי הגעה 😊\n\nבברכה";

const SALUTATION: &str = "היי,";
const CLOSING: &str = "בברכה";

/// Where a composed draft came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provenance {
    /// Enhanced by the assistant.
    Assistant,
    /// The assistant answered, but from its own rule-based fallback.
    AssistantFallback,
    /// The assistant failed; the local template was used.
    LocalTemplate,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposedEmail {
    pub subject: String,
    pub body: String,
    pub provenance: Provenance,
}

impl ComposedEmail {
    /// The draft was produced without the assistant.
    pub fn used_local_fallback(&self) -> bool {
        self.provenance == Provenance::LocalTemplate
    }
}

/// Deterministic local draft for `prompt`.
pub fn fallback_template(prompt: &str) -> ComposedEmail {
    let prompt = prompt.trim();
    if prompt.contains(INVITATION_TRIGGER) {
        return ComposedEmail {
            subject: INVITATION_SUBJECT.to_string(),
            body: INVITATION_BODY.to_string(),
            provenance: Provenance::LocalTemplate,
        };
    }

    ComposedEmail {
        subject: prompt.to_string(),
        body: format!("{SALUTATION}\n\n{prompt}\n\n{CLOSING}"),
        provenance: Provenance::LocalTemplate,
    }
}

pub struct Composer {
    assistant: Arc<dyn AssistantClient>,
    host: Arc<dyn MailHost>,
}

impl Composer {
    pub fn new(assistant: Arc<dyn AssistantClient>, host: Arc<dyn MailHost>) -> Self {
        Self { assistant, host }
    }

    /// Enhance `prompt` with the assistant, falling back to the local template.
    pub async fn draft(&self, prompt: &str, tone: Tone) -> ComposedEmail {
        match self.assistant.enhance_compose(prompt, tone).await {
            Ok(enhanced) => {
                let provenance = if enhanced.used_fallback {
                    Provenance::AssistantFallback
                } else {
                    Provenance::Assistant
                };
                info!(tone = %tone, ?provenance, "Draft composed by assistant");
                ComposedEmail {
                    subject: enhanced.subject,
                    body: enhanced.body,
                    provenance,
                }
            }
            Err(e) => {
                warn!(error = %e, "Compose enhancement failed, using local template");
                fallback_template(prompt)
            }
        }
    }

    /// Draft and write the result to the host compose surface.
    ///
    /// The subject is only written when `write_subject` is set, so replies
    /// keep the subject the host already filled in.
    pub async fn compose_into_host(
        &self,
        prompt: &str,
        tone: Tone,
        write_subject: bool,
    ) -> Result<ComposedEmail, ComposeError> {
        if prompt.trim().is_empty() {
            return Err(ComposeError::EmptyPrompt);
        }

        let draft = self.draft(prompt, tone).await;
        let subject = write_subject.then(|| draft.subject.clone());
        self.host
            .write_compose(&ComposeContent::from_text(subject, &draft.body))
            .await?;
        Ok(draft)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::assistant::types::{EnhancedEmail, IndexAck, QueryAnswer, QueryScope, SuggestedReply, Summary};
    use crate::error::{AssistantError, HostError};
    use crate::host::{AccessToken, UnreadQuery};
    use crate::mail::{CalendarEvent, MailItem};

    struct MockAssistant {
        enhanced: Result<EnhancedEmail, AssistantError>,
    }

    fn unused() -> AssistantError {
        AssistantError::Network {
            endpoint: "unused".into(),
            reason: "not scripted".into(),
        }
    }

    #[async_trait]
    impl AssistantClient for MockAssistant {
        async fn enhance_compose(
            &self,
            _text: &str,
            _tone: Tone,
        ) -> Result<EnhancedEmail, AssistantError> {
            self.enhanced.clone()
        }

        async fn summarize(&self, _item: &MailItem) -> Result<Summary, AssistantError> {
            Err(unused())
        }

        async fn suggest_reply(&self, _item: &MailItem) -> Result<SuggestedReply, AssistantError> {
            Err(unused())
        }

        async fn summarize_unread(&self, _items: &[MailItem]) -> Result<Summary, AssistantError> {
            Err(unused())
        }

        async fn query_indexed(
            &self,
            _question: &str,
            _scope: QueryScope,
        ) -> Result<QueryAnswer, AssistantError> {
            Err(unused())
        }

        async fn index_items(
            &self,
            _mail: &[MailItem],
            _events: &[CalendarEvent],
        ) -> Result<IndexAck, AssistantError> {
            Err(unused())
        }

        async fn health(&self) -> Result<(), AssistantError> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingHost {
        written: Mutex<Vec<ComposeContent>>,
    }

    #[async_trait]
    impl MailHost for RecordingHost {
        fn is_connected(&self) -> bool {
            true
        }

        async fn acquire_token(&self) -> Result<AccessToken, HostError> {
            Ok(AccessToken::new("t"))
        }

        async fn query_unread(
            &self,
            _token: &AccessToken,
            _query: &UnreadQuery,
        ) -> Result<String, HostError> {
            Ok("[]".into())
        }

        async fn legacy_request(&self, _envelope: &str) -> Result<String, HostError> {
            Err(HostError::NotConnected)
        }

        async fn write_compose(&self, content: &ComposeContent) -> Result<(), HostError> {
            self.written.lock().unwrap().push(content.clone());
            Ok(())
        }
    }

    fn composer(
        enhanced: Result<EnhancedEmail, AssistantError>,
    ) -> (Composer, Arc<RecordingHost>) {
        let host = Arc::new(RecordingHost::default());
        let composer = Composer::new(Arc::new(MockAssistant { enhanced }), host.clone());
        (composer, host)
    }

    #[test]
    fn invitation_trigger_uses_canned_draft() {
        let draft = fallback_template("  בואו לגלידה מחר  ");
        assert_eq!(draft.subject, INVITATION_SUBJECT);
        assert_eq!(draft.body, INVITATION_BODY);
        assert!(draft.used_local_fallback());
    }

    #[test]
    fn generic_template_wraps_prompt() {
        let draft = fallback_template("  Meeting moved to Thursday ");
        assert_eq!(draft.subject, "Meeting moved to Thursday");
        assert_eq!(draft.body, "היי,\n\nMeeting moved to Thursday\n\nבברכה");
    }

    #[tokio::test]
    async fn draft_uses_assistant_result() {
        let (composer, _) = composer(Ok(EnhancedEmail {
            subject: "Quarterly update".into(),
            body: "Dear team,".into(),
            was_enhanced: true,
            used_fallback: false,
        }));
        let draft = composer.draft("update the team", Tone::Formal).await;
        assert_eq!(draft.subject, "Quarterly update");
        assert_eq!(draft.provenance, Provenance::Assistant);
    }

    #[tokio::test]
    async fn draft_marks_assistant_side_fallback() {
        let (composer, _) = composer(Ok(EnhancedEmail {
            subject: "s".into(),
            body: "b".into(),
            was_enhanced: true,
            used_fallback: true,
        }));
        let draft = composer.draft("x", Tone::Friendly).await;
        assert_eq!(draft.provenance, Provenance::AssistantFallback);
        assert!(!draft.used_local_fallback());
    }

    #[tokio::test]
    async fn draft_falls_back_on_any_failure() {
        let failures = [
            AssistantError::Network {
                endpoint: "/enhanceEmail".into(),
                reason: "connection refused".into(),
            },
            AssistantError::ServerError {
                endpoint: "/enhanceEmail".into(),
                status: 500,
                message: "boom".into(),
            },
            AssistantError::Malformed {
                endpoint: "/enhanceEmail".into(),
                reason: "missing subject".into(),
            },
        ];
        for failure in failures {
            let (composer, _) = composer(Err(failure));
            let draft = composer.draft("הזמנה לגלידה", Tone::Friendly).await;
            assert_eq!(draft, fallback_template("הזמנה לגלידה"));
        }
    }

    #[tokio::test]
    async fn compose_into_host_rejects_blank_prompt() {
        let (composer, host) = composer(Err(unused()));
        let err = composer
            .compose_into_host("   ", Tone::Professional, true)
            .await
            .unwrap_err();
        assert!(matches!(err, ComposeError::EmptyPrompt));
        assert!(host.written.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn compose_into_host_writes_html_body() {
        let (composer, host) = composer(Err(unused()));
        composer
            .compose_into_host("Lunch at noon", Tone::Friendly, true)
            .await
            .unwrap();
        composer
            .compose_into_host("Lunch at noon", Tone::Friendly, false)
            .await
            .unwrap();

        let written = host.written.lock().unwrap();
        assert_eq!(written[0].subject.as_deref(), Some("Lunch at noon"));
        assert_eq!(written[0].body_html, "היי,<br><br>Lunch at noon<br><br>בברכה");
        assert_eq!(written[1].subject, None);
    }
}
